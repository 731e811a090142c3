//! Field resolution helpers: placeholder values, date formatting,
//! ordinal suffixes, and legacy `{{field}}` substitution.

use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

use crate::batch::GraduationBatch;
use crate::certificate::IssuedCertificate;
use crate::providers::StudentRef;

/// Field name of the certificate number.
pub const FIELD_CERTIFICATE_NO: &str = "certificate_no";

/// Field name of the student's display name.
pub const FIELD_STUDENT_NAME: &str = "student_name";

/// Field name of the guardian's name.
pub const FIELD_GUARDIAN_NAME: &str = "guardian_name";

/// Field name of the class.
pub const FIELD_CLASS_NAME: &str = "class_name";

/// Field name of the academic year.
pub const FIELD_ACADEMIC_YEAR: &str = "academic_year";

/// Field name of the formatted graduation date.
pub const FIELD_GRADUATION_DATE: &str = "graduation_date";

/// Field name of the ordinal rank.
pub const FIELD_POSITION: &str = "position";

/// Field name of the verification URL.
pub const FIELD_VERIFICATION_URL: &str = "verification_url";

/// Image field name of the student photo.
pub const IMAGE_STUDENT_PHOTO: &str = "student_photo";

/// Image field name of the QR code.
pub const IMAGE_QR_CODE: &str = "qr_code";

/// Appends the English ordinal suffix to `n`.
///
/// 1→"1st", 2→"2nd", 3→"3rd", 4→"4th"; 11, 12, and 13 (and 111, 212, …)
/// always take "th" regardless of their last digit.
#[must_use]
pub fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

/// Formats the graduation date as printed on the certificate
/// (e.g. `5 August 2025`).
#[must_use]
pub(crate) fn format_graduation_date(date: NaiveDate) -> String {
    format!("{} {}", date.day(), date.format("%B %Y"))
}

/// Resolves the field→value map for one certificate.
///
/// Fields whose data is missing (no guardian, no rank) are omitted
/// entirely rather than rendered empty.
#[must_use]
pub(crate) fn resolve_fields(
    certificate: &IssuedCertificate,
    batch: &GraduationBatch,
    student: &StudentRef,
    position: Option<u32>,
) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    fields.insert(
        FIELD_CERTIFICATE_NO.to_owned(),
        certificate.certificate_no.clone(),
    );
    fields.insert(FIELD_STUDENT_NAME.to_owned(), student.full_name.clone());
    if let Some(guardian) = &student.guardian_name {
        fields.insert(FIELD_GUARDIAN_NAME.to_owned(), guardian.clone());
    }
    fields.insert(FIELD_CLASS_NAME.to_owned(), batch.class_name.clone());
    fields.insert(FIELD_ACADEMIC_YEAR.to_owned(), batch.academic_year.clone());
    fields.insert(
        FIELD_GRADUATION_DATE.to_owned(),
        format_graduation_date(batch.graduation_date),
    );
    if let Some(position) = position {
        fields.insert(FIELD_POSITION.to_owned(), ordinal(position));
    }
    fields.insert(
        FIELD_VERIFICATION_URL.to_owned(),
        certificate.qr_payload.clone(),
    );
    fields
}

/// Substitutes `{{field}}` tokens in a legacy HTML body.
///
/// Token names may carry surrounding whitespace (`{{ student_name }}`).
/// Unknown or missing fields substitute to the empty string.
#[must_use]
pub(crate) fn substitute_placeholders(body: &str, fields: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let token = after[..end].trim();
                if let Some(value) = fields.get(token) {
                    out.push_str(value);
                }
                rest = &after[end + 2..];
            }
            None => {
                // Unterminated token: emit the remainder verbatim.
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
