//! Issued certificate record.

use chrono::{DateTime, Utc};

use crate::batch::BatchId;
use crate::tenant::{ActorId, OrgId, SchoolId};

/// A persisted certificate.
///
/// Created once during issuance and immutable thereafter except for the
/// `pdf_path` backfill once rendering completes. Certificates outlive
/// their batch: they remain valid for verification even if the batch
/// record is later archived.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedCertificate {
    /// Unique identifier.
    pub id: String,

    /// Owning organization.
    pub organization_id: OrgId,

    /// School the certificate was issued under.
    pub school_id: SchoolId,

    /// Template the certificate renders with.
    pub template_id: String,

    /// The batch that produced this certificate.
    pub batch_id: BatchId,

    /// The certified student.
    pub student_id: String,

    /// Sequential certificate number, unique per organization
    /// (e.g. `PFX-GRADUATION-2025-0001`).
    pub certificate_no: String,

    /// Unguessable token for public authenticity lookup. Globally unique.
    pub verification_hash: String,

    /// Payload encoded into the certificate's QR code (the verification
    /// URL).
    pub qr_payload: String,

    /// Stored path of the rendered PDF; `None` until rendering completes.
    pub pdf_path: Option<String>,

    /// Actor who issued the batch.
    pub issued_by: ActorId,

    /// Issuance timestamp.
    pub issued_at: DateTime<Utc>,
}
