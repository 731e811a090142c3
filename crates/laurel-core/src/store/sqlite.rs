//! `SQLite` storage backend.
//!
//! The [`GraduationStore`] struct wraps a single connection behind a
//! mutex for concurrent callers within one process; separate processes
//! or threads may open further stores against the same path. WAL mode
//! plus `busy_timeout` arbitrate between them.

// Mutex poisoning indicates a panic in another thread, which is unrecoverable.
#![allow(clippy::missing_panics_doc)]

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OpenFlags, OptionalExtension, Transaction, params};
use thiserror::Error;

use crate::batch::{BatchStatus, GraduationBatch, GraduationStudent};
use crate::certificate::IssuedCertificate;
use crate::eligibility::{EligibilityReport, FinalResult};
use crate::error::ErrorClass;

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Database error from `SQLite`.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error during database operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure for a stored column.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A unique index rejected an insert. Prevented by the locking
    /// protocol; kept as defense-in-depth.
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation {
        /// The violated constraint, as reported by `SQLite`.
        constraint: String,
    },

    /// A stored row failed to deserialize.
    #[error("corrupt {entity} row: bad {field} value '{value}'")]
    Corrupt {
        /// The entity whose row is corrupt.
        entity: &'static str,
        /// The offending column.
        field: &'static str,
        /// The stored value.
        value: String,
    },
}

impl StoreError {
    /// Maps the error onto the shared failure taxonomy.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::UniqueViolation { .. } => ErrorClass::Conflict,
            Self::Database(_) | Self::Io(_) | Self::Serialize(_) | Self::Corrupt { .. } => {
                ErrorClass::Infrastructure
            }
        }
    }
}

/// Maps insert failures so unique-index rejections surface as
/// [`StoreError::UniqueViolation`] rather than a bare database error.
fn map_insert_error(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(e, msg)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::UniqueViolation {
                constraint: msg.unwrap_or_else(|| "unique constraint".to_owned()),
            }
        }
        other => StoreError::Database(other),
    }
}

/// The graduation core's storage backend.
///
/// Opens with WAL mode so readers never block behind the writer. All
/// mutating operations in this crate run inside immediate transactions
/// obtained from [`lock`](Self::lock); the write lock taken at `BEGIN
/// IMMEDIATE` is the `SQLite` analog of the row locks the design calls
/// for.
#[derive(Clone)]
pub struct GraduationStore {
    conn: Arc<Mutex<Connection>>,
}

impl GraduationStore {
    /// Opens or creates the database at the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::initialize_connection(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_connection(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Initialize the connection with schema and pragmas.
    fn initialize_connection(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    /// Acquires the connection for a transaction or read.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    /// Loads a batch by id within the tenant scope.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure or a corrupt row.
    pub fn batch(
        &self,
        org: &str,
        school: &str,
        batch_id: &str,
    ) -> Result<Option<GraduationBatch>, StoreError> {
        let conn = self.lock();
        load_batch(&conn, org, school, batch_id)
    }

    /// Loads the eligibility snapshot rows of a batch.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure or a corrupt row.
    pub fn students_for_batch(&self, batch_id: &str) -> Result<Vec<GraduationStudent>, StoreError> {
        let conn = self.lock();
        load_students(&conn, batch_id)
    }

    /// Loads the certificates issued for a batch.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure or a corrupt row.
    pub fn certificates_for_batch(
        &self,
        batch_id: &str,
    ) -> Result<Vec<IssuedCertificate>, StoreError> {
        let conn = self.lock();
        load_certificates(&conn, batch_id)
    }

    /// Looks up a certificate by its verification hash (public
    /// authenticity lookup).
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure or a corrupt row.
    pub fn certificate_by_hash(
        &self,
        verification_hash: &str,
    ) -> Result<Option<IssuedCertificate>, StoreError> {
        let conn = self.lock();
        load_certificate_by_hash(&conn, verification_hash)
    }

    /// Reads the current value of an organization counter, if the counter
    /// row exists.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn counter_value(&self, org: &str, counter_type: &str) -> Result<Option<i64>, StoreError> {
        let conn = self.lock();
        load_counter(&conn, org, counter_type)
    }
}

impl std::fmt::Debug for GraduationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraduationStore").finish_non_exhaustive()
    }
}

// =============================================================================
// Batches
// =============================================================================

type RawBatchRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
);

const BATCH_COLUMNS: &str = "id, organization_id, school_id, academic_year, class_name, exam_ids, \
     graduation_date, status, created_by, created_at, approved_by, approved_at";

fn hydrate_batch(raw: RawBatchRow) -> Result<GraduationBatch, StoreError> {
    let (
        id,
        organization_id,
        school_id,
        academic_year,
        class_name,
        exam_ids,
        graduation_date,
        status,
        created_by,
        created_at,
        approved_by,
        approved_at,
    ) = raw;

    let exam_ids: Vec<String> =
        serde_json::from_str(&exam_ids).map_err(|_| StoreError::Corrupt {
            entity: "graduation_batch",
            field: "exam_ids",
            value: exam_ids,
        })?;
    let graduation_date = parse_date("graduation_batch", "graduation_date", &graduation_date)?;
    let status = BatchStatus::parse(&status).ok_or(StoreError::Corrupt {
        entity: "graduation_batch",
        field: "status",
        value: status,
    })?;
    let created_at = parse_timestamp("graduation_batch", "created_at", &created_at)?;
    let approved_at = approved_at
        .map(|t| parse_timestamp("graduation_batch", "approved_at", &t))
        .transpose()?;

    Ok(GraduationBatch {
        id,
        organization_id,
        school_id,
        academic_year,
        class_name,
        exam_ids,
        graduation_date,
        status,
        created_by,
        created_at,
        approved_by,
        approved_at,
    })
}

pub(crate) fn insert_batch(
    tx: &Transaction<'_>,
    batch: &GraduationBatch,
) -> Result<(), StoreError> {
    let exam_ids = serde_json::to_string(&batch.exam_ids)?;
    tx.execute(
        "INSERT INTO graduation_batches (id, organization_id, school_id, academic_year, \
         class_name, exam_ids, graduation_date, status, created_by, created_at, approved_by, \
         approved_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            batch.id,
            batch.organization_id,
            batch.school_id,
            batch.academic_year,
            batch.class_name,
            exam_ids,
            batch.graduation_date.format("%Y-%m-%d").to_string(),
            batch.status.as_str(),
            batch.created_by,
            batch.created_at.to_rfc3339(),
            batch.approved_by,
            batch.approved_at.map(|t| t.to_rfc3339()),
        ],
    )
    .map_err(map_insert_error)?;
    Ok(())
}

pub(crate) fn load_batch(
    conn: &Connection,
    org: &str,
    school: &str,
    batch_id: &str,
) -> Result<Option<GraduationBatch>, StoreError> {
    let raw: Option<RawBatchRow> = conn
        .query_row(
            &format!(
                "SELECT {BATCH_COLUMNS} FROM graduation_batches
                 WHERE id = ?1 AND organization_id = ?2 AND school_id = ?3"
            ),
            params![batch_id, org, school],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                    row.get(9)?,
                    row.get(10)?,
                    row.get(11)?,
                ))
            },
        )
        .optional()?;

    raw.map(hydrate_batch).transpose()
}

pub(crate) fn mark_approved(
    tx: &Transaction<'_>,
    batch_id: &str,
    approved_by: &str,
    approved_at: DateTime<Utc>,
) -> Result<(), StoreError> {
    tx.execute(
        "UPDATE graduation_batches
         SET status = ?1, approved_by = ?2, approved_at = ?3
         WHERE id = ?4",
        params![
            BatchStatus::Approved.as_str(),
            approved_by,
            approved_at.to_rfc3339(),
            batch_id,
        ],
    )?;
    Ok(())
}

pub(crate) fn mark_issued(tx: &Transaction<'_>, batch_id: &str) -> Result<(), StoreError> {
    tx.execute(
        "UPDATE graduation_batches SET status = ?1 WHERE id = ?2",
        params![BatchStatus::Issued.as_str(), batch_id],
    )?;
    Ok(())
}

// =============================================================================
// Eligibility snapshot rows
// =============================================================================

type RawStudentRow = (String, String, String, String, Option<i64>, String);

const STUDENT_COLUMNS: &str =
    "id, batch_id, student_id, final_result_status, position, eligibility_json";

fn hydrate_student(raw: RawStudentRow) -> Result<GraduationStudent, StoreError> {
    let (id, batch_id, student_id, final_result, position, eligibility_json) = raw;

    let final_result = FinalResult::parse(&final_result).ok_or(StoreError::Corrupt {
        entity: "graduation_student",
        field: "final_result_status",
        value: final_result,
    })?;
    let position = position
        .map(|p| {
            u32::try_from(p).map_err(|_| StoreError::Corrupt {
                entity: "graduation_student",
                field: "position",
                value: p.to_string(),
            })
        })
        .transpose()?;
    let report: EligibilityReport =
        serde_json::from_str(&eligibility_json).map_err(|_| StoreError::Corrupt {
            entity: "graduation_student",
            field: "eligibility_json",
            value: eligibility_json,
        })?;

    Ok(GraduationStudent {
        id,
        batch_id,
        student_id,
        final_result,
        position,
        report,
    })
}

pub(crate) fn insert_student(
    tx: &Transaction<'_>,
    student: &GraduationStudent,
) -> Result<(), StoreError> {
    let eligibility_json = serde_json::to_string(&student.report)?;
    tx.execute(
        "INSERT INTO graduation_students (id, batch_id, student_id, final_result_status, \
         position, eligibility_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            student.id,
            student.batch_id,
            student.student_id,
            student.final_result.as_str(),
            student.position.map(i64::from),
            eligibility_json,
        ],
    )
    .map_err(map_insert_error)?;
    Ok(())
}

pub(crate) fn delete_students(tx: &Transaction<'_>, batch_id: &str) -> Result<usize, StoreError> {
    let deleted = tx.execute(
        "DELETE FROM graduation_students WHERE batch_id = ?1",
        params![batch_id],
    )?;
    Ok(deleted)
}

fn query_students(
    conn: &Connection,
    sql: &str,
    batch_id: &str,
) -> Result<Vec<GraduationStudent>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![batch_id], |row| {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ))
    })?;

    let mut students = Vec::new();
    for raw in rows {
        students.push(hydrate_student(raw?)?);
    }
    Ok(students)
}

pub(crate) fn load_students(
    conn: &Connection,
    batch_id: &str,
) -> Result<Vec<GraduationStudent>, StoreError> {
    query_students(
        conn,
        &format!(
            "SELECT {STUDENT_COLUMNS} FROM graduation_students
             WHERE batch_id = ?1
             ORDER BY position IS NULL, position, student_id"
        ),
        batch_id,
    )
}

pub(crate) fn load_passing_students(
    conn: &Connection,
    batch_id: &str,
) -> Result<Vec<GraduationStudent>, StoreError> {
    query_students(
        conn,
        &format!(
            "SELECT {STUDENT_COLUMNS} FROM graduation_students
             WHERE batch_id = ?1 AND final_result_status = 'pass'
             ORDER BY position IS NULL, position, student_id"
        ),
        batch_id,
    )
}

// =============================================================================
// Issued certificates
// =============================================================================

type RawCertificateRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    String,
);

const CERTIFICATE_COLUMNS: &str = "id, organization_id, school_id, template_id, batch_id, \
     student_id, certificate_no, verification_hash, qr_payload, pdf_path, issued_by, issued_at";

fn hydrate_certificate(raw: RawCertificateRow) -> Result<IssuedCertificate, StoreError> {
    let (
        id,
        organization_id,
        school_id,
        template_id,
        batch_id,
        student_id,
        certificate_no,
        verification_hash,
        qr_payload,
        pdf_path,
        issued_by,
        issued_at,
    ) = raw;

    let issued_at = parse_timestamp("issued_certificate", "issued_at", &issued_at)?;

    Ok(IssuedCertificate {
        id,
        organization_id,
        school_id,
        template_id,
        batch_id,
        student_id,
        certificate_no,
        verification_hash,
        qr_payload,
        pdf_path,
        issued_by,
        issued_at,
    })
}

pub(crate) fn insert_certificate(
    tx: &Transaction<'_>,
    certificate: &IssuedCertificate,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO issued_certificates (id, organization_id, school_id, template_id, batch_id, \
         student_id, certificate_no, verification_hash, qr_payload, pdf_path, issued_by, \
         issued_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            certificate.id,
            certificate.organization_id,
            certificate.school_id,
            certificate.template_id,
            certificate.batch_id,
            certificate.student_id,
            certificate.certificate_no,
            certificate.verification_hash,
            certificate.qr_payload,
            certificate.pdf_path,
            certificate.issued_by,
            certificate.issued_at.to_rfc3339(),
        ],
    )
    .map_err(map_insert_error)?;
    Ok(())
}

pub(crate) fn set_pdf_path(
    tx: &Transaction<'_>,
    certificate_id: &str,
    pdf_path: &str,
) -> Result<(), StoreError> {
    tx.execute(
        "UPDATE issued_certificates SET pdf_path = ?1 WHERE id = ?2",
        params![pdf_path, certificate_id],
    )?;
    Ok(())
}

fn query_certificates(
    conn: &Connection,
    sql: &str,
    batch_id: &str,
) -> Result<Vec<IssuedCertificate>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![batch_id], |row| {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
            row.get(9)?,
            row.get(10)?,
            row.get(11)?,
        ))
    })?;

    let mut certificates = Vec::new();
    for raw in rows {
        certificates.push(hydrate_certificate(raw?)?);
    }
    Ok(certificates)
}

pub(crate) fn load_certificates(
    conn: &Connection,
    batch_id: &str,
) -> Result<Vec<IssuedCertificate>, StoreError> {
    query_certificates(
        conn,
        &format!(
            "SELECT {CERTIFICATE_COLUMNS} FROM issued_certificates
             WHERE batch_id = ?1
             ORDER BY certificate_no"
        ),
        batch_id,
    )
}

pub(crate) fn load_pending_renders(
    conn: &Connection,
    batch_id: &str,
) -> Result<Vec<IssuedCertificate>, StoreError> {
    query_certificates(
        conn,
        &format!(
            "SELECT {CERTIFICATE_COLUMNS} FROM issued_certificates
             WHERE batch_id = ?1 AND pdf_path IS NULL
             ORDER BY certificate_no"
        ),
        batch_id,
    )
}

pub(crate) fn load_certificate_by_hash(
    conn: &Connection,
    verification_hash: &str,
) -> Result<Option<IssuedCertificate>, StoreError> {
    let raw: Option<RawCertificateRow> = conn
        .query_row(
            &format!(
                "SELECT {CERTIFICATE_COLUMNS} FROM issued_certificates
                 WHERE verification_hash = ?1"
            ),
            params![verification_hash],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                    row.get(9)?,
                    row.get(10)?,
                    row.get(11)?,
                ))
            },
        )
        .optional()?;

    raw.map(hydrate_certificate).transpose()
}

// =============================================================================
// Organization counters
// =============================================================================

pub(crate) fn load_counter(
    conn: &Connection,
    org: &str,
    counter_type: &str,
) -> Result<Option<i64>, StoreError> {
    let value = conn
        .query_row(
            "SELECT last_value FROM org_counters
             WHERE organization_id = ?1 AND counter_type = ?2",
            params![org, counter_type],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

// =============================================================================
// Parsing helpers
// =============================================================================

fn parse_timestamp(
    entity: &'static str,
    field: &'static str,
    value: &str,
) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| StoreError::Corrupt {
            entity,
            field,
            value: value.to_owned(),
        })
}

fn parse_date(
    entity: &'static str,
    field: &'static str,
    value: &str,
) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| StoreError::Corrupt {
        entity,
        field,
        value: value.to_owned(),
    })
}
