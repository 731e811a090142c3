//! Interfaces to the surrounding platform.
//!
//! The graduation core consumes exam results, grading policy, certificate
//! templates, blob storage, the PDF rendering backend, and the QR encoder
//! from the rest of the system. Each dependency is a trait here; the
//! platform wires concrete implementations at composition time, and tests
//! use the fixtures in `testutil`.
//!
//! All traits are object-safe and `Send + Sync` so services can hold them
//! as `Arc<dyn ...>`.

use thiserror::Error;

use crate::render::{CertificateTemplate, RenderJob, RenderedArtifact};

/// Errors surfaced by an external provider.
///
/// Providers are opaque to this crate: any failure they report is an
/// infrastructure failure from the core's point of view and is the
/// caller's to retry.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProviderError {
    /// The provider backend failed.
    #[error("{provider} provider failure: {reason}")]
    Backend {
        /// Which provider failed (e.g. `exam_read_model`, `render_backend`).
        provider: &'static str,
        /// Human-readable failure description.
        reason: String,
    },

    /// I/O failure while reaching the provider.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    /// Convenience constructor for backend failures.
    #[must_use]
    pub fn backend(provider: &'static str, reason: impl Into<String>) -> Self {
        Self::Backend {
            provider,
            reason: reason.into(),
        }
    }
}

/// Lifecycle state of an exam, as reported by the exam read model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ExamStatus {
    /// The exam has been scheduled but not conducted.
    Scheduled,

    /// The exam has been conducted; results are still being entered.
    Conducted,

    /// Results have been finalized and may be used for eligibility.
    Finalized,
}

impl ExamStatus {
    /// Returns `true` once results may be consumed for eligibility.
    #[must_use]
    pub const fn is_finalized(&self) -> bool {
        matches!(self, Self::Finalized)
    }
}

/// One subject in the eligibility scope of an exam-class pair.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectScope {
    /// Subject identifier.
    pub subject_id: String,

    /// Display name of the subject.
    pub subject_name: String,

    /// The exam this subject was examined under.
    pub exam_id: String,

    /// Maximum obtainable marks. `None` when the subject is ungraded
    /// (excluded from the percentage).
    pub total_marks: Option<f64>,

    /// Minimum marks required to pass the subject.
    pub passing_marks: Option<f64>,
}

/// A recorded result for one student in one subject.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SubjectResult {
    /// Marks obtained, when the student sat the subject.
    pub marks_obtained: Option<f64>,

    /// Whether the student was marked absent.
    pub is_absent: bool,
}

/// A resolved student identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentRef {
    /// The student identifier used across the platform.
    pub student_id: String,

    /// Full display name, as printed on the certificate.
    pub full_name: String,

    /// Guardian name, when recorded.
    pub guardian_name: Option<String>,

    /// Blob-storage path of the student photo, when one exists.
    pub photo_path: Option<String>,
}

/// Read model over exam and enrollment data.
pub trait ExamReadModel: Send + Sync {
    /// Looks up the lifecycle status of an exam within the organization.
    ///
    /// Returns `None` when the exam does not exist in the organization.
    ///
    /// # Errors
    ///
    /// Returns an error if the read model is unavailable.
    fn exam_status(&self, org: &str, exam_id: &str) -> Result<Option<ExamStatus>, ProviderError>;

    /// Resolves the subject scope for an academic-year + class pair across
    /// the given exams. An empty result means the pair has no eligibility
    /// scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the read model is unavailable.
    fn subjects_in_scope(
        &self,
        org: &str,
        school: &str,
        academic_year: &str,
        class_name: &str,
        exam_ids: &[String],
    ) -> Result<Vec<SubjectScope>, ProviderError>;

    /// Lists enrollment identifiers of the students enrolled in the class
    /// for the academic year.
    ///
    /// # Errors
    ///
    /// Returns an error if the read model is unavailable.
    fn enrolled_students(
        &self,
        org: &str,
        school: &str,
        academic_year: &str,
        class_name: &str,
    ) -> Result<Vec<String>, ProviderError>;

    /// Looks up the recorded result of one student in one subject.
    ///
    /// Returns `None` when no result row was ever recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if the read model is unavailable.
    fn result_for(
        &self,
        org: &str,
        exam_id: &str,
        subject_id: &str,
        student_id: &str,
    ) -> Result<Option<SubjectResult>, ProviderError>;

    /// Resolves an enrollment identifier to a student identity.
    ///
    /// Returns `None` when the identity cannot be resolved; such students
    /// are dropped from eligibility output.
    ///
    /// # Errors
    ///
    /// Returns an error if the read model is unavailable.
    fn resolve_student(
        &self,
        org: &str,
        student_id: &str,
    ) -> Result<Option<StudentRef>, ProviderError>;
}

/// Organization-level grading policy.
pub trait GradePolicy: Send + Sync {
    /// Judges a percentage against the organization's grading
    /// configuration.
    ///
    /// Returns `None` when no grading configuration constrains the result
    /// ("no additional constraint").
    ///
    /// # Errors
    ///
    /// Returns an error if the policy backend is unavailable.
    fn is_pass(&self, org: &str, percentage: Option<f64>) -> Result<Option<bool>, ProviderError>;
}

/// Lookup of certificate templates.
///
/// The store resolves a template by id within an organization; the issuer
/// enforces the active flag and school-or-global scoping on the returned
/// template.
pub trait TemplateStore: Send + Sync {
    /// Looks up a template by id within the organization.
    ///
    /// Returns `None` when no such template exists in the organization.
    ///
    /// # Errors
    ///
    /// Returns an error if the template store is unavailable.
    fn find_template(
        &self,
        org: &str,
        template_id: &str,
    ) -> Result<Option<CertificateTemplate>, ProviderError>;
}

/// Read access to stored blobs (background images, student photos).
pub trait BlobStorage: Send + Sync {
    /// Reads the blob at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob is missing or unreadable.
    fn read(&self, path: &str) -> Result<Vec<u8>, ProviderError>;
}

/// The opaque PDF rendering backend.
///
/// Receives a fully resolved render job (layout, field values, images) and
/// produces a stored PDF artifact. The layout language itself is outside
/// this crate.
pub trait RenderBackend: Send + Sync {
    /// Renders the job to a PDF and returns the stored artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or artifact storage fails.
    fn render(&self, job: &RenderJob) -> Result<RenderedArtifact, ProviderError>;
}

/// QR code encoder.
pub trait QrEncoder: Send + Sync {
    /// Encodes the payload into a QR image (PNG bytes).
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    fn encode(&self, payload: &str) -> Result<Vec<u8>, ProviderError>;
}
