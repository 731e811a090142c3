//! Certificate render orchestration.
//!
//! The orchestrator resolves all placeholder values for one certificate
//! and template into a flat field→value map plus image attachments, then
//! delegates to the opaque [`crate::providers::RenderBackend`]. Two
//! template modes are supported:
//!
//! - **Coordinate layout**: each field carries an x/y percentage position
//!   and optional font overrides, rendered over a background image.
//!   Takes precedence when present.
//! - **Legacy HTML**: `{{field}}` tokens substituted inside an HTML body.

mod error;
mod fields;
mod orchestrator;
mod template;


pub use error::RenderError;
pub use fields::{
    FIELD_ACADEMIC_YEAR, FIELD_CERTIFICATE_NO, FIELD_CLASS_NAME, FIELD_GRADUATION_DATE,
    FIELD_GUARDIAN_NAME, FIELD_POSITION, FIELD_STUDENT_NAME, FIELD_VERIFICATION_URL,
    IMAGE_QR_CODE, IMAGE_STUDENT_PHOTO, ordinal,
};
pub use orchestrator::RenderOrchestrator;
pub use template::{
    CertificateTemplate, CoordinateLayout, FieldPlacement, FontOverride, PageSize, RenderJob,
    RenderLayout, RenderedArtifact,
};
