//! Certificate issuance for approved graduation batches.
//!
//! Issuance walks the passing snapshot rows of an approved batch,
//! allocating each a sequential number and an unguessable verification
//! hash, persisting the certificate records, and flipping the batch to
//! issued — all in one transaction. Rendering runs strictly after that
//! commit and backfills `pdf_path`; failed renders are reported in the
//! outcome and can be retried.

mod error;
mod issuer;
mod record;
mod verification;


pub use error::IssueError;
pub use issuer::{
    CERTIFICATE_TYPE_GRADUATION, CertificateIssuer, IssuanceOutcome, RenderFailure,
};
pub use record::IssuedCertificate;
pub use verification::verification_url;
