//! The render orchestrator.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::batch::GraduationBatch;
use crate::certificate::IssuedCertificate;
use crate::providers::{BlobStorage, QrEncoder, RenderBackend, StudentRef};

use super::error::RenderError;
use super::fields::{self, IMAGE_QR_CODE, IMAGE_STUDENT_PHOTO};
use super::template::{CertificateTemplate, RenderJob, RenderLayout, RenderedArtifact};

/// Maps one certificate + template to a resolved render job and
/// delegates to the rendering backend.
pub struct RenderOrchestrator {
    blobs: Arc<dyn BlobStorage>,
    backend: Arc<dyn RenderBackend>,
    qr: Arc<dyn QrEncoder>,
}

impl RenderOrchestrator {
    /// Creates an orchestrator over the given providers.
    #[must_use]
    pub fn new(
        blobs: Arc<dyn BlobStorage>,
        backend: Arc<dyn RenderBackend>,
        qr: Arc<dyn QrEncoder>,
    ) -> Self {
        Self { blobs, backend, qr }
    }

    /// Renders one certificate and returns the stored artifact.
    ///
    /// The coordinate layout takes precedence when the template carries
    /// one; otherwise the legacy HTML body is used with its `{{field}}`
    /// tokens substituted. Missing optional data (photo, rank, guardian)
    /// omits the field rather than failing.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::MissingLayout`] when the template has no
    /// layout at all, or a provider error from blob reads, QR encoding,
    /// or the backend.
    pub fn render_certificate(
        &self,
        certificate: &IssuedCertificate,
        batch: &GraduationBatch,
        student: &StudentRef,
        position: Option<u32>,
        template: &CertificateTemplate,
    ) -> Result<RenderedArtifact, RenderError> {
        let field_values = fields::resolve_fields(certificate, batch, student, position);

        let layout = if let Some(coordinate) = &template.coordinate_layout {
            let background = match &coordinate.background_path {
                Some(path) => Some(self.blobs.read(path)?),
                None => None,
            };
            RenderLayout::Coordinate {
                background,
                placements: coordinate.fields.clone(),
            }
        } else if let Some(body) = &template.html_body {
            RenderLayout::Html {
                body: fields::substitute_placeholders(body, &field_values),
            }
        } else {
            return Err(RenderError::MissingLayout {
                template_id: template.id.clone(),
            });
        };

        let mut images = std::collections::BTreeMap::new();
        images.insert(
            IMAGE_QR_CODE.to_owned(),
            self.qr.encode(&certificate.qr_payload)?,
        );
        if let Some(photo_path) = &student.photo_path {
            // A recorded but unreadable photo degrades to omission, like
            // any other missing optional field.
            match self.blobs.read(photo_path) {
                Ok(bytes) => {
                    images.insert(IMAGE_STUDENT_PHOTO.to_owned(), bytes);
                }
                Err(err) => {
                    warn!(
                        certificate_id = %certificate.id,
                        photo_path,
                        error = %err,
                        "student photo unreadable, omitting"
                    );
                }
            }
        }

        let job = RenderJob {
            certificate_id: certificate.id.clone(),
            page: template.page,
            layout,
            fields: field_values,
            images,
        };

        debug!(
            certificate_id = %certificate.id,
            template_id = %template.id,
            "dispatching render job"
        );
        Ok(self.backend.render(&job)?)
    }
}
