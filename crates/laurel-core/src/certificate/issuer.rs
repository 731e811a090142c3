//! The certificate issuer.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, Utc};
use rusqlite::TransactionBehavior;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{self, AuditAction, AuditRecord, ENTITY_CERTIFICATE};
use crate::batch::{BatchStatus, GraduationBatch};
use crate::providers::{ExamReadModel, TemplateStore};
use crate::render::{CertificateTemplate, RenderOrchestrator};
use crate::sequence::{self, CounterKey, NumberFormat};
use crate::store::{self, GraduationStore};
use crate::tenant::TenantContext;

use super::error::IssueError;
use super::record::IssuedCertificate;
use super::verification;

/// Certificate type issued by graduation batches; the first component of
/// the counter key.
pub const CERTIFICATE_TYPE_GRADUATION: &str = "graduation";

/// A certificate whose PDF could not be produced.
///
/// The certificate row itself is committed; only the artifact is missing
/// and can be re-driven through
/// [`CertificateIssuer::retry_pending_renders`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderFailure {
    /// The affected certificate.
    pub certificate_id: String,

    /// Its number, for operator-facing reporting.
    pub certificate_no: String,

    /// What went wrong.
    pub reason: String,
}

/// The result of an issuance or render-retry call.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuanceOutcome {
    /// The certificates processed, with `pdf_path` set where rendering
    /// succeeded.
    pub certificates: Vec<IssuedCertificate>,

    /// Certificates whose render failed. Never silently dropped.
    pub render_failures: Vec<RenderFailure>,
}

/// Orchestrates number allocation, certificate record creation, and
/// rendering for an approved batch.
///
/// Record creation is transactional: every passing student's certificate,
/// every counter increment, every audit entry, and the batch's flip to
/// issued commit or roll back as one unit. Rendering runs strictly after
/// that commit — PDF files are not transactional, so a render failure
/// must never be able to roll back committed numbers, and a rollback
/// must never leave rendered files for records that do not exist.
pub struct CertificateIssuer {
    store: GraduationStore,
    templates: Arc<dyn TemplateStore>,
    exams: Arc<dyn ExamReadModel>,
    renderer: RenderOrchestrator,
    number_format: NumberFormat,
    verification_base_url: String,
}

impl CertificateIssuer {
    /// Creates an issuer over the given store and providers.
    #[must_use]
    pub fn new(
        store: GraduationStore,
        templates: Arc<dyn TemplateStore>,
        exams: Arc<dyn ExamReadModel>,
        renderer: RenderOrchestrator,
        number_format: NumberFormat,
        verification_base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            templates,
            exams,
            renderer,
            number_format,
            verification_base_url: verification_base_url.into(),
        }
    }

    /// Issues certificates for every passing student of an approved
    /// batch and flips the batch to issued.
    ///
    /// Explicitly not idempotent: re-invoking on an issued batch fails
    /// fast instead of silently re-executing.
    ///
    /// # Errors
    ///
    /// In precondition order: [`IssueError::BatchNotFound`] for an
    /// unknown or out-of-scope batch, [`IssueError::BatchNotApproved`]
    /// unless the batch is approved, a template error
    /// ([`IssueError::TemplateNotFound`] /
    /// [`IssueError::TemplateInactive`] /
    /// [`IssueError::TemplateSchoolMismatch`]), or
    /// [`IssueError::NoEligibleStudents`] when no snapshot row passes.
    pub fn issue_certificates(
        &self,
        batch_id: &str,
        template_id: &str,
        ctx: &TenantContext,
    ) -> Result<IssuanceOutcome, IssueError> {
        let org = &ctx.organization_id;
        let school = &ctx.school_id;

        // Fast-fail checks before taking the write lock; the status is
        // re-checked under it below.
        let batch = self
            .store
            .batch(org, school, batch_id)?
            .ok_or_else(|| IssueError::BatchNotFound {
                batch_id: batch_id.to_owned(),
            })?;
        if batch.status != BatchStatus::Approved {
            return Err(IssueError::BatchNotApproved {
                batch_id: batch_id.to_owned(),
                status: batch.status,
            });
        }

        let template = self.require_template(template_id, ctx)?;

        let issued_at = Utc::now();
        let year = batch.graduation_date.year();
        let key = CounterKey::new(CERTIFICATE_TYPE_GRADUATION, school, year);
        let issued_by = if ctx.actor_id.trim().is_empty() {
            audit::SYSTEM_ACTOR.to_owned()
        } else {
            ctx.actor_id.clone()
        };

        let mut conn = self.store.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(store::StoreError::from)?;

        let current = store::sqlite::load_batch(&tx, org, school, batch_id)?.ok_or_else(|| {
            IssueError::BatchNotFound {
                batch_id: batch_id.to_owned(),
            }
        })?;
        if current.status != BatchStatus::Approved {
            return Err(IssueError::BatchNotApproved {
                batch_id: batch_id.to_owned(),
                status: current.status,
            });
        }

        let passing = store::sqlite::load_passing_students(&tx, batch_id)?;
        if passing.is_empty() {
            return Err(IssueError::NoEligibleStudents {
                batch_id: batch_id.to_owned(),
            });
        }

        let mut certificates = Vec::with_capacity(passing.len());
        for student in &passing {
            let sequence_value = sequence::next_value(&tx, org, &key)?;
            let certificate_no =
                self.number_format
                    .render(CERTIFICATE_TYPE_GRADUATION, year, sequence_value);
            let verification_hash = verification::verification_hash(&student.student_id);
            let qr_payload =
                verification::verification_url(&self.verification_base_url, &verification_hash);

            let certificate = IssuedCertificate {
                id: Uuid::new_v4().to_string(),
                organization_id: org.clone(),
                school_id: school.clone(),
                template_id: template.id.clone(),
                batch_id: batch_id.to_owned(),
                student_id: student.student_id.clone(),
                certificate_no,
                verification_hash,
                qr_payload,
                pdf_path: None,
                issued_by: issued_by.clone(),
                issued_at,
            };

            store::sqlite::insert_certificate(&tx, &certificate)?;
            audit::append(
                &tx,
                &AuditRecord::new(
                    ctx,
                    ENTITY_CERTIFICATE,
                    certificate.id.clone(),
                    AuditAction::Issue,
                    json!({
                        "batch_id": batch_id,
                        "student_id": certificate.student_id,
                        "certificate_no": certificate.certificate_no,
                    }),
                ),
            )?;
            certificates.push(certificate);
        }

        store::sqlite::mark_issued(&tx, batch_id)?;
        tx.commit().map_err(store::StoreError::from)?;
        drop(conn);

        info!(
            batch_id,
            count = certificates.len(),
            "issued certificates, batch moved to issued"
        );

        // Rendering runs strictly after the issuance commit; see the
        // struct docs.
        let positions: HashMap<String, Option<u32>> = passing
            .iter()
            .map(|s| (s.student_id.clone(), s.position))
            .collect();
        let render_failures =
            self.render_certificates(&batch, &template, &positions, &mut certificates, ctx);

        Ok(IssuanceOutcome {
            certificates,
            render_failures,
        })
    }

    /// Re-drives rendering for committed certificates that still lack a
    /// PDF.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::BatchNotFound`] for an unknown or
    /// out-of-scope batch, [`IssueError::BatchNotIssued`] unless the
    /// batch has been issued, or a storage error.
    pub fn retry_pending_renders(
        &self,
        batch_id: &str,
        ctx: &TenantContext,
    ) -> Result<IssuanceOutcome, IssueError> {
        let org = &ctx.organization_id;

        let batch = self
            .store
            .batch(org, &ctx.school_id, batch_id)?
            .ok_or_else(|| IssueError::BatchNotFound {
                batch_id: batch_id.to_owned(),
            })?;
        if batch.status != BatchStatus::Issued {
            return Err(IssueError::BatchNotIssued {
                batch_id: batch_id.to_owned(),
                status: batch.status,
            });
        }

        let mut pending = {
            let conn = self.store.lock();
            store::sqlite::load_pending_renders(&conn, batch_id)?
        };
        if pending.is_empty() {
            return Ok(IssuanceOutcome {
                certificates: Vec::new(),
                render_failures: Vec::new(),
            });
        }

        let positions: HashMap<String, Option<u32>> = self
            .store
            .students_for_batch(batch_id)?
            .into_iter()
            .map(|s| (s.student_id.clone(), s.position))
            .collect();

        // All certificates of a batch share one template in practice,
        // but the template id is read back from each row.
        let mut failures = Vec::new();
        let mut templates: HashMap<String, Option<CertificateTemplate>> = HashMap::new();
        for certificate in &mut pending {
            let template = match templates.entry(certificate.template_id.clone()) {
                std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
                std::collections::hash_map::Entry::Vacant(entry) => {
                    entry.insert(self.templates.find_template(org, &certificate.template_id)?)
                }
            };
            let Some(template) = template else {
                failures.push(RenderFailure {
                    certificate_id: certificate.id.clone(),
                    certificate_no: certificate.certificate_no.clone(),
                    reason: format!("template {} no longer exists", certificate.template_id),
                });
                continue;
            };
            let template = template.clone();
            if let Err(reason) = self.render_one(&batch, &template, &positions, certificate, ctx) {
                failures.push(RenderFailure {
                    certificate_id: certificate.id.clone(),
                    certificate_no: certificate.certificate_no.clone(),
                    reason,
                });
            }
        }

        Ok(IssuanceOutcome {
            certificates: pending,
            render_failures: failures,
        })
    }

    fn require_template(
        &self,
        template_id: &str,
        ctx: &TenantContext,
    ) -> Result<CertificateTemplate, IssueError> {
        let template = self
            .templates
            .find_template(&ctx.organization_id, template_id)?
            .ok_or_else(|| IssueError::TemplateNotFound {
                template_id: template_id.to_owned(),
            })?;
        if template.organization_id != ctx.organization_id {
            return Err(IssueError::TemplateNotFound {
                template_id: template_id.to_owned(),
            });
        }
        if !template.active {
            return Err(IssueError::TemplateInactive {
                template_id: template_id.to_owned(),
            });
        }
        if !template.covers_school(&ctx.school_id) {
            return Err(IssueError::TemplateSchoolMismatch {
                template_id: template_id.to_owned(),
                school_id: ctx.school_id.clone(),
            });
        }
        Ok(template)
    }

    /// Renders every certificate in `certificates`, collecting failures
    /// instead of aborting: each remaining certificate still gets its
    /// attempt.
    fn render_certificates(
        &self,
        batch: &GraduationBatch,
        template: &CertificateTemplate,
        positions: &HashMap<String, Option<u32>>,
        certificates: &mut [IssuedCertificate],
        ctx: &TenantContext,
    ) -> Vec<RenderFailure> {
        let mut failures = Vec::new();
        for certificate in certificates.iter_mut() {
            if let Err(reason) = self.render_one(batch, template, positions, certificate, ctx) {
                failures.push(RenderFailure {
                    certificate_id: certificate.id.clone(),
                    certificate_no: certificate.certificate_no.clone(),
                    reason,
                });
            }
        }
        failures
    }

    /// Renders one certificate and backfills its `pdf_path`. Returns the
    /// failure reason on error.
    fn render_one(
        &self,
        batch: &GraduationBatch,
        template: &CertificateTemplate,
        positions: &HashMap<String, Option<u32>>,
        certificate: &mut IssuedCertificate,
        ctx: &TenantContext,
    ) -> Result<(), String> {
        let resolve = |reason: String| {
            warn!(
                certificate_id = %certificate.id,
                certificate_no = %certificate.certificate_no,
                reason = %reason,
                "certificate render failed, pdf_path left unset"
            );
            reason
        };

        let student = self
            .exams
            .resolve_student(&ctx.organization_id, &certificate.student_id)
            .map_err(|err| resolve(err.to_string()))?
            .ok_or_else(|| resolve("student identity unresolved".to_owned()))?;
        let position = positions
            .get(&certificate.student_id)
            .copied()
            .unwrap_or(None);

        let artifact = self
            .renderer
            .render_certificate(certificate, batch, &student, position, template)
            .map_err(|err| resolve(err.to_string()))?;

        let backfill = || -> Result<(), crate::store::StoreError> {
            let mut conn = self.store.lock();
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            store::sqlite::set_pdf_path(&tx, &certificate.id, &artifact.pdf_path)?;
            audit::append(
                &tx,
                &AuditRecord::new(
                    ctx,
                    ENTITY_CERTIFICATE,
                    certificate.id.clone(),
                    AuditAction::RenderCompleted,
                    json!({ "pdf_path": artifact.pdf_path }),
                ),
            )?;
            tx.commit()?;
            Ok(())
        };
        backfill().map_err(|err| resolve(err.to_string()))?;

        certificate.pdf_path = Some(artifact.pdf_path);
        Ok(())
    }
}
