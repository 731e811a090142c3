//! The batch lifecycle manager.

use chrono::Utc;
use rusqlite::TransactionBehavior;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::audit::{self, AuditAction, AuditRecord, ENTITY_BATCH};
use crate::eligibility::EligibilityEvaluator;
use crate::store::{self, GraduationStore};
use crate::tenant::TenantContext;

use super::error::BatchError;
use super::state::{BatchStatus, GraduationBatch, GraduationStudent, NewBatch};

/// Owns the batch state machine and eligibility snapshotting.
///
/// All read-check-then-write sequences run under an immediate
/// transaction, so concurrent callers racing on the same batch serialize
/// at the write lock and the loser observes the winner's state.
pub struct BatchLifecycleManager {
    store: GraduationStore,
    evaluator: EligibilityEvaluator,
}

impl BatchLifecycleManager {
    /// Creates a manager over the given store and evaluator.
    #[must_use]
    pub fn new(store: GraduationStore, evaluator: EligibilityEvaluator) -> Self {
        Self { store, evaluator }
    }

    /// Creates a new batch in draft.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::EmptyExamList`] when the payload names no
    /// exams, or a storage error.
    pub fn create_batch(
        &self,
        payload: NewBatch,
        ctx: &TenantContext,
    ) -> Result<GraduationBatch, BatchError> {
        if payload.exam_ids.is_empty() {
            return Err(BatchError::EmptyExamList);
        }

        let batch = GraduationBatch {
            id: Uuid::new_v4().to_string(),
            organization_id: ctx.organization_id.clone(),
            school_id: ctx.school_id.clone(),
            academic_year: payload.academic_year,
            class_name: payload.class_name,
            exam_ids: payload.exam_ids,
            graduation_date: payload.graduation_date,
            status: BatchStatus::Draft,
            created_by: ctx.actor_id.clone(),
            created_at: Utc::now(),
            approved_by: None,
            approved_at: None,
        };

        let mut conn = self.store.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(store::StoreError::from)?;
        store::sqlite::insert_batch(&tx, &batch)?;
        audit::append(
            &tx,
            &AuditRecord::new(
                ctx,
                ENTITY_BATCH,
                batch.id.clone(),
                AuditAction::Create,
                json!({
                    "academic_year": batch.academic_year,
                    "class_name": batch.class_name,
                    "exam_count": batch.exam_ids.len(),
                }),
            ),
        )?;
        tx.commit().map_err(store::StoreError::from)?;
        drop(conn);

        info!(batch_id = %batch.id, class = %batch.class_name, "created graduation batch");
        Ok(batch)
    }

    /// Regenerates the eligibility snapshot of a draft batch.
    ///
    /// Evaluation runs against the exam read model first; then, in one
    /// transaction, the previous snapshot is deleted and the fresh one
    /// inserted. Repeatable while draft: each run fully replaces the
    /// prior snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::BatchNotFound`] for an unknown or
    /// out-of-scope batch, [`BatchError::CannotRegenerate`] once the
    /// batch left draft, or an eligibility/storage error.
    pub fn generate_students(
        &self,
        batch_id: &str,
        ctx: &TenantContext,
    ) -> Result<Vec<GraduationStudent>, BatchError> {
        let batch = self.require_batch(batch_id, ctx)?;
        if batch.status != BatchStatus::Draft {
            return Err(BatchError::CannotRegenerate {
                batch_id: batch_id.to_owned(),
                status: batch.status,
            });
        }

        let rows = self.evaluator.evaluate(
            ctx,
            &batch.academic_year,
            &batch.class_name,
            &batch.exam_ids,
        )?;

        let students: Vec<GraduationStudent> = rows
            .into_iter()
            .map(|row| GraduationStudent {
                id: Uuid::new_v4().to_string(),
                batch_id: batch.id.clone(),
                student_id: row.student.student_id,
                final_result: row.final_result,
                position: row.position,
                report: row.report,
            })
            .collect();

        let mut conn = self.store.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(store::StoreError::from)?;

        // Re-check under the write lock: evaluation ran unlocked, and an
        // approve may have won the race in between.
        let current = store::sqlite::load_batch(&tx, &ctx.organization_id, &ctx.school_id, batch_id)?
            .ok_or_else(|| BatchError::BatchNotFound {
                batch_id: batch_id.to_owned(),
            })?;
        if current.status != BatchStatus::Draft {
            return Err(BatchError::CannotRegenerate {
                batch_id: batch_id.to_owned(),
                status: current.status,
            });
        }

        let deleted = store::sqlite::delete_students(&tx, batch_id)?;
        for student in &students {
            store::sqlite::insert_student(&tx, student)?;
        }
        audit::append(
            &tx,
            &AuditRecord::new(
                ctx,
                ENTITY_BATCH,
                batch_id,
                AuditAction::GenerateStudents,
                json!({ "rows": students.len() }),
            ),
        )?;
        tx.commit().map_err(store::StoreError::from)?;
        drop(conn);

        debug!(batch_id, replaced = deleted, "replaced prior snapshot rows");
        info!(batch_id, rows = students.len(), "generated eligibility snapshot");
        Ok(students)
    }

    /// Approves a draft batch, freezing its snapshot.
    ///
    /// Explicitly not idempotent: approving an already-approved or issued
    /// batch fails. The status check and the update run under one
    /// immediate transaction, so two concurrent approvers admit exactly
    /// one winner.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::BatchNotFound`] for an unknown or
    /// out-of-scope batch, [`BatchError::TransitionNotAllowed`] when the
    /// batch is not draft, or a storage error.
    pub fn approve_batch(
        &self,
        batch_id: &str,
        ctx: &TenantContext,
    ) -> Result<GraduationBatch, BatchError> {
        let mut conn = self.store.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(store::StoreError::from)?;

        let mut batch =
            store::sqlite::load_batch(&tx, &ctx.organization_id, &ctx.school_id, batch_id)?
                .ok_or_else(|| BatchError::BatchNotFound {
                    batch_id: batch_id.to_owned(),
                })?;
        if !batch.status.can_transition_to(BatchStatus::Approved) {
            return Err(BatchError::TransitionNotAllowed {
                batch_id: batch_id.to_owned(),
                from: batch.status,
                to: BatchStatus::Approved,
            });
        }

        let approved_at = Utc::now();
        store::sqlite::mark_approved(&tx, batch_id, &ctx.actor_id, approved_at)?;
        audit::append(
            &tx,
            &AuditRecord::new(
                ctx,
                ENTITY_BATCH,
                batch_id,
                AuditAction::Approve,
                json!({ "previous_status": batch.status.as_str() }),
            ),
        )?;
        tx.commit().map_err(store::StoreError::from)?;
        drop(conn);

        batch.status = BatchStatus::Approved;
        batch.approved_by = Some(ctx.actor_id.clone());
        batch.approved_at = Some(approved_at);

        info!(batch_id, approved_by = %ctx.actor_id, "approved graduation batch");
        Ok(batch)
    }

    /// Loads a batch within the tenant scope.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::BatchNotFound`] or a storage error.
    pub fn batch(&self, batch_id: &str, ctx: &TenantContext) -> Result<GraduationBatch, BatchError> {
        self.require_batch(batch_id, ctx)
    }

    /// Loads the current snapshot rows of a batch.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::BatchNotFound`] or a storage error.
    pub fn students(
        &self,
        batch_id: &str,
        ctx: &TenantContext,
    ) -> Result<Vec<GraduationStudent>, BatchError> {
        self.require_batch(batch_id, ctx)?;
        Ok(self.store.students_for_batch(batch_id)?)
    }

    fn require_batch(
        &self,
        batch_id: &str,
        ctx: &TenantContext,
    ) -> Result<GraduationBatch, BatchError> {
        self.store
            .batch(&ctx.organization_id, &ctx.school_id, batch_id)?
            .ok_or_else(|| BatchError::BatchNotFound {
                batch_id: batch_id.to_owned(),
            })
    }
}
