//! Tests for the batch state machine and lifecycle manager.

use std::sync::Arc;
use std::thread;

use chrono::NaiveDate;
use tempfile::TempDir;

use crate::audit::{AuditLogger, ENTITY_BATCH, SYSTEM_ACTOR};
use crate::eligibility::EligibilityEvaluator;
use crate::store::GraduationStore;
use crate::tenant::TenantContext;
use crate::testutil::{FixedGradePolicy, FixtureExams, abc_exams, ctx};

use super::*;

// =============================================================================
// State machine
// =============================================================================

#[test]
fn test_transition_table() {
    assert_eq!(
        BatchStatus::Draft.valid_transitions(),
        &[BatchStatus::Approved][..]
    );
    assert_eq!(
        BatchStatus::Approved.valid_transitions(),
        &[BatchStatus::Issued][..]
    );
    assert!(BatchStatus::Issued.valid_transitions().is_empty());

    assert!(BatchStatus::Draft.can_transition_to(BatchStatus::Approved));
    assert!(!BatchStatus::Draft.can_transition_to(BatchStatus::Issued));
    assert!(!BatchStatus::Approved.can_transition_to(BatchStatus::Draft));
    assert!(!BatchStatus::Issued.can_transition_to(BatchStatus::Draft));
}

#[test]
fn test_status_string_round_trip() {
    for status in [BatchStatus::Draft, BatchStatus::Approved, BatchStatus::Issued] {
        assert_eq!(BatchStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(BatchStatus::parse("archived"), None);
}

#[test]
fn test_terminal_state() {
    assert!(BatchStatus::Issued.is_terminal());
    assert!(!BatchStatus::Draft.is_terminal());
    assert!(!BatchStatus::Approved.is_terminal());
}

// =============================================================================
// Lifecycle manager
// =============================================================================

fn manager_over(store: GraduationStore, exams: FixtureExams) -> BatchLifecycleManager {
    let evaluator = EligibilityEvaluator::new(Arc::new(exams), Arc::new(FixedGradePolicy(None)));
    BatchLifecycleManager::new(store, evaluator)
}

fn manager_with(exams: FixtureExams) -> (BatchLifecycleManager, GraduationStore) {
    let store = GraduationStore::in_memory().expect("in-memory store");
    (manager_over(store.clone(), exams), store)
}

fn new_batch() -> NewBatch {
    NewBatch {
        academic_year: "2024-2025".to_owned(),
        class_name: "Grade 12".to_owned(),
        exam_ids: vec!["exam-1".to_owned()],
        graduation_date: NaiveDate::from_ymd_opt(2025, 3, 20).expect("valid date"),
    }
}

#[test]
fn test_create_batch_starts_in_draft() {
    let (manager, store) = manager_with(abc_exams());
    let batch = manager.create_batch(new_batch(), &ctx()).expect("created");

    assert_eq!(batch.status, BatchStatus::Draft);
    assert_eq!(batch.approved_by, None);
    assert_eq!(batch.approved_at, None);

    let stored = store
        .batch(&ctx().organization_id, &ctx().school_id, &batch.id)
        .expect("load")
        .expect("present");
    assert_eq!(stored, batch);

    let audit = AuditLogger::new(store);
    let entries = audit
        .entries_for_entity(ENTITY_BATCH, &batch.id)
        .expect("audit entries");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, "create");
    assert_eq!(entries[0].performed_by, "user-1");
}

#[test]
fn test_create_batch_requires_exams() {
    let (manager, _store) = manager_with(abc_exams());
    let payload = NewBatch {
        exam_ids: Vec::new(),
        ..new_batch()
    };
    let err = manager
        .create_batch(payload, &ctx())
        .expect_err("empty exam list rejected");

    assert!(matches!(err, BatchError::EmptyExamList));
    assert_eq!(err.class(), crate::ErrorClass::Unprocessable);
}

#[test]
fn test_create_batch_with_empty_actor_audits_as_system() {
    let (manager, store) = manager_with(abc_exams());
    let anonymous = TenantContext::new("org-1", "school-1", "");
    let batch = manager.create_batch(new_batch(), &anonymous).expect("created");

    let audit = AuditLogger::new(store);
    let entries = audit
        .entries_for_entity(ENTITY_BATCH, &batch.id)
        .expect("audit entries");
    assert_eq!(entries[0].performed_by, SYSTEM_ACTOR);
}

#[test]
fn test_generate_students_snapshots_eligibility() {
    let (manager, _store) = manager_with(abc_exams());
    let batch = manager.create_batch(new_batch(), &ctx()).expect("created");

    let rows = manager
        .generate_students(&batch.id, &ctx())
        .expect("generated");
    assert_eq!(rows.len(), 3);
    assert_eq!(
        rows.iter().filter(|r| r.final_result.is_pass()).count(),
        1,
        "only the 90-mark student passes"
    );
}

#[test]
fn test_generate_students_replaces_prior_snapshot() {
    let (manager, store) = manager_with(abc_exams());
    let batch = manager.create_batch(new_batch(), &ctx()).expect("created");

    let first = manager
        .generate_students(&batch.id, &ctx())
        .expect("first run");
    let second = manager
        .generate_students(&batch.id, &ctx())
        .expect("second run");

    let stored = store.students_for_batch(&batch.id).expect("snapshot rows");
    assert_eq!(stored.len(), 3, "no rows from the first run survive");

    let first_ids: Vec<&str> = first.iter().map(|r| r.id.as_str()).collect();
    assert!(
        second.iter().all(|r| !first_ids.contains(&r.id.as_str())),
        "second run produces fresh row identities"
    );
    let stored_ids: Vec<&str> = stored.iter().map(|r| r.id.as_str()).collect();
    assert!(second.iter().all(|r| stored_ids.contains(&r.id.as_str())));
}

#[test]
fn test_generate_students_unknown_batch() {
    let (manager, _store) = manager_with(abc_exams());
    let err = manager
        .generate_students("no-such-batch", &ctx())
        .expect_err("unknown batch rejected");

    assert!(matches!(err, BatchError::BatchNotFound { .. }));
    assert_eq!(err.class(), crate::ErrorClass::NotFound);
}

#[test]
fn test_generate_students_out_of_scope_batch() {
    let (manager, _store) = manager_with(abc_exams());
    let batch = manager.create_batch(new_batch(), &ctx()).expect("created");

    let foreign = TenantContext::new("org-2", "school-1", "user-1");
    let err = manager
        .generate_students(&batch.id, &foreign)
        .expect_err("foreign tenant sees nothing");
    assert!(matches!(err, BatchError::BatchNotFound { .. }));
}

#[test]
fn test_generate_students_rejected_after_approval() {
    let (manager, _store) = manager_with(abc_exams());
    let batch = manager.create_batch(new_batch(), &ctx()).expect("created");
    manager
        .generate_students(&batch.id, &ctx())
        .expect("generated");
    manager.approve_batch(&batch.id, &ctx()).expect("approved");

    let err = manager
        .generate_students(&batch.id, &ctx())
        .expect_err("regeneration after approval rejected");
    assert!(matches!(
        err,
        BatchError::CannotRegenerate {
            status: BatchStatus::Approved,
            ..
        }
    ));
    assert_eq!(err.class(), crate::ErrorClass::InvalidState);
}

#[test]
fn test_approve_batch_records_approver() {
    let (manager, store) = manager_with(abc_exams());
    let batch = manager.create_batch(new_batch(), &ctx()).expect("created");

    let approved = manager.approve_batch(&batch.id, &ctx()).expect("approved");
    assert_eq!(approved.status, BatchStatus::Approved);
    assert_eq!(approved.approved_by.as_deref(), Some("user-1"));
    assert!(approved.approved_at.is_some());

    let stored = store
        .batch(&ctx().organization_id, &ctx().school_id, &batch.id)
        .expect("load")
        .expect("present");
    assert_eq!(stored.status, BatchStatus::Approved);
    assert_eq!(stored.approved_by.as_deref(), Some("user-1"));

    let audit = AuditLogger::new(store);
    let entries = audit
        .entries_for_entity(ENTITY_BATCH, &batch.id)
        .expect("audit entries");
    let actions: Vec<&str> = entries.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, vec!["create", "approve"]);
}

#[test]
fn test_approve_batch_is_not_idempotent() {
    let (manager, _store) = manager_with(abc_exams());
    let batch = manager.create_batch(new_batch(), &ctx()).expect("created");
    manager.approve_batch(&batch.id, &ctx()).expect("approved");

    let err = manager
        .approve_batch(&batch.id, &ctx())
        .expect_err("second approval rejected");
    assert!(matches!(
        err,
        BatchError::TransitionNotAllowed {
            from: BatchStatus::Approved,
            to: BatchStatus::Approved,
            ..
        }
    ));
    assert_eq!(err.class(), crate::ErrorClass::InvalidState);
}

#[test]
fn test_concurrent_approval_admits_one_winner() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("batches.db");

    let store = GraduationStore::open(&path).expect("open store");
    let manager = manager_over(store, abc_exams());
    let batch = manager.create_batch(new_batch(), &ctx()).expect("created");

    let mut handles = Vec::new();
    for _ in 0..2 {
        let path = path.clone();
        let batch_id = batch.id.clone();
        handles.push(thread::spawn(move || {
            let store = GraduationStore::open(&path).expect("open store");
            let manager = manager_over(store, abc_exams());
            manager.approve_batch(&batch_id, &ctx()).is_ok()
        }));
    }

    let outcomes: Vec<bool> = handles
        .into_iter()
        .map(|h| h.join().expect("approver thread"))
        .collect();
    assert_eq!(
        outcomes.iter().filter(|won| **won).count(),
        1,
        "exactly one approver wins the race"
    );
}
