//! Tests for the storage layer.

use chrono::{NaiveDate, Utc};
use tempfile::TempDir;

use crate::batch::{BatchStatus, GraduationBatch, GraduationStudent};
use crate::certificate::IssuedCertificate;
use crate::eligibility::{EligibilityReport, FinalResult};

use super::sqlite::{
    delete_students, insert_batch, insert_certificate, insert_student, load_batch,
    load_certificates, load_passing_students, load_pending_renders, load_students, mark_approved,
    mark_issued, set_pdf_path,
};
use super::*;

fn sample_batch(id: &str) -> GraduationBatch {
    GraduationBatch {
        id: id.to_owned(),
        organization_id: "org-1".to_owned(),
        school_id: "school-1".to_owned(),
        academic_year: "2024-2025".to_owned(),
        class_name: "Grade 12".to_owned(),
        exam_ids: vec!["exam-1".to_owned(), "exam-2".to_owned()],
        graduation_date: NaiveDate::from_ymd_opt(2025, 3, 20).expect("valid date"),
        status: BatchStatus::Draft,
        created_by: "user-1".to_owned(),
        created_at: Utc::now(),
        approved_by: None,
        approved_at: None,
    }
}

fn sample_student(id: &str, batch_id: &str, result: FinalResult) -> GraduationStudent {
    GraduationStudent {
        id: id.to_owned(),
        batch_id: batch_id.to_owned(),
        student_id: format!("student-{id}"),
        final_result: result,
        position: None,
        report: EligibilityReport::default(),
    }
}

fn sample_certificate(id: &str, batch_id: &str, number: &str, hash: &str) -> IssuedCertificate {
    IssuedCertificate {
        id: id.to_owned(),
        organization_id: "org-1".to_owned(),
        school_id: "school-1".to_owned(),
        template_id: "tpl-1".to_owned(),
        batch_id: batch_id.to_owned(),
        student_id: format!("student-{id}"),
        certificate_no: number.to_owned(),
        verification_hash: hash.to_owned(),
        qr_payload: format!("https://verify.example.org/certificates/{hash}"),
        pdf_path: None,
        issued_by: "user-1".to_owned(),
        issued_at: Utc::now(),
    }
}

fn store_with_batch(batch: &GraduationBatch) -> GraduationStore {
    let store = GraduationStore::in_memory().expect("in-memory store");
    {
        let mut conn = store.lock();
        let tx = conn.transaction().expect("transaction");
        insert_batch(&tx, batch).expect("insert batch");
        tx.commit().expect("commit");
    }
    store
}

#[test]
fn test_open_enables_wal_mode() {
    let dir = TempDir::new().expect("temp dir");
    let store = GraduationStore::open(dir.path().join("core.db")).expect("open store");

    let conn = store.lock();
    let mode: String = conn
        .query_row("PRAGMA journal_mode", [], |row| row.get(0))
        .expect("journal mode");
    assert_eq!(mode.to_lowercase(), "wal");
}

#[test]
fn test_batch_round_trip() {
    let batch = sample_batch("batch-1");
    let store = store_with_batch(&batch);

    let loaded = store
        .batch("org-1", "school-1", "batch-1")
        .expect("load")
        .expect("present");
    assert_eq!(loaded, batch);
}

#[test]
fn test_batch_lookup_is_tenant_scoped() {
    let batch = sample_batch("batch-1");
    let store = store_with_batch(&batch);

    assert!(
        store
            .batch("org-2", "school-1", "batch-1")
            .expect("load")
            .is_none(),
        "another organization sees nothing"
    );
    assert!(
        store
            .batch("org-1", "school-9", "batch-1")
            .expect("load")
            .is_none(),
        "another school sees nothing"
    );
}

#[test]
fn test_mark_approved_then_issued() {
    let batch = sample_batch("batch-1");
    let store = store_with_batch(&batch);
    let approved_at = Utc::now();

    {
        let mut conn = store.lock();
        let tx = conn.transaction().expect("transaction");
        mark_approved(&tx, "batch-1", "approver", approved_at).expect("approve");
        tx.commit().expect("commit");
    }
    let loaded = store
        .batch("org-1", "school-1", "batch-1")
        .expect("load")
        .expect("present");
    assert_eq!(loaded.status, BatchStatus::Approved);
    assert_eq!(loaded.approved_by.as_deref(), Some("approver"));
    assert_eq!(
        loaded.approved_at.map(|t| t.timestamp()),
        Some(approved_at.timestamp())
    );

    {
        let mut conn = store.lock();
        let tx = conn.transaction().expect("transaction");
        mark_issued(&tx, "batch-1").expect("issue");
        tx.commit().expect("commit");
    }
    let loaded = store
        .batch("org-1", "school-1", "batch-1")
        .expect("load")
        .expect("present");
    assert_eq!(loaded.status, BatchStatus::Issued);
}

#[test]
fn test_snapshot_replace_deletes_then_inserts() {
    let batch = sample_batch("batch-1");
    let store = store_with_batch(&batch);

    {
        let mut conn = store.lock();
        let tx = conn.transaction().expect("transaction");
        insert_student(&tx, &sample_student("s1", "batch-1", FinalResult::Pass))
            .expect("insert");
        insert_student(&tx, &sample_student("s2", "batch-1", FinalResult::Fail))
            .expect("insert");
        tx.commit().expect("commit");
    }
    assert_eq!(store.students_for_batch("batch-1").expect("rows").len(), 2);

    {
        let mut conn = store.lock();
        let tx = conn.transaction().expect("transaction");
        let deleted = delete_students(&tx, "batch-1").expect("delete");
        assert_eq!(deleted, 2);
        insert_student(&tx, &sample_student("s3", "batch-1", FinalResult::Pass))
            .expect("insert");
        tx.commit().expect("commit");
    }

    let rows = store.students_for_batch("batch-1").expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "s3");
}

#[test]
fn test_passing_students_filter_and_order() {
    let batch = sample_batch("batch-1");
    let store = store_with_batch(&batch);

    let mut ranked = sample_student("s1", "batch-1", FinalResult::Pass);
    ranked.position = Some(2);
    let mut top = sample_student("s2", "batch-1", FinalResult::Pass);
    top.position = Some(1);
    let unranked = sample_student("s3", "batch-1", FinalResult::Pass);
    let failed = sample_student("s4", "batch-1", FinalResult::Fail);

    {
        let mut conn = store.lock();
        let tx = conn.transaction().expect("transaction");
        for student in [&ranked, &top, &unranked, &failed] {
            insert_student(&tx, student).expect("insert");
        }
        tx.commit().expect("commit");
    }

    let conn = store.lock();
    let passing = load_passing_students(&conn, "batch-1").expect("passing rows");
    let ids: Vec<&str> = passing.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["s2", "s1", "s3"],
        "ranked rows first, unranked after, failures excluded"
    );
}

#[test]
fn test_certificate_round_trip_and_pdf_backfill() {
    let batch = sample_batch("batch-1");
    let store = store_with_batch(&batch);
    let certificate = sample_certificate("c1", "batch-1", "PFX-GRADUATION-2025-0001", "hash-1");

    {
        let mut conn = store.lock();
        let tx = conn.transaction().expect("transaction");
        insert_certificate(&tx, &certificate).expect("insert");
        tx.commit().expect("commit");
    }

    let conn = store.lock();
    let pending = load_pending_renders(&conn, "batch-1").expect("pending");
    assert_eq!(pending.len(), 1);
    drop(conn);

    {
        let mut conn = store.lock();
        let tx = conn.transaction().expect("transaction");
        set_pdf_path(&tx, "c1", "certificates/c1.pdf").expect("backfill");
        tx.commit().expect("commit");
    }

    let conn = store.lock();
    assert!(
        load_pending_renders(&conn, "batch-1")
            .expect("pending")
            .is_empty()
    );
    let all = load_certificates(&conn, "batch-1").expect("certificates");
    assert_eq!(all[0].pdf_path.as_deref(), Some("certificates/c1.pdf"));
}

#[test]
fn test_duplicate_certificate_no_is_a_conflict() {
    let batch = sample_batch("batch-1");
    let store = store_with_batch(&batch);

    let first = sample_certificate("c1", "batch-1", "PFX-GRADUATION-2025-0001", "hash-1");
    let duplicate = sample_certificate("c2", "batch-1", "PFX-GRADUATION-2025-0001", "hash-2");

    let mut conn = store.lock();
    let tx = conn.transaction().expect("transaction");
    insert_certificate(&tx, &first).expect("insert");
    let err = insert_certificate(&tx, &duplicate).expect_err("duplicate number rejected");
    assert!(matches!(err, StoreError::UniqueViolation { .. }));
    assert_eq!(err.class(), crate::ErrorClass::Conflict);
}

#[test]
fn test_duplicate_verification_hash_is_a_conflict() {
    let batch = sample_batch("batch-1");
    let store = store_with_batch(&batch);

    let first = sample_certificate("c1", "batch-1", "PFX-GRADUATION-2025-0001", "hash-1");
    let duplicate = sample_certificate("c2", "batch-1", "PFX-GRADUATION-2025-0002", "hash-1");

    let mut conn = store.lock();
    let tx = conn.transaction().expect("transaction");
    insert_certificate(&tx, &first).expect("insert");
    let err = insert_certificate(&tx, &duplicate).expect_err("duplicate hash rejected");
    assert!(matches!(err, StoreError::UniqueViolation { .. }));
}

#[test]
fn test_certificate_lookup_by_hash() {
    let batch = sample_batch("batch-1");
    let store = store_with_batch(&batch);
    let certificate = sample_certificate("c1", "batch-1", "PFX-GRADUATION-2025-0001", "hash-1");

    {
        let mut conn = store.lock();
        let tx = conn.transaction().expect("transaction");
        insert_certificate(&tx, &certificate).expect("insert");
        tx.commit().expect("commit");
    }

    let found = store
        .certificate_by_hash("hash-1")
        .expect("lookup")
        .expect("present");
    assert_eq!(found.id, "c1");
    assert!(store.certificate_by_hash("hash-9").expect("lookup").is_none());
}

#[test]
fn test_corrupt_status_surfaces_as_corrupt_row() {
    let batch = sample_batch("batch-1");
    let store = store_with_batch(&batch);

    {
        let conn = store.lock();
        conn.execute(
            "UPDATE graduation_batches SET status = 'archived' WHERE id = 'batch-1'",
            [],
        )
        .expect("raw update");
    }

    let conn = store.lock();
    let err = load_batch(&conn, "org-1", "school-1", "batch-1").expect_err("corrupt row detected");
    assert!(matches!(
        err,
        StoreError::Corrupt {
            field: "status",
            ..
        }
    ));
    assert_eq!(err.class(), crate::ErrorClass::Infrastructure);
}

#[test]
fn test_students_loaded_through_store_handle() {
    let batch = sample_batch("batch-1");
    let store = store_with_batch(&batch);

    {
        let mut conn = store.lock();
        let tx = conn.transaction().expect("transaction");
        insert_student(&tx, &sample_student("s1", "batch-1", FinalResult::Pass))
            .expect("insert");
        tx.commit().expect("commit");
    }

    let conn = store.lock();
    let via_fn = load_students(&conn, "batch-1").expect("rows");
    drop(conn);
    let via_store = store.students_for_batch("batch-1").expect("rows");
    assert_eq!(via_fn, via_store);
}
