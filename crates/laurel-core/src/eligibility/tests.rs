//! Tests for the eligibility evaluator.

use std::sync::Arc;

use crate::providers::ExamStatus;
use crate::testutil::{FixedGradePolicy, FixtureExams, ThresholdGradePolicy, abc_exams, ctx};

use super::*;

fn evaluator(exams: FixtureExams, policy: FixedGradePolicy) -> EligibilityEvaluator {
    EligibilityEvaluator::new(Arc::new(exams), Arc::new(policy))
}

fn exam_ids() -> Vec<String> {
    vec!["exam-1".to_owned()]
}

fn row_for<'a>(rows: &'a [StudentEligibility], student_id: &str) -> &'a StudentEligibility {
    rows.iter()
        .find(|r| r.student.student_id == student_id)
        .expect("student present in output")
}

#[test]
fn test_canonical_pass_absent_below_passing() {
    let evaluator = evaluator(abc_exams(), FixedGradePolicy(None));
    let rows = evaluator
        .evaluate(&ctx(), "2024-2025", "Grade 12", &exam_ids())
        .expect("evaluation succeeds");

    assert_eq!(rows.len(), 3);

    let a = row_for(&rows, "student-a");
    assert_eq!(a.final_result, FinalResult::Pass);
    assert!(a.report.issues.is_empty());
    assert_eq!(a.report.percentage, Some(90.0));
    assert_eq!(a.report.total_obtained, 90.0);
    assert_eq!(a.report.total_possible, 100.0);
    assert_eq!(a.position, Some(1));

    let b = row_for(&rows, "student-b");
    assert_eq!(b.final_result, FinalResult::Fail);
    assert_eq!(b.report.issues.len(), 1);
    assert_eq!(b.report.issues[0].issue, EligibilityIssue::Absent);
    assert_eq!(b.position, None);

    let c = row_for(&rows, "student-c");
    assert_eq!(c.final_result, FinalResult::Fail);
    assert_eq!(c.report.issues.len(), 1);
    assert_eq!(c.report.issues[0].issue, EligibilityIssue::BelowPassing);
    assert_eq!(c.report.percentage, Some(35.0));
}

#[test]
fn test_unknown_exam_fails() {
    let evaluator = evaluator(FixtureExams::new(), FixedGradePolicy(None));
    let err = evaluator
        .evaluate(&ctx(), "2024-2025", "Grade 12", &exam_ids())
        .expect_err("unknown exam rejected");

    assert!(matches!(err, EligibilityError::ExamNotFound { .. }));
    assert_eq!(err.class(), crate::ErrorClass::Unprocessable);
}

#[test]
fn test_unfinalized_exam_fails() {
    let exams = FixtureExams::new().with_exam("exam-1", ExamStatus::Conducted);
    let evaluator = evaluator(exams, FixedGradePolicy(None));
    let err = evaluator
        .evaluate(&ctx(), "2024-2025", "Grade 12", &exam_ids())
        .expect_err("unfinalized exam rejected");

    assert!(matches!(err, EligibilityError::ResultsNotFinalized { .. }));
    assert_eq!(err.class(), crate::ErrorClass::Unprocessable);
}

#[test]
fn test_empty_scope_yields_empty_result() {
    let exams = FixtureExams::new()
        .with_exam("exam-1", ExamStatus::Finalized)
        .with_student("student-a", "Amira Khan");
    let evaluator = evaluator(exams, FixedGradePolicy(None));
    let rows = evaluator
        .evaluate(&ctx(), "2024-2025", "Grade 12", &exam_ids())
        .expect("empty scope is not an error");

    assert!(rows.is_empty());
}

#[test]
fn test_missing_result_is_an_issue() {
    let exams = FixtureExams::new()
        .with_exam("exam-1", ExamStatus::Finalized)
        .with_subject("exam-1", "math", Some(100.0), Some(40.0))
        .with_student("student-a", "Amira Khan");
    let evaluator = evaluator(exams, FixedGradePolicy(None));
    let rows = evaluator
        .evaluate(&ctx(), "2024-2025", "Grade 12", &exam_ids())
        .expect("evaluation succeeds");

    let a = row_for(&rows, "student-a");
    assert_eq!(a.final_result, FinalResult::Fail);
    assert_eq!(a.report.issues[0].issue, EligibilityIssue::MissingResult);
    assert_eq!(
        a.report.percentage, None,
        "missing results accumulate no totals"
    );
}

#[test]
fn test_unresolvable_students_are_dropped() {
    let exams = abc_exams().with_unresolvable_student("student-ghost");
    let evaluator = evaluator(exams, FixedGradePolicy(None));
    let rows = evaluator
        .evaluate(&ctx(), "2024-2025", "Grade 12", &exam_ids())
        .expect("evaluation succeeds");

    assert_eq!(rows.len(), 3, "ghost enrollment produces no row");
    assert!(rows.iter().all(|r| r.student.student_id != "student-ghost"));
}

#[test]
fn test_grade_policy_veto_fails_clean_students() {
    let evaluator = EligibilityEvaluator::new(
        Arc::new(abc_exams()),
        Arc::new(ThresholdGradePolicy(95.0)),
    );
    let rows = evaluator
        .evaluate(&ctx(), "2024-2025", "Grade 12", &exam_ids())
        .expect("evaluation succeeds");

    let a = row_for(&rows, "student-a");
    assert!(a.report.issues.is_empty());
    assert_eq!(a.report.grade_pass, Some(false));
    assert_eq!(a.final_result, FinalResult::Fail);
}

#[test]
fn test_null_grade_policy_is_no_constraint() {
    let evaluator = evaluator(abc_exams(), FixedGradePolicy(None));
    let rows = evaluator
        .evaluate(&ctx(), "2024-2025", "Grade 12", &exam_ids())
        .expect("evaluation succeeds");

    let a = row_for(&rows, "student-a");
    assert_eq!(a.report.grade_pass, None);
    assert_eq!(a.final_result, FinalResult::Pass);
}

#[test]
fn test_ungraded_subject_accumulates_no_totals() {
    let exams = FixtureExams::new()
        .with_exam("exam-1", ExamStatus::Finalized)
        .with_subject("exam-1", "conduct", None, None)
        .with_student("student-a", "Amira Khan")
        .with_result("exam-1", "conduct", "student-a", 1.0);
    let evaluator = evaluator(exams, FixedGradePolicy(None));
    let rows = evaluator
        .evaluate(&ctx(), "2024-2025", "Grade 12", &exam_ids())
        .expect("evaluation succeeds");

    let a = row_for(&rows, "student-a");
    assert!(a.report.issues.is_empty());
    assert_eq!(a.report.percentage, None);
    assert_eq!(a.final_result, FinalResult::Pass);
    assert_eq!(a.position, None, "no percentage means no rank");
}

#[test]
fn test_percentage_rounds_to_two_decimals() {
    let exams = FixtureExams::new()
        .with_exam("exam-1", ExamStatus::Finalized)
        .with_subject("exam-1", "math", Some(90.0), Some(30.0))
        .with_student("student-a", "Amira Khan")
        .with_result("exam-1", "math", "student-a", 60.0);
    let evaluator = evaluator(exams, FixedGradePolicy(None));
    let rows = evaluator
        .evaluate(&ctx(), "2024-2025", "Grade 12", &exam_ids())
        .expect("evaluation succeeds");

    assert_eq!(rows[0].report.percentage, Some(66.67));
}

#[test]
fn test_report_json_shape() {
    let evaluator = evaluator(abc_exams(), FixedGradePolicy(None));
    let rows = evaluator
        .evaluate(&ctx(), "2024-2025", "Grade 12", &exam_ids())
        .expect("evaluation succeeds");

    let b = row_for(&rows, "student-b");
    let json = serde_json::to_value(&b.report).expect("report serializes");
    assert_eq!(json["issues"][0]["issue"], "absent");
    assert_eq!(json["issues"][0]["subject_id"], "math");
    assert_eq!(json["grade_pass"], serde_json::Value::Null);
}
