//! The eligibility evaluator.

use std::sync::Arc;

use tracing::debug;

use crate::providers::{ExamReadModel, GradePolicy, SubjectScope};
use crate::tenant::TenantContext;

use super::error::EligibilityError;
use super::report::{
    EligibilityIssue, EligibilityReport, FinalResult, StudentEligibility, SubjectIssue,
};

/// Computes per-student pass/fail verdicts and diagnostics from exam
/// results.
pub struct EligibilityEvaluator {
    exams: Arc<dyn ExamReadModel>,
    grades: Arc<dyn GradePolicy>,
}

impl EligibilityEvaluator {
    /// Creates an evaluator over the given read model and grade policy.
    #[must_use]
    pub fn new(exams: Arc<dyn ExamReadModel>, grades: Arc<dyn GradePolicy>) -> Self {
        Self { exams, grades }
    }

    /// Evaluates eligibility for one academic-year + class pair over the
    /// given exams.
    ///
    /// Returns one row per resolvable enrolled student. Students whose
    /// identity cannot be resolved are dropped silently. An empty subject
    /// scope yields an empty result set, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`EligibilityError::ExamNotFound`] when an exam is missing
    /// from the organization, [`EligibilityError::ResultsNotFinalized`]
    /// when an exam's results are not finalized, or a provider error.
    pub fn evaluate(
        &self,
        ctx: &TenantContext,
        academic_year: &str,
        class_name: &str,
        exam_ids: &[String],
    ) -> Result<Vec<StudentEligibility>, EligibilityError> {
        let org = &ctx.organization_id;

        for exam_id in exam_ids {
            let status = self
                .exams
                .exam_status(org, exam_id)?
                .ok_or_else(|| EligibilityError::ExamNotFound {
                    exam_id: exam_id.clone(),
                })?;
            if !status.is_finalized() {
                return Err(EligibilityError::ResultsNotFinalized {
                    exam_id: exam_id.clone(),
                });
            }
        }

        let scope = self.exams.subjects_in_scope(
            org,
            &ctx.school_id,
            academic_year,
            class_name,
            exam_ids,
        )?;
        if scope.is_empty() {
            debug!(academic_year, class_name, "empty eligibility scope");
            return Ok(Vec::new());
        }

        let enrolled =
            self.exams
                .enrolled_students(org, &ctx.school_id, academic_year, class_name)?;

        let mut rows = Vec::with_capacity(enrolled.len());
        for student_id in &enrolled {
            let Some(student) = self.exams.resolve_student(org, student_id)? else {
                debug!(student_id, "dropping unresolvable student");
                continue;
            };

            let mut report = self.evaluate_student(org, &scope, student_id)?;
            report.grade_pass = self.grades.is_pass(org, report.percentage)?;
            let final_result = if report.is_pass() {
                FinalResult::Pass
            } else {
                FinalResult::Fail
            };

            rows.push(StudentEligibility {
                student,
                final_result,
                position: None,
                report,
            });
        }

        assign_positions(&mut rows);
        Ok(rows)
    }

    /// Walks the subject scope for one student, collecting issues and
    /// totals. The grade verdict is filled in by the caller.
    fn evaluate_student(
        &self,
        org: &str,
        scope: &[SubjectScope],
        student_id: &str,
    ) -> Result<EligibilityReport, EligibilityError> {
        let mut report = EligibilityReport::default();

        for subject in scope {
            let result =
                self.exams
                    .result_for(org, &subject.exam_id, &subject.subject_id, student_id)?;

            let Some(result) = result else {
                report.issues.push(SubjectIssue {
                    subject_id: subject.subject_id.clone(),
                    issue: EligibilityIssue::MissingResult,
                });
                continue;
            };

            if result.is_absent {
                report.issues.push(SubjectIssue {
                    subject_id: subject.subject_id.clone(),
                    issue: EligibilityIssue::Absent,
                });
            }

            if let Some(total) = subject.total_marks {
                report.total_possible += total;
                report.total_obtained += result.marks_obtained.unwrap_or(0.0);
            }

            if let (Some(passing), Some(obtained)) = (subject.passing_marks, result.marks_obtained)
            {
                if !result.is_absent && obtained < passing {
                    report.issues.push(SubjectIssue {
                        subject_id: subject.subject_id.clone(),
                        issue: EligibilityIssue::BelowPassing,
                    });
                }
            }
        }

        if report.total_possible > 0.0 {
            let pct = report.total_obtained / report.total_possible * 100.0;
            report.percentage = Some((pct * 100.0).round() / 100.0);
        }

        Ok(report)
    }
}

/// Ranks passing students 1..n by descending percentage.
///
/// Failing students and students without a computable percentage carry no
/// position. Ties resolve in enrollment order.
fn assign_positions(rows: &mut [StudentEligibility]) {
    let mut ranked: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| row.final_result.is_pass() && row.report.percentage.is_some())
        .map(|(idx, _)| idx)
        .collect();

    ranked.sort_by(|&a, &b| {
        let pa = rows[a].report.percentage.unwrap_or(0.0);
        let pb = rows[b].report.percentage.unwrap_or(0.0);
        pb.partial_cmp(&pa).unwrap_or(std::cmp::Ordering::Equal)
    });

    for (rank, idx) in ranked.into_iter().enumerate() {
        rows[idx].position = Some(rank as u32 + 1);
    }
}
