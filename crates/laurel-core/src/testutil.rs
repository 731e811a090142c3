//! Shared fixtures for module tests: in-memory providers and canned
//! exam data.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::providers::{
    BlobStorage, ExamReadModel, ExamStatus, GradePolicy, ProviderError, QrEncoder, RenderBackend,
    StudentRef, SubjectResult, SubjectScope, TemplateStore,
};
use crate::render::{CertificateTemplate, PageSize, RenderJob, RenderedArtifact};
use crate::tenant::TenantContext;

pub(crate) const ORG: &str = "org-1";
pub(crate) const SCHOOL: &str = "school-1";
pub(crate) const ACTOR: &str = "user-1";

pub(crate) fn ctx() -> TenantContext {
    TenantContext::new(ORG, SCHOOL, ACTOR)
}

// =============================================================================
// Exam read model fixture
// =============================================================================

/// Canned exam data, built up per test.
#[derive(Default)]
pub(crate) struct FixtureExams {
    exams: HashMap<String, ExamStatus>,
    subjects: Vec<SubjectScope>,
    enrolled: Vec<String>,
    results: HashMap<(String, String, String), SubjectResult>,
    students: HashMap<String, StudentRef>,
}

impl FixtureExams {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_exam(mut self, exam_id: &str, status: ExamStatus) -> Self {
        self.exams.insert(exam_id.to_owned(), status);
        self
    }

    pub(crate) fn with_subject(
        mut self,
        exam_id: &str,
        subject_id: &str,
        total: Option<f64>,
        passing: Option<f64>,
    ) -> Self {
        self.subjects.push(SubjectScope {
            subject_id: subject_id.to_owned(),
            subject_name: subject_id.to_uppercase(),
            exam_id: exam_id.to_owned(),
            total_marks: total,
            passing_marks: passing,
        });
        self
    }

    /// Enrolls a resolvable student.
    pub(crate) fn with_student(mut self, student_id: &str, name: &str) -> Self {
        self.enrolled.push(student_id.to_owned());
        self.students.insert(
            student_id.to_owned(),
            StudentRef {
                student_id: student_id.to_owned(),
                full_name: name.to_owned(),
                guardian_name: None,
                photo_path: None,
            },
        );
        self
    }

    /// Enrolls a student whose identity does not resolve.
    pub(crate) fn with_unresolvable_student(mut self, student_id: &str) -> Self {
        self.enrolled.push(student_id.to_owned());
        self
    }

    pub(crate) fn with_result(
        mut self,
        exam_id: &str,
        subject_id: &str,
        student_id: &str,
        marks: f64,
    ) -> Self {
        self.results.insert(
            (exam_id.to_owned(), subject_id.to_owned(), student_id.to_owned()),
            SubjectResult {
                marks_obtained: Some(marks),
                is_absent: false,
            },
        );
        self
    }

    pub(crate) fn with_absent(mut self, exam_id: &str, subject_id: &str, student_id: &str) -> Self {
        self.results.insert(
            (exam_id.to_owned(), subject_id.to_owned(), student_id.to_owned()),
            SubjectResult {
                marks_obtained: None,
                is_absent: true,
            },
        );
        self
    }

}

impl ExamReadModel for FixtureExams {
    fn exam_status(&self, _org: &str, exam_id: &str) -> Result<Option<ExamStatus>, ProviderError> {
        Ok(self.exams.get(exam_id).copied())
    }

    fn subjects_in_scope(
        &self,
        _org: &str,
        _school: &str,
        _academic_year: &str,
        _class_name: &str,
        exam_ids: &[String],
    ) -> Result<Vec<SubjectScope>, ProviderError> {
        Ok(self
            .subjects
            .iter()
            .filter(|s| exam_ids.contains(&s.exam_id))
            .cloned()
            .collect())
    }

    fn enrolled_students(
        &self,
        _org: &str,
        _school: &str,
        _academic_year: &str,
        _class_name: &str,
    ) -> Result<Vec<String>, ProviderError> {
        Ok(self.enrolled.clone())
    }

    fn result_for(
        &self,
        _org: &str,
        exam_id: &str,
        subject_id: &str,
        student_id: &str,
    ) -> Result<Option<SubjectResult>, ProviderError> {
        Ok(self
            .results
            .get(&(exam_id.to_owned(), subject_id.to_owned(), student_id.to_owned()))
            .copied())
    }

    fn resolve_student(
        &self,
        _org: &str,
        student_id: &str,
    ) -> Result<Option<StudentRef>, ProviderError> {
        Ok(self.students.get(student_id).cloned())
    }
}

/// The canonical three-student fixture: one finalized exam with a single
/// 100/40 subject; A scores 90 (pass), B is absent (fail), C scores 35
/// (fail).
pub(crate) fn abc_exams() -> FixtureExams {
    FixtureExams::new()
        .with_exam("exam-1", ExamStatus::Finalized)
        .with_subject("exam-1", "math", Some(100.0), Some(40.0))
        .with_student("student-a", "Amira Khan")
        .with_student("student-b", "Bilal Rauf")
        .with_student("student-c", "Chanda Das")
        .with_result("exam-1", "math", "student-a", 90.0)
        .with_absent("exam-1", "math", "student-b")
        .with_result("exam-1", "math", "student-c", 35.0)
}

// =============================================================================
// Grade policy fixtures
// =============================================================================

/// A grade policy returning a fixed verdict for every percentage.
pub(crate) struct FixedGradePolicy(pub(crate) Option<bool>);

impl GradePolicy for FixedGradePolicy {
    fn is_pass(&self, _org: &str, _percentage: Option<f64>) -> Result<Option<bool>, ProviderError> {
        Ok(self.0)
    }
}

/// A grade policy passing at or above a threshold percentage.
pub(crate) struct ThresholdGradePolicy(pub(crate) f64);

impl GradePolicy for ThresholdGradePolicy {
    fn is_pass(&self, _org: &str, percentage: Option<f64>) -> Result<Option<bool>, ProviderError> {
        Ok(percentage.map(|p| p >= self.0))
    }
}

// =============================================================================
// Template, blob, render, and QR fixtures
// =============================================================================

/// In-memory template store.
#[derive(Default)]
pub(crate) struct FixtureTemplates {
    templates: HashMap<String, CertificateTemplate>,
}

impl FixtureTemplates {
    pub(crate) fn with(mut self, template: CertificateTemplate) -> Self {
        self.templates.insert(template.id.clone(), template);
        self
    }
}

impl TemplateStore for FixtureTemplates {
    fn find_template(
        &self,
        org: &str,
        template_id: &str,
    ) -> Result<Option<CertificateTemplate>, ProviderError> {
        Ok(self
            .templates
            .get(template_id)
            .filter(|t| t.organization_id == org)
            .cloned())
    }
}

/// A school-scoped HTML template with sensible defaults.
pub(crate) fn html_template(template_id: &str) -> CertificateTemplate {
    CertificateTemplate {
        id: template_id.to_owned(),
        organization_id: ORG.to_owned(),
        school_id: Some(SCHOOL.to_owned()),
        name: "Graduation Certificate".to_owned(),
        active: true,
        coordinate_layout: None,
        html_body: Some(
            "<h1>{{ student_name }}</h1><p>{{ certificate_no }}</p><p>{{ graduation_date }}</p>"
                .to_owned(),
        ),
        page: PageSize::A4Landscape,
    }
}

/// In-memory blob storage.
#[derive(Default)]
pub(crate) struct MemoryBlobs {
    blobs: HashMap<String, Vec<u8>>,
}

impl MemoryBlobs {
    pub(crate) fn with(mut self, path: &str, bytes: &[u8]) -> Self {
        self.blobs.insert(path.to_owned(), bytes.to_vec());
        self
    }
}

impl BlobStorage for MemoryBlobs {
    fn read(&self, path: &str) -> Result<Vec<u8>, ProviderError> {
        self.blobs
            .get(path)
            .cloned()
            .ok_or_else(|| ProviderError::backend("blob_storage", format!("missing blob: {path}")))
    }
}

/// A render backend that records every job and returns a deterministic
/// path per certificate.
#[derive(Default)]
pub(crate) struct RecordingBackend {
    pub(crate) jobs: Mutex<Vec<RenderJob>>,
}

impl RenderBackend for RecordingBackend {
    fn render(&self, job: &RenderJob) -> Result<RenderedArtifact, ProviderError> {
        self.jobs.lock().unwrap().push(job.clone());
        Ok(RenderedArtifact {
            pdf_path: format!("certificates/{}.pdf", job.certificate_id),
        })
    }
}

/// A render backend that fails for the named students' certificates and
/// succeeds otherwise. Failures are keyed by the `student_name` field so
/// tests can target one certificate in a batch.
#[derive(Default)]
pub(crate) struct FlakyBackend {
    fail_students: Mutex<HashSet<String>>,
}

impl FlakyBackend {
    pub(crate) fn failing_for(names: &[&str]) -> Self {
        Self {
            fail_students: Mutex::new(names.iter().map(|n| (*n).to_owned()).collect()),
        }
    }

    /// Clears the failure set so subsequent renders succeed.
    pub(crate) fn heal(&self) {
        self.fail_students.lock().unwrap().clear();
    }
}

impl RenderBackend for FlakyBackend {
    fn render(&self, job: &RenderJob) -> Result<RenderedArtifact, ProviderError> {
        let name = job.fields.get("student_name").cloned().unwrap_or_default();
        if self.fail_students.lock().unwrap().contains(&name) {
            return Err(ProviderError::backend(
                "render_backend",
                format!("renderer crashed for {name}"),
            ));
        }
        Ok(RenderedArtifact {
            pdf_path: format!("certificates/{}.pdf", job.certificate_id),
        })
    }
}

/// A QR encoder that returns the payload bytes unchanged.
pub(crate) struct StubQr;

impl QrEncoder for StubQr {
    fn encode(&self, payload: &str) -> Result<Vec<u8>, ProviderError> {
        Ok(payload.as_bytes().to_vec())
    }
}
