use chrono::Utc;
use serde::Serialize;

use crate::model::{CompletionRecord, Semester, Student, Subject};
use crate::progress::{self, SemesterSummary};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOptions {
    pub title: String,
    pub include_subjects: bool,
    pub credit_target: u32,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            title: "Student Performance Report".to_string(),
            include_subjects: true,
            credit_target: 162,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportLine {
    pub code: String,
    pub name: String,
    pub credits: u32,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSemester {
    pub semester: Semester,
    pub progress_percent: f64,
    /// Rounded figure for printed output.
    pub progress_display: i64,
    pub credits: u64,
    pub locked: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<ReportLine>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReport {
    pub title: String,
    pub generated_at: String,
    pub student: Student,
    pub total_credits: u64,
    pub credit_target: u32,
    pub semesters: Vec<ReportSemester>,
    pub file_name: String,
}

fn report_semester(s: SemesterSummary, include_subjects: bool) -> ReportSemester {
    let subjects = if include_subjects {
        s.subjects
            .into_iter()
            .map(|row| ReportLine {
                code: row.subject.code,
                name: row.subject.name,
                credits: row.subject.credits,
                completed: row.completed,
            })
            .collect()
    } else {
        Vec::new()
    };
    ReportSemester {
        semester: s.semester,
        progress_percent: s.progress_percent,
        progress_display: progress::round_percent(s.progress_percent),
        credits: s.credits,
        locked: s.locked,
        subjects,
    }
}

fn report_file_name(student: &Student) -> String {
    let stem: String = student
        .name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("{}_report.pdf", stem)
}

/// Builds the teacher-facing report for one student across all eight semesters.
pub fn build_student_report(
    student: &Student,
    subjects: &[Subject],
    records: &[CompletionRecord],
    opts: &ReportOptions,
) -> StudentReport {
    let summary = progress::student_summary(subjects, records, Semester::all());
    StudentReport {
        title: opts.title.clone(),
        generated_at: Utc::now().to_rfc3339(),
        student: student.clone(),
        total_credits: summary.total_credits,
        credit_target: opts.credit_target,
        semesters: summary
            .semesters
            .into_iter()
            .map(|s| report_semester(s, opts.include_subjects))
            .collect(),
        file_name: report_file_name(student),
    }
}
