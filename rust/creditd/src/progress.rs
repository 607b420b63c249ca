use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::lock;
use crate::model::{CompletionRecord, Semester, Subject};

/// Ids of subjects with at least one completed record, optionally scoped to
/// a semester. Duplicate or stale rows collapse to one entry per subject.
fn completed_subject_ids(records: &[CompletionRecord], semester: Option<Semester>) -> HashSet<i64> {
    records
        .iter()
        .filter(|r| r.completed)
        .filter(|r| semester.map(|s| r.semester == s).unwrap_or(true))
        .map(|r| r.subject_id)
        .collect()
}

/// Percentage of the semester's catalog subjects the student has completed.
///
/// Returns 0.0 for a semester with no subjects. The value is not rounded.
pub fn semester_progress(subjects: &[Subject], records: &[CompletionRecord], semester: Semester) -> f64 {
    let semester_subjects: Vec<&Subject> =
        subjects.iter().filter(|s| s.semester == semester).collect();
    if semester_subjects.is_empty() {
        return 0.0;
    }
    let done = completed_subject_ids(records, Some(semester));
    let completed = semester_subjects
        .iter()
        .filter(|s| done.contains(&s.id))
        .count();
    (100.0 * completed as f64 / semester_subjects.len() as f64).min(100.0)
}

/// Sum of credits over distinct completed subjects, across all semesters.
pub fn total_credits(subjects: &[Subject], records: &[CompletionRecord]) -> u64 {
    let done = completed_subject_ids(records, None);
    subjects
        .iter()
        .filter(|s| done.contains(&s.id))
        .map(|s| u64::from(s.credits))
        .sum()
}

pub fn semester_credits(subjects: &[Subject], records: &[CompletionRecord], semester: Semester) -> u64 {
    let done = completed_subject_ids(records, Some(semester));
    subjects
        .iter()
        .filter(|s| s.semester == semester && done.contains(&s.id))
        .map(|s| u64::from(s.credits))
        .sum()
}

/// Presentation rounding for percentages (half away from zero).
pub fn round_percent(x: f64) -> i64 {
    x.round() as i64
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStatus {
    #[serde(flatten)]
    pub subject: Subject,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterSummary {
    pub semester: Semester,
    pub progress_percent: f64,
    pub credits: u64,
    pub locked: bool,
    pub subjects: Vec<SubjectStatus>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub total_credits: u64,
    pub semesters: Vec<SemesterSummary>,
}

pub fn semester_summary(
    subjects: &[Subject],
    records: &[CompletionRecord],
    semester: Semester,
) -> SemesterSummary {
    // A subject counts as completed if any of its rows for this semester says so.
    let mut completed_by_subject: HashMap<i64, bool> = HashMap::new();
    for r in records.iter().filter(|r| r.semester == semester) {
        *completed_by_subject.entry(r.subject_id).or_insert(false) |= r.completed;
    }
    let rows = subjects
        .iter()
        .filter(|s| s.semester == semester)
        .map(|s| SubjectStatus {
            subject: s.clone(),
            completed: completed_by_subject.get(&s.id).copied().unwrap_or(false),
        })
        .collect();

    SemesterSummary {
        semester,
        progress_percent: semester_progress(subjects, records, semester),
        credits: semester_credits(subjects, records, semester),
        locked: lock::is_locked(records, semester),
        subjects: rows,
    }
}

/// Recomputes every figure from a full snapshot of one student's records.
pub fn student_summary<I>(subjects: &[Subject], records: &[CompletionRecord], semesters: I) -> ProgressSummary
where
    I: IntoIterator<Item = Semester>,
{
    ProgressSummary {
        total_credits: total_credits(subjects, records),
        semesters: semesters
            .into_iter()
            .map(|s| semester_summary(subjects, records, s))
            .collect(),
    }
}
