//! Per-semester save/lock state machine.
//!
//! A (student, semester) pair starts `Unsaved` and moves to `Saved` once; there
//! is no way back. Every mutation consults [`is_locked`] on a fresh snapshot.

use serde::Serialize;

use crate::error::CoreError;
use crate::model::{CompletionRecord, Semester};
use crate::store::CreditStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SemesterLock {
    Unsaved,
    Saved,
}

pub fn lock_state(records: &[CompletionRecord], semester: Semester) -> SemesterLock {
    if records.iter().any(|r| r.semester == semester && r.saved) {
        SemesterLock::Saved
    } else {
        SemesterLock::Unsaved
    }
}

pub fn is_locked(records: &[CompletionRecord], semester: Semester) -> bool {
    lock_state(records, semester) == SemesterLock::Saved
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// No record yet: create one already completed.
    Create,
    /// Flip `completed` on the existing record; `saved` is carried as-is.
    Flip { completed: bool, saved: bool },
}

impl ToggleOutcome {
    pub fn completed(self) -> bool {
        match self {
            ToggleOutcome::Create => true,
            ToggleOutcome::Flip { completed, .. } => completed,
        }
    }

    pub fn saved(self) -> bool {
        match self {
            ToggleOutcome::Create => false,
            ToggleOutcome::Flip { saved, .. } => saved,
        }
    }
}

pub fn plan_toggle(
    records: &[CompletionRecord],
    subject_id: i64,
    semester: Semester,
) -> Result<ToggleOutcome, CoreError> {
    if is_locked(records, semester) {
        return Err(CoreError::LockedSemester { semester });
    }
    let existing = records
        .iter()
        .find(|r| r.subject_id == subject_id && r.semester == semester);
    Ok(match existing {
        None => ToggleOutcome::Create,
        Some(r) => ToggleOutcome::Flip {
            completed: !r.completed,
            saved: r.saved,
        },
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavePlan {
    pub semester: Semester,
    pub record_ids: Vec<String>,
}

/// A second save on a locked semester is rejected rather than re-written.
pub fn plan_save(records: &[CompletionRecord], semester: Semester) -> Result<SavePlan, CoreError> {
    if is_locked(records, semester) {
        return Err(CoreError::AlreadySaved { semester });
    }
    Ok(SavePlan {
        semester,
        record_ids: records
            .iter()
            .filter(|r| r.semester == semester)
            .map(|r| r.id.clone())
            .collect(),
    })
}

/// Toggles one subject for a student after checking the catalog and the lock.
pub fn toggle_completion<S: CreditStore + ?Sized>(
    store: &S,
    roll_no: &str,
    subject_id: i64,
    semester: Semester,
) -> Result<CompletionRecord, CoreError> {
    store.fetch_student(roll_no)?;
    let subjects = store.fetch_subjects()?;
    let subject = subjects
        .iter()
        .find(|s| s.id == subject_id)
        .ok_or_else(|| CoreError::NotFound {
            entity: "subject",
            id: subject_id.to_string(),
        })?;
    if subject.semester != semester {
        return Err(CoreError::SemesterMismatch {
            subject_id,
            expected: subject.semester,
            got: semester,
        });
    }

    let records = store.fetch_completion_records(roll_no)?;
    let outcome = plan_toggle(&records, subject_id, semester)?;
    let rec = store.upsert_completion_record(
        roll_no,
        subject_id,
        semester,
        outcome.completed(),
        outcome.saved(),
    )?;
    tracing::info!(
        roll_no,
        subject_id,
        semester = semester.number(),
        completed = rec.completed,
        "completion toggled"
    );
    Ok(rec)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResult {
    pub semester: Semester,
    pub saved_count: usize,
    pub state: SemesterLock,
}

/// Locks a semester. Subjects never toggled get no record and stay incomplete.
pub fn save_semester<S: CreditStore + ?Sized>(
    store: &S,
    roll_no: &str,
    semester: Semester,
) -> Result<SaveResult, CoreError> {
    store.fetch_student(roll_no)?;
    let records = store.fetch_completion_records(roll_no)?;
    let plan = plan_save(&records, semester)?;
    let saved_count = if plan.record_ids.is_empty() {
        0
    } else {
        store.mark_semester_saved(roll_no, plan.semester)?
    };
    let state = if saved_count > 0 {
        SemesterLock::Saved
    } else {
        SemesterLock::Unsaved
    };
    tracing::info!(
        roll_no,
        semester = semester.number(),
        saved_count,
        "semester saved"
    );
    Ok(SaveResult {
        semester,
        saved_count,
        state,
    })
}
