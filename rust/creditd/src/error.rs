use thiserror::Error;

use crate::model::Semester;

/// Failures surfaced by the credit core and its store.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("semester {semester} is saved and cannot be edited")]
    LockedSemester { semester: Semester },

    #[error("semester {semester} is already saved")]
    AlreadySaved { semester: Semester },

    #[error("semester {semester} is not accessible for this student")]
    SemesterNotAccessible { semester: Semester },

    #[error("subject {subject_id} belongs to semester {expected}, not {got}")]
    SemesterMismatch {
        subject_id: i64,
        expected: Semester,
        got: Semester,
    },

    #[error("semester must be in 1..=8, got {0}")]
    InvalidSemester(i64),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("{entity} already exists: {id}")]
    Duplicate { entity: &'static str, id: String },

    #[error("store request failed: {0}")]
    Transient(#[from] rusqlite::Error),
}

impl CoreError {
    /// Stable error code used in IPC responses.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::NotFound { .. } => "not_found",
            CoreError::LockedSemester { .. } => "semester_locked",
            CoreError::AlreadySaved { .. } => "already_saved",
            CoreError::SemesterNotAccessible { .. } => "semester_not_accessible",
            CoreError::SemesterMismatch { .. } => "semester_mismatch",
            CoreError::InvalidSemester(_) => "bad_params",
            CoreError::InvalidCredentials => "invalid_credentials",
            CoreError::Duplicate { .. } => "already_exists",
            CoreError::Transient(_) => "db_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        use serde_json::json;
        match self {
            CoreError::NotFound { entity, id } => Some(json!({ "entity": entity, "id": id })),
            CoreError::LockedSemester { semester }
            | CoreError::AlreadySaved { semester }
            | CoreError::SemesterNotAccessible { semester } => {
                Some(json!({ "semester": semester }))
            }
            CoreError::SemesterMismatch {
                subject_id,
                expected,
                got,
            } => Some(json!({
                "subjectId": subject_id,
                "subjectSemester": expected,
                "semester": got
            })),
            CoreError::InvalidSemester(n) => Some(json!({ "semester": n })),
            CoreError::Duplicate { entity, id } => Some(json!({ "entity": entity, "id": id })),
            CoreError::InvalidCredentials | CoreError::Transient(_) => None,
        }
    }
}
