use serde_json::{json, Value};

use crate::auth::Session;
use crate::db::SqliteStore;
use crate::eligibility;
use crate::error::CoreError;
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::model::{Role, Semester, Student};

pub fn required_str(req: &Request, key: &str) -> Result<String, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
}

pub fn required_i64(req: &Request, key: &str) -> Result<i64, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn semester_param(req: &Request, key: &str) -> Result<Semester, Value> {
    let n = required_i64(req, key)?;
    Semester::new(n).map_err(|e| core_err(req, e))
}

pub fn core_err(req: &Request, e: CoreError) -> Value {
    if let CoreError::Transient(inner) = &e {
        tracing::warn!(id = %req.id, method = %req.method, error = %inner, "store call failed");
    }
    err(&req.id, e.code(), e.to_string(), e.details())
}

pub fn store<'a>(state: &'a AppState, req: &Request) -> Result<&'a SqliteStore, Value> {
    state
        .store
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn session<'a>(state: &'a AppState, req: &Request) -> Result<&'a Session, Value> {
    state
        .session
        .as_ref()
        .ok_or_else(|| err(&req.id, "not_signed_in", "sign in first", None))
}

pub fn require_teacher<'a>(state: &'a AppState, req: &Request) -> Result<&'a Session, Value> {
    let s = session(state, req)?;
    if !s.is_teacher() {
        return Err(err(&req.id, "forbidden", "teacher sign-in required", None));
    }
    Ok(s)
}

/// Students address themselves; teachers must name the student.
pub fn target_roll_no(session: &Session, req: &Request) -> Result<String, Value> {
    let requested = optional_str(req, "rollNo");
    match session.role {
        Role::Student => match requested {
            Some(r) if r != session.id => Err(err(
                &req.id,
                "forbidden",
                "students may only access their own records",
                Some(json!({ "rollNo": r })),
            )),
            _ => Ok(session.id.clone()),
        },
        Role::Teacher => requested
            .ok_or_else(|| err(&req.id, "bad_params", "missing rollNo", None)),
    }
}

/// Semesters this session may see for `student`.
pub fn visible_semesters(session: &Session, student: &Student) -> Vec<Semester> {
    match session.role {
        Role::Teacher => Semester::all().collect(),
        Role::Student => eligibility::accessible_semesters_for(&student.year_of_study),
    }
}

/// Student sessions are held to their year's semesters before any call
/// that reads or writes a single semester.
pub fn check_semester_access(
    session: &Session,
    student: &Student,
    semester: Semester,
    req: &Request,
) -> Result<(), Value> {
    if session.role == Role::Teacher || eligibility::is_accessible(&student.year_of_study, semester) {
        return Ok(());
    }
    Err(core_err(req, CoreError::SemesterNotAccessible { semester }))
}
