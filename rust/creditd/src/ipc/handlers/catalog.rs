use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    check_semester_access, core_err, require_teacher, required_i64, required_str,
    semester_param, session, store, visible_semesters,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Role, Subject};
use crate::store::CreditStore;
use serde_json::{json, Value};

const SUBJECT_CODE_MAX: usize = 32;
const SUBJECT_NAME_MAX: usize = 200;
const SUBJECT_CREDITS_MAX: i64 = 40;

fn bounded_str(req: &Request, key: &str, max_len: usize) -> Result<String, Value> {
    let s = required_str(req, key)?;
    let s = s.trim();
    if s.is_empty() || s.len() > max_len {
        return Err(err(
            &req.id,
            "bad_params",
            format!("{} must be 1..={} characters", key, max_len),
            None,
        ));
    }
    Ok(s.to_string())
}

fn handle_subjects_list(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let session = session(state, req)?;
    let store = store(state, req)?;
    let filter = if req.params.get("semester").is_some_and(|v| !v.is_null()) {
        Some(semester_param(req, "semester")?)
    } else {
        None
    };
    // Students only see the catalog of their own year's semesters.
    let visible = if session.role == Role::Student {
        let student = store
            .fetch_student(&session.id)
            .map_err(|e| core_err(req, e))?;
        if let Some(f) = filter {
            check_semester_access(session, &student, f, req)?;
        }
        Some(visible_semesters(session, &student))
    } else {
        None
    };
    let subjects: Vec<Subject> = store
        .fetch_subjects()
        .map_err(|e| core_err(req, e))?
        .into_iter()
        .filter(|s| filter.map(|f| s.semester == f).unwrap_or(true))
        .filter(|s| visible.as_ref().map(|v| v.contains(&s.semester)).unwrap_or(true))
        .collect();
    Ok(ok(&req.id, json!({ "subjects": subjects })))
}

fn handle_subjects_upsert(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    require_teacher(state, req)?;
    let store = store(state, req)?;

    let id = match req.params.get("id") {
        None | Some(Value::Null) => 0,
        Some(v) => match v.as_i64() {
            Some(n) if n >= 0 => n,
            _ => {
                return Err(err(
                    &req.id,
                    "bad_params",
                    "id must be a non-negative integer",
                    Some(json!({ "id": v })),
                ))
            }
        },
    };
    let credits = required_i64(req, "credits")?;
    if !(1..=SUBJECT_CREDITS_MAX).contains(&credits) {
        return Err(err(
            &req.id,
            "bad_params",
            format!("credits must be in 1..={}", SUBJECT_CREDITS_MAX),
            Some(json!({ "credits": credits })),
        ));
    }
    let credits = credits as u32;
    let subject = Subject {
        id,
        semester: semester_param(req, "semester")?,
        code: bounded_str(req, "code", SUBJECT_CODE_MAX)?,
        name: bounded_str(req, "name", SUBJECT_NAME_MAX)?,
        mode_of_study: bounded_str(req, "modeOfStudy", SUBJECT_NAME_MAX)?,
        credits,
    };
    let subject_id = store.upsert_subject(&subject).map_err(|e| core_err(req, e))?;
    tracing::info!(subject_id, semester = subject.semester.number(), "subject saved");
    Ok(ok(
        &req.id,
        json!({ "subjectId": subject_id, "semester": subject.semester }),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let res = match req.method.as_str() {
        "subjects.list" => handle_subjects_list(state, req),
        "subjects.upsert" => handle_subjects_upsert(state, req),
        _ => return None,
    };
    Some(res.unwrap_or_else(|e| e))
}
