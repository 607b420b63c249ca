use crate::eligibility;
use crate::ipc::error::ok;
use crate::ipc::helpers::{core_err, require_teacher, session, store, target_roll_no};
use crate::ipc::types::{AppState, Request};
use crate::store::CreditStore;
use serde_json::{json, Value};

fn handle_students_list(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    require_teacher(state, req)?;
    let students = store(state, req)?
        .list_students()
        .map_err(|e| core_err(req, e))?;
    Ok(ok(&req.id, json!({ "students": students })))
}

fn handle_students_get(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let session = session(state, req)?;
    let roll_no = target_roll_no(session, req)?;
    let student = store(state, req)?
        .fetch_student(&roll_no)
        .map_err(|e| core_err(req, e))?;
    let accessible = eligibility::accessible_semesters_for(&student.year_of_study);
    Ok(ok(
        &req.id,
        json!({
            "student": student,
            "accessibleSemesters": accessible,
        }),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let res = match req.method.as_str() {
        "students.list" => handle_students_list(state, req),
        "students.get" => handle_students_get(state, req),
        _ => return None,
    };
    Some(res.unwrap_or_else(|e| e))
}
