use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    check_semester_access, core_err, required_i64, semester_param, session, store,
    target_roll_no,
};
use crate::ipc::types::{AppState, Request};
use crate::lock;
use crate::progress;
use crate::store::CreditStore;
use serde_json::{json, Value};

fn handle_completion_toggle(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let session = session(state, req)?;
    let roll_no = target_roll_no(session, req)?;
    let subject_id = required_i64(req, "subjectId")?;
    let semester = semester_param(req, "semester")?;
    let store = store(state, req)?;

    let student = store.fetch_student(&roll_no).map_err(|e| core_err(req, e))?;
    check_semester_access(session, &student, semester, req)?;

    let record = lock::toggle_completion(store, &roll_no, subject_id, semester)
        .map_err(|e| core_err(req, e))?;

    // Report figures from a fresh read, never by patching the old snapshot.
    let subjects = store.fetch_subjects().map_err(|e| core_err(req, e))?;
    let records = store
        .fetch_completion_records(&roll_no)
        .map_err(|e| core_err(req, e))?;
    Ok(ok(
        &req.id,
        json!({
            "record": record,
            "semester": progress::semester_summary(&subjects, &records, semester),
            "totalCredits": progress::total_credits(&subjects, &records),
        }),
    ))
}

fn handle_semester_save(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let session = session(state, req)?;
    let roll_no = target_roll_no(session, req)?;
    let semester = semester_param(req, "semester")?;
    let store = store(state, req)?;

    let student = store.fetch_student(&roll_no).map_err(|e| core_err(req, e))?;
    check_semester_access(session, &student, semester, req)?;

    let confirmed = req
        .params
        .get("confirmed")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if !confirmed {
        return Err(err(
            &req.id,
            "confirmation_required",
            format!(
                "saving semester {} is permanent; resend with confirmed=true",
                semester
            ),
            Some(json!({ "semester": semester })),
        ));
    }

    let saved = lock::save_semester(store, &roll_no, semester).map_err(|e| core_err(req, e))?;
    Ok(ok(&req.id, json!(saved)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let res = match req.method.as_str() {
        "completion.toggle" => handle_completion_toggle(state, req),
        "semester.save" => handle_semester_save(state, req),
        _ => return None,
    };
    Some(res.unwrap_or_else(|e| e))
}
