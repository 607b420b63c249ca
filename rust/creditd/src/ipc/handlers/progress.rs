use crate::eligibility;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::settings;
use crate::ipc::helpers::{core_err, session, store, target_roll_no, visible_semesters};
use crate::ipc::types::{AppState, Request};
use crate::progress;
use crate::store::CreditStore;
use serde_json::{json, Value};

/// Full dashboard snapshot, recomputed from scratch on every call. Clients
/// call this again whenever they see a `records.invalidated` event.
fn handle_progress_get(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let session = session(state, req)?;
    let roll_no = target_roll_no(session, req)?;
    let store = store(state, req)?;

    let student = store.fetch_student(&roll_no).map_err(|e| core_err(req, e))?;
    let subjects = store.fetch_subjects().map_err(|e| core_err(req, e))?;
    let records = store
        .fetch_completion_records(&roll_no)
        .map_err(|e| core_err(req, e))?;
    let opts = settings::report_options(store.conn())
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;

    let semesters = visible_semesters(session, &student);
    let summary = progress::student_summary(&subjects, &records, semesters);

    Ok(ok(
        &req.id,
        json!({
            "student": student,
            "accessibleSemesters": eligibility::accessible_semesters_for(&student.year_of_study),
            "totalCredits": summary.total_credits,
            "creditTarget": opts.credit_target,
            "semesters": summary.semesters,
        }),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let res = match req.method.as_str() {
        "progress.get" => handle_progress_get(state, req),
        _ => return None,
    };
    Some(res.unwrap_or_else(|e| e))
}
