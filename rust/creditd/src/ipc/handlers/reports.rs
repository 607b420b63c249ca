use crate::ipc::error::{err, ok};
use crate::ipc::handlers::settings;
use crate::ipc::helpers::{core_err, require_teacher, required_str, store};
use crate::ipc::types::{AppState, Request};
use crate::report;
use crate::store::CreditStore;
use serde_json::{json, Value};

fn handle_student_progress_model(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    require_teacher(state, req)?;
    let roll_no = required_str(req, "rollNo")?;
    let store = store(state, req)?;

    let student = store.fetch_student(&roll_no).map_err(|e| core_err(req, e))?;
    let subjects = store.fetch_subjects().map_err(|e| core_err(req, e))?;
    let records = store
        .fetch_completion_records(&roll_no)
        .map_err(|e| core_err(req, e))?;
    let opts = settings::report_options(store.conn())
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;

    let model = report::build_student_report(&student, &subjects, &records, &opts);
    tracing::info!(roll_no = %roll_no, total_credits = model.total_credits, "report model built");
    Ok(ok(&req.id, json!(model)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let res = match req.method.as_str() {
        "reports.studentProgressModel" => handle_student_progress_model(state, req),
        _ => return None,
    };
    Some(res.unwrap_or_else(|e| e))
}
