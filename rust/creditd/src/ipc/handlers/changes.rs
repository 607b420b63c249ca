use crate::ipc::error::{err, event, ok};
use crate::ipc::helpers::{core_err, required_i64, session, store, target_roll_no};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::store::CreditStore;
use serde_json::{json, Value};

fn handle_changes_subscribe(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let session = session(state, req)?;
    // Teachers may watch every student by omitting rollNo.
    let roll_no = if session.role == Role::Teacher && req.params.get("rollNo").is_none() {
        None
    } else {
        Some(target_roll_no(session, req)?)
    };
    let store = store(state, req)?;
    if let Some(r) = roll_no.as_deref() {
        store.fetch_student(r).map_err(|e| core_err(req, e))?;
    }
    let sub = store.subscribe_to_changes(roll_no.as_deref());
    let id = sub.id;
    state.subscriptions.push(sub);
    Ok(ok(
        &req.id,
        json!({ "subscriptionId": id, "rollNo": roll_no }),
    ))
}

fn handle_changes_unsubscribe(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    session(state, req)?;
    let id = required_i64(req, "subscriptionId")?;
    let Some(pos) = state.subscriptions.iter().position(|s| s.id as i64 == id) else {
        return Err(err(
            &req.id,
            "not_found",
            "subscription not found",
            Some(json!({ "subscriptionId": id })),
        ));
    };
    let sub = state.subscriptions.remove(pos);
    if let Some(store) = state.store.as_ref() {
        store.feed().unsubscribe(sub.id);
    }
    Ok(ok(&req.id, json!({ "subscriptionId": id })))
}

/// Collects pending invalidations as event lines, one per subscription and
/// student, however many writes happened since the last drain.
pub fn drain_events(state: &mut AppState) -> Vec<Value> {
    let mut out = Vec::new();
    for sub in &state.subscriptions {
        for roll_no in sub.drain() {
            out.push(event(
                "records.invalidated",
                json!({ "subscriptionId": sub.id, "rollNo": roll_no }),
            ));
        }
    }
    out
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let res = match req.method.as_str() {
        "changes.subscribe" => handle_changes_subscribe(state, req),
        "changes.unsubscribe" => handle_changes_unsubscribe(state, req),
        _ => return None,
    };
    Some(res.unwrap_or_else(|e| e))
}
