use crate::auth::{self, SignupError, SignupForm};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{core_err, optional_str, required_str, store};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::store::CreditStore;
use serde_json::{json, Value};

fn role_param(req: &Request) -> Result<Role, Value> {
    let raw = required_str(req, "role")?;
    Role::parse(&raw).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            "role must be one of: student, teacher",
            Some(json!({ "role": raw })),
        )
    })
}

fn handle_signup(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let store = store(state, req)?;
    let form = SignupForm {
        role: role_param(req)?,
        id: required_str(req, "id")?,
        name: required_str(req, "name")?,
        department: required_str(req, "department")?,
        year_of_study: optional_str(req, "yearOfStudy"),
        password: required_str(req, "password")?,
    };
    match auth::signup(store, &form) {
        Ok(()) => Ok(ok(
            &req.id,
            json!({ "role": form.role, "id": form.id.trim() }),
        )),
        Err(SignupError::Core(e)) => Err(core_err(req, e)),
        Err(e) => Err(err(&req.id, "bad_params", e.to_string(), None)),
    }
}

fn handle_login(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let role = role_param(req)?;
    let id = required_str(req, "id")?;
    let password = required_str(req, "password")?;
    let session = {
        let store = store(state, req)?;
        auth::login(store, role, &id, &password).map_err(|e| core_err(req, e))?
    };
    state.clear_session();
    state.session = Some(session.clone());
    Ok(ok(&req.id, json!({ "session": session })))
}

fn handle_logout(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let was = state.session.take();
    state.clear_session();
    if let Some(s) = &was {
        tracing::info!(role = s.role.as_str(), id = %s.id, "signed out");
    }
    Ok(ok(&req.id, json!({ "signedOut": was.is_some() })))
}

fn handle_session_get(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let Some(session) = state.session.as_ref() else {
        return Ok(ok(&req.id, json!({ "session": null })));
    };
    let store = store(state, req)?;
    let profile = match session.role {
        Role::Student => json!(store.fetch_student(&session.id).map_err(|e| core_err(req, e))?),
        Role::Teacher => json!(store.fetch_teacher(&session.id).map_err(|e| core_err(req, e))?),
    };
    Ok(ok(&req.id, json!({ "session": session, "profile": profile })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let res = match req.method.as_str() {
        "auth.signup" => handle_signup(state, req),
        "auth.login" => handle_login(state, req),
        "auth.logout" => handle_logout(state, req),
        "session.get" => handle_session_get(state, req),
        _ => return None,
    };
    Some(res.unwrap_or_else(|e| e))
}
