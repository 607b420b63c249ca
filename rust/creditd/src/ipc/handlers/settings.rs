use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{require_teacher, session, store};
use crate::ipc::types::{AppState, Request};
use crate::report::ReportOptions;
use rusqlite::Connection;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SettingsSection {
    Progress,
    Reports,
}

impl SettingsSection {
    const ALL: [SettingsSection; 2] = [SettingsSection::Progress, SettingsSection::Reports];

    fn parse(s: &str) -> Option<Self> {
        match s {
            "progress" => Some(Self::Progress),
            "reports" => Some(Self::Reports),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Progress => "progress",
            Self::Reports => "reports",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Progress => "setup.progress",
            Self::Reports => "setup.reports",
        }
    }
}

fn default_section(section: SettingsSection) -> Value {
    let defaults = ReportOptions::default();
    match section {
        SettingsSection::Progress => json!({
            "creditTarget": defaults.credit_target
        }),
        SettingsSection::Reports => json!({
            "title": defaults.title,
            "includeSubjects": defaults.include_subjects
        }),
    }
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.is_empty() || s.len() > max_len {
        return Err(format!("{} length must be 1..={}", key, max_len));
    }
    Ok(s.to_string())
}

fn merge_section_patch(
    section: SettingsSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal settings object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SettingsSection::Progress => match k.as_str() {
                "creditTarget" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 1000)?));
                }
                _ => return Err(format!("unknown progress field: {}", k)),
            },
            SettingsSection::Reports => match k.as_str() {
                "title" => {
                    obj.insert(k.clone(), Value::String(parse_string_max(v, k, 120)?));
                }
                "includeSubjects" => {
                    let b = v
                        .as_bool()
                        .ok_or_else(|| format!("{} must be boolean", k))?;
                    obj.insert(k.clone(), Value::Bool(b));
                }
                _ => return Err(format!("unknown reports field: {}", k)),
            },
        }
    }
    Ok(())
}

/// Stored section merged over its defaults, so new fields always have a value.
fn load_section(conn: &Connection, section: SettingsSection) -> anyhow::Result<Value> {
    let mut out = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let (Some(dst), Some(src)) = (out.as_object_mut(), saved.as_object()) {
            for (k, v) in src {
                if dst.contains_key(k) {
                    dst.insert(k.clone(), v.clone());
                }
            }
        }
    }
    Ok(out)
}

pub fn report_options(conn: &Connection) -> anyhow::Result<ReportOptions> {
    let defaults = ReportOptions::default();
    let progress = load_section(conn, SettingsSection::Progress)?;
    let reports = load_section(conn, SettingsSection::Reports)?;
    Ok(ReportOptions {
        title: reports
            .get("title")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or(defaults.title),
        include_subjects: reports
            .get("includeSubjects")
            .and_then(|v| v.as_bool())
            .unwrap_or(defaults.include_subjects),
        credit_target: progress
            .get("creditTarget")
            .and_then(|v| v.as_u64())
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(defaults.credit_target),
    })
}

fn handle_settings_get(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    session(state, req)?;
    let conn = store(state, req)?.conn();
    let mut out = Map::new();
    for section in SettingsSection::ALL {
        let v = load_section(conn, section)
            .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;
        out.insert(section.name().to_string(), v);
    }
    Ok(ok(&req.id, Value::Object(out)))
}

fn handle_settings_update(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    require_teacher(state, req)?;
    let conn = store(state, req)?.conn();
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return Err(err(&req.id, "bad_params", "missing section", None));
    };
    let Some(section) = SettingsSection::parse(section_raw) else {
        return Err(err(&req.id, "bad_params", "unknown section", None));
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return Err(err(&req.id, "bad_params", "patch must be an object", None));
    };

    let mut current = load_section(conn, section)
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;
    merge_section_patch(section, &mut current, patch_obj)
        .map_err(|msg| err(&req.id, "bad_params", msg, None))?;
    db::settings_set_json(conn, section.key(), &current)
        .map_err(|e| err(&req.id, "db_update_failed", e.to_string(), None))?;
    let mut out = Map::new();
    out.insert(section.name().to_string(), current);
    Ok(ok(&req.id, Value::Object(out)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let res = match req.method.as_str() {
        "settings.get" => handle_settings_get(state, req),
        "settings.update" => handle_settings_update(state, req),
        _ => return None,
    };
    Some(res.unwrap_or_else(|e| e))
}
