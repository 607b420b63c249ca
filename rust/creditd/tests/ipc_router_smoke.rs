use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_creditd");
    let mut child = Command::new(exe)
        .env_remove("CREDITD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn creditd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> Option<&str> {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("creditd-router-smoke");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health["workspacePath"].is_null());

    let unknown = request(&mut stdin, &mut reader, "2", "grades.explode", json!({}));
    assert_eq!(error_code(&unknown), Some("not_implemented"));

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read bad_json line");
    let bad: serde_json::Value = serde_json::from_str(line.trim()).expect("parse");
    assert_eq!(error_code(&bad), Some("bad_json"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "auth.signup",
        json!({ "role": "teacher", "id": "T1", "name": "Rao", "department": "CS", "password": "pw" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "auth.login",
        json!({ "role": "teacher", "id": "T1", "password": "pw" }),
    );

    let methods = [
        ("subjects.list", json!({})),
        ("subjects.list", json!({ "semester": 1 })),
        ("students.list", json!({})),
        ("settings.get", json!({})),
        ("session.get", json!({})),
    ];
    for (i, (method, params)) in methods.into_iter().enumerate() {
        let _ = request_ok(&mut stdin, &mut reader, &format!("6.{}", i), method, params);
    }

    let settings = request_ok(&mut stdin, &mut reader, "7", "settings.get", json!({}));
    assert_eq!(settings["progress"]["creditTarget"], 162);
    assert_eq!(settings["reports"]["includeSubjects"], true);

    let families = [
        ("students.get", json!({ "rollNo": "nobody" }), "not_found"),
        ("progress.get", json!({ "rollNo": "nobody" }), "not_found"),
        ("reports.studentProgressModel", json!({ "rollNo": "nobody" }), "not_found"),
        ("changes.unsubscribe", json!({ "subscriptionId": 99 }), "not_found"),
        ("semester.save", json!({ "rollNo": "nobody", "semester": 1, "confirmed": true }), "not_found"),
        ("settings.update", json!({ "section": "colours", "patch": {} }), "bad_params"),
    ];
    for (i, (method, params, code)) in families.into_iter().enumerate() {
        let resp = request(&mut stdin, &mut reader, &format!("8.{}", i), method, params);
        assert_eq!(error_code(&resp), Some(code), "{} -> {}", method, resp);
    }

    // Reopening the workspace drops the session.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let session = request_ok(&mut stdin, &mut reader, "10", "session.get", json!({}));
    assert!(session["session"].is_null());
}
