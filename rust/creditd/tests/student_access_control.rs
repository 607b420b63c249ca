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

fn next_line(reader: &mut BufReader<ChildStdout>) -> serde_json::Value {
    let mut line = String::new();
    reader.read_line(&mut line).expect("read line");
    serde_json::from_str(line.trim()).expect("parse line json")
}

fn setup_workspace(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    prefix: &str,
) -> PathBuf {
    let workspace = temp_dir(prefix);
    let _ = request_ok(
        stdin,
        reader,
        "s1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "s2",
        "auth.signup",
        json!({ "role": "teacher", "id": "T1", "name": "Rao", "department": "CS", "password": "tpw" }),
    );
    for (roll, year) in [("R1", "First"), ("R2", "Third")] {
        let _ = request_ok(
            stdin,
            reader,
            &format!("s3.{}", roll),
            "auth.signup",
            json!({
                "role": "student",
                "id": roll,
                "name": format!("Student {}", roll),
                "department": "CS",
                "yearOfStudy": year,
                "password": "spw"
            }),
        );
    }
    let _ = request_ok(
        stdin,
        reader,
        "s4",
        "auth.login",
        json!({ "role": "teacher", "id": "T1", "password": "tpw" }),
    );
    for sem in 1..=4 {
        let _ = request_ok(
            stdin,
            reader,
            &format!("s5.{}", sem),
            "subjects.upsert",
            json!({
                "id": sem,
                "semester": sem,
                "code": format!("GE{}01", sem),
                "name": format!("General {}", sem),
                "modeOfStudy": "Theory",
                "credits": 3
            }),
        );
    }
    workspace
}

#[test]
fn first_year_student_is_held_to_semesters_one_and_two() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = setup_workspace(&mut stdin, &mut reader, "creditd-access");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "auth.login",
        json!({ "role": "student", "id": "R1", "password": "spw" }),
    );

    let me = request_ok(&mut stdin, &mut reader, "2", "students.get", json!({}));
    assert_eq!(me["student"]["rollNo"], "R1");
    assert_eq!(me["accessibleSemesters"], json!([1, 2]));

    let progress = request_ok(&mut stdin, &mut reader, "3", "progress.get", json!({}));
    let shown: Vec<i64> = progress["semesters"]
        .as_array()
        .expect("semesters")
        .iter()
        .filter_map(|r| r["semester"].as_i64())
        .collect();
    assert_eq!(shown, vec![1, 2]);

    let outside = request(
        &mut stdin,
        &mut reader,
        "4",
        "completion.toggle",
        json!({ "subjectId": 3, "semester": 3 }),
    );
    assert_eq!(error_code(&outside), Some("semester_not_accessible"));
    let outside_save = request(
        &mut stdin,
        &mut reader,
        "5",
        "semester.save",
        json!({ "semester": 3, "confirmed": true }),
    );
    assert_eq!(error_code(&outside_save), Some("semester_not_accessible"));

    let other = request(
        &mut stdin,
        &mut reader,
        "6",
        "progress.get",
        json!({ "rollNo": "R2" }),
    );
    assert_eq!(error_code(&other), Some("forbidden"));

    let list = request(&mut stdin, &mut reader, "7", "students.list", json!({}));
    assert_eq!(error_code(&list), Some("forbidden"));
    let report = request(
        &mut stdin,
        &mut reader,
        "8",
        "reports.studentProgressModel",
        json!({ "rollNo": "R1" }),
    );
    assert_eq!(error_code(&report), Some("forbidden"));
    let upsert = request(
        &mut stdin,
        &mut reader,
        "9",
        "subjects.upsert",
        json!({ "semester": 1, "code": "X", "name": "X", "modeOfStudy": "X", "credits": 1 }),
    );
    assert_eq!(error_code(&upsert), Some("forbidden"));

    let hidden_catalog = request(
        &mut stdin,
        &mut reader,
        "9.1",
        "subjects.list",
        json!({ "semester": 3 }),
    );
    assert_eq!(error_code(&hidden_catalog), Some("semester_not_accessible"));
    let own_catalog = request_ok(&mut stdin, &mut reader, "9.2", "subjects.list", json!({}));
    let listed: Vec<i64> = own_catalog["subjects"]
        .as_array()
        .expect("subjects")
        .iter()
        .filter_map(|s| s["semester"].as_i64())
        .collect();
    assert_eq!(listed, vec![1, 2]);
    let sem2 = request_ok(
        &mut stdin,
        &mut reader,
        "9.3",
        "subjects.list",
        json!({ "semester": 2 }),
    );
    assert_eq!(sem2["subjects"].as_array().map(|a| a.len()), Some(1));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "completion.toggle",
        json!({ "subjectId": 2, "semester": 2 }),
    );
}

#[test]
fn teacher_sees_all_semesters_and_builds_report() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = setup_workspace(&mut stdin, &mut reader, "creditd-teacher");

    let students = request_ok(&mut stdin, &mut reader, "1", "students.list", json!({}));
    assert_eq!(students["students"].as_array().map(|a| a.len()), Some(2));

    let missing_roll = request(&mut stdin, &mut reader, "2", "progress.get", json!({}));
    assert_eq!(error_code(&missing_roll), Some("bad_params"));

    for sem in [3, 4] {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("3.{}", sem),
            "completion.toggle",
            json!({ "rollNo": "R2", "subjectId": sem, "semester": sem }),
        );
    }
    let progress = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "progress.get",
        json!({ "rollNo": "R2" }),
    );
    assert_eq!(progress["semesters"].as_array().map(|a| a.len()), Some(8));
    assert_eq!(progress["accessibleSemesters"], json!([1, 2, 3, 4, 5, 6]));
    assert_eq!(progress["totalCredits"], 6);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "settings.update",
        json!({ "section": "progress", "patch": { "creditTarget": 160 } }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "settings.update",
        json!({ "section": "reports", "patch": { "includeSubjects": false } }),
    );
    let bad = request(
        &mut stdin,
        &mut reader,
        "7",
        "settings.update",
        json!({ "section": "progress", "patch": { "creditTarget": "lots" } }),
    );
    assert_eq!(error_code(&bad), Some("bad_params"));

    let report = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "reports.studentProgressModel",
        json!({ "rollNo": "R2" }),
    );
    assert_eq!(report["creditTarget"], 160);
    assert_eq!(report["totalCredits"], 6);
    assert_eq!(report["fileName"], "Student_R2_report.pdf");
    let semesters = report["semesters"].as_array().expect("semesters");
    assert_eq!(semesters.len(), 8);
    assert_eq!(semesters[2]["progressDisplay"], 100);
    assert!(semesters.iter().all(|s| s.get("subjects").is_none()));
}

#[test]
fn subscriptions_emit_invalidation_events_after_writes() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = setup_workspace(&mut stdin, &mut reader, "creditd-events");

    // Teacher watching everyone.
    let all = request_ok(&mut stdin, &mut reader, "1", "changes.subscribe", json!({}));
    let all_id = all["subscriptionId"].as_i64().expect("subscriptionId");
    assert!(all["rollNo"].is_null());

    let only_r1 = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "changes.subscribe",
        json!({ "rollNo": "R1" }),
    );
    let r1_id = only_r1["subscriptionId"].as_i64().expect("subscriptionId");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "completion.toggle",
        json!({ "rollNo": "R2", "subjectId": 1, "semester": 1 }),
    );
    let ev = next_line(&mut reader);
    assert_eq!(ev["event"], "records.invalidated");
    assert_eq!(ev["subscriptionId"], all_id);
    assert_eq!(ev["rollNo"], "R2");
    assert!(ev.get("id").is_none());

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "completion.toggle",
        json!({ "rollNo": "R1", "subjectId": 1, "semester": 1 }),
    );
    let mut seen: Vec<i64> = (0..2)
        .map(|_| next_line(&mut reader)["subscriptionId"].as_i64().expect("id"))
        .collect();
    seen.sort();
    let mut expected = vec![all_id, r1_id];
    expected.sort();
    assert_eq!(seen, expected);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "changes.unsubscribe",
        json!({ "subscriptionId": all_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "completion.toggle",
        json!({ "rollNo": "R2", "subjectId": 2, "semester": 2 }),
    );
    // Nothing pending: the next line must be the health response.
    let health = request_ok(&mut stdin, &mut reader, "7", "health", json!({}));
    assert_eq!(health["subscribers"], 1);

    let _ = request_ok(&mut stdin, &mut reader, "8", "auth.logout", json!({}));
    let health = request_ok(&mut stdin, &mut reader, "9", "health", json!({}));
    assert_eq!(health["subscribers"], 0);
    assert!(health["session"].is_null());
}
