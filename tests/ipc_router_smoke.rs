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
    let exe = env!("CARGO_BIN_EXE_campusd");
    let mut child = Command::new(exe)
        .env_remove("CAMPUSD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn campusd");
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
            .get("error")
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string())
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> String {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("campus-router-smoke");
    let bundle_out = workspace.join("smoke-backup.zip");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("workspacePath").map(|v| v.is_null()).unwrap_or(false));

    let early = request(&mut stdin, &mut reader, "2", "students.list", json!({}));
    assert_eq!(error_code(&early), "no_workspace");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let catalog = request_ok(&mut stdin, &mut reader, "4", "catalog.courses", json!({}));
    let categories = catalog["categories"].as_array().expect("categories");
    assert_eq!(categories.len(), 5);
    assert_eq!(categories[1]["category"], "Junior College");

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "students.create",
        json!({
            "name": "Smoke Student",
            "category": "School",
            "course": "CBSE 10th",
            "email": "smoke@example.com",
            "phone": "9000000000",
            "enrollmentDate": "2024-06-01",
            "totalFee": 12000
        }),
    );
    let student_id = created["student"]["id"].as_str().expect("student id").to_string();

    let calls: Vec<(&str, serde_json::Value)> = vec![
        ("students.list", json!({})),
        ("students.get", json!({ "studentId": student_id })),
        ("attendance.sessionSave", json!({ "date": "2024-07-01" })),
        ("attendance.summary", json!({ "by": "category" })),
        ("attendance.grid", json!({ "from": "2024-07-01", "to": "2024-07-03" })),
        ("attendance.window", json!({ "from": "2024-07-01", "to": "2024-07-03" })),
        (
            "fees.recordPayment",
            json!({ "studentId": student_id, "amount": 1000, "date": "2024-07-02" }),
        ),
        ("fees.overview", json!({})),
        ("fees.history", json!({ "studentId": student_id })),
        ("fees.reconcile", json!({})),
        (
            "performance.recordResult",
            json!({
                "studentId": student_id,
                "examName": "Unit Test 1",
                "date": "2024-07-05",
                "marks": 40,
                "totalMarks": 50
            }),
        ),
        ("performance.summary", json!({})),
        ("performance.list", json!({})),
        (
            "exams.create",
            json!({ "name": "Mid Term", "date": "2024-09-10", "categories": "School" }),
        ),
        ("exams.list", json!({})),
        ("dashboard.overview", json!({ "today": "2024-07-10" })),
        ("workspace.exportBackup", json!({ "outPath": bundle_out.to_string_lossy() })),
    ];
    for (i, (method, params)) in calls.into_iter().enumerate() {
        let id = format!("call-{}", i);
        let _ = request_ok(&mut stdin, &mut reader, &id, method, params);
    }

    let unknown = request(&mut stdin, &mut reader, "99", "students.delete", json!({}));
    assert_eq!(error_code(&unknown), "not_implemented");

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush garbage");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read bad_json response");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(error_code(&value), "bad_json");

    let after = request_ok(&mut stdin, &mut reader, "100", "health", json!({}));
    assert!(after["workspacePath"].is_string());

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
