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

fn create_student(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    name: &str,
    category: &str,
    course: &str,
    total_fee: f64,
) -> String {
    let created = request_ok(
        stdin,
        reader,
        id,
        "students.create",
        json!({
            "name": name,
            "category": category,
            "course": course,
            "email": format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            "phone": "9000000000",
            "enrollmentDate": "2024-06-01",
            "totalFee": total_fee
        }),
    );
    created["student"]["id"]
        .as_str()
        .expect("student id")
        .to_string()
}

#[test]
fn exam_schedule_is_date_ordered_and_validated() {
    let workspace = temp_dir("campus-exams");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "exams.create",
        json!({ "name": "Finals", "date": "2024-12-01", "categories": "School, Degree" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "exams.create",
        json!({ "name": "Mock NEET", "date": "2024-08-15", "categories": ["Entrance Exams"] }),
    );
    let no_name = request(
        &mut stdin,
        &mut reader,
        "4",
        "exams.create",
        json!({ "name": "", "date": "2024-08-15" }),
    );
    assert_eq!(error_code(&no_name), "bad_params");
    let no_date = request(&mut stdin, &mut reader, "5", "exams.create", json!({ "name": "Orals" }));
    assert_eq!(error_code(&no_date), "missing_date");

    let listed = request_ok(&mut stdin, &mut reader, "6", "exams.list", json!({}));
    let exams = listed["exams"].as_array().expect("exams");
    assert_eq!(exams.len(), 2);
    assert_eq!(exams[0]["name"], "Mock NEET");
    assert_eq!(exams[1]["categories"], json!(["School", "Degree"]));

    let upcoming = request_ok(&mut stdin, &mut reader, "7", "exams.list", json!({ "from": "2024-09-01" }));
    assert_eq!(upcoming["exams"].as_array().map(|e| e.len()), Some(1));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn dashboard_combines_every_roll_up() {
    let workspace = temp_dir("campus-dashboard");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let a = create_student(&mut stdin, &mut reader, "2", "Manoj Gupta", "School", "CBSE 9th", 10000.0);
    let b = create_student(&mut stdin, &mut reader, "3", "Nisha Reddy", "Degree", "B.Com - 2nd Year", 10000.0);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "fees.recordPayment",
        json!({ "studentId": a, "amount": 2500, "date": "2024-07-01" }),
    );
    let mut selections = serde_json::Map::new();
    selections.insert(b.clone(), json!("Absent"));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.sessionSave",
        json!({ "date": "2024-07-01", "selections": selections }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "performance.recordResult",
        json!({
            "studentId": b,
            "examName": "Accounts Quiz",
            "date": "2024-07-03",
            "marks": 18,
            "totalMarks": 20
        }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "exams.create",
        json!({ "name": "Past Exam", "date": "2024-06-01", "categories": "School" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "exams.create",
        json!({ "name": "Next Exam", "date": "2024-08-01", "categories": "School" }),
    );

    let overview = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "dashboard.overview",
        json!({ "today": "2024-07-10" }),
    );
    assert_eq!(overview["studentCount"].as_u64(), Some(2));
    assert_eq!(overview["attendanceByCategory"]["School"]["percentage"].as_u64(), Some(100));
    assert_eq!(overview["attendanceByCategory"]["Degree"]["percentage"].as_u64(), Some(0));
    assert_eq!(overview["fees"]["totalFees"].as_f64(), Some(20000.0));
    assert_eq!(overview["fees"]["totalCollected"].as_f64(), Some(2500.0));
    assert_eq!(overview["fees"]["collectedPercent"].as_u64(), Some(13));
    assert_eq!(overview["topPerformer"]["studentId"], b.as_str());
    let upcoming = overview["upcomingExams"].as_array().expect("upcoming exams");
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0]["name"], "Next Exam");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
