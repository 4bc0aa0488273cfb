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
    let exe = env!("CARGO_BIN_EXE_resultsd");
    let mut child = Command::new(exe)
        .env_remove("RESULTSD_WORKSPACE")
        .env_remove("RESULTSD_PAGE_SIZE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn resultsd");
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
    value.get("result").cloned().unwrap_or(json!({}))
}

fn error_code(value: &serde_json::Value) -> Option<&str> {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

fn cohort() -> Vec<serde_json::Value> {
    (0..25)
        .map(|i| {
            let grade = if i % 5 == 0 { "C" } else { "A" };
            let mut courses = vec![json!({
                "code": "CSC101", "name": "Introduction to Computing",
                "grade": grade, "credit_load": 3
            })];
            if i % 2 == 0 {
                courses.push(json!({
                    "code": "GST111", "name": "Use of English",
                    "grade": "B", "credit_load": "2"
                }));
            }
            json!({
                "matric": format!("CSC/{:03}", i),
                "student_name": format!("Student {}", i),
                "department_name": "Computer Science",
                "Level": 100,
                "courses_info": courses,
            })
        })
        .collect()
}

fn setup() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let workspace = temp_dir("resultsd-review-flow");
    let (child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "cat",
        "catalog.import",
        json!({
            "departments": [{ "id": "csc", "name": "Computer Science" }],
            "levels": [{ "id": "l1", "name": "100" }, { "id": "l2", "name": "200" }],
            "sessions": [{ "id": "s1", "name": "2023/2024", "semesters": [
                { "id": "first", "name": "First" }
            ]}]
        }),
    );
    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "imp",
        "results.import",
        json!({
            "departmentId": "csc", "sessionId": "s1", "semesterId": "first",
            "results": cohort()
        }),
    );
    assert_eq!(summary["imported"], json!(25));
    assert_eq!(summary["courseRows"], json!(38));
    (child, stdin, reader)
}

fn matrics(view: &serde_json::Value) -> Vec<String> {
    view["rows"]
        .as_array()
        .expect("rows")
        .iter()
        .map(|r| r["matric"].as_str().unwrap_or("").to_string())
        .collect()
}

#[test]
fn fetch_filter_and_paginate_a_cohort() {
    let (mut child, mut stdin, mut reader) = setup();

    let fetched = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "results.fetch",
        json!({ "departmentId": "csc", "sessionId": "s1", "semesterId": "first" }),
    );
    assert_eq!(fetched["fetch"]["applied"], json!(true));
    assert_eq!(fetched["fetch"]["studentCount"], json!(25));
    let view = &fetched["view"];
    assert_eq!(view["shown"], json!(true));
    assert_eq!(view["departmentName"], json!("Computer Science"));
    assert_eq!(view["levelTabs"], json!(["100", "200"]));
    assert_eq!(view["totalStudents"], json!(25));
    assert_eq!(view["pageCount"], json!(3));
    assert_eq!(view["rows"].as_array().map(|r| r.len()), Some(10));
    assert_eq!(view["columns"][0]["code"], json!("CSC101"));
    assert_eq!(view["columns"][1]["code"], json!("GST111"));
    assert_eq!(view["rows"][0]["cells"], json!(["C", "B"]));
    assert_eq!(view["rows"][1]["cells"], json!(["A", "-"]));
    assert_eq!(view["rows"][0]["gpaDisplay"], json!("3.40"));
    assert_eq!(view["rows"][2]["gpaDisplay"], json!("4.60"));

    let view = request_ok(&mut stdin, &mut reader, "2", "filters.set", json!({ "page": 2 }));
    assert_eq!(view["page"], json!(2));
    assert_eq!(
        matrics(&view),
        vec!["CSC/020", "CSC/021", "CSC/022", "CSC/023", "CSC/024"]
    );

    // The band shrinks the list to two pages; the stored page is kept and
    // the view shows the last page that exists.
    let view = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "filters.set",
        json!({ "band": "4.50-5.00" }),
    );
    assert_eq!(view["filteredCount"], json!(20));
    assert_eq!(view["requestedPage"], json!(2));
    assert_eq!(view["page"], json!(1));
    assert_eq!(view["rows"].as_array().map(|r| r.len()), Some(10));
    assert_eq!(view["band"]["label"], json!("4.50 - 5.00"));

    let view = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "filters.set",
        json!({ "search": "CSC/01" }),
    );
    assert_eq!(view["filteredCount"], json!(8));
    assert_eq!(view["page"], json!(0));
    assert!(!matrics(&view).contains(&"CSC/010".to_string()));
    assert!(!matrics(&view).contains(&"CSC/015".to_string()));

    let view = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "filters.set",
        json!({ "band": "all", "search": null, "pageSize": 25 }),
    );
    assert_eq!(view["filteredCount"], json!(25));
    assert_eq!(view["page"], json!(0));
    assert_eq!(view["pageCount"], json!(1));
    assert_eq!(view["rows"].as_array().map(|r| r.len()), Some(25));

    let view = request_ok(&mut stdin, &mut reader, "6", "filters.set", json!({ "levelTab": 1 }));
    assert_eq!(view["shown"], json!(true));
    assert_eq!(view["filteredCount"], json!(0));
    assert_eq!(view["rows"], json!([]));
    assert_eq!(view["columns"], json!([]));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn rejected_filter_changes_leave_state_alone() {
    let (mut child, mut stdin, mut reader) = setup();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "results.fetch",
        json!({ "departmentId": "csc", "sessionId": "s1", "semesterId": "first" }),
    );
    request_ok(&mut stdin, &mut reader, "2", "filters.set", json!({ "page": 1 }));

    for (i, params) in [
        json!({ "band": "4.00-3.00" }),
        json!({ "band": { "min": 0, "max": 6 } }),
        json!({ "gpaMin": 1.0 }),
        json!({ "pageSize": 0, "page": 2 }),
        json!({ "page": -1 }),
        json!({ "search": 42 }),
    ]
    .into_iter()
    .enumerate()
    {
        let resp = request(&mut stdin, &mut reader, &format!("bad-{i}"), "filters.set", params);
        assert_eq!(error_code(&resp), Some("bad_params"), "{}", resp);
    }

    let view = request_ok(&mut stdin, &mut reader, "3", "results.view", json!({}));
    assert_eq!(view["page"], json!(1));
    assert_eq!(view["pageSize"], json!(10));
    assert_eq!(view["band"]["label"], json!("All"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn fetch_requires_a_complete_selection() {
    let (mut child, mut stdin, mut reader) = setup();

    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "results.fetch",
        json!({ "departmentId": "csc", "sessionId": "s1" }),
    );
    assert_eq!(error_code(&resp), Some("invalid_selection"));

    let sel = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "selection.set",
        json!({ "semesterId": "first" }),
    );
    assert_eq!(sel["ready"], json!(true));

    // Changing session drops the semester again.
    let sel = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "selection.set",
        json!({ "sessionId": "s2" }),
    );
    assert_eq!(sel["ready"], json!(false));
    assert_eq!(sel["selection"]["semesterId"], json!(null));

    let view = request_ok(&mut stdin, &mut reader, "4", "results.view", json!({}));
    assert_eq!(view["shown"], json!(false));
    assert_eq!(view["rows"], json!([]));

    drop(stdin);
    let _ = child.wait();
}
