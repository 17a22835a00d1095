#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
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

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    spawn_sidecar_with_env(&[])
}

pub fn spawn_sidecar_with_env(env: &[(&str, &str)]) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    spawn_with(env, Stdio::null())
}

/// Like `spawn_sidecar`, with stderr piped for `shutdown_and_read_logs`.
pub fn spawn_sidecar_capturing_logs() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    spawn_with(&[("TIMETABLED_LOG", "info")], Stdio::piped())
}

/// Closes stdin, waits for exit and returns everything logged to stderr.
pub fn shutdown_and_read_logs(mut child: Child, stdin: ChildStdin) -> String {
    drop(stdin);
    let mut logs = String::new();
    child
        .stderr
        .take()
        .expect("child stderr")
        .read_to_string(&mut logs)
        .expect("read stderr");
    let _ = child.wait();
    logs
}

fn spawn_with(env: &[(&str, &str)], stderr: Stdio) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_timetabled");
    let mut cmd = Command::new(exe);
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(stderr)
        .env_remove("TIMETABLED_WORKSPACE");
    for (k, v) in env {
        cmd.env(k, v);
    }
    let mut child = cmd.spawn().expect("spawn timetabled");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn send_line(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, line: &str) -> serde_json::Value {
    writeln!(stdin, "{}", line).expect("write request");
    stdin.flush().expect("flush request");
    let mut out = String::new();
    reader.read_line(&mut out).expect("read response line");
    assert!(!out.trim().is_empty(), "empty response");
    serde_json::from_str(out.trim()).expect("parse response json")
}

pub fn request(
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
    let value = send_line(stdin, reader, &payload.to_string());
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or(serde_json::Value::Null)
}

/// Returns the error code.
pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string()
}

/// Generator-shaped timetable: one week, Monday with two pending lectures.
pub fn one_week_timetable() -> serde_json::Value {
    json!([
        {
            "week": 1,
            "days": [
                { "day": "Monday", "schedule": [
                    { "time": "09:00 - 10:00", "subject": "Mathematics", "topic": "Linear equations" },
                    { "time": "10:00 - 11:00", "subject": "Physics", "topic": "Newton's laws" }
                ]}
            ]
        }
    ])
}

pub fn two_week_timetable() -> serde_json::Value {
    json!([
        {
            "week": 1,
            "days": [
                { "day": "Monday", "schedule": [
                    { "time": "09:00", "subject": "Chemistry", "topic": "Bonds", "status": "Completed" },
                    { "time": "10:00", "subject": "Biology", "topic": "Cells" }
                ]},
                { "day": "Tuesday", "schedule": [
                    { "time": "09:00", "subject": "English", "topic": "Poetry", "status": "Conducted" }
                ]}
            ]
        },
        {
            "week": 2,
            "days": [
                { "day": "Thursday", "schedule": [
                    { "time": "11:00", "subject": "History", "topic": "Industrial revolution" }
                ]},
                { "day": "Friday", "schedule": [] }
            ]
        }
    ])
}
