#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
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

pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Sidecar {
    pub fn spawn() -> Self {
        let exe = env!("CARGO_BIN_EXE_resultsd");
        let mut child = Command::new(exe)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn resultsd");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
            next_id: 0,
        }
    }

    /// Spawn and select a fresh workspace.
    pub fn with_workspace(prefix: &str) -> (Self, PathBuf) {
        let workspace = temp_dir(prefix);
        let mut sc = Self::spawn();
        sc.ok("workspace.select", json!({ "path": workspace.to_string_lossy() }));
        (sc, workspace)
    }

    pub fn send_line(&mut self, line: &str) -> Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");
        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response");
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    pub fn request(&mut self, method: &str, params: Value) -> Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        let value = self.send_line(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    /// Result of a request that must succeed.
    pub fn ok(&mut self, method: &str, params: Value) -> Value {
        let value = self.request(method, params);
        assert!(
            value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or(Value::Null)
    }

    /// Error code of a request that must fail.
    pub fn fail(&mut self, method: &str, params: Value) -> String {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value
            .pointer("/error/code")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    }

    /// Create a student and return its id.
    pub fn add_student(
        &mut self,
        first: &str,
        last: &str,
        grade: &str,
        stream: &str,
        optional: &[&str],
    ) -> String {
        let res = self.ok(
            "students.create",
            json!({
                "firstName": first,
                "lastName": last,
                "grade": grade,
                "stream": stream,
                "optionalSubjects": optional,
            }),
        );
        res.pointer("/student/id")
            .and_then(|v| v.as_str())
            .expect("student id")
            .to_string()
    }

    /// Store a mark whose final mark equals `value` (ca == exam == value).
    pub fn set_mark(&mut self, student_id: &str, subject_id: &str, value: f64) -> Value {
        self.ok(
            "marks.upsert",
            json!({
                "studentId": student_id,
                "subjectId": subject_id,
                "caMarks": value,
                "examMarks": value,
            }),
        )
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
