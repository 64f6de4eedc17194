use serde_json::{json, Value};

use super::types::Request;

pub fn ok(id: &str, result: Value) -> Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(id: &str, code: &str, message: impl Into<String>, details: Option<Value>) -> Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// `not_found` for a lookup by one id param, e.g. `("student", "studentId", id)`.
pub fn not_found(req: &Request, what: &str, param: &str, value: &str) -> Value {
    err(
        &req.id,
        "not_found",
        format!("{what} not found"),
        Some(json!({ param: value })),
    )
}

/// Store failure. Logged here since the client only sees the message.
pub fn db_err(req: &Request, code: &str, e: anyhow::Error) -> Value {
    tracing::error!(method = %req.method, code, error = %e, "store call failed");
    err(&req.id, code, format!("{e:#}"), None)
}
