use std::borrow::Cow;

use rusqlite::Connection;
use serde_json::{json, Value};

use crate::ipc::error::{db_err, err};
use crate::ipc::types::{AppState, Request};
use crate::model::{GradeLevel, Period, Stream};
use crate::snapshot::Snapshot;

pub fn required_str(req: &Request, key: &str) -> Result<String, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn parse_class(req: &Request) -> Result<(GradeLevel, Stream), Value> {
    let grade = required_str(req, "grade")?;
    let stream = required_str(req, "stream")?;
    let Some(g) = GradeLevel::parse(&grade) else {
        return Err(err(
            &req.id,
            "bad_params",
            "unknown grade",
            Some(json!({ "grade": grade })),
        ));
    };
    let Some(s) = Stream::parse(&stream) else {
        return Err(err(
            &req.id,
            "bad_params",
            "unknown stream",
            Some(json!({ "stream": stream })),
        ));
    };
    Ok((g, s))
}

/// The active period, overridden field by field by `term` / `year` params.
pub fn requested_period(state: &AppState, req: &Request) -> Result<Period, Value> {
    let mut period = state.config.period.clone();
    match req.params.get("term") {
        None | Some(Value::Null) => {}
        Some(v) => match v.as_str().map(str::trim).filter(|s| !s.is_empty()) {
            Some(term) => period.term = term.to_string(),
            None => return Err(err(&req.id, "bad_params", "term must be a non-empty string", None)),
        },
    }
    match req.params.get("year") {
        None | Some(Value::Null) => {}
        Some(v) => match v.as_i64().and_then(|y| i32::try_from(y).ok()) {
            Some(year) => period.year = year,
            None => return Err(err(&req.id, "bad_params", "year must be an integer", None)),
        },
    }
    Ok(period)
}

/// The mirror when the requested period is the active one, otherwise a
/// one-off read of that period from the store.
pub fn period_snapshot<'a>(state: &'a AppState, req: &Request) -> Result<Cow<'a, Snapshot>, Value> {
    let conn = db_conn(state, req)?;
    let period = requested_period(state, req)?;
    if period == state.snapshot.period {
        return Ok(Cow::Borrowed(&state.snapshot));
    }
    Snapshot::load(conn, period)
        .map(Cow::Owned)
        .map_err(|e| db_err(req, "db_query_failed", e))
}

/// Raw mark field from the wire. Numeric strings are accepted, anything else
/// is treated as absent.
pub fn mark_input(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_input_accepts_numbers_and_numeric_strings() {
        assert_eq!(mark_input(Some(&json!(72.5))), Some(72.5));
        assert_eq!(mark_input(Some(&json!(" 40 "))), Some(40.0));
        assert_eq!(mark_input(Some(&json!("abc"))), None);
        assert_eq!(mark_input(Some(&json!(null))), None);
        assert_eq!(mark_input(None), None);
    }

    #[test]
    fn period_params_override_the_active_period() {
        let state = AppState::new();
        let req = Request {
            id: "1".into(),
            method: "results.student".into(),
            params: json!({ "term": "Term 2" }),
        };
        assert_eq!(requested_period(&state, &req).ok(), Some(Period::new("Term 2", 2026)));

        let bad = Request {
            params: json!({ "year": "soon" }),
            ..req
        };
        assert!(requested_period(&state, &bad).is_err());
    }
}
