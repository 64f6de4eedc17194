use serde_json::json;

use crate::config;
use crate::ipc::error::{db_err, err, ok};
use crate::ipc::helpers::db_conn;
use crate::ipc::types::{AppState, Request};
use crate::snapshot::Snapshot;

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = db_conn(state, req) {
        return e;
    }
    ok(&req.id, json!({ "grading": state.config.to_patch() }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut next = state.config.clone();
    if let Err(e) = next.merge_patch(patch, &state.catalog) {
        return err(
            &req.id,
            "bad_params",
            e.to_string(),
            Some(json!({ "patch": patch })),
        );
    }

    let period_changed = next.period != state.config.period;
    let snapshot = if period_changed {
        match Snapshot::load(conn, next.period.clone()) {
            Ok(s) => Some(s),
            Err(e) => return db_err(req, "db_query_failed", e),
        }
    } else {
        None
    };
    if let Err(e) = config::save(conn, &next) {
        return db_err(req, "db_update_failed", e);
    }

    tracing::info!(
        term = %next.period.term,
        year = next.period.year,
        best_others = next.rules.best_others,
        "grading config updated"
    );
    state.config = next;
    if let Some(s) = snapshot {
        state.snapshot = s;
    }
    ok(
        &req.id,
        json!({
            "grading": state.config.to_patch(),
            "periodChanged": period_changed,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
