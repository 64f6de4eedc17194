use std::path::PathBuf;

use serde_json::json;

use crate::config;
use crate::db;
use crate::ipc::error::{db_err, err, ok};
use crate::ipc::helpers::db_conn;
use crate::ipc::types::{AppState, Request};
use crate::snapshot::Snapshot;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "period": state.config.period,
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    let conn = match db::open_db(&path) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "db_open_failed", format!("{e:#}"), None),
    };
    let cfg = match config::load(&conn, &state.catalog) {
        Ok(c) => c,
        Err(e) => return db_err(req, "db_query_failed", e),
    };
    let snapshot = match Snapshot::load(&conn, cfg.period.clone()) {
        Ok(s) => s,
        Err(e) => return db_err(req, "db_query_failed", e),
    };

    tracing::info!(
        workspace = %path.display(),
        students = snapshot.students.len(),
        term = %cfg.period.term,
        year = cfg.period.year,
        "workspace opened"
    );
    state.workspace = Some(path.clone());
    state.db = Some(conn);
    state.config = cfg;
    state.snapshot = snapshot;
    ok(
        &req.id,
        json!({
            "workspacePath": path.to_string_lossy(),
            "period": state.config.period,
            "students": state.snapshot.students.len(),
        }),
    )
}

fn handle_catalog_subjects(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "subjects": state.catalog.all() }))
}

fn handle_snapshot_refresh(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = state.snapshot.resync(conn) {
        return db_err(req, "db_query_failed", e);
    }
    ok(
        &req.id,
        json!({
            "period": state.snapshot.period,
            "students": state.snapshot.students.len(),
            "marks": state.snapshot.marks.len(),
        }),
    )
}

fn handle_snapshot_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = db_conn(state, req) {
        return e;
    }
    ok(
        &req.id,
        json!({
            "period": state.snapshot.period,
            "students": state.snapshot.students.len(),
            "marks": state.snapshot.marks.len(),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "catalog.subjects" => Some(handle_catalog_subjects(state, req)),
        "snapshot.refresh" => Some(handle_snapshot_refresh(state, req)),
        "snapshot.status" => Some(handle_snapshot_status(state, req)),
        _ => None,
    }
}
