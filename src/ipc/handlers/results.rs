use serde_json::json;

use crate::calc;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{parse_class, period_snapshot, required_str};
use crate::ipc::types::{AppState, Request};
use crate::report;

fn handle_results_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let snap = match period_snapshot(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ctx = snap.ctx(&state.catalog, &state.config.rules);
    let results = calc::student_results(&ctx, &student_id);
    ok(
        &req.id,
        json!({
            "studentId": student_id,
            "period": snap.period,
            "results": results,
        }),
    )
}

fn handle_results_class_rankings(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (grade, stream) = match parse_class(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let snap = match period_snapshot(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ctx = snap.ctx(&state.catalog, &state.config.rules);
    let rankings = calc::class_rankings(&ctx, grade, stream);
    ok(
        &req.id,
        json!({
            "grade": grade,
            "stream": stream,
            "period": snap.period,
            "rankings": rankings,
        }),
    )
}

fn handle_results_dashboard(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (grade, stream) = match parse_class(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let top_n = match req.params.get("topN") {
        None | Some(serde_json::Value::Null) => state.config.top_performers,
        Some(v) => match v.as_u64().filter(|n| *n >= 1) {
            Some(n) => n as usize,
            None => return err(&req.id, "bad_params", "topN must be a positive integer", None),
        },
    };
    let snap = match period_snapshot(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ctx = snap.ctx(&state.catalog, &state.config.rules);
    let overview = report::class_overview(&ctx, grade, stream, top_n);
    ok(&req.id, json!({ "period": snap.period, "overview": overview }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "results.student" => Some(handle_results_student(state, req)),
        "results.classRankings" => Some(handle_results_class_rankings(state, req)),
        "results.dashboard" => Some(handle_results_dashboard(state, req)),
        _ => None,
    }
}
