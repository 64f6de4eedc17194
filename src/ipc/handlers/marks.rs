use serde_json::json;

use crate::calc;
use crate::db;
use crate::ipc::error::{db_err, err, not_found, ok};
use crate::ipc::helpers::{db_conn, mark_input, period_snapshot, requested_period, required_str};
use crate::ipc::types::{AppState, Request};

fn handle_marks_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let snap = match period_snapshot(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    ok(&req.id, json!({ "period": snap.period, "marks": snap.marks }))
}

fn handle_marks_for_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let snap = match period_snapshot(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    ok(
        &req.id,
        json!({
            "period": snap.period,
            "marks": snap.student_marks(&student_id),
        }),
    )
}

fn handle_marks_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let period = match requested_period(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(max_marks) = state.catalog.get(&subject_id).map(|s| s.max_marks) else {
        return not_found(req, "subject", "subjectId", &subject_id);
    };
    match db::get_student(conn, &student_id) {
        Ok(Some(_)) => {}
        Ok(None) => return not_found(req, "student", "studentId", &student_id),
        Err(e) => return db_err(req, "db_query_failed", e),
    }

    let previous = match db::list_student_marks(conn, &student_id, &period) {
        Ok(marks) => marks.into_iter().find(|m| m.subject_id == subject_id),
        Err(e) => return db_err(req, "db_query_failed", e),
    };
    let edit = calc::resolve_mark_edit(
        previous.as_ref(),
        mark_input(req.params.get("caMarks")),
        mark_input(req.params.get("examMarks")),
        max_marks,
    );
    if !edit.rejected.is_empty() {
        tracing::warn!(
            student_id = %student_id,
            subject_id = %subject_id,
            rejected = ?edit.rejected,
            "mark fields rejected"
        );
    }
    if edit.all_rejected() {
        return ok(
            &req.id,
            json!({
                "written": false,
                "record": previous,
                "rejected": edit.rejected,
            }),
        );
    }

    let record = match db::upsert_mark(
        conn,
        &student_id,
        &subject_id,
        edit.ca_marks,
        edit.exam_marks,
        &period,
    ) {
        Ok(r) => r,
        Err(e) => return db_err(req, "db_insert_failed", e),
    };

    tracing::info!(
        student_id = %student_id,
        subject_id = %subject_id,
        term = %period.term,
        year = period.year,
        final_marks = record.final_marks,
        "mark saved"
    );
    state.snapshot.apply_mark_upserted(record.clone());
    ok(
        &req.id,
        json!({
            "written": true,
            "record": record,
            "rejected": edit.rejected,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "marks.list" => Some(handle_marks_list(state, req)),
        "marks.forStudent" => Some(handle_marks_for_student(state, req)),
        "marks.upsert" => Some(handle_marks_upsert(state, req)),
        _ => None,
    }
}
