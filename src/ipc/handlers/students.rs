use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::calc;
use crate::db;
use crate::ipc::error::{db_err, err, not_found, ok};
use crate::ipc::helpers::{db_conn, parse_class, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::{GradeLevel, NewStudent, Stream, StudentPatch};

/// `STU` + two-digit year + four digits.
fn generate_student_no() -> String {
    let year = chrono::Local::now().format("%y");
    let n = Uuid::new_v4().as_u128() % 10_000;
    format!("STU{year}{n:04}")
}

fn optional_text(req: &Request, key: &str) -> Result<Option<String>, Value> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_string()))
        }
        Some(_) => Err(err(&req.id, "bad_params", format!("{key} must be a string"), None)),
    }
}

fn parse_optional_subjects(
    state: &AppState,
    req: &Request,
    v: Option<&Value>,
) -> Result<Option<Vec<String>>, Value> {
    let Some(v) = v.filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    let Some(items) = v.as_array() else {
        return Err(err(&req.id, "bad_params", "optionalSubjects must be an array", None));
    };
    let mut ids: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let Some(id) = item.as_str() else {
            return Err(err(
                &req.id,
                "bad_params",
                "optionalSubjects must contain subject ids",
                None,
            ));
        };
        if !ids.iter().any(|x| x == id) {
            ids.push(id.to_string());
        }
    }
    let invalid = state.catalog.invalid_optional_ids(&ids);
    if !invalid.is_empty() {
        return Err(err(
            &req.id,
            "bad_params",
            "unknown optional subject",
            Some(json!({ "subjectIds": invalid })),
        ));
    }
    Ok(Some(ids))
}

fn parse_patch(state: &AppState, req: &Request, obj: &Map<String, Value>) -> Result<StudentPatch, Value> {
    let bad = |msg: String| err(&req.id, "bad_params", msg, None);
    let text = |key: &str, v: &Value| -> Result<String, Value> {
        v.as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .ok_or_else(|| bad(format!("{key} must be a non-empty string")))
    };
    let nullable = |key: &str, v: &Value| -> Result<Option<String>, Value> {
        match v {
            Value::Null => Ok(None),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => Ok(Some(s.trim().to_string())),
            _ => Err(bad(format!("{key} must be a string or null"))),
        }
    };

    let mut patch = StudentPatch::default();
    for (k, v) in obj {
        let k = k.as_str();
        match k {
            "firstName" => patch.first_name = Some(text(k, v)?),
            "lastName" => patch.last_name = Some(text(k, v)?),
            "studentNo" => patch.student_no = Some(text(k, v)?),
            "grade" => {
                let g = text(k, v)?;
                patch.grade = Some(
                    GradeLevel::parse(&g).ok_or_else(|| bad(format!("unknown grade: {g}")))?,
                );
            }
            "stream" => {
                let s = text(k, v)?;
                patch.stream =
                    Some(Stream::parse(&s).ok_or_else(|| bad(format!("unknown stream: {s}")))?);
            }
            "optionalSubjects" => {
                patch.optional_subjects = parse_optional_subjects(state, req, Some(v))?;
            }
            "dateOfBirth" => patch.date_of_birth = Some(nullable(k, v)?),
            "guardianName" => patch.guardian_name = Some(nullable(k, v)?),
            "guardianPhone" => patch.guardian_phone = Some(nullable(k, v)?),
            other => return Err(bad(format!("unknown student field: {other}"))),
        }
    }
    Ok(patch)
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = db_conn(state, req) {
        return e;
    }
    let has_class = req.params.get("grade").is_some() || req.params.get("stream").is_some();
    if !has_class {
        return ok(&req.id, json!({ "students": state.snapshot.students }));
    }
    let (grade, stream) = match parse_class(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ctx = state.snapshot.ctx(&state.catalog, &state.config.rules);
    let students = calc::students_by_class(&ctx, grade, stream);
    ok(&req.id, json!({ "students": students }))
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let first_name = match required_str(req, "firstName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let last_name = match required_str(req, "lastName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (grade, stream) = match parse_class(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let optional_subjects = match parse_optional_subjects(state, req, req.params.get("optionalSubjects")) {
        Ok(v) => v.unwrap_or_default(),
        Err(e) => return e,
    };
    let student_no = match optional_text(req, "studentNo") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let date_of_birth = match optional_text(req, "dateOfBirth") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let guardian_name = match optional_text(req, "guardianName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let guardian_phone = match optional_text(req, "guardianPhone") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let new = NewStudent {
        first_name,
        last_name,
        student_no: student_no.unwrap_or_else(generate_student_no),
        grade,
        stream,
        optional_subjects,
        date_of_birth,
        guardian_name,
        guardian_phone,
    };
    let student = match db::insert_student(conn, new) {
        Ok(s) => s,
        Err(e) => return db_err(req, "db_insert_failed", e),
    };

    tracing::info!(student_id = %student.id, student_no = %student.student_no, "student added");
    state.snapshot.apply_student_added(student.clone());
    ok(&req.id, json!({ "student": student }))
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };
    let patch = match parse_patch(state, req, obj) {
        Ok(p) => p,
        Err(e) => return e,
    };
    if patch.is_empty() {
        return err(&req.id, "bad_params", "patch is empty", None);
    }

    match db::update_student(conn, &student_id, &patch) {
        Ok(true) => {}
        Ok(false) => return not_found(req, "student", "studentId", &student_id),
        Err(e) => return db_err(req, "db_update_failed", e),
    }

    tracing::info!(student_id = %student_id, "student updated");
    state.snapshot.apply_student_updated(&student_id, &patch);
    ok(&req.id, json!({ "student": state.snapshot.student(&student_id) }))
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(conn) = state.db.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    match db::delete_student(conn, &student_id) {
        Ok(true) => {}
        Ok(false) => return not_found(req, "student", "studentId", &student_id),
        Err(e) => return db_err(req, "db_delete_failed", e),
    }

    tracing::info!(student_id = %student_id, "student deleted");
    state.snapshot.apply_student_deleted(&student_id);
    ok(&req.id, json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        _ => None,
    }
}
