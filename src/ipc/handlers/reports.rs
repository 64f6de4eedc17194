use std::path::PathBuf;

use serde_json::json;

use crate::ipc::error::{err, not_found, ok};
use crate::ipc::helpers::{parse_class, period_snapshot, required_str};
use crate::ipc::types::{AppState, Request};
use crate::report;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

fn parse_format(req: &Request) -> Result<ExportFormat, serde_json::Value> {
    match req
        .params
        .get("format")
        .and_then(|v| v.as_str())
        .map(|s| s.to_ascii_lowercase())
        .as_deref()
    {
        None | Some("json") => Ok(ExportFormat::Json),
        Some("csv") => Ok(ExportFormat::Csv),
        Some(other) => Err(err(
            &req.id,
            "bad_params",
            "format must be one of: json, csv",
            Some(json!({ "format": other })),
        )),
    }
}

fn handle_reports_student_card(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let snap = match period_snapshot(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ctx = snap.ctx(&state.catalog, &state.config.rules);
    match report::student_report_card(&ctx, &student_id) {
        Some(card) => ok(&req.id, json!({ "card": card })),
        None => not_found(req, "student", "studentId", &student_id),
    }
}

fn handle_reports_class_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (grade, stream) = match parse_class(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let format = match parse_format(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let out_path = req
        .params
        .get("outPath")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from);
    let snap = match period_snapshot(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ctx = snap.ctx(&state.catalog, &state.config.rules);

    let cards = report::class_report_cards(&ctx, grade, stream);
    if cards.is_empty() {
        return err(
            &req.id,
            "no_students",
            "no students found in this class",
            Some(json!({ "grade": grade, "stream": stream })),
        );
    }

    let body = match format {
        ExportFormat::Json => match serde_json::to_string_pretty(&cards) {
            Ok(s) => s,
            Err(e) => return err(&req.id, "io_failed", e.to_string(), None),
        },
        ExportFormat::Csv => report::report_cards_csv(&ctx, &cards),
    };
    let suggested_name = format!(
        "{}.{}",
        report::export_file_stem(grade, stream, &snap.period.term, snap.period.year),
        format.as_str()
    );
    let generated_at = chrono::Utc::now().to_rfc3339();

    let Some(path) = out_path else {
        let content = match format {
            ExportFormat::Json => json!(cards),
            ExportFormat::Csv => json!(body),
        };
        return ok(
            &req.id,
            json!({
                "format": format.as_str(),
                "count": cards.len(),
                "suggestedName": suggested_name,
                "generatedAt": generated_at,
                "content": content,
            }),
        );
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(parent) {
            return err(&req.id, "io_failed", e.to_string(), Some(json!({ "path": path })));
        }
    }
    if let Err(e) = std::fs::write(&path, body) {
        return err(&req.id, "io_failed", e.to_string(), Some(json!({ "path": path })));
    }
    tracing::info!(
        path = %path.display(),
        count = cards.len(),
        format = format.as_str(),
        "class report cards exported"
    );
    ok(
        &req.id,
        json!({
            "format": format.as_str(),
            "count": cards.len(),
            "suggestedName": suggested_name,
            "generatedAt": generated_at,
            "path": path.to_string_lossy(),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.studentCard" => Some(handle_reports_student_card(state, req)),
        "reports.classExport" => Some(handle_reports_class_export(state, req)),
        _ => None,
    }
}
