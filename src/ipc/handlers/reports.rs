use crate::calc::{self, CalcMethod};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

/// Grades are free-form text; keep the artifact file name tame.
fn grade_slug(grade: &str) -> String {
    let mut out = String::with_capacity(grade.len());
    for c in grade.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else {
            out.push('_');
        }
    }
    out
}

fn handle_report_build(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (Some(workspace), Some(book)) = (state.workspace.as_ref(), state.book.as_ref()) else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let method = match req.params.get("method").and_then(|v| v.as_str()) {
        None => CalcMethod::default(),
        Some(raw) => match CalcMethod::parse(raw) {
            Some(m) => m,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "method must be 'componentWeighted' or 'formativeBlock'",
                    Some(json!({ "method": raw })),
                )
            }
        },
    };

    let reports = calc::grade_reports(book, method);

    // The chart series for each grade goes to disk as the hand-off to the
    // external renderer; the response carries the artifact paths.
    let charts_dir: PathBuf = workspace.join("charts");
    if let Err(e) = std::fs::create_dir_all(&charts_dir) {
        return err(&req.id, "chart_write_failed", e.to_string(), None);
    }

    let mut chart_artifacts = serde_json::Map::new();
    for (grade, report) in &reports {
        let artifact = charts_dir.join(format!("grade-{}.json", grade_slug(grade)));
        let payload = json!({
            "grade": grade,
            "series": report.chart_series,
        });
        let text = match serde_json::to_string_pretty(&payload) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "internal", e.to_string(), None),
        };
        if let Err(e) = std::fs::write(&artifact, text) {
            return err(&req.id, "chart_write_failed", e.to_string(), None);
        }
        chart_artifacts.insert(
            grade.clone(),
            json!(artifact.to_string_lossy().to_string()),
        );
    }

    let grades = match serde_json::to_value(&reports) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "internal", e.to_string(), None),
    };

    tracing::debug!(grades = reports.len(), "report built");
    ok(
        &req.id,
        json!({
            "grades": grades,
            "chartArtifacts": chart_artifacts,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "report.build" => Some(handle_report_build(state, req)),
        _ => None,
    }
}
