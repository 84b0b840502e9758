use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store::Gradebook;
use crate::{db, ingest};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImportMode {
    Replace,
    Merge,
}

fn handle_import_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (Some(conn), Some(book)) = (state.db.as_mut(), state.book.as_mut()) else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let mode = match req.params.get("mode").and_then(|v| v.as_str()) {
        None | Some("replace") => ImportMode::Replace,
        Some("merge") => ImportMode::Merge,
        Some(other) => {
            return err(
                &req.id,
                "bad_params",
                "mode must be 'replace' or 'merge'",
                Some(json!({ "mode": other })),
            )
        }
    };

    let text_param = req.params.get("text").and_then(|v| v.as_str());
    let path_param = req.params.get("path").and_then(|v| v.as_str());

    // Any failure from here on leaves the prior dataset untouched, in
    // memory and on disk.
    let parsed = match (text_param, path_param) {
        (Some(text), _) => ingest::parse_csv_text(text),
        (None, Some(path)) => match std::fs::read(path) {
            Ok(bytes) => ingest::parse_csv_bytes(&bytes),
            Err(e) => {
                return err(
                    &req.id,
                    "bad_import",
                    format!("failed to read {}: {}", path, e),
                    None,
                )
            }
        },
        (None, None) => {
            return err(&req.id, "bad_params", "missing params.text or params.path", None)
        }
    };

    let parsed = match parsed {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_import", e.message(), None),
    };

    let imported = parsed.records.len();
    let next = match mode {
        ImportMode::Replace => Gradebook::from_records(parsed.records),
        ImportMode::Merge => {
            let mut merged = Gradebook::from_records(book.snapshot().to_vec());
            for rec in parsed.records {
                merged.put(rec);
            }
            merged
        }
    };

    if let Err(e) = db::replace_all(conn, next.snapshot()) {
        return err(&req.id, "db_insert_failed", format!("{e:?}"), None);
    }
    *book = next;

    tracing::info!(
        imported,
        dropped = parsed.dropped_rows,
        total = book.len(),
        mode = if mode == ImportMode::Replace { "replace" } else { "merge" },
        "csv import applied"
    );
    ok(
        &req.id,
        json!({
            "imported": imported,
            "droppedRows": parsed.dropped_rows,
            "mode": if mode == ImportMode::Replace { "replace" } else { "merge" },
            "total": book.len(),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "scores.importCsv" => Some(handle_import_csv(state, req)),
        _ => None,
    }
}
