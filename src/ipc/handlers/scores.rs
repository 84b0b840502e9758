use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{RecordKey, ScoreColumn};
use crate::store::{parse_score, validate_score, StoreError};
use crate::{calc, db, ingest};
use serde_json::json;

fn require_str<'a>(req: &'a Request, field: &str) -> Result<&'a str, serde_json::Value> {
    req.params
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", field), None))
}

/// The interactive path accepts a JSON number or a numeric string (form
/// inputs arrive as text); both go through the same range check.
fn resolve_value(req: &Request) -> Result<f64, serde_json::Value> {
    let raw = req.params.get("value");
    let parsed = match raw {
        Some(v) if v.is_f64() || v.is_i64() || v.is_u64() => {
            v.as_f64().ok_or(StoreError::InvalidScore {
                raw: v.to_string(),
            })
            .and_then(validate_score)
        }
        Some(v) => match v.as_str() {
            Some(s) => parse_score(s),
            None => Err(StoreError::InvalidScore { raw: v.to_string() }),
        },
        None => Err(StoreError::InvalidScore {
            raw: "(missing)".to_string(),
        }),
    };
    parsed.map_err(|e| err(&req.id, e.code(), e.message(), None))
}

fn handle_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (Some(conn), Some(book)) = (state.db.as_ref(), state.book.as_mut()) else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let student = match require_str(req, "student") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let grade = match require_str(req, "grade") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let class_name = match require_str(req, "className") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let subject = match require_str(req, "subject") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let semester = match require_str(req, "semester") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let column_raw = match require_str(req, "column") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let Some(column) = ScoreColumn::parse(column_raw) else {
        let e = StoreError::InvalidColumn {
            column: column_raw.to_string(),
        };
        return err(&req.id, e.code(), e.message(), Some(json!({ "column": column_raw })));
    };
    let value = match resolve_value(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let outcome = match book.upsert(student, grade, class_name, subject, semester, column, value)
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, e.code(), e.message(), None),
    };

    // Mirror the touched record before replying.
    let rec = match RecordKey::new(student, subject, semester).and_then(|k| book.get(&k)) {
        Some(rec) => rec.clone(),
        None => return err(&req.id, "internal", "record missing after upsert", None),
    };
    if let Err(e) = db::upsert_record(conn, &rec) {
        return err(&req.id, "db_insert_failed", format!("{e:?}"), None);
    }

    tracing::debug!(
        student = %rec.student,
        subject = %rec.subject,
        semester = %rec.semester,
        column = column.name(),
        created = outcome.created,
        "score upserted"
    );
    ok(
        &req.id,
        json!({
            "created": outcome.created,
            "message": if outcome.created { "score record created" } else { "score record updated" },
        }),
    )
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (Some(conn), Some(book)) = (state.db.as_ref(), state.book.as_mut()) else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let student = match require_str(req, "student") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let subject = match require_str(req, "subject") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let semester = match require_str(req, "semester") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let removed = book.delete(student, subject, semester);
    if removed {
        if let Some(key) = RecordKey::new(student, subject, semester) {
            if let Err(e) = db::delete_record(conn, &key) {
                return err(&req.id, "db_delete_failed", format!("{e:?}"), None);
            }
        }
    }

    // Not-found is a result the caller shows the user, not an error.
    let message = if removed {
        "score record deleted".to_string()
    } else {
        format!(
            "no record for student '{}' subject '{}' semester '{}'",
            student.trim(),
            subject.trim(),
            semester.trim()
        )
    };
    ok(&req.id, json!({ "removed": removed, "message": message }))
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(book) = state.book.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let sorted = req
        .params
        .get("sorted")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let records = if sorted {
        book.sorted_snapshot()
    } else {
        book.snapshot().to_vec()
    };

    let mut rows: Vec<serde_json::Value> = Vec::with_capacity(records.len());
    for rec in &records {
        let mut row = match serde_json::to_value(rec) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "internal", e.to_string(), None),
        };
        row["average"] = json!(calc::weighted_average(rec));
        rows.push(row);
    }

    ok(&req.id, json!({ "count": rows.len(), "records": rows }))
}

fn handle_export_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(book) = state.book.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match ingest::to_csv_string(book.snapshot()) {
        Ok(csv) => ok(&req.id, json!({ "csv": csv, "records": book.len() })),
        Err(e) => err(&req.id, "internal", format!("{e:?}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "scores.upsert" => Some(handle_upsert(state, req)),
        "scores.delete" => Some(handle_delete(state, req)),
        "scores.list" => Some(handle_list(state, req)),
        "scores.exportCsv" => Some(handle_export_csv(state, req)),
        _ => None,
    }
}
