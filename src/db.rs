use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use uuid::Uuid;

use crate::model::{RecordKey, ScoreRecord};

pub const DB_FILE: &str = "gradebook.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS score_records(
            id TEXT PRIMARY KEY,
            student TEXT NOT NULL,
            grade TEXT NOT NULL,
            class_name TEXT NOT NULL,
            subject TEXT NOT NULL,
            semester TEXT NOT NULL,
            formative1 REAL,
            formative2 REAL,
            formative3 REAL,
            formative4 REAL,
            midterm REAL,
            final_exam REAL,
            updated_at TEXT,
            UNIQUE(student, subject, semester)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_score_records_grade ON score_records(grade)",
        [],
    )?;

    // Workspaces created before timestamps were recorded lack the column.
    ensure_updated_at(&conn)?;

    Ok(conn)
}

fn ensure_updated_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "score_records", "updated_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE score_records ADD COLUMN updated_at TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Loads the whole dataset in insertion order.
pub fn load_records(conn: &Connection) -> anyhow::Result<Vec<ScoreRecord>> {
    let mut stmt = conn.prepare(
        "SELECT student, grade, class_name, subject, semester,
                formative1, formative2, formative3, formative4, midterm, final_exam
         FROM score_records
         ORDER BY rowid",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok(ScoreRecord {
            student: r.get(0)?,
            grade: r.get(1)?,
            class_name: r.get(2)?,
            subject: r.get(3)?,
            semester: r.get(4)?,
            formative1: r.get(5)?,
            formative2: r.get(6)?,
            formative3: r.get(7)?,
            formative4: r.get(8)?,
            midterm: r.get(9)?,
            final_exam: r.get(10)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Write-through mirror of a single in-memory record.
pub fn upsert_record(conn: &Connection, rec: &ScoreRecord) -> anyhow::Result<()> {
    let id = Uuid::new_v4().to_string();
    let updated_at = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO score_records(
            id, student, grade, class_name, subject, semester,
            formative1, formative2, formative3, formative4, midterm, final_exam, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(student, subject, semester) DO UPDATE SET
           grade = excluded.grade,
           class_name = excluded.class_name,
           formative1 = excluded.formative1,
           formative2 = excluded.formative2,
           formative3 = excluded.formative3,
           formative4 = excluded.formative4,
           midterm = excluded.midterm,
           final_exam = excluded.final_exam,
           updated_at = excluded.updated_at",
        rusqlite::params![
            id,
            rec.student,
            rec.grade,
            rec.class_name,
            rec.subject,
            rec.semester,
            rec.formative1,
            rec.formative2,
            rec.formative3,
            rec.formative4,
            rec.midterm,
            rec.final_exam,
            updated_at,
        ],
    )?;
    Ok(())
}

pub fn delete_record(conn: &Connection, key: &RecordKey) -> anyhow::Result<bool> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM score_records WHERE student = ? AND subject = ? AND semester = ?",
            (&key.student, &key.subject, &key.semester),
            |r| r.get(0),
        )
        .optional()?;
    let Some(id) = existing else {
        return Ok(false);
    };
    conn.execute("DELETE FROM score_records WHERE id = ?", [&id])?;
    Ok(true)
}

/// Swaps the stored dataset for the given records in one transaction.
pub fn replace_all(conn: &mut Connection, records: &[ScoreRecord]) -> anyhow::Result<()> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM score_records", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO score_records(
                id, student, grade, class_name, subject, semester,
                formative1, formative2, formative3, formative4, midterm, final_exam, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        let updated_at = chrono::Utc::now().to_rfc3339();
        for rec in records {
            stmt.execute(rusqlite::params![
                Uuid::new_v4().to_string(),
                rec.student,
                rec.grade,
                rec.class_name,
                rec.subject,
                rec.semester,
                rec.formative1,
                rec.formative2,
                rec.formative3,
                rec.formative4,
                rec.midterm,
                rec.final_exam,
                updated_at,
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}
