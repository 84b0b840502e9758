use std::collections::HashMap;

use crate::model::{RecordKey, ScoreColumn, ScoreRecord, SEMESTERS};

/// Structural import failures. The whole import is rejected and the prior
/// dataset retained; row-level problems are handled by dropping the row.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestError {
    /// Input bytes were not valid UTF-8.
    Undecodable,
    /// No header row at all.
    MissingHeader,
    /// Header row found but a key column is absent.
    MissingKeyColumn { column: &'static str },
    /// The csv reader gave up on the input shape.
    Malformed { message: String },
}

impl IngestError {
    pub fn message(&self) -> String {
        match self {
            IngestError::Undecodable => "input is not valid UTF-8 text".to_string(),
            IngestError::MissingHeader => "input has no header row".to_string(),
            IngestError::MissingKeyColumn { column } => {
                format!("header is missing the {} column", column)
            }
            IngestError::Malformed { message } => format!("unreadable input: {}", message),
        }
    }
}

/// Outcome of a successful parse. Rows that failed to normalize are counted,
/// not fatal; key-collision handling is left to the store.
#[derive(Debug)]
pub struct ParsedImport {
    pub records: Vec<ScoreRecord>,
    pub dropped_rows: usize,
}

// Header aliases, canonical name first. Matching is case-insensitive on the
// trimmed header cell; the source system's headers are accepted alongside.
const STUDENT_ALIASES: [&str; 4] = ["student", "student name", "name", "tên"];
const GRADE_ALIASES: [&str; 2] = ["grade", "khối"];
const CLASS_ALIASES: [&str; 3] = ["class", "class name", "lớp"];
const SUBJECT_ALIASES: [&str; 2] = ["subject", "môn"];
const SEMESTER_ALIASES: [&str; 3] = ["semester", "term", "hk"];

fn find_column(headers: &HashMap<String, usize>, aliases: &[&str]) -> Option<usize> {
    aliases.iter().find_map(|a| headers.get(*a).copied())
}

pub fn parse_csv_bytes(bytes: &[u8]) -> Result<ParsedImport, IngestError> {
    let text = std::str::from_utf8(bytes).map_err(|_| IngestError::Undecodable)?;
    parse_csv_text(text)
}

/// Parses delimited text with a header row into normalized records.
/// Unknown extra columns are ignored; missing score columns mean the
/// component is absent for every row.
pub fn parse_csv_text(text: &str) -> Result<ParsedImport, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| IngestError::Malformed {
            message: e.to_string(),
        })?
        .clone();
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(IngestError::MissingHeader);
    }

    let mut by_name: HashMap<String, usize> = HashMap::new();
    for (i, h) in headers.iter().enumerate() {
        by_name.entry(h.trim().to_lowercase()).or_insert(i);
    }

    let student_col = find_column(&by_name, &STUDENT_ALIASES)
        .ok_or(IngestError::MissingKeyColumn { column: "student" })?;
    let grade_col = find_column(&by_name, &GRADE_ALIASES)
        .ok_or(IngestError::MissingKeyColumn { column: "grade" })?;
    let class_col = find_column(&by_name, &CLASS_ALIASES)
        .ok_or(IngestError::MissingKeyColumn { column: "class" })?;
    let subject_col = find_column(&by_name, &SUBJECT_ALIASES)
        .ok_or(IngestError::MissingKeyColumn { column: "subject" })?;
    // Semester is special-cased: a dataset without the column defaults every
    // row to the first enumerated semester; an empty cell under a present
    // column still drops the row.
    let semester_col = find_column(&by_name, &SEMESTER_ALIASES);

    // First matching header wins per column, in header order, so a file
    // carrying both a canonical name and an alias stays deterministic.
    let mut score_cols: Vec<(ScoreColumn, usize)> = Vec::new();
    for (i, h) in headers.iter().enumerate() {
        if let Some(col) = ScoreColumn::parse(h) {
            if !score_cols.iter().any(|&(c, _)| c == col) {
                score_cols.push((col, i));
            }
        }
    }

    let mut records: Vec<ScoreRecord> = Vec::new();
    let mut dropped_rows = 0usize;

    for row in reader.records() {
        let Ok(row) = row else {
            dropped_rows += 1;
            continue;
        };

        let cell = |i: usize| row.get(i).unwrap_or("").trim();
        let student = cell(student_col);
        let grade = cell(grade_col);
        let class_name = cell(class_col);
        let subject = cell(subject_col);
        let semester = match semester_col {
            Some(i) => cell(i).to_string(),
            None => SEMESTERS[0].to_string(),
        };

        if grade.is_empty() || class_name.is_empty() {
            dropped_rows += 1;
            continue;
        }
        let Some(key) = RecordKey::new(student, subject, &semester) else {
            dropped_rows += 1;
            continue;
        };

        let mut rec = ScoreRecord::blank(key, grade, class_name);
        for &(col, i) in &score_cols {
            // Best-effort numeric coercion; parse failures become missing.
            rec.set(col, cell(i).parse::<f64>().ok());
        }
        records.push(rec);
    }

    Ok(ParsedImport {
        records,
        dropped_rows,
    })
}

/// Serializes records as canonical-header CSV. Output round-trips through
/// parse_csv_text for fields free of delimiter-breaking characters.
pub fn to_csv_string(records: &[ScoreRecord]) -> anyhow::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "student",
        "grade",
        "class",
        "subject",
        "semester",
        "formative1",
        "formative2",
        "formative3",
        "formative4",
        "midterm",
        "final",
    ])?;

    let fmt = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
    for rec in records {
        let scores = [
            fmt(rec.formative1),
            fmt(rec.formative2),
            fmt(rec.formative3),
            fmt(rec.formative4),
            fmt(rec.midterm),
            fmt(rec.final_exam),
        ];
        writer.write_record([
            rec.student.as_str(),
            rec.grade.as_str(),
            rec.class_name.as_str(),
            rec.subject.as_str(),
            rec.semester.as_str(),
            scores[0].as_str(),
            scores[1].as_str(),
            scores[2].as_str(),
            scores[3].as_str(),
            scores[4].as_str(),
            scores[5].as_str(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("failed to flush csv writer: {}", e))?;
    Ok(String::from_utf8(bytes)?)
}
