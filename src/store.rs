use std::cmp::Ordering;
use std::collections::HashMap;

use crate::model::{RecordKey, ScoreColumn, ScoreRecord};

pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 10.0;

/// Recoverable domain failures. Every variant maps to a stable wire code;
/// the store is guaranteed unchanged whenever one is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Interactive score outside [0,10] or not a number.
    InvalidScore { raw: String },
    /// Column identifier outside the closed six-column set.
    InvalidColumn { column: String },
    /// A key field was empty after trimming.
    EmptyKeyField { field: &'static str },
    /// Delete/edit target does not exist.
    NotFound,
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::InvalidScore { .. } => "invalid_score",
            StoreError::InvalidColumn { .. } => "invalid_column",
            StoreError::EmptyKeyField { .. } => "bad_params",
            StoreError::NotFound => "not_found",
        }
    }

    pub fn message(&self) -> String {
        match self {
            StoreError::InvalidScore { raw } => {
                format!(
                    "score must be a number between {} and {}: {}",
                    SCORE_MIN, SCORE_MAX, raw
                )
            }
            StoreError::InvalidColumn { column } => {
                format!("unknown score column: {}", column)
            }
            StoreError::EmptyKeyField { field } => {
                format!("{} must not be empty", field)
            }
            StoreError::NotFound => "record not found".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub created: bool,
}

/// Validates an interactive score value: finite and within [0,10].
pub fn validate_score(value: f64) -> Result<f64, StoreError> {
    if !value.is_finite() || value < SCORE_MIN || value > SCORE_MAX {
        return Err(StoreError::InvalidScore {
            raw: value.to_string(),
        });
    }
    Ok(value)
}

/// Parses a textual score from the interactive path.
pub fn parse_score(raw: &str) -> Result<f64, StoreError> {
    let parsed = raw.trim().parse::<f64>().map_err(|_| StoreError::InvalidScore {
        raw: raw.to_string(),
    })?;
    validate_score(parsed)
}

/// In-memory dataset: the sole source of truth handed to aggregation.
/// Insertion order is preserved; a key index keeps upsert/delete O(1).
#[derive(Debug, Default)]
pub struct Gradebook {
    records: Vec<ScoreRecord>,
    index: HashMap<RecordKey, usize>,
}

impl Gradebook {
    pub fn new() -> Gradebook {
        Gradebook::default()
    }

    /// Builds a book from normalized rows. Rows sharing a key collapse
    /// last-wins, matching upsert semantics rather than duplicating.
    pub fn from_records(rows: Vec<ScoreRecord>) -> Gradebook {
        let mut book = Gradebook::new();
        for rec in rows {
            book.put(rec);
        }
        book
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &RecordKey) -> Option<&ScoreRecord> {
        self.index.get(key).map(|&i| &self.records[i])
    }

    /// Whole-record last-wins write, used by ingestion and merge-on-import.
    /// An existing key keeps its slot in insertion order.
    pub fn put(&mut self, rec: ScoreRecord) {
        let key = rec.key();
        match self.index.get(&key) {
            Some(&i) => self.records[i] = rec,
            None => {
                self.records.push(rec);
                self.index.insert(key, self.records.len() - 1);
            }
        }
    }

    /// Column-level upsert. Replaces only the named column on a match and
    /// unconditionally refreshes grade/class (last write wins on those
    /// denormalized fields); creates a record with the five sibling
    /// components missing otherwise. No mutation on any failure.
    pub fn upsert(
        &mut self,
        student: &str,
        grade: &str,
        class_name: &str,
        subject: &str,
        semester: &str,
        column: ScoreColumn,
        value: f64,
    ) -> Result<UpsertOutcome, StoreError> {
        let value = validate_score(value)?;
        let key = self.require_key(student, subject, semester)?;

        match self.index.get(&key) {
            Some(&i) => {
                let rec = &mut self.records[i];
                rec.set(column, Some(value));
                rec.grade = grade.trim().to_string();
                rec.class_name = class_name.trim().to_string();
                Ok(UpsertOutcome { created: false })
            }
            None => {
                let mut rec = ScoreRecord::blank(key, grade, class_name);
                rec.set(column, Some(value));
                self.put(rec);
                Ok(UpsertOutcome { created: true })
            }
        }
    }

    /// Returns true when a record existed and was removed. Not-found is a
    /// user-visible condition for the caller, never an exception here.
    pub fn delete(&mut self, student: &str, subject: &str, semester: &str) -> bool {
        let Some(key) = RecordKey::new(student, subject, semester) else {
            return false;
        };
        let Some(pos) = self.index.remove(&key) else {
            return false;
        };
        self.records.remove(pos);
        for (i, rec) in self.records.iter().enumerate().skip(pos) {
            self.index.insert(rec.key(), i);
        }
        true
    }

    /// Read-only view in insertion order.
    pub fn snapshot(&self) -> &[ScoreRecord] {
        &self.records
    }

    /// Sorted view: grade, then class, then subject, then student name.
    /// Empty strings sort first.
    pub fn sorted_snapshot(&self) -> Vec<ScoreRecord> {
        let mut out = self.records.clone();
        out.sort_by(|a, b| {
            cmp_field(&a.grade, &b.grade)
                .then_with(|| cmp_field(&a.class_name, &b.class_name))
                .then_with(|| cmp_field(&a.subject, &b.subject))
                .then_with(|| cmp_field(&a.student, &b.student))
        });
        out
    }

    fn require_key(
        &self,
        student: &str,
        subject: &str,
        semester: &str,
    ) -> Result<RecordKey, StoreError> {
        if student.trim().is_empty() {
            return Err(StoreError::EmptyKeyField { field: "student" });
        }
        if subject.trim().is_empty() {
            return Err(StoreError::EmptyKeyField { field: "subject" });
        }
        if semester.trim().is_empty() {
            return Err(StoreError::EmptyKeyField { field: "semester" });
        }
        RecordKey::new(student, subject, semester).ok_or(StoreError::EmptyKeyField {
            field: "student",
        })
    }
}

fn cmp_field(a: &str, b: &str) -> Ordering {
    // Empty ("missing") fields first, then plain lexicographic order.
    match (a.is_empty(), b.is_empty()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScoreColumn;

    fn upsert_ok(book: &mut Gradebook, student: &str, column: ScoreColumn, value: f64) -> bool {
        book.upsert(student, "10", "10A", "Math", "HK1", column, value)
            .expect("upsert")
            .created
    }

    #[test]
    fn upsert_creates_then_updates_single_column() {
        let mut book = Gradebook::new();
        assert!(upsert_ok(&mut book, "Lan", ScoreColumn::Midterm, 8.0));
        assert!(!upsert_ok(&mut book, "Lan", ScoreColumn::Final, 6.0));

        assert_eq!(book.len(), 1);
        let rec = book.snapshot()[0].clone();
        assert_eq!(rec.midterm, Some(8.0));
        assert_eq!(rec.final_exam, Some(6.0));
        assert_eq!(rec.formative1, None);
    }

    #[test]
    fn upsert_is_idempotent() {
        let mut book = Gradebook::new();
        upsert_ok(&mut book, "Lan", ScoreColumn::Formative1, 7.5);
        upsert_ok(&mut book, "Lan", ScoreColumn::Formative1, 7.5);
        assert_eq!(book.len(), 1);
        assert_eq!(book.snapshot()[0].formative1, Some(7.5));
    }

    #[test]
    fn upsert_refreshes_grade_and_class() {
        let mut book = Gradebook::new();
        book.upsert("Lan", "10", "10A", "Math", "HK1", ScoreColumn::Midterm, 8.0)
            .expect("first upsert");
        book.upsert("Lan", "11", "11B", "Math", "HK1", ScoreColumn::Final, 6.0)
            .expect("second upsert");
        let rec = &book.snapshot()[0];
        assert_eq!(rec.grade, "11");
        assert_eq!(rec.class_name, "11B");
        // Key stayed the same, so still one record.
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn upsert_rejects_out_of_range_without_mutation() {
        let mut book = Gradebook::new();
        upsert_ok(&mut book, "Lan", ScoreColumn::Midterm, 8.0);

        let err = book
            .upsert("Lan", "10", "10A", "Math", "HK1", ScoreColumn::Midterm, 10.0001)
            .expect_err("out of range");
        assert_eq!(err.code(), "invalid_score");
        assert_eq!(book.snapshot()[0].midterm, Some(8.0));

        let err = book
            .upsert("Lan", "10", "10A", "Math", "HK1", ScoreColumn::Midterm, -0.0001)
            .expect_err("below range");
        assert_eq!(err.code(), "invalid_score");
    }

    #[test]
    fn boundary_scores_accepted() {
        let mut book = Gradebook::new();
        assert!(book
            .upsert("A", "10", "10A", "Math", "HK1", ScoreColumn::Midterm, 0.0)
            .is_ok());
        assert!(book
            .upsert("A", "10", "10A", "Math", "HK1", ScoreColumn::Final, 10.0)
            .is_ok());
    }

    #[test]
    fn key_matching_trims_whitespace() {
        let mut book = Gradebook::new();
        upsert_ok(&mut book, "Lan", ScoreColumn::Midterm, 8.0);
        book.upsert("  Lan ", "10", "10A", " Math ", "HK1 ", ScoreColumn::Final, 6.0)
            .expect("trimmed upsert");
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn empty_key_field_rejected() {
        let mut book = Gradebook::new();
        let err = book
            .upsert("  ", "10", "10A", "Math", "HK1", ScoreColumn::Midterm, 8.0)
            .expect_err("empty student");
        assert_eq!(err.code(), "bad_params");
        assert!(book.is_empty());
    }

    #[test]
    fn delete_reports_not_found_and_leaves_store_unchanged() {
        let mut book = Gradebook::new();
        upsert_ok(&mut book, "Lan", ScoreColumn::Midterm, 8.0);
        assert!(!book.delete("Mai", "Math", "HK1"));
        assert_eq!(book.len(), 1);
        assert!(book.delete("Lan", "Math", "HK1"));
        assert!(book.is_empty());
    }

    #[test]
    fn delete_keeps_index_consistent() {
        let mut book = Gradebook::new();
        upsert_ok(&mut book, "An", ScoreColumn::Midterm, 5.0);
        upsert_ok(&mut book, "Binh", ScoreColumn::Midterm, 6.0);
        upsert_ok(&mut book, "Chi", ScoreColumn::Midterm, 7.0);
        assert!(book.delete("An", "Math", "HK1"));

        // Later records must still be reachable through the index.
        book.upsert("Chi", "10", "10A", "Math", "HK1", ScoreColumn::Final, 9.0)
            .expect("upsert after delete");
        assert_eq!(book.len(), 2);
        let chi = book
            .get(&crate::model::RecordKey::new("Chi", "Math", "HK1").expect("key"))
            .expect("chi present");
        assert_eq!(chi.final_exam, Some(9.0));
    }

    #[test]
    fn from_records_collapses_duplicate_keys_last_wins() {
        let mut first = crate::model::ScoreRecord::blank(
            crate::model::RecordKey::new("Lan", "Math", "HK1").expect("key"),
            "10",
            "10A",
        );
        first.midterm = Some(4.0);
        let mut second = first.clone();
        second.midterm = Some(9.0);

        let book = Gradebook::from_records(vec![first, second]);
        assert_eq!(book.len(), 1);
        assert_eq!(book.snapshot()[0].midterm, Some(9.0));
    }

    #[test]
    fn sorted_snapshot_orders_missing_first() {
        let mut book = Gradebook::new();
        book.upsert("Binh", "11", "11A", "Math", "HK1", ScoreColumn::Midterm, 5.0)
            .expect("upsert");
        book.upsert("An", "", "10A", "Math", "HK1", ScoreColumn::Midterm, 5.0)
            .expect("upsert");
        book.upsert("Chi", "10", "10A", "Math", "HK1", ScoreColumn::Midterm, 5.0)
            .expect("upsert");

        let sorted = book.sorted_snapshot();
        let grades: Vec<&str> = sorted.iter().map(|r| r.grade.as_str()).collect();
        assert_eq!(grades, vec!["", "10", "11"]);
    }
}
