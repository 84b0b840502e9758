use serde::Serialize;

/// Enumerated semesters assumed when an imported dataset carries no
/// semester column. Free-form values are accepted when present.
pub const SEMESTERS: [&str; 2] = ["HK1", "HK2"];

/// The closed set of score components a record carries. Anything outside
/// this set is rejected at the boundary before any mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreColumn {
    Formative1,
    Formative2,
    Formative3,
    Formative4,
    Midterm,
    Final,
}

impl ScoreColumn {
    pub const ALL: [ScoreColumn; 6] = [
        ScoreColumn::Formative1,
        ScoreColumn::Formative2,
        ScoreColumn::Formative3,
        ScoreColumn::Formative4,
        ScoreColumn::Midterm,
        ScoreColumn::Final,
    ];

    /// Assessment weight: formatives count once, midterm twice, final three times.
    pub fn weight(self) -> f64 {
        match self {
            ScoreColumn::Formative1
            | ScoreColumn::Formative2
            | ScoreColumn::Formative3
            | ScoreColumn::Formative4 => 1.0,
            ScoreColumn::Midterm => 2.0,
            ScoreColumn::Final => 3.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ScoreColumn::Formative1 => "formative1",
            ScoreColumn::Formative2 => "formative2",
            ScoreColumn::Formative3 => "formative3",
            ScoreColumn::Formative4 => "formative4",
            ScoreColumn::Midterm => "midterm",
            ScoreColumn::Final => "final",
        }
    }

    /// Case-insensitive parse. Accepts the canonical names plus the short
    /// headers used by the source datasets (TX1..TX4, GK, CK).
    pub fn parse(s: &str) -> Option<ScoreColumn> {
        match s.trim().to_ascii_lowercase().as_str() {
            "formative1" | "tx1" => Some(ScoreColumn::Formative1),
            "formative2" | "tx2" => Some(ScoreColumn::Formative2),
            "formative3" | "tx3" => Some(ScoreColumn::Formative3),
            "formative4" | "tx4" => Some(ScoreColumn::Formative4),
            "midterm" | "gk" => Some(ScoreColumn::Midterm),
            "final" | "ck" => Some(ScoreColumn::Final),
            _ => None,
        }
    }
}

/// Identity of a score record. Fields are trimmed, non-empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub student: String,
    pub subject: String,
    pub semester: String,
}

impl RecordKey {
    /// Trims the parts; returns None if any part is empty after trimming.
    pub fn new(student: &str, subject: &str, semester: &str) -> Option<RecordKey> {
        let student = student.trim();
        let subject = subject.trim();
        let semester = semester.trim();
        if student.is_empty() || subject.is_empty() || semester.is_empty() {
            return None;
        }
        Some(RecordKey {
            student: student.to_string(),
            subject: subject.to_string(),
            semester: semester.to_string(),
        })
    }
}

/// One per-student, per-subject, per-semester row. Score components are
/// present-or-missing; a missing component is never treated as zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    pub student: String,
    pub grade: String,
    pub class_name: String,
    pub subject: String,
    pub semester: String,
    pub formative1: Option<f64>,
    pub formative2: Option<f64>,
    pub formative3: Option<f64>,
    pub formative4: Option<f64>,
    pub midterm: Option<f64>,
    #[serde(rename = "final")]
    pub final_exam: Option<f64>,
}

impl ScoreRecord {
    /// A record with every component missing.
    pub fn blank(key: RecordKey, grade: &str, class_name: &str) -> ScoreRecord {
        ScoreRecord {
            student: key.student,
            grade: grade.trim().to_string(),
            class_name: class_name.trim().to_string(),
            subject: key.subject,
            semester: key.semester,
            formative1: None,
            formative2: None,
            formative3: None,
            formative4: None,
            midterm: None,
            final_exam: None,
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            student: self.student.clone(),
            subject: self.subject.clone(),
            semester: self.semester.clone(),
        }
    }

    pub fn get(&self, col: ScoreColumn) -> Option<f64> {
        match col {
            ScoreColumn::Formative1 => self.formative1,
            ScoreColumn::Formative2 => self.formative2,
            ScoreColumn::Formative3 => self.formative3,
            ScoreColumn::Formative4 => self.formative4,
            ScoreColumn::Midterm => self.midterm,
            ScoreColumn::Final => self.final_exam,
        }
    }

    pub fn set(&mut self, col: ScoreColumn, value: Option<f64>) {
        match col {
            ScoreColumn::Formative1 => self.formative1 = value,
            ScoreColumn::Formative2 => self.formative2 = value,
            ScoreColumn::Formative3 => self.formative3 = value,
            ScoreColumn::Formative4 => self.formative4 = value,
            ScoreColumn::Midterm => self.midterm = value,
            ScoreColumn::Final => self.final_exam = value,
        }
    }

    /// All six components paired with their column, in canonical order.
    pub fn components(&self) -> [(ScoreColumn, Option<f64>); 6] {
        [
            (ScoreColumn::Formative1, self.formative1),
            (ScoreColumn::Formative2, self.formative2),
            (ScoreColumn::Formative3, self.formative3),
            (ScoreColumn::Formative4, self.formative4),
            (ScoreColumn::Midterm, self.midterm),
            (ScoreColumn::Final, self.final_exam),
        ]
    }
}
