use serde::Serialize;
use std::collections::BTreeMap;

use crate::model::ScoreRecord;
use crate::store::Gradebook;

/// Pass threshold on the 0-10 scale.
pub const PASS_MARK: f64 = 5.0;

/// How a record's six components combine into one mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalcMethod {
    /// Weighted sum over the components that are present. Degrades
    /// gracefully with missing data; the denominator is the weight of the
    /// present components only.
    #[default]
    ComponentWeighted,
    /// Variant kept from one iteration of the source system: present
    /// formatives are averaged into a single block, then
    /// (block*1 + midterm*2 + final*3) / 6 with missing midterm/final
    /// contributing 0. The denominator is fixed at 6.
    FormativeBlock,
}

impl CalcMethod {
    pub fn parse(s: &str) -> Option<CalcMethod> {
        match s.trim() {
            "componentWeighted" => Some(CalcMethod::ComponentWeighted),
            "formativeBlock" => Some(CalcMethod::FormativeBlock),
            _ => None,
        }
    }
}

/// Weighted average over present components, or None when every component
/// is missing. Missing components never contribute zero.
pub fn weighted_average(rec: &ScoreRecord) -> Option<f64> {
    let mut total_score = 0.0_f64;
    let mut total_weight = 0.0_f64;
    for (col, value) in rec.components() {
        if let Some(v) = value {
            total_score += v * col.weight();
            total_weight += col.weight();
        }
    }
    if total_weight > 0.0 {
        Some(total_score / total_weight)
    } else {
        None
    }
}

/// The fixed-denominator variant (see CalcMethod::FormativeBlock). Differs
/// from weighted_average exactly when formatives are partially missing or
/// midterm/final are absent; agrees on fully populated records.
pub fn formative_block_average(rec: &ScoreRecord) -> Option<f64> {
    if rec.components().iter().all(|(_, v)| v.is_none()) {
        return None;
    }

    let formatives = [rec.formative1, rec.formative2, rec.formative3, rec.formative4];
    let present: Vec<f64> = formatives.iter().filter_map(|v| *v).collect();
    let block = if present.is_empty() {
        0.0
    } else {
        present.iter().sum::<f64>() / present.len() as f64
    };

    let midterm = rec.midterm.unwrap_or(0.0);
    let final_exam = rec.final_exam.unwrap_or(0.0);
    Some((block + midterm * 2.0 + final_exam * 3.0) / 6.0)
}

pub fn average_with(rec: &ScoreRecord, method: CalcMethod) -> Option<f64> {
    match method {
        CalcMethod::ComponentWeighted => weighted_average(rec),
        CalcMethod::FormativeBlock => formative_block_average(rec),
    }
}

/// Per-subject statistics within one grade. Records with no computable
/// average sit outside the statistical universe: they count toward neither
/// pass nor fail and are excluded from the mean.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectReport {
    pub average_score: Option<f64>,
    pub pass_rate: f64,
    pub passed_students: Vec<String>,
    pub failed_students: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeReport {
    pub subjects: BTreeMap<String, SubjectReport>,
    /// Mean weighted average per subject, handed opaquely to the external
    /// chart renderer.
    pub chart_series: BTreeMap<String, f64>,
}

/// Groups the snapshot by grade, then subject, and derives the statistics.
/// Records with an empty grade are skipped; within a subject the name lists
/// follow snapshot iteration order.
pub fn grade_reports(book: &Gradebook, method: CalcMethod) -> BTreeMap<String, GradeReport> {
    let mut grouped: BTreeMap<String, BTreeMap<String, Vec<&ScoreRecord>>> = BTreeMap::new();
    for rec in book.snapshot() {
        if rec.grade.is_empty() {
            continue;
        }
        grouped
            .entry(rec.grade.clone())
            .or_default()
            .entry(rec.subject.clone())
            .or_default()
            .push(rec);
    }

    let mut out: BTreeMap<String, GradeReport> = BTreeMap::new();
    for (grade, subjects) in grouped {
        let mut subject_reports: BTreeMap<String, SubjectReport> = BTreeMap::new();
        let mut chart_series: BTreeMap<String, f64> = BTreeMap::new();

        for (subject, records) in subjects {
            let mut sum = 0.0_f64;
            let mut passed: Vec<String> = Vec::new();
            let mut failed: Vec<String> = Vec::new();

            for rec in &records {
                let Some(avg) = average_with(rec, method) else {
                    continue;
                };
                sum += avg;
                if avg >= PASS_MARK {
                    passed.push(rec.student.clone());
                } else {
                    failed.push(rec.student.clone());
                }
            }

            let counted = passed.len() + failed.len();
            let average_score = if counted > 0 {
                Some(sum / counted as f64)
            } else {
                None
            };
            let pass_rate = if counted > 0 {
                100.0 * passed.len() as f64 / counted as f64
            } else {
                0.0
            };

            if let Some(avg) = average_score {
                chart_series.insert(subject.clone(), avg);
            }
            subject_reports.insert(
                subject,
                SubjectReport {
                    average_score,
                    pass_rate,
                    passed_students: passed,
                    failed_students: failed,
                },
            );
        }

        out.insert(
            grade,
            GradeReport {
                subjects: subject_reports,
                chart_series,
            },
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RecordKey, ScoreColumn};

    fn record(student: &str, grade: &str, subject: &str) -> ScoreRecord {
        ScoreRecord::blank(
            RecordKey::new(student, subject, "HK1").expect("key"),
            grade,
            "10A",
        )
    }

    #[test]
    fn single_midterm_carries_its_own_weight() {
        let mut rec = record("Lan", "10", "Math");
        rec.midterm = Some(8.0);
        // Only midterm present: weight 2 over denominator 2.
        assert_eq!(weighted_average(&rec), Some(8.0));
    }

    #[test]
    fn midterm_and_final_combine_by_weight() {
        let mut rec = record("Lan", "10", "Math");
        rec.midterm = Some(8.0);
        rec.final_exam = Some(6.0);
        let avg = weighted_average(&rec).expect("average");
        assert!((avg - 6.8).abs() < 1e-9, "(8*2+6*3)/5 = 6.8, got {}", avg);
    }

    #[test]
    fn empty_record_has_no_average() {
        let rec = record("Lan", "10", "Math");
        assert_eq!(weighted_average(&rec), None);
        assert_eq!(formative_block_average(&rec), None);
    }

    #[test]
    fn lone_formative_is_not_diluted() {
        let mut rec = record("Lan", "10", "Math");
        rec.formative2 = Some(9.0);
        assert_eq!(weighted_average(&rec), Some(9.0));
    }

    #[test]
    fn average_stays_in_range() {
        let mut rec = record("Lan", "10", "Math");
        rec.formative1 = Some(10.0);
        rec.formative2 = Some(0.0);
        rec.midterm = Some(10.0);
        rec.final_exam = Some(0.0);
        let avg = weighted_average(&rec).expect("average");
        assert!((0.0..=10.0).contains(&avg));
    }

    #[test]
    fn methods_agree_on_fully_populated_records() {
        let mut rec = record("Lan", "10", "Math");
        rec.formative1 = Some(7.0);
        rec.formative2 = Some(8.0);
        rec.formative3 = Some(6.0);
        rec.formative4 = Some(9.0);
        rec.midterm = Some(8.0);
        rec.final_exam = Some(7.0);
        let a = weighted_average(&rec).expect("canonical");
        let b = formative_block_average(&rec).expect("block");
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn block_method_diverges_when_final_missing() {
        let mut rec = record("Lan", "10", "Math");
        rec.midterm = Some(8.0);
        // Canonical: 8.0 over the present weight. Block: (0 + 16 + 0)/6.
        assert_eq!(weighted_average(&rec), Some(8.0));
        let block = formative_block_average(&rec).expect("block");
        assert!((block - 16.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn reports_partition_pass_and_fail() {
        let mut book = Gradebook::new();
        book.upsert("An", "10", "10A", "Math", "HK1", ScoreColumn::Midterm, 8.0)
            .expect("upsert");
        book.upsert("Binh", "10", "10A", "Math", "HK1", ScoreColumn::Midterm, 3.0)
            .expect("upsert");
        book.upsert("Chi", "10", "10A", "Math", "HK1", ScoreColumn::Midterm, 5.0)
            .expect("upsert");

        let reports = grade_reports(&book, CalcMethod::ComponentWeighted);
        let math = &reports["10"].subjects["Math"];
        assert_eq!(math.passed_students, vec!["An", "Chi"]);
        assert_eq!(math.failed_students, vec!["Binh"]);
        assert!((math.pass_rate - 200.0 / 3.0).abs() < 1e-9);
        let avg = math.average_score.expect("average");
        assert!((avg - 16.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn no_data_records_leave_the_universe() {
        let mut book = Gradebook::new();
        book.upsert("An", "10", "10A", "Math", "HK1", ScoreColumn::Midterm, 8.0)
            .expect("upsert");
        // A record that exists but carries no scores at all.
        let empty = ScoreRecord::blank(
            RecordKey::new("Binh", "Math", "HK1").expect("key"),
            "10",
            "10A",
        );
        book.put(empty);

        let reports = grade_reports(&book, CalcMethod::ComponentWeighted);
        let math = &reports["10"].subjects["Math"];
        assert_eq!(math.passed_students.len() + math.failed_students.len(), 1);
        assert_eq!(math.pass_rate, 100.0);
    }

    #[test]
    fn records_without_grade_are_skipped() {
        let mut book = Gradebook::new();
        book.upsert("An", "", "10A", "Math", "HK1", ScoreColumn::Midterm, 8.0)
            .expect("upsert");
        let reports = grade_reports(&book, CalcMethod::ComponentWeighted);
        assert!(reports.is_empty());
    }

    #[test]
    fn chart_series_tracks_subject_means() {
        let mut book = Gradebook::new();
        book.upsert("An", "10", "10A", "Math", "HK1", ScoreColumn::Midterm, 8.0)
            .expect("upsert");
        book.upsert("An", "10", "10A", "Literature", "HK1", ScoreColumn::Final, 6.0)
            .expect("upsert");

        let reports = grade_reports(&book, CalcMethod::ComponentWeighted);
        let series = &reports["10"].chart_series;
        assert_eq!(series.get("Math"), Some(&8.0));
        assert_eq!(series.get("Literature"), Some(&6.0));
    }
}
