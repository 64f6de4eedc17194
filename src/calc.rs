use serde::Serialize;
use std::cmp::Ordering;

use crate::catalog::SubjectCatalog;
use crate::config::AggregationRules;
use crate::grade::{grade_of, points_of, remark_of, Grade};
use crate::model::{GradeLevel, MarkRecord, Period, Stream, Student};

pub const CA_WEIGHT: f64 = 0.2;
pub const EXAM_WEIGHT: f64 = 0.8;

/// Half-up rounding to an integer: `Int(x + 0.5)`.
pub fn round_half_up(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

/// 1-decimal rounding used for every displayed average:
/// `Int(10*x + 0.5) / 10`
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

/// Weighted final mark, fixed at write time.
pub fn final_mark(ca_marks: f64, exam_marks: f64) -> i64 {
    round_half_up(ca_marks * CA_WEIGHT + exam_marks * EXAM_WEIGHT)
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkEdit {
    pub ca_marks: f64,
    pub exam_marks: f64,
    pub rejected: Vec<&'static str>,
}

impl MarkEdit {
    pub fn all_rejected(&self) -> bool {
        self.rejected.len() == 2
    }
}

fn accept_mark(candidate: Option<f64>, max_marks: f64) -> Option<f64> {
    candidate.filter(|v| v.is_finite() && *v >= 0.0 && *v <= max_marks)
}

/// Validate an edit field by field. A value that is missing, not a number or
/// outside `[0, max_marks]` is rejected and the previous value kept (0 when
/// there is no previous record).
pub fn resolve_mark_edit(
    previous: Option<&MarkRecord>,
    ca_input: Option<f64>,
    exam_input: Option<f64>,
    max_marks: f64,
) -> MarkEdit {
    let mut rejected = Vec::new();
    let ca_marks = accept_mark(ca_input, max_marks).unwrap_or_else(|| {
        rejected.push("caMarks");
        previous.map(|m| m.ca_marks).unwrap_or(0.0)
    });
    let exam_marks = accept_mark(exam_input, max_marks).unwrap_or_else(|| {
        rejected.push("examMarks");
        previous.map(|m| m.exam_marks).unwrap_or(0.0)
    });
    MarkEdit {
        ca_marks,
        exam_marks,
        rejected,
    }
}

/// Read-only view the aggregation runs over. Nothing here is mutated.
#[derive(Debug, Clone, Copy)]
pub struct CalcContext<'a> {
    pub students: &'a [Student],
    pub marks: &'a [MarkRecord],
    pub period: &'a Period,
    pub catalog: &'a SubjectCatalog,
    pub rules: &'a AggregationRules,
}

impl<'a> CalcContext<'a> {
    pub fn student(&self, student_id: &str) -> Option<&'a Student> {
        self.students.iter().find(|s| s.id == student_id)
    }

    pub fn mark(&self, student_id: &str, subject_id: &str) -> Option<&'a MarkRecord> {
        self.marks
            .iter()
            .find(|m| m.key_matches(student_id, subject_id, self.period))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectResult {
    pub subject_id: String,
    pub subject_name: String,
    pub marks: i64,
    pub ca_marks: f64,
    pub exam_marks: f64,
    pub grade: Grade,
    pub remarks: &'static str,
    pub points: u8,
    pub is_compulsory: bool,
    #[serde(rename = "includedInBest6")]
    pub included_in_best6: bool,
    pub has_mark: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentResults {
    pub results: Vec<SubjectResult>,
    pub total: i64,
    pub average: f64,
    pub overall_grade: Grade,
    #[serde(rename = "best6Points")]
    pub best6_points: u32,
    pub math_points: Option<u8>,
    pub english_points: Option<u8>,
}

impl StudentResults {
    /// What an unknown student resolves to. Check `results.is_empty()`.
    pub fn empty() -> Self {
        Self {
            results: Vec::new(),
            total: 0,
            average: 0.0,
            overall_grade: Grade::FAIL,
            best6_points: 0,
            math_points: None,
            english_points: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Best6 {
    pub best6_points: u32,
    pub math_points: Option<u8>,
    pub english_points: Option<u8>,
}

/// Mark compulsory/included flags on `results` and total the best-6 points.
///
/// A compulsory subject only contributes when it has a mark record; a missing
/// one is reported as `None` and adds nothing to the sum. The remaining
/// subjects are stable-sorted by points (lower is better) and the first
/// `rules.best_others` are taken.
pub fn apply_best6(results: &mut [SubjectResult], rules: &AggregationRules) -> Best6 {
    let compulsory = &rules.compulsory;
    let points_for = |id: &str, results: &[SubjectResult]| {
        results
            .iter()
            .find(|r| r.subject_id == id && r.has_mark)
            .map(|r| r.points)
    };
    let math_points = points_for(&compulsory.mathematics, &*results);
    let english_points = points_for(&compulsory.english, &*results);

    let mut others: Vec<usize> = (0..results.len())
        .filter(|&i| !compulsory.contains(&results[i].subject_id))
        .collect();
    others.sort_by_key(|&i| results[i].points);
    others.truncate(rules.best_others);

    let mut best6_points: u32 =
        math_points.unwrap_or(0) as u32 + english_points.unwrap_or(0) as u32;
    for &i in &others {
        best6_points += results[i].points as u32;
    }

    for (i, r) in results.iter_mut().enumerate() {
        r.is_compulsory = compulsory.contains(&r.subject_id);
        r.included_in_best6 = r.is_compulsory || others.contains(&i);
    }

    Best6 {
        best6_points,
        math_points,
        english_points,
    }
}

pub fn student_results(ctx: &CalcContext<'_>, student_id: &str) -> StudentResults {
    let Some(student) = ctx.student(student_id) else {
        return StudentResults::empty();
    };

    let mut results: Vec<SubjectResult> = ctx
        .catalog
        .applicable_subjects(student)
        .into_iter()
        .map(|subject| {
            let mark = ctx.mark(student_id, &subject.id);
            let marks = mark.map(|m| m.final_marks).unwrap_or(0);
            let grade = grade_of(marks as f64, subject.max_marks);
            let label = grade.label();
            SubjectResult {
                subject_id: subject.id.clone(),
                subject_name: subject.name.clone(),
                marks,
                ca_marks: mark.map(|m| m.ca_marks).unwrap_or(0.0),
                exam_marks: mark.map(|m| m.exam_marks).unwrap_or(0.0),
                grade,
                remarks: remark_of(&label),
                points: points_of(&label),
                is_compulsory: false,
                included_in_best6: false,
                has_mark: mark.is_some(),
            }
        })
        .collect();

    let best6 = apply_best6(&mut results, ctx.rules);

    let total: i64 = results.iter().map(|r| r.marks).sum();
    let average = if results.is_empty() {
        0.0
    } else {
        round_off_1_decimal(total as f64 / results.len() as f64)
    };

    StudentResults {
        overall_grade: grade_of(average, 100.0),
        results,
        total,
        average,
        best6_points: best6.best6_points,
        math_points: best6.math_points,
        english_points: best6.english_points,
    }
}

pub fn students_by_class<'a>(
    ctx: &CalcContext<'a>,
    grade: GradeLevel,
    stream: Stream,
) -> Vec<&'a Student> {
    ctx.students
        .iter()
        .filter(|s| s.in_class(grade, stream))
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub student: Student,
    pub average: f64,
    pub position: usize,
}

/// Class order by average, best first. Equal averages keep their snapshot
/// order and still get distinct consecutive positions.
pub fn class_rankings(
    ctx: &CalcContext<'_>,
    grade: GradeLevel,
    stream: Stream,
) -> Vec<RankingEntry> {
    let mut with_avg: Vec<(&Student, f64)> = students_by_class(ctx, grade, stream)
        .into_iter()
        .map(|s| (s, student_results(ctx, &s.id).average))
        .collect();

    with_avg.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    with_avg
        .into_iter()
        .enumerate()
        .map(|(i, (student, average))| RankingEntry {
            student: student.clone(),
            average,
            position: i + 1,
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::fixtures::{mark, student};
    use super::*;

    struct World {
        students: Vec<Student>,
        marks: Vec<MarkRecord>,
        period: Period,
        catalog: SubjectCatalog,
        rules: AggregationRules,
    }

    impl World {
        fn new() -> Self {
            Self {
                students: Vec::new(),
                marks: Vec::new(),
                period: Period::new("Term 1", 2026),
                catalog: SubjectCatalog::standard(),
                rules: AggregationRules::default(),
            }
        }

        fn ctx(&self) -> CalcContext<'_> {
            CalcContext {
                students: &self.students,
                marks: &self.marks,
                period: &self.period,
                catalog: &self.catalog,
                rules: &self.rules,
            }
        }

        fn marks_for(&mut self, student_id: &str, finals: &[(&str, i64)]) {
            for (subject, v) in finals {
                let m = mark(student_id, subject, *v, &self.period);
                self.marks.push(m);
            }
        }
    }

    #[test]
    fn final_mark_weights_ca_and_exam() {
        assert_eq!(final_mark(80.0, 90.0), 88);
        assert_eq!(final_mark(85.0, 85.0), 85);
        // 0.2*1 + 0.8*2 = 1.8
        assert_eq!(final_mark(1.0, 2.0), 2);
        // 0.2*2.5 = 0.5 rounds up
        assert_eq!(final_mark(2.5, 0.0), 1);
        assert_eq!(final_mark(0.0, 0.0), 0);
    }

    #[test]
    fn round_off_matches_display_rounding() {
        assert_eq!(round_off_1_decimal(0.0), 0.0);
        assert_eq!(round_off_1_decimal(3.54), 3.5);
        assert_eq!(round_off_1_decimal(3.55), 3.6);
        assert_eq!(round_off_1_decimal(91.42857), 91.4);
    }

    #[test]
    fn mark_edit_rejects_out_of_range_fields_individually() {
        let prev = mark("s1", "math", 60, &Period::default());
        let edit = resolve_mark_edit(Some(&prev), Some(120.0), Some(75.0), 100.0);
        assert_eq!(edit.ca_marks, 60.0);
        assert_eq!(edit.exam_marks, 75.0);
        assert_eq!(edit.rejected, vec!["caMarks"]);
        assert!(!edit.all_rejected());

        let edit = resolve_mark_edit(Some(&prev), Some(-1.0), None, 100.0);
        assert_eq!((edit.ca_marks, edit.exam_marks), (60.0, 60.0));
        assert!(edit.all_rejected());

        let edit = resolve_mark_edit(None, Some(f64::NAN), Some(100.0), 100.0);
        assert_eq!((edit.ca_marks, edit.exam_marks), (0.0, 100.0));
        assert_eq!(edit.rejected, vec!["caMarks"]);
    }

    #[test]
    fn best6_takes_compulsory_plus_four_lowest_others() {
        let mut w = World::new();
        w.students.push(student("1", "Mwangi", GradeLevel::Form1, Stream::A, &["comp", "french"]));
        // points: math 1, eng 2, sci 1, soc 3, life 2, comp 4, french 2
        w.marks_for(
            "1",
            &[
                ("math", 85),
                ("eng", 68),
                ("sci", 80),
                ("soc", 60),
                ("life", 70),
                ("comp", 50),
                ("french", 66),
            ],
        );
        let r = student_results(&w.ctx(), "1");
        assert_eq!(r.math_points, Some(1));
        assert_eq!(r.english_points, Some(2));
        let pts: Vec<u8> = r.results.iter().map(|x| x.points).collect();
        assert_eq!(pts, vec![1, 2, 1, 3, 2, 4, 2]);
        // others sorted [1,2,2,3,4] -> best four sum 8
        assert_eq!(r.best6_points, 1 + 2 + 8);

        let excluded: Vec<&str> = r
            .results
            .iter()
            .filter(|x| !x.included_in_best6)
            .map(|x| x.subject_id.as_str())
            .collect();
        assert_eq!(excluded, vec!["comp"]);
        let compulsory: Vec<&str> = r
            .results
            .iter()
            .filter(|x| x.is_compulsory)
            .map(|x| x.subject_id.as_str())
            .collect();
        assert_eq!(compulsory, vec!["math", "eng"]);
    }

    #[test]
    fn best6_ties_keep_catalog_order() {
        let mut w = World::new();
        w.students.push(student("1", "Kamau", GradeLevel::Form1, Stream::A, &["agri", "pe"]));
        // every other subject is grade 3
        w.marks_for(
            "1",
            &[
                ("math", 90),
                ("eng", 90),
                ("sci", 60),
                ("soc", 60),
                ("life", 60),
                ("agri", 60),
                ("pe", 60),
            ],
        );
        let r = student_results(&w.ctx(), "1");
        let included: Vec<&str> = r
            .results
            .iter()
            .filter(|x| x.included_in_best6 && !x.is_compulsory)
            .map(|x| x.subject_id.as_str())
            .collect();
        assert_eq!(included, vec!["sci", "soc", "life", "agri"]);
        assert_eq!(r.best6_points, 1 + 1 + 3 * 4);
    }

    #[test]
    fn missing_math_record_is_null_and_left_out_of_sum() {
        let mut w = World::new();
        w.students.push(student("1", "Kiprop", GradeLevel::Form2, Stream::B, &["music"]));
        w.marks_for(
            "1",
            &[("eng", 70), ("sci", 80), ("soc", 80), ("life", 56), ("music", 46)],
        );
        let r = student_results(&w.ctx(), "1");
        assert_eq!(r.math_points, None);
        assert_eq!(r.english_points, Some(2));
        // others: sci 1, soc 1, life 3, music 4
        assert_eq!(r.best6_points, 2 + 1 + 1 + 3 + 4);

        let math = r.results.iter().find(|x| x.subject_id == "math").expect("math row");
        assert!(!math.has_mark);
        assert_eq!(math.marks, 0);
        assert_eq!(math.points, 9);
        assert!(math.is_compulsory && math.included_in_best6);
    }

    #[test]
    fn totals_and_overall_grade() {
        let mut w = World::new();
        w.students.push(student("1", "Mwangi", GradeLevel::Form1, Stream::A, &["comp", "french"]));
        w.marks_for(
            "1",
            &[
                ("math", 85),
                ("eng", 78),
                ("sci", 92),
                ("soc", 74),
                ("life", 88),
                ("comp", 95),
                ("french", 72),
            ],
        );
        let r = student_results(&w.ctx(), "1");
        assert_eq!(r.total, 584);
        // 584 / 7 = 83.428...
        assert_eq!(r.average, 83.4);
        assert_eq!(r.overall_grade.label(), "1");
    }

    #[test]
    fn absent_marks_count_as_zero_in_average() {
        let mut w = World::new();
        w.students.push(student("1", "Ochieng", GradeLevel::Form1, Stream::A, &[]));
        w.marks_for("1", &[("math", 50), ("eng", 50)]);
        let r = student_results(&w.ctx(), "1");
        assert_eq!(r.results.len(), 5);
        assert_eq!(r.total, 100);
        assert_eq!(r.average, 20.0);
        assert_eq!(r.overall_grade.label(), "9");
    }

    #[test]
    fn marks_from_other_periods_are_ignored() {
        let mut w = World::new();
        w.students.push(student("1", "Ochieng", GradeLevel::Form1, Stream::A, &[]));
        let old = Period::new("Term 3", 2025);
        w.marks.push(mark("1", "math", 99, &old));
        let r = student_results(&w.ctx(), "1");
        assert_eq!(r.math_points, None);
        assert_eq!(r.total, 0);
    }

    #[test]
    fn unknown_student_yields_empty_sentinel() {
        let w = World::new();
        let r = student_results(&w.ctx(), "nobody");
        assert!(r.results.is_empty());
        assert_eq!(r.total, 0);
        assert_eq!(r.average, 0.0);
        assert_eq!(r.best6_points, 0);
        assert_eq!(r.math_points, None);
        assert_eq!(r.english_points, None);
    }

    #[test]
    fn compulsory_ids_come_from_rules() {
        let mut w = World::new();
        w.rules.compulsory.english = "sci".to_string();
        w.students.push(student("1", "Wanjiku", GradeLevel::Form1, Stream::A, &[]));
        w.marks_for("1", &[("math", 80), ("sci", 70), ("eng", 30)]);
        let r = student_results(&w.ctx(), "1");
        assert_eq!(r.english_points, Some(2));
        let eng = r.results.iter().find(|x| x.subject_id == "eng").expect("eng row");
        assert!(!eng.is_compulsory);
    }

    #[test]
    fn serialized_shape_uses_wire_names() {
        let mut w = World::new();
        w.students.push(student("1", "Ochieng", GradeLevel::Form1, Stream::A, &[]));
        w.marks_for("1", &[("math", 80)]);
        let v = serde_json::to_value(student_results(&w.ctx(), "1")).expect("serialize");
        assert!(v.get("best6Points").is_some());
        assert_eq!(v["mathPoints"], serde_json::json!(1));
        assert_eq!(v["englishPoints"], serde_json::Value::Null);
        assert_eq!(v["overallGrade"], serde_json::json!("9"));
        assert_eq!(v["results"][0]["includedInBest6"], serde_json::json!(true));
        assert_eq!(v["results"][0]["grade"], serde_json::json!("1"));
    }

    fn class_world(averages: &[(&str, i64)]) -> World {
        let mut w = World::new();
        for (id, final_marks) in averages {
            w.students.push(student(id, id, GradeLevel::Form1, Stream::A, &[]));
            let finals: Vec<(&str, i64)> = ["math", "eng", "sci", "soc", "life"]
                .iter()
                .map(|s| (*s, *final_marks))
                .collect();
            w.marks_for(id, &finals);
        }
        w
    }

    #[test]
    fn ranking_gives_ties_distinct_positions_in_snapshot_order() {
        let w = class_world(&[("A", 91), ("B", 91), ("C", 70)]);
        let ranks = class_rankings(&w.ctx(), GradeLevel::Form1, Stream::A);
        let got: Vec<(&str, f64, usize)> = ranks
            .iter()
            .map(|r| (r.student.id.as_str(), r.average, r.position))
            .collect();
        assert_eq!(got, vec![("A", 91.0, 1), ("B", 91.0, 2), ("C", 70.0, 3)]);
    }

    #[test]
    fn ranking_sorts_descending_and_filters_class() {
        let mut w = class_world(&[("A", 40), ("B", 80), ("C", 60)]);
        w.students.push(student("D", "D", GradeLevel::Form1, Stream::B, &[]));
        w.students.push(student("E", "E", GradeLevel::Form2, Stream::A, &[]));
        let ranks = class_rankings(&w.ctx(), GradeLevel::Form1, Stream::A);
        let ids: Vec<&str> = ranks.iter().map(|r| r.student.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "C", "A"]);
        assert_eq!(students_by_class(&w.ctx(), GradeLevel::Form1, Stream::B).len(), 1);
        assert!(class_rankings(&w.ctx(), GradeLevel::Grade12, Stream::C).is_empty());
    }
}
