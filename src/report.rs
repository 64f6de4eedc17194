use serde::Serialize;

use crate::calc::{self, CalcContext, RankingEntry, SubjectResult};
use crate::grade::Grade;
use crate::model::{GradeLevel, Stream, Student};

pub fn class_average(rankings: &[RankingEntry]) -> f64 {
    if rankings.is_empty() {
        return 0.0;
    }
    rankings.iter().map(|r| r.average).sum::<f64>() / rankings.len() as f64
}

pub fn top_performers(rankings: &[RankingEntry], n: usize) -> &[RankingEntry] {
    &rankings[..n.min(rankings.len())]
}

pub fn teacher_comment(average: f64) -> &'static str {
    if average >= 80.0 {
        "Exceptional performance! Keep up the excellent work."
    } else if average >= 70.0 {
        "Very good performance. Continue working hard."
    } else if average >= 60.0 {
        "Good effort. There is room for improvement."
    } else if average >= 50.0 {
        "Satisfactory. More dedication is needed."
    } else {
        "Needs significant improvement. Please consult with teachers."
    }
}

pub fn head_teacher_comment(average: f64) -> &'static str {
    if average >= 70.0 {
        "Congratulations on your achievements."
    } else {
        "Strive for excellence in all endeavors."
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectCounts {
    pub core: usize,
    pub optional: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassOverview {
    pub grade: GradeLevel,
    pub stream: Stream,
    pub total_students: usize,
    pub class_students: usize,
    pub class_average: f64,
    pub top_performers: Vec<RankingEntry>,
    pub subjects: SubjectCounts,
}

/// Dashboard figures for one class.
pub fn class_overview(
    ctx: &CalcContext<'_>,
    grade: GradeLevel,
    stream: Stream,
    top_n: usize,
) -> ClassOverview {
    let rankings = calc::class_rankings(ctx, grade, stream);
    let core = ctx.catalog.core_count();
    let optional = ctx.catalog.optional_count();
    ClassOverview {
        grade,
        stream,
        total_students: ctx.students.len(),
        class_students: rankings.len(),
        class_average: calc::round_off_1_decimal(class_average(&rankings)),
        top_performers: top_performers(&rankings, top_n).to_vec(),
        subjects: SubjectCounts {
            core,
            optional,
            total: core + optional,
        },
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCard {
    pub student: Student,
    pub results: Vec<SubjectResult>,
    pub total: i64,
    pub average: f64,
    pub overall_grade: Grade,
    #[serde(rename = "best6Points")]
    pub best6_points: u32,
    pub math_points: Option<u8>,
    pub english_points: Option<u8>,
    /// 0 when the student is not ranked in its class.
    pub position: usize,
    pub total_students: usize,
    pub term: String,
    pub year: i32,
    pub teacher_comment: &'static str,
    pub head_teacher_comment: &'static str,
}

fn build_card(ctx: &CalcContext<'_>, student: &Student, rankings: &[RankingEntry]) -> ReportCard {
    let r = calc::student_results(ctx, &student.id);
    let position = rankings
        .iter()
        .find(|e| e.student.id == student.id)
        .map(|e| e.position)
        .unwrap_or(0);
    ReportCard {
        student: student.clone(),
        teacher_comment: teacher_comment(r.average),
        head_teacher_comment: head_teacher_comment(r.average),
        results: r.results,
        total: r.total,
        average: r.average,
        overall_grade: r.overall_grade,
        best6_points: r.best6_points,
        math_points: r.math_points,
        english_points: r.english_points,
        position,
        total_students: rankings.len(),
        term: ctx.period.term.clone(),
        year: ctx.period.year,
    }
}

/// Report card for one student, ranked within its own class.
pub fn student_report_card(ctx: &CalcContext<'_>, student_id: &str) -> Option<ReportCard> {
    let student = ctx.student(student_id)?;
    let rankings = calc::class_rankings(ctx, student.grade, student.stream);
    Some(build_card(ctx, student, &rankings))
}

/// One card per class member, in roster order, positions from the ranking.
pub fn class_report_cards(ctx: &CalcContext<'_>, grade: GradeLevel, stream: Stream) -> Vec<ReportCard> {
    let rankings = calc::class_rankings(ctx, grade, stream);
    calc::students_by_class(ctx, grade, stream)
        .into_iter()
        .map(|s| build_card(ctx, s, &rankings))
        .collect()
}

pub fn export_file_stem(grade: GradeLevel, stream: Stream, term: &str, year: i32) -> String {
    let clean = |s: &str| s.replace(' ', "");
    format!(
        "Report_Cards_Grade{}_Stream{}_{}_{}",
        clean(grade.as_str()),
        stream.as_str(),
        clean(term),
        year
    )
}

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn opt_points(p: Option<u8>) -> String {
    p.map(|v| v.to_string()).unwrap_or_default()
}

/// Flat class sheet: one row per card, one mark/grade column pair per subject
/// of the catalog. Subjects a student does not take are left blank.
pub fn report_cards_csv(ctx: &CalcContext<'_>, cards: &[ReportCard]) -> String {
    let subjects = ctx.catalog.all();
    let mut csv = String::from("position,student_no,last_name,first_name");
    for s in subjects {
        csv.push_str(&format!(",{}_marks,{}_grade", s.id, s.id));
    }
    csv.push_str(",total,average,overall_grade,best6_points,math_points,english_points\n");

    for card in cards {
        csv.push_str(&format!(
            "{},{},{},{}",
            card.position,
            csv_quote(&card.student.student_no),
            csv_quote(&card.student.last_name),
            csv_quote(&card.student.first_name)
        ));
        for s in subjects {
            match card.results.iter().find(|r| r.subject_id == s.id) {
                Some(r) => csv.push_str(&format!(",{},{}", r.marks, r.grade.label())),
                None => csv.push_str(",,"),
            }
        }
        csv.push_str(&format!(
            ",{},{:.1},{},{},{},{}\n",
            card.total,
            card.average,
            card.overall_grade.label(),
            card.best6_points,
            opt_points(card.math_points),
            opt_points(card.english_points)
        ));
    }
    csv
}
