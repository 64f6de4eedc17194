use rusqlite::Connection;

use crate::calc::CalcContext;
use crate::catalog::SubjectCatalog;
use crate::config::AggregationRules;
use crate::db;
use crate::model::{MarkRecord, Period, Student, StudentPatch};

/// In-memory mirror of the store for one grading period.
///
/// After a successful store write the caller patches the mirror with one of
/// the `apply_*` methods instead of re-reading. Two writers can therefore
/// disagree until one of them calls [`Snapshot::resync`].
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub period: Period,
    pub students: Vec<Student>,
    pub marks: Vec<MarkRecord>,
}

impl Snapshot {
    pub fn empty(period: Period) -> Self {
        Self {
            period,
            students: Vec::new(),
            marks: Vec::new(),
        }
    }

    pub fn load(conn: &Connection, period: Period) -> anyhow::Result<Self> {
        let students = db::list_students(conn)?;
        let marks = db::list_marks(conn, &period)?;
        tracing::debug!(
            term = %period.term,
            year = period.year,
            students = students.len(),
            marks = marks.len(),
            "snapshot loaded"
        );
        Ok(Self {
            period,
            students,
            marks,
        })
    }

    /// Replace everything with a fresh read. On error the current contents
    /// are kept.
    pub fn resync(&mut self, conn: &Connection) -> anyhow::Result<()> {
        *self = Self::load(conn, self.period.clone())?;
        Ok(())
    }

    pub fn ctx<'a>(&'a self, catalog: &'a SubjectCatalog, rules: &'a AggregationRules) -> CalcContext<'a> {
        CalcContext {
            students: &self.students,
            marks: &self.marks,
            period: &self.period,
            catalog,
            rules,
        }
    }

    pub fn student(&self, id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    pub fn student_marks(&self, student_id: &str) -> Vec<&MarkRecord> {
        self.marks
            .iter()
            .filter(|m| m.student_id == student_id && m.in_period(&self.period))
            .collect()
    }

    pub fn apply_student_added(&mut self, student: Student) {
        self.students.push(student);
    }

    /// Returns false when the student is not in the mirror.
    pub fn apply_student_updated(&mut self, id: &str, patch: &StudentPatch) -> bool {
        match self.students.iter_mut().find(|s| s.id == id) {
            Some(s) => {
                patch.apply_to(s);
                true
            }
            None => false,
        }
    }

    pub fn apply_student_deleted(&mut self, id: &str) {
        self.students.retain(|s| s.id != id);
        self.marks.retain(|m| m.student_id != id);
    }

    /// Marks for other periods are not mirrored and are dropped.
    pub fn apply_mark_upserted(&mut self, record: MarkRecord) {
        if !record.in_period(&self.period) {
            return;
        }
        let period = &self.period;
        match self
            .marks
            .iter_mut()
            .find(|m| m.key_matches(&record.student_id, &record.subject_id, period))
        {
            Some(existing) => *existing = record,
            None => self.marks.push(record),
        }
    }
}
