use anyhow::{anyhow, Context};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use uuid::Uuid;

use crate::calc;
use crate::model::{GradeLevel, MarkRecord, NewStudent, Period, Stream, Student, StudentPatch};

pub const DB_FILE: &str = "results.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            student_no TEXT NOT NULL,
            grade TEXT NOT NULL,
            stream TEXT NOT NULL,
            optional_subjects TEXT NOT NULL DEFAULT '[]',
            date_of_birth TEXT,
            guardian_name TEXT,
            guardian_phone TEXT,
            created_at TEXT,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(grade, stream)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_last_name ON students(last_name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS marks(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            term TEXT NOT NULL,
            year INTEGER NOT NULL,
            ca_marks REAL NOT NULL DEFAULT 0,
            exam_marks REAL NOT NULL DEFAULT 0,
            marks INTEGER NOT NULL,
            updated_at TEXT,
            FOREIGN KEY(student_id) REFERENCES students(id),
            UNIQUE(student_id, subject_id, term, year)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_marks_period ON marks(term, year)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_marks_student ON marks(student_id)",
        [],
    )?;

    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(
            serde_json::from_str(&s).with_context(|| format!("bad json in setting {}", key))?,
        )),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

const STUDENT_COLUMNS: &str = "id, first_name, last_name, student_no, grade, stream,
     optional_subjects, date_of_birth, guardian_name, guardian_phone";

struct StudentRow {
    id: String,
    first_name: String,
    last_name: String,
    student_no: String,
    grade: String,
    stream: String,
    optional_subjects: String,
    date_of_birth: Option<String>,
    guardian_name: Option<String>,
    guardian_phone: Option<String>,
}

impl StudentRow {
    fn from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: r.get(0)?,
            first_name: r.get(1)?,
            last_name: r.get(2)?,
            student_no: r.get(3)?,
            grade: r.get(4)?,
            stream: r.get(5)?,
            optional_subjects: r.get(6)?,
            date_of_birth: r.get(7)?,
            guardian_name: r.get(8)?,
            guardian_phone: r.get(9)?,
        })
    }

    fn into_student(self) -> anyhow::Result<Student> {
        let grade = GradeLevel::parse(&self.grade)
            .ok_or_else(|| anyhow!("student {} has unknown grade {:?}", self.id, self.grade))?;
        let stream = Stream::parse(&self.stream)
            .ok_or_else(|| anyhow!("student {} has unknown stream {:?}", self.id, self.stream))?;
        let optional_subjects: Vec<String> = serde_json::from_str(&self.optional_subjects)
            .with_context(|| format!("student {} has bad optional_subjects", self.id))?;
        Ok(Student {
            id: self.id,
            first_name: self.first_name,
            last_name: self.last_name,
            student_no: self.student_no,
            grade,
            stream,
            optional_subjects,
            date_of_birth: self.date_of_birth,
            guardian_name: self.guardian_name,
            guardian_phone: self.guardian_phone,
        })
    }
}

/// All students, ordered by last name.
pub fn list_students(conn: &Connection) -> anyhow::Result<Vec<Student>> {
    let sql = format!(
        "SELECT {} FROM students ORDER BY last_name, first_name, rowid",
        STUDENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], StudentRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(StudentRow::into_student).collect()
}

pub fn get_student(conn: &Connection, id: &str) -> anyhow::Result<Option<Student>> {
    let sql = format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLUMNS);
    let row = conn
        .query_row(&sql, [id], StudentRow::from_row)
        .optional()?;
    row.map(StudentRow::into_student).transpose()
}

pub fn insert_student(conn: &Connection, new: NewStudent) -> anyhow::Result<Student> {
    let id = Uuid::new_v4().to_string();
    let optional_json = serde_json::to_string(&new.optional_subjects)?;
    conn.execute(
        "INSERT INTO students(
           id, first_name, last_name, student_no, grade, stream,
           optional_subjects, date_of_birth, guardian_name, guardian_phone,
           created_at, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
           strftime('%Y-%m-%dT%H:%M:%SZ','now'), strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (
            &id,
            &new.first_name,
            &new.last_name,
            &new.student_no,
            new.grade.as_str(),
            new.stream.as_str(),
            &optional_json,
            new.date_of_birth.as_deref(),
            new.guardian_name.as_deref(),
            new.guardian_phone.as_deref(),
        ),
    )?;
    Ok(new.into_student(id))
}

/// Returns false when no student has this id.
pub fn update_student(conn: &Connection, id: &str, patch: &StudentPatch) -> anyhow::Result<bool> {
    let mut set_parts: Vec<&str> = Vec::new();
    let mut bind_values: Vec<Value> = Vec::new();

    let opt_text = |v: &Option<String>| match v {
        Some(s) => Value::Text(s.clone()),
        None => Value::Null,
    };

    if let Some(v) = &patch.first_name {
        set_parts.push("first_name = ?");
        bind_values.push(Value::Text(v.clone()));
    }
    if let Some(v) = &patch.last_name {
        set_parts.push("last_name = ?");
        bind_values.push(Value::Text(v.clone()));
    }
    if let Some(v) = &patch.student_no {
        set_parts.push("student_no = ?");
        bind_values.push(Value::Text(v.clone()));
    }
    if let Some(v) = patch.grade {
        set_parts.push("grade = ?");
        bind_values.push(Value::Text(v.as_str().to_string()));
    }
    if let Some(v) = patch.stream {
        set_parts.push("stream = ?");
        bind_values.push(Value::Text(v.as_str().to_string()));
    }
    if let Some(v) = &patch.optional_subjects {
        set_parts.push("optional_subjects = ?");
        bind_values.push(Value::Text(serde_json::to_string(v)?));
    }
    if let Some(v) = &patch.date_of_birth {
        set_parts.push("date_of_birth = ?");
        bind_values.push(opt_text(v));
    }
    if let Some(v) = &patch.guardian_name {
        set_parts.push("guardian_name = ?");
        bind_values.push(opt_text(v));
    }
    if let Some(v) = &patch.guardian_phone {
        set_parts.push("guardian_phone = ?");
        bind_values.push(opt_text(v));
    }

    set_parts.push("updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')");
    bind_values.push(Value::Text(id.to_string()));

    let sql = format!("UPDATE students SET {} WHERE id = ?", set_parts.join(", "));
    let changed = conn.execute(&sql, params_from_iter(bind_values))?;
    Ok(changed > 0)
}

/// Deletes the student and all of its marks. Returns false when no student
/// has this id.
pub fn delete_student(conn: &mut Connection, id: &str) -> anyhow::Result<bool> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM marks WHERE student_id = ?", [id])?;
    let removed = tx.execute("DELETE FROM students WHERE id = ?", [id])?;
    tx.commit()?;
    Ok(removed > 0)
}

fn mark_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<MarkRecord> {
    Ok(MarkRecord {
        student_id: r.get(0)?,
        subject_id: r.get(1)?,
        term: r.get(2)?,
        year: r.get(3)?,
        ca_marks: r.get(4)?,
        exam_marks: r.get(5)?,
        final_marks: r.get(6)?,
    })
}

pub fn list_marks(conn: &Connection, period: &Period) -> anyhow::Result<Vec<MarkRecord>> {
    let mut stmt = conn.prepare(
        "SELECT student_id, subject_id, term, year, ca_marks, exam_marks, marks
         FROM marks
         WHERE term = ? AND year = ?
         ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map((&period.term, period.year), mark_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_student_marks(
    conn: &Connection,
    student_id: &str,
    period: &Period,
) -> anyhow::Result<Vec<MarkRecord>> {
    let mut stmt = conn.prepare(
        "SELECT student_id, subject_id, term, year, ca_marks, exam_marks, marks
         FROM marks
         WHERE student_id = ? AND term = ? AND year = ?
         ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map((student_id, &period.term, period.year), mark_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Insert or replace the mark for (student, subject, term, year). The final
/// mark is computed here, at write time.
pub fn upsert_mark(
    conn: &Connection,
    student_id: &str,
    subject_id: &str,
    ca_marks: f64,
    exam_marks: f64,
    period: &Period,
) -> anyhow::Result<MarkRecord> {
    let final_marks = calc::final_mark(ca_marks, exam_marks);
    let mark_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO marks(id, student_id, subject_id, term, year, ca_marks, exam_marks, marks, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))
         ON CONFLICT(student_id, subject_id, term, year) DO UPDATE SET
           ca_marks = excluded.ca_marks,
           exam_marks = excluded.exam_marks,
           marks = excluded.marks,
           updated_at = excluded.updated_at",
        (
            &mark_id,
            student_id,
            subject_id,
            &period.term,
            period.year,
            ca_marks,
            exam_marks,
            final_marks,
        ),
    )?;
    Ok(MarkRecord {
        student_id: student_id.to_string(),
        subject_id: subject_id.to_string(),
        term: period.term.clone(),
        year: period.year,
        ca_marks,
        exam_marks,
        final_marks,
    })
}
