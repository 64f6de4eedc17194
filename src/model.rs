use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GradeLevel {
    #[serde(rename = "FORM 1")]
    Form1,
    #[serde(rename = "FORM 2")]
    Form2,
    #[serde(rename = "FORM 3")]
    Form3,
    #[serde(rename = "FORM 4")]
    Form4,
    #[serde(rename = "10")]
    Grade10,
    #[serde(rename = "11")]
    Grade11,
    #[serde(rename = "12")]
    Grade12,
}

impl GradeLevel {
    pub const ALL: [GradeLevel; 7] = [
        GradeLevel::Form1,
        GradeLevel::Form2,
        GradeLevel::Form3,
        GradeLevel::Form4,
        GradeLevel::Grade10,
        GradeLevel::Grade11,
        GradeLevel::Grade12,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GradeLevel::Form1 => "FORM 1",
            GradeLevel::Form2 => "FORM 2",
            GradeLevel::Form3 => "FORM 3",
            GradeLevel::Form4 => "FORM 4",
            GradeLevel::Grade10 => "10",
            GradeLevel::Grade11 => "11",
            GradeLevel::Grade12 => "12",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let t = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|g| g.as_str().eq_ignore_ascii_case(t))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Stream {
    One,
    Two,
    Three,
    A,
    B,
    C,
}

impl Stream {
    pub const ALL: [Stream; 6] = [
        Stream::One,
        Stream::Two,
        Stream::Three,
        Stream::A,
        Stream::B,
        Stream::C,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stream::One => "ONE",
            Stream::Two => "TWO",
            Stream::Three => "THREE",
            Stream::A => "A",
            Stream::B => "B",
            Stream::C => "C",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let t = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|st| st.as_str().eq_ignore_ascii_case(t))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub student_no: String,
    pub grade: GradeLevel,
    pub stream: Stream,
    pub optional_subjects: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guardian_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guardian_phone: Option<String>,
}

impl Student {
    pub fn in_class(&self, grade: GradeLevel, stream: Stream) -> bool {
        self.grade == grade && self.stream == stream
    }
}

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub first_name: String,
    pub last_name: String,
    pub student_no: String,
    pub grade: GradeLevel,
    pub stream: Stream,
    pub optional_subjects: Vec<String>,
    pub date_of_birth: Option<String>,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
}

impl NewStudent {
    pub fn into_student(self, id: String) -> Student {
        Student {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            student_no: self.student_no,
            grade: self.grade,
            stream: self.stream,
            optional_subjects: self.optional_subjects,
            date_of_birth: self.date_of_birth,
            guardian_name: self.guardian_name,
            guardian_phone: self.guardian_phone,
        }
    }
}

/// Partial update. `None` leaves a field alone; for the nullable contact
/// fields `Some(None)` clears the value.
#[derive(Debug, Clone, Default)]
pub struct StudentPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub student_no: Option<String>,
    pub grade: Option<GradeLevel>,
    pub stream: Option<Stream>,
    pub optional_subjects: Option<Vec<String>>,
    pub date_of_birth: Option<Option<String>>,
    pub guardian_name: Option<Option<String>>,
    pub guardian_phone: Option<Option<String>>,
}

impl StudentPatch {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.student_no.is_none()
            && self.grade.is_none()
            && self.stream.is_none()
            && self.optional_subjects.is_none()
            && self.date_of_birth.is_none()
            && self.guardian_name.is_none()
            && self.guardian_phone.is_none()
    }

    pub fn apply_to(&self, s: &mut Student) {
        if let Some(v) = &self.first_name {
            s.first_name = v.clone();
        }
        if let Some(v) = &self.last_name {
            s.last_name = v.clone();
        }
        if let Some(v) = &self.student_no {
            s.student_no = v.clone();
        }
        if let Some(v) = self.grade {
            s.grade = v;
        }
        if let Some(v) = self.stream {
            s.stream = v;
        }
        if let Some(v) = &self.optional_subjects {
            s.optional_subjects = v.clone();
        }
        if let Some(v) = &self.date_of_birth {
            s.date_of_birth = v.clone();
        }
        if let Some(v) = &self.guardian_name {
            s.guardian_name = v.clone();
        }
        if let Some(v) = &self.guardian_phone {
            s.guardian_phone = v.clone();
        }
    }
}

/// Grading period every mark lookup is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    pub term: String,
    pub year: i32,
}

impl Period {
    pub fn new(term: impl Into<String>, year: i32) -> Self {
        Self {
            term: term.into(),
            year,
        }
    }
}

impl Default for Period {
    fn default() -> Self {
        Period::new("Term 1", 2026)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRecord {
    pub student_id: String,
    pub subject_id: String,
    pub term: String,
    pub year: i32,
    pub ca_marks: f64,
    pub exam_marks: f64,
    /// Weighted final, fixed when the record was written.
    pub final_marks: i64,
}

impl MarkRecord {
    pub fn key_matches(&self, student_id: &str, subject_id: &str, period: &Period) -> bool {
        self.student_id == student_id
            && self.subject_id == subject_id
            && self.term == period.term
            && self.year == period.year
    }

    pub fn in_period(&self, period: &Period) -> bool {
        self.term == period.term && self.year == period.year
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_labels_round_trip_through_serde() {
        for g in GradeLevel::ALL {
            let v = serde_json::to_value(g).expect("serialize");
            assert_eq!(v, serde_json::json!(g.as_str()));
            assert_eq!(GradeLevel::parse(g.as_str()), Some(g));
        }
        for s in Stream::ALL {
            let v = serde_json::to_value(s).expect("serialize");
            assert_eq!(v, serde_json::json!(s.as_str()));
            assert_eq!(Stream::parse(&s.as_str().to_ascii_lowercase()), Some(s));
        }
        assert_eq!(GradeLevel::parse("9"), None);
        assert_eq!(Stream::parse("D"), None);
    }

    #[test]
    fn patch_clears_nullable_fields() {
        let mut s = NewStudent {
            first_name: "Grace".into(),
            last_name: "Ochieng".into(),
            student_no: "STU26001".into(),
            grade: GradeLevel::Form1,
            stream: Stream::A,
            optional_subjects: vec!["art".into()],
            date_of_birth: None,
            guardian_name: Some("Peter".into()),
            guardian_phone: None,
        }
        .into_student("s1".into());

        let patch = StudentPatch {
            stream: Some(Stream::B),
            guardian_name: Some(None),
            ..Default::default()
        };
        assert!(!patch.is_empty());
        patch.apply_to(&mut s);
        assert_eq!(s.stream, Stream::B);
        assert_eq!(s.guardian_name, None);
        assert_eq!(s.first_name, "Grace");
    }
}
