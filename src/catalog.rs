use serde::Serialize;

use crate::model::Student;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub is_core: bool,
    pub max_marks: f64,
}

impl Subject {
    fn new(id: &str, name: &str, is_core: bool) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            is_core,
            max_marks: 100.0,
        }
    }
}

/// Static subject registry, fixed at process start.
#[derive(Debug, Clone)]
pub struct SubjectCatalog {
    subjects: Vec<Subject>,
}

impl SubjectCatalog {
    pub fn new(subjects: Vec<Subject>) -> Self {
        Self { subjects }
    }

    pub fn standard() -> Self {
        Self::new(vec![
            Subject::new("math", "Mathematics", true),
            Subject::new("eng", "English Language", true),
            Subject::new("sci", "Science", true),
            Subject::new("soc", "Social Studies", true),
            Subject::new("life", "Life Skills", true),
            Subject::new("comp", "Computer Studies", false),
            Subject::new("art", "Art & Design", false),
            Subject::new("agri", "Agriculture", false),
            Subject::new("music", "Music", false),
            Subject::new("french", "French", false),
            Subject::new("pe", "Physical Education", false),
        ])
    }

    pub fn all(&self) -> &[Subject] {
        &self.subjects
    }

    pub fn get(&self, id: &str) -> Option<&Subject> {
        self.subjects.iter().find(|s| s.id == id)
    }

    pub fn core_count(&self) -> usize {
        self.subjects.iter().filter(|s| s.is_core).count()
    }

    pub fn optional_count(&self) -> usize {
        self.subjects.iter().filter(|s| !s.is_core).count()
    }

    /// Core subjects, then the student's optional subjects, both in catalog
    /// order. This is report-card row order.
    pub fn applicable_subjects(&self, student: &Student) -> Vec<&Subject> {
        let core = self.subjects.iter().filter(|s| s.is_core);
        let optional = self
            .subjects
            .iter()
            .filter(|s| !s.is_core && student.optional_subjects.iter().any(|id| *id == s.id));
        core.chain(optional).collect()
    }

    /// Returns the ids that are not optional subjects of this catalog.
    pub fn invalid_optional_ids<'a>(&self, ids: &'a [String]) -> Vec<&'a str> {
        ids.iter()
            .filter(|id| !matches!(self.get(id), Some(s) if !s.is_core))
            .map(|id| id.as_str())
            .collect()
    }
}

impl Default for SubjectCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
