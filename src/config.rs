use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::catalog::SubjectCatalog;
use crate::db;
use crate::model::Period;

const SETTINGS_KEY: &str = "grading.config";

/// The two subjects that always count toward best-6.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompulsorySubjects {
    pub mathematics: String,
    pub english: String,
}

impl CompulsorySubjects {
    pub fn contains(&self, subject_id: &str) -> bool {
        self.mathematics == subject_id || self.english == subject_id
    }
}

impl Default for CompulsorySubjects {
    fn default() -> Self {
        Self {
            mathematics: "math".to_string(),
            english: "eng".to_string(),
        }
    }
}

/// Parameters of the best-6 aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationRules {
    pub compulsory: CompulsorySubjects,
    pub best_others: usize,
}

impl Default for AggregationRules {
    fn default() -> Self {
        Self {
            compulsory: CompulsorySubjects::default(),
            best_others: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingConfig {
    pub period: Period,
    #[serde(flatten)]
    pub rules: AggregationRules,
    pub top_performers: usize,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            period: Period::default(),
            rules: AggregationRules::default(),
            top_performers: 5,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("unknown config field: {0}")]
    UnknownField(String),
    #[error("{field} must be {expected}")]
    BadValue {
        field: &'static str,
        expected: &'static str,
    },
    #[error("compulsory subject {0} is not in the catalog")]
    UnknownSubject(String),
    #[error("compulsory subjects must be two different subjects")]
    DuplicateCompulsory,
}

impl GradingConfig {
    /// Apply a camelCase JSON patch. On error `self` is left unchanged.
    pub fn merge_patch(
        &mut self,
        patch: &Map<String, Value>,
        catalog: &SubjectCatalog,
    ) -> Result<(), ConfigError> {
        let mut next = self.clone();
        for (k, v) in patch {
            match k.as_str() {
                "term" => {
                    let s = v
                        .as_str()
                        .map(str::trim)
                        .filter(|s| !s.is_empty() && s.len() <= 40)
                        .ok_or(ConfigError::BadValue {
                            field: "term",
                            expected: "a non-empty string",
                        })?;
                    next.period.term = s.to_string();
                }
                "year" => {
                    let y = v
                        .as_i64()
                        .filter(|y| (1900..=2200).contains(y))
                        .ok_or(ConfigError::BadValue {
                            field: "year",
                            expected: "an integer between 1900 and 2200",
                        })?;
                    next.period.year = y as i32;
                }
                "mathematics" | "english" => {
                    let id = v.as_str().map(str::trim).ok_or(ConfigError::BadValue {
                        field: "compulsory subject",
                        expected: "a subject id",
                    })?;
                    if catalog.get(id).is_none() {
                        return Err(ConfigError::UnknownSubject(id.to_string()));
                    }
                    if k == "mathematics" {
                        next.rules.compulsory.mathematics = id.to_string();
                    } else {
                        next.rules.compulsory.english = id.to_string();
                    }
                }
                "bestOthers" => {
                    let n = v
                        .as_u64()
                        .filter(|n| *n <= 20)
                        .ok_or(ConfigError::BadValue {
                            field: "bestOthers",
                            expected: "an integer between 0 and 20",
                        })?;
                    next.rules.best_others = n as usize;
                }
                "topPerformers" => {
                    let n = v
                        .as_u64()
                        .filter(|n| (1..=100).contains(n))
                        .ok_or(ConfigError::BadValue {
                            field: "topPerformers",
                            expected: "an integer between 1 and 100",
                        })?;
                    next.top_performers = n as usize;
                }
                other => return Err(ConfigError::UnknownField(other.to_string())),
            }
        }
        if next.rules.compulsory.mathematics == next.rules.compulsory.english {
            return Err(ConfigError::DuplicateCompulsory);
        }
        *self = next;
        Ok(())
    }

    pub fn to_patch(&self) -> Value {
        serde_json::json!({
            "term": self.period.term,
            "year": self.period.year,
            "mathematics": self.rules.compulsory.mathematics,
            "english": self.rules.compulsory.english,
            "bestOthers": self.rules.best_others,
            "topPerformers": self.top_performers,
        })
    }
}

/// Defaults overlaid with whatever the workspace has saved. A malformed saved
/// value is logged and ignored so the workspace still opens.
pub fn load(conn: &Connection, catalog: &SubjectCatalog) -> anyhow::Result<GradingConfig> {
    let mut cfg = GradingConfig::default();
    if let Some(saved) = db::settings_get_json(conn, SETTINGS_KEY)? {
        if let Some(obj) = saved.as_object() {
            if let Err(e) = cfg.merge_patch(obj, catalog) {
                tracing::warn!(error = %e, "ignoring saved grading config");
            }
        }
    }
    Ok(cfg)
}

pub fn save(conn: &Connection, cfg: &GradingConfig) -> anyhow::Result<()> {
    db::settings_set_json(conn, SETTINGS_KEY, &cfg.to_patch())
}
