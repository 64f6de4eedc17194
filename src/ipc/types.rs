use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::catalog::SubjectCatalog;
use crate::config::GradingConfig;
use crate::snapshot::Snapshot;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub catalog: SubjectCatalog,
    pub config: GradingConfig,
    /// Mirror of the store for `config.period`; empty until a workspace is open.
    pub snapshot: Snapshot,
}

impl AppState {
    pub fn new() -> Self {
        let config = GradingConfig::default();
        Self {
            workspace: None,
            db: None,
            catalog: SubjectCatalog::standard(),
            snapshot: Snapshot::empty(config.period.clone()),
            config,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
