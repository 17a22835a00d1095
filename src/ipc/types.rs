use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::Deserialize;

use crate::db;
use crate::manager::ScheduleStateManager;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Open timetables are keyed by teacher id and live until closed or until
/// another workspace is selected.
#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub sessions: HashMap<String, ScheduleStateManager>,
}

impl AppState {
    pub fn select_workspace(&mut self, path: &Path) -> anyhow::Result<()> {
        let conn = db::open_db(path)?;
        if !self.sessions.is_empty() {
            tracing::info!(
                discarded = self.sessions.len(),
                "workspace changed, closing open timetables"
            );
        }
        self.sessions.clear();
        self.workspace = Some(path.to_path_buf());
        self.db = Some(conn);
        tracing::info!(workspace = %path.display(), "workspace selected");
        Ok(())
    }
}
