use std::path::PathBuf;

use serde::Deserialize;

use crate::roster::RollIndex;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// The result rows currently loaded into the sidecar. `source`/`sheet_name`
/// are absent when the rows arrived inline over IPC instead of from a file.
pub struct LoadedSheet {
    pub source: Option<PathBuf>,
    pub sheet_name: Option<String>,
    pub row_count: usize,
    pub index: RollIndex,
}

pub struct AppState {
    pub sheet: Option<LoadedSheet>,
}
