use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::store::Gradebook;

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
    /// The in-memory dataset restored at workspace.select. Mutations apply
    /// here first and mirror to the database before the reply goes out.
    pub book: Option<Gradebook>,
}
