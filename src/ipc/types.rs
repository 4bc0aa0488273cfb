use std::path::PathBuf;

use crate::session::ReviewSession;
use rusqlite::Connection;
use serde::Deserialize;

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
    pub review: ReviewSession,
}

impl AppState {
    pub fn new(page_size: usize) -> Self {
        Self {
            workspace: None,
            db: None,
            review: ReviewSession::new(page_size),
        }
    }
}
