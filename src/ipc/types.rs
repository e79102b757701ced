use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

/// Identity the host claims for a request. Checked against the users table
/// before any protected method runs.
#[derive(Debug, Deserialize, Clone)]
pub struct ActorClaim {
    pub id: String,
    pub role: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub actor: Option<ActorClaim>,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
}
