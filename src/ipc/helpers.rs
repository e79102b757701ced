use chrono::NaiveDate;
use rusqlite::Connection;
use tracing::warn;

use crate::error::CoreError;
use crate::identity;
use crate::ipc::error::HandlerErr;
use crate::ipc::types::{AppState, Request};
use crate::ledger::{self, Status};
use crate::policy::{Actor, Role};

pub fn db_conn<'a>(state: &'a AppState) -> Result<&'a Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn required_i64(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    let Some(v) = params.get(key) else {
        return Err(HandlerErr::bad_params(format!("missing {}", key)));
    };
    // Hosts sometimes send numeric form fields as strings.
    v.as_i64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse::<i64>().ok()))
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key)))
}

pub fn required_date(params: &serde_json::Value, key: &str) -> Result<NaiveDate, HandlerErr> {
    let raw = required_str(params, key)?;
    Ok(ledger::parse_date(&raw)?)
}

/// `"present"`/`"absent"` or a boolean where `true` means present.
pub fn required_status(params: &serde_json::Value, key: &str) -> Result<Status, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => {
            Err(HandlerErr::bad_params(format!("missing {}", key)))
        }
        Some(serde_json::Value::Bool(b)) => Ok(Status::from_flag(*b)),
        Some(serde_json::Value::String(s)) => Ok(s.parse::<Status>()?),
        Some(other) => Err(HandlerErr::from(CoreError::validation(format!(
            "status must be present, absent or a boolean, got {}",
            other
        )))),
    }
}

/// Resolves the request's claimed identity into a verified actor. The claim
/// must name an existing account holding that role.
pub fn require_actor(conn: &Connection, req: &Request) -> Result<Actor, HandlerErr> {
    let Some(claim) = req.actor.as_ref() else {
        return Err(HandlerErr::new("unauthenticated", "missing actor"));
    };
    let role = claim
        .role
        .parse::<Role>()
        .map_err(|_| HandlerErr::new("unauthenticated", "unknown actor role"))?;
    let actor = Actor {
        id: claim.id.clone(),
        role,
    };
    if !identity::actor_is_current(conn, &actor)? {
        warn!(actor_id = %actor.id, role = %actor.role, "stale or unknown actor");
        return Err(HandlerErr::new("unauthenticated", "unknown actor"));
    }
    Ok(actor)
}

/// Like [`require_actor`] but absent claims are allowed.
pub fn optional_actor(conn: &Connection, req: &Request) -> Result<Option<Actor>, HandlerErr> {
    if req.actor.is_none() {
        return Ok(None);
    }
    require_actor(conn, req).map(Some)
}
