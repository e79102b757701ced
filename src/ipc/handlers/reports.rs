use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{db_conn, require_actor};
use crate::ipc::types::{AppState, Request};
use crate::reports;
use serde_json::json;

fn reports_student_wise(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = require_actor(conn, req)?;
    let rows = reports::student_wise_report(conn, &actor)?;
    Ok(json!({ "rows": rows }))
}

fn reports_month_wise(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = require_actor(conn, req)?;
    let rows = reports::month_wise_report(conn, &actor)?;
    Ok(json!({ "rows": rows }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "reports.studentWise" => reports_student_wise(state, req),
        "reports.monthWise" => reports_month_wise(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
