use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{db_conn, require_actor, required_date, required_status, required_str};
use crate::ipc::types::{AppState, Request};
use crate::ledger;
use serde_json::json;

fn attendance_mark(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = require_actor(conn, req)?;
    let student_id = required_str(&req.params, "studentId")?;
    let date = required_date(&req.params, "date")?;
    let status = required_status(&req.params, "status")?;
    let record = ledger::mark_attendance(conn, &actor, &student_id, date, status)?;
    Ok(json!({ "record": record }))
}

fn attendance_update(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = require_actor(conn, req)?;
    let student_id = required_str(&req.params, "studentId")?;
    let date = required_date(&req.params, "date")?;
    let status = required_status(&req.params, "status")?;
    let record = ledger::update_attendance(conn, &actor, &student_id, date, status)?;
    Ok(json!({ "record": record }))
}

fn attendance_list(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = require_actor(conn, req)?;
    let records = ledger::list_records(conn, &actor)?;
    Ok(json!({ "records": records }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "attendance.mark" => attendance_mark(state, req),
        "attendance.update" => attendance_update(state, req),
        "attendance.list" => attendance_list(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
