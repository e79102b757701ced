use crate::assignments;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{db_conn, require_actor, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn pair(params: &serde_json::Value) -> Result<(String, String), HandlerErr> {
    Ok((
        required_str(params, "teacherId")?,
        required_str(params, "studentId")?,
    ))
}

fn assignments_assign(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = require_actor(conn, req)?;
    let (teacher_id, student_id) = pair(&req.params)?;
    assignments::assign(conn, &actor, &teacher_id, &student_id)?;
    Ok(json!({ "ok": true }))
}

fn assignments_unassign(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = require_actor(conn, req)?;
    let (teacher_id, student_id) = pair(&req.params)?;
    assignments::unassign(conn, &actor, &teacher_id, &student_id)?;
    Ok(json!({ "ok": true }))
}

fn assignments_my_students(
    state: &AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = require_actor(conn, req)?;
    let students = assignments::list_students_for_teacher(conn, &actor)?;
    Ok(json!({ "students": students }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "assignments.assign" => assignments_assign(state, req),
        "assignments.unassign" => assignments_unassign(state, req),
        "assignments.myStudents" => assignments_my_students(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
