use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{db_conn, require_actor, required_i64, required_str};
use crate::ipc::types::{AppState, Request};
use crate::roster::{self, StudentFields};
use serde_json::json;

fn student_fields(params: &serde_json::Value) -> Result<StudentFields, HandlerErr> {
    Ok(StudentFields {
        name: required_str(params, "name")?,
        roll_number: required_str(params, "rollNumber")?,
        class: required_i64(params, "class")?,
    })
}

fn students_create(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = require_actor(conn, req)?;
    let fields = student_fields(&req.params)?;
    let student = roster::create_student(conn, &actor, fields)?;
    Ok(json!({ "studentId": student.id, "student": student }))
}

fn students_update(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = require_actor(conn, req)?;
    let student_id = required_str(&req.params, "studentId")?;
    let fields = student_fields(&req.params)?;
    let student = roster::update_student(conn, &actor, &student_id, fields)?;
    Ok(json!({ "student": student }))
}

fn students_delete(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = require_actor(conn, req)?;
    let student_id = required_str(&req.params, "studentId")?;
    roster::delete_student(conn, &actor, &student_id)?;
    Ok(json!({ "ok": true }))
}

fn students_list(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = require_actor(conn, req)?;
    let students = roster::list_students(conn, &actor)?;
    Ok(json!({ "students": students }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.create" => students_create(state, req),
        "students.update" => students_update(state, req),
        "students.delete" => students_delete(state, req),
        "students.list" => students_list(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
