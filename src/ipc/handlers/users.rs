use crate::error::CoreError;
use crate::identity::{self, NewUser};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{db_conn, optional_actor, require_actor, required_str};
use crate::ipc::types::{AppState, Request};
use crate::policy::Role;
use serde_json::json;

fn users_register(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = optional_actor(conn, req)?;
    // Only an absent role defaults; null or a non-string is a mistake.
    let role = match req.params.get("role") {
        None => Role::Teacher,
        Some(serde_json::Value::String(r)) => r.parse::<Role>()?,
        Some(other) => {
            return Err(CoreError::validation(format!(
                "role must be admin or teacher, got {}",
                other
            ))
            .into())
        }
    };
    let user = identity::register_user(
        conn,
        actor.as_ref(),
        NewUser {
            name: required_str(&req.params, "name")?,
            email: required_str(&req.params, "email")?,
            password: required_str(&req.params, "password")?,
            role,
        },
    )?;
    Ok(json!({ "user": user }))
}

fn auth_login(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let email = required_str(&req.params, "email")?;
    let password = required_str(&req.params, "password")?;
    match identity::verify_credentials(conn, &email, &password)? {
        Some(user) => Ok(json!({
            "userId": user.id,
            "name": user.name,
            "role": user.role,
        })),
        None => Err(HandlerErr::new("unauthenticated", "invalid email or password")),
    }
}

fn users_list(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = require_actor(conn, req)?;
    let users = identity::list_users(conn, &actor)?;
    Ok(json!({ "users": users }))
}

fn teachers_list(state: &AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let teachers = identity::list_teachers(conn)?;
    Ok(json!({ "teachers": teachers }))
}

fn teachers_update(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = require_actor(conn, req)?;
    let user_id = required_str(&req.params, "userId")?;
    let name = required_str(&req.params, "name")?;
    let email = required_str(&req.params, "email")?;
    let teacher = identity::update_teacher(conn, &actor, &user_id, &name, &email)?;
    Ok(json!({ "teacher": teacher }))
}

fn teachers_delete(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = require_actor(conn, req)?;
    let user_id = required_str(&req.params, "userId")?;
    identity::delete_teacher(conn, &actor, &user_id)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "users.register" => users_register(state, req),
        "auth.login" => auth_login(state, req),
        "users.list" => users_list(state, req),
        "teachers.list" => teachers_list(state, req),
        "teachers.update" => teachers_update(state, req),
        "teachers.delete" => teachers_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
