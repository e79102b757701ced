//! User accounts: registration, credential checks and the admin-side teacher
//! directory.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db;
use crate::error::{classify_write, CoreError, CoreResult};
use crate::policy::{gate, Action, Actor, Role};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

fn hash_password(password: &str) -> CoreResult<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| CoreError::Internal(e.to_string()))?;
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| CoreError::Internal(e.to_string()))?;
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| CoreError::Internal(e.to_string()))?
        .to_string();
    Ok(phc)
}

fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn validate_email(email: &str) -> CoreResult<()> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(CoreError::validation("email must contain @"));
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(CoreError::validation(format!("invalid email: {}", email)));
    }
    Ok(())
}

fn user_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<(User, String)> {
    let role: String = r.get(3)?;
    let role = role.parse::<Role>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok((
        User {
            id: r.get(0)?,
            name: r.get(1)?,
            email: r.get(2)?,
            role,
        },
        r.get(4)?,
    ))
}

fn find_user(conn: &Connection, user_id: &str) -> CoreResult<Option<User>> {
    let found = conn
        .query_row(
            "SELECT id, name, email, role, password_hash FROM users WHERE id = ?",
            [user_id],
            user_row,
        )
        .optional()?;
    Ok(found.map(|(u, _)| u))
}

/// Creates an account. Teachers may self-register. Creating an admin needs
/// an admin actor, except for the very first admin of a fresh workspace.
pub fn register_user(conn: &Connection, actor: Option<&Actor>, new: NewUser) -> CoreResult<User> {
    let name = new.name.trim().to_string();
    let email = normalize_email(&new.email);
    if name.is_empty() {
        return Err(CoreError::validation("name must not be empty"));
    }
    validate_email(&email)?;
    if new.password.is_empty() {
        return Err(CoreError::validation("password must not be empty"));
    }

    let password_hash = hash_password(&new.password)?;
    let tx = db::write_tx(conn)?;

    if new.role == Role::Admin && !actor.is_some_and(Actor::is_admin) {
        let admins: i64 =
            tx.query_row("SELECT COUNT(*) FROM users WHERE role = 'admin'", [], |r| {
                r.get(0)
            })?;
        if admins > 0 {
            return Err(CoreError::forbidden("only admin can create admin accounts"));
        }
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        name,
        email,
        role: new.role,
    };
    tx.execute(
        "INSERT INTO users(id, name, email, password_hash, role, created_at)
         VALUES(?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (
            &user.id,
            &user.name,
            &user.email,
            &password_hash,
            user.role.as_str(),
        ),
    )
    .map_err(|e| classify_write(e, "user already exists", "user not found"))?;
    tx.commit()?;

    info!(user_id = %user.id, role = %user.role, "user registered");
    Ok(user)
}

/// Returns the account for a matching email/password pair. Unknown email and
/// wrong password are indistinguishable to the caller.
pub fn verify_credentials(
    conn: &Connection,
    email: &str,
    password: &str,
) -> CoreResult<Option<User>> {
    let found = conn
        .query_row(
            "SELECT id, name, email, role, password_hash FROM users WHERE email = ?",
            [normalize_email(email)],
            user_row,
        )
        .optional()?;
    match found {
        Some((user, hash)) if verify_password(&hash, password) => Ok(Some(user)),
        Some((user, _)) => {
            warn!(user_id = %user.id, "login rejected: bad password");
            Ok(None)
        }
        None => Ok(None),
    }
}

/// True when the actor names an existing account holding the claimed role.
pub fn actor_is_current(conn: &Connection, actor: &Actor) -> CoreResult<bool> {
    Ok(find_user(conn, &actor.id)?.is_some_and(|u| u.role == actor.role))
}

pub fn list_users(conn: &Connection, actor: &Actor) -> CoreResult<Vec<User>> {
    gate(actor, Action::ViewDirectory)?;
    let mut stmt = conn.prepare(
        "SELECT id, name, email, role, password_hash FROM users ORDER BY name, email",
    )?;
    let users = stmt
        .query_map([], user_row)?
        .map(|r| r.map(|(u, _)| u))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

pub fn list_teachers(conn: &Connection) -> CoreResult<Vec<TeacherSummary>> {
    let mut stmt =
        conn.prepare("SELECT id, name FROM users WHERE role = 'teacher' ORDER BY name, id")?;
    let teachers = stmt
        .query_map([], |r| {
            Ok(TeacherSummary {
                id: r.get(0)?,
                name: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(teachers)
}

fn load_teacher_target(conn: &Connection, actor: &Actor, user_id: &str) -> CoreResult<User> {
    // Non-admins are turned away before learning whether the id exists.
    gate(
        actor,
        Action::ManageTeacher {
            target_role: Role::Teacher,
        },
    )?;
    let target =
        find_user(conn, user_id)?.ok_or_else(|| CoreError::not_found("teacher not found"))?;
    gate(
        actor,
        Action::ManageTeacher {
            target_role: target.role,
        },
    )?;
    Ok(target)
}

pub fn update_teacher(
    conn: &Connection,
    actor: &Actor,
    user_id: &str,
    name: &str,
    email: &str,
) -> CoreResult<User> {
    let name = name.trim().to_string();
    let email = normalize_email(email);
    if name.is_empty() {
        return Err(CoreError::validation("name must not be empty"));
    }
    validate_email(&email)?;

    let tx = db::write_tx(conn)?;
    let mut teacher = load_teacher_target(&tx, actor, user_id)?;
    tx.execute(
        "UPDATE users SET name = ?, email = ? WHERE id = ?",
        (&name, &email, user_id),
    )
    .map_err(|e| classify_write(e, "email already in use", "teacher not found"))?;
    tx.commit()?;

    info!(user_id, "teacher updated");
    teacher.name = name;
    teacher.email = email;
    Ok(teacher)
}

pub fn delete_teacher(conn: &Connection, actor: &Actor, user_id: &str) -> CoreResult<()> {
    let tx = db::write_tx(conn)?;
    load_teacher_target(&tx, actor, user_id)?;
    tx.execute("DELETE FROM users WHERE id = ?", [user_id])?;
    tx.commit()?;
    info!(user_id, "teacher deleted");
    Ok(())
}
