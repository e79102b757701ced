//! Who may do what. Every operation builds an [`Action`] describing the facts
//! it is about to act on and runs it through [`authorize`] before touching
//! the ledger. Nothing in here reads storage.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "teacher" => Ok(Role::Teacher),
            other => Err(CoreError::validation(format!(
                "role must be admin or teacher, got {:?}",
                other
            ))),
        }
    }
}

/// The verified identity a request runs as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action<'a> {
    ManageStudents,
    ViewDirectory,
    ManageTeacher { target_role: Role },
    ManageAssignments,
    ViewAssignedStudents,
    MarkAttendance { assigned: bool },
    AmendAttendance { marked_by: &'a str },
    ViewAttendance,
    AggregateReports,
}

/// A refused action, carrying the rule it violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Denied {
    pub rule: &'static str,
}

impl From<Denied> for CoreError {
    fn from(d: Denied) -> Self {
        CoreError::forbidden(d.rule)
    }
}

fn require(ok: bool, rule: &'static str) -> Result<(), Denied> {
    if ok {
        Ok(())
    } else {
        Err(Denied { rule })
    }
}

pub fn authorize(actor: &Actor, action: Action<'_>) -> Result<(), Denied> {
    let admin = actor.role == Role::Admin;
    let teacher = actor.role == Role::Teacher;
    match action {
        Action::ManageStudents => {
            require(admin, "only admin can create, update or delete students")
        }
        Action::ViewDirectory => require(admin, "only admin can view all students and users"),
        Action::ManageTeacher { target_role } => {
            require(admin, "only admin can update or delete teachers")?;
            require(
                target_role == Role::Teacher,
                "only teacher accounts can be updated or deleted",
            )
        }
        Action::ManageAssignments => {
            require(admin, "only admin can assign or unassign students")
        }
        Action::ViewAssignedStudents => {
            require(teacher, "only teacher can view assigned students")
        }
        Action::MarkAttendance { assigned } => {
            require(teacher, "only teacher can mark attendance")?;
            require(assigned, "student not assigned to you")
        }
        Action::AmendAttendance { marked_by } => require(
            admin || (teacher && marked_by == actor.id),
            "you can update only attendance you marked",
        ),
        // Scoping happens in the ledger query; both roles may ask.
        Action::ViewAttendance => Ok(()),
        Action::AggregateReports => {
            require(admin, "only admin can generate aggregate reports")
        }
    }
}

/// [`authorize`] for operations: a refusal is logged and becomes
/// `CoreError::Forbidden`.
pub fn gate(actor: &Actor, action: Action<'_>) -> CoreResult<()> {
    authorize(actor, action).map_err(|d| {
        warn!(actor_id = %actor.id, role = %actor.role, rule = d.rule, "denied");
        CoreError::from(d)
    })
}
