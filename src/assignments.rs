use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::db;
use crate::error::{classify_write, CoreError, CoreResult};
use crate::policy::{gate, Action, Actor};
use crate::roster::{self, Student};

pub fn is_assigned(conn: &Connection, teacher_id: &str, student_id: &str) -> CoreResult<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM assignments WHERE teacher_id = ? AND student_id = ?",
            (teacher_id, student_id),
            |r| r.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

pub fn assign(
    conn: &Connection,
    actor: &Actor,
    teacher_id: &str,
    student_id: &str,
) -> CoreResult<()> {
    gate(actor, Action::ManageAssignments)?;
    let tx = db::write_tx(conn)?;
    let teacher_exists = tx
        .query_row("SELECT 1 FROM users WHERE id = ?", [teacher_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some();
    if !teacher_exists {
        return Err(CoreError::not_found("teacher not found"));
    }
    if roster::find_student(&tx, student_id)?.is_none() {
        return Err(CoreError::not_found("student not found"));
    }
    tx.execute(
        "INSERT INTO assignments(teacher_id, student_id) VALUES(?, ?)",
        (teacher_id, student_id),
    )
    .map_err(|e| {
        classify_write(
            e,
            "student already assigned to this teacher",
            "teacher or student not found",
        )
    })?;
    tx.commit()?;
    info!(teacher_id, student_id, "student assigned");
    Ok(())
}

/// Drops the pair. Attendance already marked under it stays in the ledger.
pub fn unassign(
    conn: &Connection,
    actor: &Actor,
    teacher_id: &str,
    student_id: &str,
) -> CoreResult<()> {
    gate(actor, Action::ManageAssignments)?;
    let changed = conn.execute(
        "DELETE FROM assignments WHERE teacher_id = ? AND student_id = ?",
        (teacher_id, student_id),
    )?;
    if changed == 0 {
        return Err(CoreError::not_found("assignment not found"));
    }
    info!(teacher_id, student_id, "student unassigned");
    Ok(())
}

pub fn list_students_for_teacher(conn: &Connection, actor: &Actor) -> CoreResult<Vec<Student>> {
    gate(actor, Action::ViewAssignedStudents)?;
    let mut stmt = conn.prepare(
        "SELECT s.id, s.name, s.roll_number, s.class
         FROM students s
         JOIN assignments a ON a.student_id = s.id
         WHERE a.teacher_id = ?
         ORDER BY s.roll_number",
    )?;
    let students = stmt
        .query_map([&actor.id], roster::student_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(students)
}
