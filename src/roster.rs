use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::db;
use crate::error::{classify_write, CoreError, CoreResult};
use crate::policy::{gate, Action, Actor};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub roll_number: String,
    pub class: i64,
}

#[derive(Debug, Clone)]
pub struct StudentFields {
    pub name: String,
    pub roll_number: String,
    pub class: i64,
}

impl StudentFields {
    fn normalized(self) -> CoreResult<Self> {
        let name = self.name.trim().to_string();
        let roll_number = self.roll_number.trim().to_string();
        if name.is_empty() {
            return Err(CoreError::validation("name must not be empty"));
        }
        if roll_number.is_empty() {
            return Err(CoreError::validation("rollNumber must not be empty"));
        }
        if self.class < 0 {
            return Err(CoreError::validation("class must not be negative"));
        }
        Ok(StudentFields {
            name,
            roll_number,
            class: self.class,
        })
    }
}

pub(crate) fn student_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        name: r.get(1)?,
        roll_number: r.get(2)?,
        class: r.get(3)?,
    })
}

pub fn find_student(conn: &Connection, student_id: &str) -> CoreResult<Option<Student>> {
    Ok(conn
        .query_row(
            "SELECT id, name, roll_number, class FROM students WHERE id = ?",
            [student_id],
            student_row,
        )
        .optional()?)
}

pub fn create_student(
    conn: &Connection,
    actor: &Actor,
    fields: StudentFields,
) -> CoreResult<Student> {
    gate(actor, Action::ManageStudents)?;
    let fields = fields.normalized()?;
    let student = Student {
        id: Uuid::new_v4().to_string(),
        name: fields.name,
        roll_number: fields.roll_number,
        class: fields.class,
    };
    conn.execute(
        "INSERT INTO students(id, name, roll_number, class) VALUES(?, ?, ?, ?)",
        (&student.id, &student.name, &student.roll_number, student.class),
    )
    .map_err(|e| classify_write(e, "roll number already in use", "student not found"))?;
    info!(student_id = %student.id, roll_number = %student.roll_number, "student created");
    Ok(student)
}

pub fn update_student(
    conn: &Connection,
    actor: &Actor,
    student_id: &str,
    fields: StudentFields,
) -> CoreResult<Student> {
    gate(actor, Action::ManageStudents)?;
    let fields = fields.normalized()?;
    let changed = conn
        .execute(
            "UPDATE students SET name = ?, roll_number = ?, class = ? WHERE id = ?",
            (&fields.name, &fields.roll_number, fields.class, student_id),
        )
        .map_err(|e| classify_write(e, "roll number already in use", "student not found"))?;
    if changed == 0 {
        return Err(CoreError::not_found("student not found"));
    }
    info!(student_id, "student updated");
    Ok(Student {
        id: student_id.to_string(),
        name: fields.name,
        roll_number: fields.roll_number,
        class: fields.class,
    })
}

/// Removes the student; assignments and attendance go with it through the
/// schema's cascades.
pub fn delete_student(conn: &Connection, actor: &Actor, student_id: &str) -> CoreResult<()> {
    gate(actor, Action::ManageStudents)?;
    let tx = db::write_tx(conn)?;
    let changed = tx.execute("DELETE FROM students WHERE id = ?", [student_id])?;
    if changed == 0 {
        return Err(CoreError::not_found("student not found"));
    }
    tx.commit()?;
    info!(student_id, "student deleted");
    Ok(())
}

pub fn list_students(conn: &Connection, actor: &Actor) -> CoreResult<Vec<Student>> {
    gate(actor, Action::ViewDirectory)?;
    let mut stmt =
        conn.prepare("SELECT id, name, roll_number, class FROM students ORDER BY roll_number")?;
    let students = stmt
        .query_map([], student_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(students)
}
