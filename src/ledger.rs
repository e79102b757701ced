//! The attendance ledger: at most one row per (student, date) slot.
//!
//! A slot starts unmarked. The assigned teacher marks it once; after that
//! only its status changes, by the same teacher or an admin. Nothing ever
//! returns a slot to unmarked.

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use crate::assignments;
use crate::db;
use crate::error::{classify_write, CoreError, CoreResult};
use crate::policy::{gate, Action, Actor, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Present,
    Absent,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Present => "present",
            Status::Absent => "absent",
        }
    }

    pub fn from_flag(present: bool) -> Self {
        if present {
            Status::Present
        } else {
            Status::Absent
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" => Ok(Status::Present),
            "absent" => Ok(Status::Absent),
            other => Err(CoreError::validation(format!(
                "status must be present or absent, got {:?}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub student_id: String,
    pub date: NaiveDate,
    pub status: Status,
    pub marked_by: String,
}

pub fn parse_date(raw: &str) -> CoreResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| CoreError::validation(format!("date must be YYYY-MM-DD, got {:?}", raw)))
}

/// Reads a stored status, failing the row on anything but a known value.
pub(crate) fn status_column(r: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Status> {
    let raw: String = r.get(idx)?;
    raw.parse::<Status>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn record_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    Ok(AttendanceRecord {
        id: r.get(0)?,
        student_id: r.get(1)?,
        date: r.get(2)?,
        status: status_column(r, 3)?,
        marked_by: r.get(4)?,
    })
}

fn find_slot(
    conn: &Connection,
    student_id: &str,
    date: NaiveDate,
) -> CoreResult<Option<AttendanceRecord>> {
    Ok(conn
        .query_row(
            "SELECT id, student_id, date, status, marked_by
             FROM attendance
             WHERE student_id = ? AND date = ?",
            (student_id, date),
            record_row,
        )
        .optional()?)
}

/// Records the first status for a slot. The assignment check, the slot check
/// and the insert share one write transaction; the unique index still has
/// the last word if another connection wins the slot first.
pub fn mark_attendance(
    conn: &Connection,
    actor: &Actor,
    student_id: &str,
    date: NaiveDate,
    status: Status,
) -> CoreResult<AttendanceRecord> {
    let tx = db::write_tx(conn)?;
    let assigned =
        actor.role == Role::Teacher && assignments::is_assigned(&tx, &actor.id, student_id)?;
    gate(actor, Action::MarkAttendance { assigned })?;

    if find_slot(&tx, student_id, date)?.is_some() {
        return Err(CoreError::conflict("attendance already marked"));
    }

    let record = AttendanceRecord {
        id: Uuid::new_v4().to_string(),
        student_id: student_id.to_string(),
        date,
        status,
        marked_by: actor.id.clone(),
    };
    tx.execute(
        "INSERT INTO attendance(id, student_id, date, status, marked_by) VALUES(?, ?, ?, ?, ?)",
        (
            &record.id,
            &record.student_id,
            record.date,
            record.status.as_str(),
            &record.marked_by,
        ),
    )
    .map_err(|e| classify_write(e, "attendance already marked", "student not found"))?;
    tx.commit()?;

    info!(student_id, %date, %status, teacher_id = %actor.id, "attendance marked");
    Ok(record)
}

/// Changes the status of a marked slot. Date and marker stay as they were.
pub fn update_attendance(
    conn: &Connection,
    actor: &Actor,
    student_id: &str,
    date: NaiveDate,
    status: Status,
) -> CoreResult<AttendanceRecord> {
    let tx = db::write_tx(conn)?;
    let mut record = find_slot(&tx, student_id, date)?
        .ok_or_else(|| CoreError::not_found("attendance not found"))?;
    gate(
        actor,
        Action::AmendAttendance {
            marked_by: &record.marked_by,
        },
    )?;

    tx.execute(
        "UPDATE attendance SET status = ? WHERE id = ?",
        (status.as_str(), &record.id),
    )?;
    tx.commit()?;

    info!(
        student_id,
        %date,
        from = %record.status,
        to = %status,
        actor_id = %actor.id,
        "attendance updated"
    );
    record.status = status;
    Ok(record)
}

/// Admin sees every row. A teacher sees rows for the students assigned to
/// them right now, whoever marked them; dropping an assignment hides that
/// student's history from the teacher.
pub fn list_records(conn: &Connection, actor: &Actor) -> CoreResult<Vec<AttendanceRecord>> {
    gate(actor, Action::ViewAttendance)?;
    let records = match actor.role {
        Role::Admin => {
            let mut stmt = conn.prepare(
                "SELECT id, student_id, date, status, marked_by
                 FROM attendance
                 ORDER BY date, student_id",
            )?;
            let rows = stmt
                .query_map([], record_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
        Role::Teacher => {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.student_id, r.date, r.status, r.marked_by
                 FROM attendance r
                 JOIN assignments a ON a.student_id = r.student_id
                 WHERE a.teacher_id = ?
                 ORDER BY r.date, r.student_id",
            )?;
            let rows = stmt
                .query_map([&actor.id], record_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };
    Ok(records)
}
