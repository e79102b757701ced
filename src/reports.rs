use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::db;
use crate::error::CoreResult;
use crate::ledger::{self, Status};
use crate::policy::{gate, Action, Actor};

/// Two-decimal percentage, halves going to the even digit (5/32 is 15.62).
/// Callers never pass `total == 0`: a group only exists once it has a row.
pub fn present_percent(present: u32, total: u32) -> f64 {
    let pct = present as f64 / total as f64 * 100.0;
    (pct * 100.0).round_ties_even() / 100.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Tally {
    total: u32,
    present: u32,
}

impl Tally {
    fn add(&mut self, status: Status) {
        self.total += 1;
        if status == Status::Present {
            self.present += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRollup {
    pub student_id: String,
    pub name: String,
    pub roll_number: String,
    pub total_days: u32,
    pub present_days: u32,
    pub absent_days: u32,
    pub present_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthRollup {
    pub month: String,
    pub total_days: u32,
    pub present_days: u32,
    pub absent_days: u32,
    pub present_percent: f64,
}

#[derive(Debug, Clone)]
struct LedgerRow {
    student_id: String,
    name: String,
    roll_number: String,
    date: NaiveDate,
    status: Status,
}

/// Reads every ledger row inside one read transaction so both groupings see
/// the same state.
fn snapshot(conn: &Connection) -> CoreResult<Vec<LedgerRow>> {
    let tx = db::read_tx(conn)?;
    let rows = {
        let mut stmt = tx.prepare(
            "SELECT r.student_id, s.name, s.roll_number, r.date, r.status
             FROM attendance r
             JOIN students s ON s.id = r.student_id",
        )?;
        let rows = stmt
            .query_map([], |r| {
                Ok(LedgerRow {
                    student_id: r.get(0)?,
                    name: r.get(1)?,
                    roll_number: r.get(2)?,
                    date: r.get(3)?,
                    status: ledger::status_column(r, 4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };
    tx.commit()?;
    Ok(rows)
}

fn by_student(rows: &[LedgerRow]) -> Vec<StudentRollup> {
    let mut groups: BTreeMap<&str, (&LedgerRow, Tally)> = BTreeMap::new();
    for row in rows {
        groups
            .entry(row.student_id.as_str())
            .or_insert((row, Tally::default()))
            .1
            .add(row.status);
    }
    groups
        .into_values()
        .map(|(first, t)| StudentRollup {
            student_id: first.student_id.clone(),
            name: first.name.clone(),
            roll_number: first.roll_number.clone(),
            total_days: t.total,
            present_days: t.present,
            absent_days: t.total - t.present,
            present_percent: present_percent(t.present, t.total),
        })
        .collect()
}

fn by_month(rows: &[LedgerRow]) -> Vec<MonthRollup> {
    let mut groups: BTreeMap<String, Tally> = BTreeMap::new();
    for row in rows {
        groups
            .entry(row.date.format("%Y-%m").to_string())
            .or_default()
            .add(row.status);
    }
    groups
        .into_iter()
        .map(|(month, t)| MonthRollup {
            month,
            total_days: t.total,
            present_days: t.present,
            absent_days: t.total - t.present,
            present_percent: present_percent(t.present, t.total),
        })
        .collect()
}

pub fn student_wise_report(conn: &Connection, actor: &Actor) -> CoreResult<Vec<StudentRollup>> {
    gate(actor, Action::AggregateReports)?;
    Ok(by_student(&snapshot(conn)?))
}

pub fn month_wise_report(conn: &Connection, actor: &Actor) -> CoreResult<Vec<MonthRollup>> {
    gate(actor, Action::AggregateReports)?;
    Ok(by_month(&snapshot(conn)?))
}
