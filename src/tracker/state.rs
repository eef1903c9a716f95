//! Per-employee state, always derived from the open spans and never stored.

use crate::database::models::{AttendanceSpan, BreakSpan, WorkSpan};
use crate::database::queries;
use crate::error::TrackerResult;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmployeeState {
    Absent,
    PresentIdle,
    PresentBreak,
    PresentWorking,
}

impl EmployeeState {
    /// State implied by which spans are open. Open sub-spans without an open
    /// attendance do not make an employee present.
    pub fn derive(present: bool, on_break: bool, working: bool) -> Self {
        match (present, on_break, working) {
            (false, _, _) => EmployeeState::Absent,
            (true, true, _) => EmployeeState::PresentBreak,
            (true, false, true) => EmployeeState::PresentWorking,
            (true, false, false) => EmployeeState::PresentIdle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmployeeState::Absent => "absent",
            EmployeeState::PresentIdle => "present",
            EmployeeState::PresentBreak => "on break",
            EmployeeState::PresentWorking => "working",
        }
    }
}

impl fmt::Display for EmployeeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inconsistencies between open spans that are reported, never auto-repaired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    DanglingSession { session_id: i64 },
    DanglingBreak { break_id: i64 },
    BreakDuringSession { break_id: i64, session_id: i64 },
}

#[derive(Debug, Clone, Serialize)]
pub struct EmployeeStatus {
    pub employee_id: i64,
    pub state: EmployeeState,
    pub attendance: Option<AttendanceSpan>,
    pub active_break: Option<BreakSpan>,
    pub active_session: Option<WorkSpan>,
    pub anomalies: Vec<Anomaly>,
}

impl EmployeeStatus {
    pub fn from_open_spans(
        employee_id: i64,
        attendance: Option<AttendanceSpan>,
        active_break: Option<BreakSpan>,
        active_session: Option<WorkSpan>,
    ) -> Self {
        let state = EmployeeState::derive(
            attendance.is_some(),
            active_break.is_some(),
            active_session.is_some(),
        );

        let mut anomalies = Vec::new();
        if attendance.is_none() {
            if let Some(session) = &active_session {
                anomalies.push(Anomaly::DanglingSession {
                    session_id: session.id,
                });
            }
            if let Some(open_break) = &active_break {
                anomalies.push(Anomaly::DanglingBreak {
                    break_id: open_break.id,
                });
            }
        }
        if let (Some(open_break), Some(session)) = (&active_break, &active_session) {
            anomalies.push(Anomaly::BreakDuringSession {
                break_id: open_break.id,
                session_id: session.id,
            });
        }

        Self {
            employee_id,
            state,
            attendance,
            active_break,
            active_session,
            anomalies,
        }
    }
}

pub async fn current_status(pool: &SqlitePool, employee_id: i64) -> TrackerResult<EmployeeStatus> {
    let attendance = queries::get_open_attendance(pool, employee_id).await?;
    let active_break = queries::get_open_break(pool, employee_id).await?;
    let active_session = queries::get_open_work(pool, employee_id).await?;

    Ok(EmployeeStatus::from_open_spans(
        employee_id,
        attendance,
        active_break,
        active_session,
    ))
}

/// Status of every active employee plus anyone with an open span.
pub async fn presence_board(pool: &SqlitePool) -> TrackerResult<Vec<EmployeeStatus>> {
    let employees = queries::list_active_employees(pool).await?;
    let mut attendance: HashMap<i64, AttendanceSpan> = queries::get_all_open_attendance(pool)
        .await?
        .into_iter()
        .map(|span| (span.employee_id, span))
        .collect();
    let mut breaks: HashMap<i64, BreakSpan> = queries::get_all_open_breaks(pool)
        .await?
        .into_iter()
        .map(|span| (span.employee_id, span))
        .collect();
    let mut sessions: HashMap<i64, WorkSpan> = queries::get_all_open_work(pool)
        .await?
        .into_iter()
        .map(|span| (span.employee_id, span))
        .collect();

    let mut ids: Vec<i64> = employees.iter().map(|employee| employee.id).collect();
    let listed: HashSet<i64> = ids.iter().copied().collect();
    // Archived employees with open spans, in id order.
    let unlisted: BTreeSet<i64> = attendance
        .keys()
        .chain(breaks.keys())
        .chain(sessions.keys())
        .filter(|id| !listed.contains(id))
        .copied()
        .collect();
    ids.extend(unlisted);

    Ok(ids
        .into_iter()
        .map(|id| {
            EmployeeStatus::from_open_spans(
                id,
                attendance.remove(&id),
                breaks.remove(&id),
                sessions.remove(&id),
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use EmployeeState::*;

    #[test]
    fn state_follows_open_spans() {
        assert_eq!(EmployeeState::derive(false, false, false), Absent);
        assert_eq!(EmployeeState::derive(true, false, false), PresentIdle);
        assert_eq!(EmployeeState::derive(true, true, false), PresentBreak);
        assert_eq!(EmployeeState::derive(true, false, true), PresentWorking);
        assert_eq!(EmployeeState::derive(false, false, true), Absent);
    }

    #[test]
    fn open_session_without_attendance_is_reported() {
        let status = EmployeeStatus::from_open_spans(
            3,
            None,
            None,
            Some(WorkSpan {
                id: 11,
                employee_id: 3,
                target: crate::database::models::WorkTarget::Activity(2),
                task_description: None,
                started_at: chrono::Utc::now(),
                ended_at: None,
                duration_minutes: None,
                hourly_rate: None,
                is_billable: false,
                cost: None,
                method: crate::database::models::EntryMethod::Kiosk,
                note: None,
            }),
        );
        assert_eq!(status.state, Absent);
        assert_eq!(status.anomalies, vec![Anomaly::DanglingSession { session_id: 11 }]);
    }
}
