//! The single authority for every presence, break and work transition.
//!
//! Each state-changing call is one conditional write against the store: the
//! preconditions are part of the `INSERT … SELECT … WHERE` or
//! `UPDATE … WHERE ended_at IS NULL` statement, so two terminals racing on
//! the same employee can never both pass. When such a write touches no row,
//! the tracker re-reads the state to name the violated precondition.

pub mod breaks;
pub mod presence;
pub mod state;
pub mod work;

pub use breaks::{BreakTracker, EndBreakRequest, StartBreakRequest};
pub use presence::{AttendanceCorrection, ClockInRequest, ClockOutRequest, PresenceTracker};
pub use state::{Anomaly, EmployeeState, EmployeeStatus};
pub use work::{EndSessionRequest, SessionCorrection, StartSessionRequest, WorkTracker};

use crate::database::models::Employee;
use crate::database::queries;
use crate::error::{TrackerError, TrackerResult};
use sqlx::SqlitePool;

/// Appends a closing note to an opening note; neither side is ever dropped.
pub(crate) fn merge_notes(existing: Option<&str>, addition: Option<&str>) -> Option<String> {
    match (existing, addition) {
        (Some(existing), Some(addition)) => Some(format!("{} | {}", existing, addition)),
        (Some(existing), None) => Some(existing.to_string()),
        (None, Some(addition)) => Some(addition.to_string()),
        (None, None) => None,
    }
}

pub(crate) async fn require_active_employee(
    pool: &SqlitePool,
    employee_id: i64,
) -> TrackerResult<Employee> {
    match queries::get_employee(pool, employee_id).await? {
        Some(employee) if employee.is_active => Ok(employee),
        _ => Err(TrackerError::EmployeeNotFound(employee_id)),
    }
}
