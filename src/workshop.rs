//! Entry point shared by every front-end (web sessions, PIN kiosks, the
//! simplified kiosk keyed by employee number). All of them reach the same
//! tracker methods through here.

use crate::accounting::PerformanceAggregator;
use crate::database::models::{BreakSpan, Employee, WorkSpan};
use crate::database::queries;
use crate::error::{TrackerError, TrackerResult};
use crate::tracker::state::{self, EmployeeStatus};
use crate::tracker::{BreakTracker, PresenceTracker, WorkTracker};
use crate::utils::time::Clock;
use chrono::FixedOffset;
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct Workshop {
    pool: SqlitePool,
    presence: PresenceTracker,
    breaks: BreakTracker,
    work: WorkTracker,
    performance: PerformanceAggregator,
}

/// Open spans that no tracker will ever close on its own.
#[derive(Debug, Clone, Default)]
pub struct AnomalyReport {
    pub dangling_sessions: Vec<WorkSpan>,
    pub dangling_breaks: Vec<BreakSpan>,
}

impl AnomalyReport {
    pub fn is_empty(&self) -> bool {
        self.dangling_sessions.is_empty() && self.dangling_breaks.is_empty()
    }
}

impl Workshop {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>, offset: FixedOffset) -> Self {
        let breaks = BreakTracker::new(pool.clone(), clock.clone());
        let presence = PresenceTracker::new(pool.clone(), clock.clone(), breaks.clone());
        let work = WorkTracker::new(pool.clone(), clock.clone());
        let performance = PerformanceAggregator::new(pool.clone(), clock, offset);

        Self {
            pool,
            presence,
            breaks,
            work,
            performance,
        }
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn breaks(&self) -> &BreakTracker {
        &self.breaks
    }

    pub fn work(&self) -> &WorkTracker {
        &self.work
    }

    pub fn performance(&self) -> &PerformanceAggregator {
        &self.performance
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Resolves a kiosk login by employee number to an active employee.
    pub async fn resolve_employee_number(&self, employee_number: &str) -> TrackerResult<Employee> {
        let key = employee_number.trim();
        let found = queries::get_employee_by_number(&self.pool, key).await?;
        active_or_unknown(found, key)
    }

    pub async fn resolve_badge(&self, badge_id: &str) -> TrackerResult<Employee> {
        let key = badge_id.trim();
        let found = queries::get_employee_by_badge(&self.pool, key).await?;
        active_or_unknown(found, key)
    }

    pub async fn status(&self, employee_id: i64) -> TrackerResult<EmployeeStatus> {
        state::current_status(&self.pool, employee_id).await
    }

    pub async fn presence_board(&self) -> TrackerResult<Vec<EmployeeStatus>> {
        state::presence_board(&self.pool).await
    }

    pub async fn anomalies(&self) -> TrackerResult<AnomalyReport> {
        Ok(AnomalyReport {
            dangling_sessions: self.work.dangling_sessions().await?,
            dangling_breaks: self.breaks.dangling_breaks().await?,
        })
    }
}

fn active_or_unknown(found: Option<Employee>, key: &str) -> TrackerResult<Employee> {
    match found {
        Some(employee) if employee.is_active => Ok(employee),
        Some(employee) => Err(TrackerError::EmployeeNotFound(employee.id)),
        None => Err(TrackerError::UnknownEmployeeKey(key.to_string())),
    }
}
