use crate::accounting::time_accountant::hours_between;
use crate::database::models::{AttendanceSpan, EntryMethod, SpanKind};
use crate::database::queries;
use crate::error::{TrackerError, TrackerResult, conflict_or_store};
use crate::tracker::breaks::BreakTracker;
use crate::tracker::{merge_notes, require_active_employee};
use crate::utils::time::Clock;
use crate::utils::validation::{normalize_text, validate_interval};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct ClockInRequest {
    pub method: EntryMethod,
    pub location: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ClockOutRequest {
    pub method: EntryMethod,
    pub location: Option<String>,
    pub note: Option<String>,
    /// Skip auto-ending an open break.
    pub force: bool,
}

/// Administrative fix of an attendance span. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct AttendanceCorrection {
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

/// Owns clock-in and clock-out, the root of every employee's timeline.
#[derive(Clone)]
pub struct PresenceTracker {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    breaks: BreakTracker,
}

impl PresenceTracker {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>, breaks: BreakTracker) -> Self {
        Self { pool, clock, breaks }
    }

    pub async fn clock_in(
        &self,
        employee_id: i64,
        request: ClockInRequest,
    ) -> TrackerResult<AttendanceSpan> {
        require_active_employee(&self.pool, employee_id).await?;

        let now = self.clock.now();
        let location = normalize_text(request.location.as_deref());
        let note = normalize_text(request.note.as_deref());

        let result = sqlx::query(
            "INSERT INTO attendance_spans (employee_id, started_at, clock_in_method, location, note)
             SELECT ?, ?, ?, ?, ?
             WHERE NOT EXISTS (
                 SELECT 1 FROM attendance_spans WHERE employee_id = ? AND ended_at IS NULL
             )",
        )
        .bind(employee_id)
        .bind(now)
        .bind(request.method.as_str())
        .bind(&location)
        .bind(&note)
        .bind(employee_id)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_store(e, employee_id, SpanKind::Attendance))?;

        if result.rows_affected() == 0 {
            return Err(TrackerError::AlreadyPresent(employee_id));
        }

        let span = queries::get_attendance_span(&self.pool, result.last_insert_rowid())
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        info!(
            "Clock-in: employee_id={}, span_id={}, method={}",
            employee_id, span.id, span.clock_in_method
        );
        Ok(span)
    }

    /// Closes the open attendance. An open break is auto-ended first (unless
    /// `force`), at the same instant, and swept again once the attendance is
    /// closed; its failure never blocks the clock-out.
    /// An open work session is left open and shows up as an anomaly.
    pub async fn clock_out(
        &self,
        employee_id: i64,
        request: ClockOutRequest,
    ) -> TrackerResult<AttendanceSpan> {
        let open = queries::get_open_attendance(&self.pool, employee_id)
            .await?
            .ok_or(TrackerError::NotPresent(employee_id))?;

        let now = self.clock.now();

        if !request.force {
            self.breaks.auto_end(employee_id, now).await;
        }

        if let Some(session) = queries::get_open_work(&self.pool, employee_id).await? {
            warn!(
                "Clock-out leaves work session open: employee_id={}, session_id={}",
                employee_id, session.id
            );
        }

        let duration_hours = hours_between(open.started_at, now);
        let note = merge_notes(
            open.note.as_deref(),
            normalize_text(request.note.as_deref()).as_deref(),
        );
        let location = normalize_text(request.location.as_deref()).or(open.location.clone());

        let result = sqlx::query(
            "UPDATE attendance_spans
             SET ended_at = ?, duration_hours = ?, clock_out_method = ?, location = ?, note = ?,
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = ? AND ended_at IS NULL",
        )
        .bind(now)
        .bind(duration_hours)
        .bind(request.method.as_str())
        .bind(&location)
        .bind(&note)
        .bind(open.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Another terminal clocked the employee out first.
            return Err(TrackerError::NotPresent(employee_id));
        }

        if !request.force {
            // A break may have opened between the first auto-end and the update.
            // No new one can start once the attendance is closed.
            self.breaks.auto_end(employee_id, now).await;
        }

        let span = queries::get_attendance_span(&self.pool, open.id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        info!(
            "Clock-out: employee_id={}, span_id={}, hours={:.2}",
            employee_id, span.id, duration_hours
        );
        Ok(span)
    }

    pub async fn active_span(&self, employee_id: i64) -> TrackerResult<Option<AttendanceSpan>> {
        Ok(queries::get_open_attendance(&self.pool, employee_id).await?)
    }

    pub async fn all_active(&self) -> TrackerResult<Vec<AttendanceSpan>> {
        Ok(queries::get_all_open_attendance(&self.pool).await?)
    }

    /// Rewrites the interval of an attendance span and recomputes its duration.
    pub async fn correct_span(
        &self,
        span_id: i64,
        correction: AttendanceCorrection,
    ) -> TrackerResult<AttendanceSpan> {
        let span = queries::get_attendance_span(&self.pool, span_id)
            .await?
            .ok_or(TrackerError::SpanNotFound {
                span: SpanKind::Attendance,
                id: span_id,
            })?;

        let started_at = correction.started_at.unwrap_or(span.started_at);
        let ended_at = correction.ended_at.or(span.ended_at);
        if let Some(end) = ended_at {
            validate_interval(started_at, end)?;
        }
        let duration_hours = ended_at.map(|end| hours_between(started_at, end));
        let note = normalize_text(correction.note.as_deref()).or(span.note.clone());

        sqlx::query(
            "UPDATE attendance_spans
             SET started_at = ?, ended_at = ?, duration_hours = ?, note = ?,
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = ?",
        )
        .bind(started_at)
        .bind(ended_at)
        .bind(duration_hours)
        .bind(&note)
        .bind(span_id)
        .execute(&self.pool)
        .await?;

        info!(
            "Attendance corrected: span_id={}, employee_id={}",
            span_id, span.employee_id
        );

        Ok(queries::get_attendance_span(&self.pool, span_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?)
    }
}
