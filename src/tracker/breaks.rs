use crate::accounting::time_accountant::minutes_between;
use crate::database::models::{BreakSpan, SpanKind};
use crate::database::queries;
use crate::error::{TrackerError, TrackerResult, conflict_or_store};
use crate::tracker::{merge_notes, require_active_employee};
use crate::utils::time::Clock;
use crate::utils::validation::normalize_text;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const AUTO_END_NOTE: &str = "Automatically ended at clock-out";

#[derive(Debug, Clone)]
pub struct StartBreakRequest {
    pub category_id: i64,
    pub note: Option<String>,
}

impl StartBreakRequest {
    pub fn new(category_id: i64) -> Self {
        Self {
            category_id,
            note: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EndBreakRequest {
    pub note: Option<String>,
}

#[derive(Clone)]
pub struct BreakTracker {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl BreakTracker {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Opens a break. The employee must be present, not already on a break,
    /// and not working; the category must be an active break category.
    pub async fn start_break(
        &self,
        employee_id: i64,
        request: StartBreakRequest,
    ) -> TrackerResult<BreakSpan> {
        require_active_employee(&self.pool, employee_id).await?;

        let now = self.clock.now();
        let note = normalize_text(request.note.as_deref());

        let result = sqlx::query(
            "INSERT INTO break_spans (employee_id, category_id, attendance_span_id, started_at, note)
             SELECT ?, ?, a.id, ?, ?
             FROM attendance_spans a
             WHERE a.employee_id = ? AND a.ended_at IS NULL
               AND NOT EXISTS (
                   SELECT 1 FROM break_spans b WHERE b.employee_id = ? AND b.ended_at IS NULL
               )
               AND NOT EXISTS (
                   SELECT 1 FROM work_spans w WHERE w.employee_id = ? AND w.ended_at IS NULL
               )
               AND EXISTS (
                   SELECT 1 FROM categories c
                   WHERE c.id = ? AND c.kind = 'break' AND c.is_active = TRUE
               )",
        )
        .bind(employee_id)
        .bind(request.category_id)
        .bind(now)
        .bind(&note)
        .bind(employee_id)
        .bind(employee_id)
        .bind(employee_id)
        .bind(request.category_id)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_store(e, employee_id, SpanKind::Break))?;

        if result.rows_affected() == 0 {
            return Err(self
                .explain_rejected_start(employee_id, request.category_id)
                .await?);
        }

        let span = queries::get_break_span(&self.pool, result.last_insert_rowid())
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        info!(
            "Break started: employee_id={}, break_id={}, category_id={}",
            employee_id, span.id, span.category_id
        );
        Ok(span)
    }

    pub async fn end_break(
        &self,
        employee_id: i64,
        request: EndBreakRequest,
    ) -> TrackerResult<BreakSpan> {
        let now = self.clock.now();
        let note = normalize_text(request.note.as_deref());
        let span = self
            .close_open_break(employee_id, now, note.as_deref(), false)
            .await?;

        info!(
            "Break ended: employee_id={}, break_id={}, minutes={:.1}",
            employee_id,
            span.id,
            span.duration_minutes.unwrap_or_default()
        );
        Ok(span)
    }

    /// Closes whatever break is open at `at` on behalf of a clock-out.
    ///
    /// Never fails: a missing break is the normal case and any other error is
    /// logged and swallowed so the clock-out can proceed.
    pub async fn auto_end(&self, employee_id: i64, at: DateTime<Utc>) -> Option<BreakSpan> {
        match self
            .close_open_break(employee_id, at, Some(AUTO_END_NOTE), true)
            .await
        {
            Ok(span) => {
                info!(
                    "Break auto-ended at clock-out: employee_id={}, break_id={}",
                    employee_id, span.id
                );
                Some(span)
            }
            Err(TrackerError::NoActiveBreak(_)) => None,
            Err(e) => {
                warn!(
                    "Failed to auto-end break at clock-out: employee_id={}, error={}",
                    employee_id, e
                );
                None
            }
        }
    }

    pub async fn active_break(&self, employee_id: i64) -> TrackerResult<Option<BreakSpan>> {
        Ok(queries::get_open_break(&self.pool, employee_id).await?)
    }

    pub async fn all_active_breaks(&self) -> TrackerResult<Vec<BreakSpan>> {
        Ok(queries::get_all_open_breaks(&self.pool).await?)
    }

    /// Open breaks whose employee is no longer clocked in.
    pub async fn dangling_breaks(&self) -> TrackerResult<Vec<BreakSpan>> {
        Ok(queries::get_dangling_breaks(&self.pool).await?)
    }

    async fn close_open_break(
        &self,
        employee_id: i64,
        at: DateTime<Utc>,
        note: Option<&str>,
        auto_ended: bool,
    ) -> TrackerResult<BreakSpan> {
        let open = queries::get_open_break(&self.pool, employee_id)
            .await?
            .ok_or(TrackerError::NoActiveBreak(employee_id))?;

        let duration_minutes = minutes_between(open.started_at, at);
        let merged_note = merge_notes(open.note.as_deref(), note);

        let result = sqlx::query(
            "UPDATE break_spans
             SET ended_at = ?, duration_minutes = ?, note = ?, auto_ended = ?,
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = ? AND ended_at IS NULL",
        )
        .bind(at)
        .bind(duration_minutes)
        .bind(&merged_note)
        .bind(auto_ended)
        .bind(open.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TrackerError::NoActiveBreak(employee_id));
        }

        Ok(queries::get_break_span(&self.pool, open.id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?)
    }

    /// Names the precondition a rejected break start violated, in the order
    /// presence, existing break, category, running work session.
    async fn explain_rejected_start(
        &self,
        employee_id: i64,
        category_id: i64,
    ) -> TrackerResult<TrackerError> {
        if queries::get_open_attendance(&self.pool, employee_id)
            .await?
            .is_none()
        {
            return Ok(TrackerError::NotPresent(employee_id));
        }
        if queries::get_open_break(&self.pool, employee_id)
            .await?
            .is_some()
        {
            return Ok(TrackerError::AlreadyOnBreak(employee_id));
        }
        let category_ok = queries::get_category(&self.pool, category_id)
            .await?
            .is_some_and(|category| category.usable_for_break());
        if !category_ok {
            return Ok(TrackerError::InvalidCategory(category_id));
        }
        if queries::get_open_work(&self.pool, employee_id)
            .await?
            .is_some()
        {
            return Ok(TrackerError::AlreadyWorking(employee_id));
        }

        debug!(
            "Break start rejected without a visible violation: employee_id={}",
            employee_id
        );
        Ok(TrackerError::StoreConflict {
            employee_id,
            span: SpanKind::Break,
        })
    }
}
