use crate::accounting::time_accountant::{cost, minutes_between};
use crate::database::models::{EntryMethod, SpanKind, WorkSpan, WorkTarget};
use crate::database::queries;
use crate::error::{TrackerError, TrackerResult, conflict_or_store};
use crate::tracker::{merge_notes, require_active_employee};
use crate::utils::time::Clock;
use crate::utils::validation::{normalize_text, validate_hourly_rate, validate_interval};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info};

/// Input for opening a work session. Exactly one of `order_id` and
/// `category_id` must be set.
#[derive(Debug, Clone, Default)]
pub struct StartSessionRequest {
    pub order_id: Option<i64>,
    pub category_id: Option<i64>,
    pub task_description: Option<String>,
    /// Falls back to the employee's rate for billable sessions.
    pub hourly_rate: Option<f64>,
    pub note: Option<String>,
    pub method: EntryMethod,
}

impl StartSessionRequest {
    pub fn for_order(order_id: i64) -> Self {
        Self {
            order_id: Some(order_id),
            ..Self::default()
        }
    }

    pub fn for_activity(category_id: i64) -> Self {
        Self {
            category_id: Some(category_id),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EndSessionRequest {
    pub note: Option<String>,
    /// For a session left open by a clock-out, close it at the clock-out
    /// time instead of now.
    pub force: bool,
}

/// Administrative edit of a work session. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct SessionCorrection {
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub category_id: Option<i64>,
    pub task_description: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct TargetTerms {
    is_billable: bool,
}

#[derive(Clone)]
pub struct WorkTracker {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl WorkTracker {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Opens a work session against an order or an activity category.
    ///
    /// Starting on an order in status `created` moves it to `in_progress` in
    /// the same transaction as the insert.
    pub async fn start_session(
        &self,
        employee_id: i64,
        request: StartSessionRequest,
    ) -> TrackerResult<WorkSpan> {
        let employee = require_active_employee(&self.pool, employee_id).await?;
        validate_hourly_rate(request.hourly_rate)?;

        let terms = self
            .check_start_preconditions(employee_id, request.order_id, request.category_id)
            .await?;
        let target = WorkTarget::from_columns(request.order_id, request.category_id)
            .ok_or(TrackerError::ConflictingTarget)?;

        let hourly_rate = if terms.is_billable {
            request.hourly_rate.or(employee.hourly_rate)
        } else {
            request.hourly_rate
        };
        let task_description = normalize_text(request.task_description.as_deref());
        let note = normalize_text(request.note.as_deref());
        let now = self.clock.now();

        let (target_guard, target_id) = match target {
            WorkTarget::Order(order_id) => (
                "EXISTS (SELECT 1 FROM orders o
                         WHERE o.id = ? AND o.status IN ('created', 'in_progress'))",
                order_id,
            ),
            WorkTarget::Activity(category_id) => (
                "EXISTS (SELECT 1 FROM categories c
                         WHERE c.id = ? AND c.is_active = TRUE AND c.kind <> 'break')",
                category_id,
            ),
        };
        let sql = format!(
            "INSERT INTO work_spans (employee_id, order_id, category_id, task_description,
                                     started_at, hourly_rate, is_billable, method, note)
             SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?
             WHERE NOT EXISTS (
                 SELECT 1 FROM work_spans w WHERE w.employee_id = ? AND w.ended_at IS NULL
             )
               AND EXISTS (
                 SELECT 1 FROM attendance_spans a WHERE a.employee_id = ? AND a.ended_at IS NULL
             )
               AND NOT EXISTS (
                 SELECT 1 FROM break_spans b WHERE b.employee_id = ? AND b.ended_at IS NULL
             )
               AND {target_guard}"
        );

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(&sql)
            .bind(employee_id)
            .bind(target.order_id())
            .bind(target.category_id())
            .bind(&task_description)
            .bind(now)
            .bind(hourly_rate)
            .bind(terms.is_billable)
            .bind(request.method.as_str())
            .bind(&note)
            .bind(employee_id)
            .bind(employee_id)
            .bind(employee_id)
            .bind(target_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| conflict_or_store(e, employee_id, SpanKind::Work))?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(self
                .explain_rejected_start(employee_id, request.order_id, request.category_id)
                .await?);
        }
        let session_id = result.last_insert_rowid();

        if let WorkTarget::Order(order_id) = target {
            let promoted = sqlx::query(
                "UPDATE orders SET status = 'in_progress', updated_at = ?
                 WHERE id = ? AND status = 'created'",
            )
            .bind(now)
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

            if promoted.rows_affected() == 1 {
                info!(
                    "Order promoted to in_progress: order_id={}, session_id={}",
                    order_id, session_id
                );
            }
        }

        tx.commit().await?;

        let span = queries::get_work_span(&self.pool, session_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        info!(
            "Work session started: employee_id={}, session_id={}, method={}",
            employee_id, span.id, span.method
        );
        Ok(span)
    }

    /// Closes the open session, fixing its duration and cost.
    pub async fn end_session(
        &self,
        employee_id: i64,
        request: EndSessionRequest,
    ) -> TrackerResult<WorkSpan> {
        let open = queries::get_open_work(&self.pool, employee_id)
            .await?
            .ok_or(TrackerError::NoActiveSession(employee_id))?;

        let now = self.clock.now();
        let ended_at = if request.force {
            self.dangling_close_time(&open).await?.unwrap_or(now)
        } else {
            now
        };

        let duration_minutes = minutes_between(open.started_at, ended_at);
        let session_cost = cost(duration_minutes, open.hourly_rate);
        let note = merge_notes(
            open.note.as_deref(),
            normalize_text(request.note.as_deref()).as_deref(),
        );

        let result = sqlx::query(
            "UPDATE work_spans
             SET ended_at = ?, duration_minutes = ?, cost = ?, note = ?,
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = ? AND ended_at IS NULL",
        )
        .bind(ended_at)
        .bind(duration_minutes)
        .bind(session_cost)
        .bind(&note)
        .bind(open.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TrackerError::NoActiveSession(employee_id));
        }

        let span = queries::get_work_span(&self.pool, open.id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        info!(
            "Work session ended: employee_id={}, session_id={}, minutes={:.1}",
            employee_id, span.id, duration_minutes
        );
        Ok(span)
    }

    pub async fn active_session(&self, employee_id: i64) -> TrackerResult<Option<WorkSpan>> {
        Ok(queries::get_open_work(&self.pool, employee_id).await?)
    }

    pub async fn all_active_sessions(&self) -> TrackerResult<Vec<WorkSpan>> {
        Ok(queries::get_all_open_work(&self.pool).await?)
    }

    /// Sessions still open although their employee clocked out.
    pub async fn dangling_sessions(&self) -> TrackerResult<Vec<WorkSpan>> {
        Ok(queries::get_dangling_work(&self.pool).await?)
    }

    /// Rewrites a session and recomputes every derived value from the new
    /// interval.
    pub async fn update_session(
        &self,
        session_id: i64,
        correction: SessionCorrection,
    ) -> TrackerResult<WorkSpan> {
        let span = queries::get_work_span(&self.pool, session_id)
            .await?
            .ok_or(TrackerError::SpanNotFound {
                span: SpanKind::Work,
                id: session_id,
            })?;

        let started_at = correction.started_at.unwrap_or(span.started_at);
        let ended_at = correction.ended_at.or(span.ended_at);
        if let Some(end) = ended_at {
            validate_interval(started_at, end)?;
        }

        let mut is_billable = span.is_billable;
        let target = match (correction.category_id, span.target) {
            (None, target) => target,
            (Some(_), WorkTarget::Order(_)) => return Err(TrackerError::ConflictingTarget),
            (Some(category_id), WorkTarget::Activity(_)) => {
                let category = queries::get_category(&self.pool, category_id)
                    .await?
                    .filter(|category| category.usable_for_work())
                    .ok_or(TrackerError::InvalidCategory(category_id))?;
                is_billable = category.is_billable;
                WorkTarget::Activity(category.id)
            }
        };

        let duration_minutes = ended_at.map(|end| minutes_between(started_at, end));
        let session_cost = duration_minutes.and_then(|minutes| cost(minutes, span.hourly_rate));
        let task_description =
            normalize_text(correction.task_description.as_deref()).or(span.task_description.clone());
        let note = normalize_text(correction.note.as_deref()).or(span.note.clone());

        sqlx::query(
            "UPDATE work_spans
             SET started_at = ?, ended_at = ?, duration_minutes = ?, cost = ?, category_id = ?,
                 is_billable = ?, task_description = ?, note = ?, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?",
        )
        .bind(started_at)
        .bind(ended_at)
        .bind(duration_minutes)
        .bind(session_cost)
        .bind(target.category_id())
        .bind(is_billable)
        .bind(&task_description)
        .bind(&note)
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        info!(
            "Work session corrected: session_id={}, employee_id={}",
            session_id, span.employee_id
        );

        Ok(queries::get_work_span(&self.pool, session_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?)
    }

    pub async fn delete_session(&self, session_id: i64) -> TrackerResult<WorkSpan> {
        let span = queries::get_work_span(&self.pool, session_id)
            .await?
            .ok_or(TrackerError::SpanNotFound {
                span: SpanKind::Work,
                id: session_id,
            })?;

        sqlx::query("DELETE FROM work_spans WHERE id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        info!(
            "Work session deleted: session_id={}, employee_id={}",
            session_id, span.employee_id
        );
        Ok(span)
    }

    /// End of the attendance a dangling session outlived, if it has one.
    async fn dangling_close_time(&self, session: &WorkSpan) -> TrackerResult<Option<DateTime<Utc>>> {
        if queries::get_open_attendance(&self.pool, session.employee_id)
            .await?
            .is_some()
        {
            return Ok(None);
        }
        let last = queries::get_last_closed_attendance(&self.pool, session.employee_id).await?;
        Ok(last
            .and_then(|span| span.ended_at)
            .filter(|ended_at| *ended_at > session.started_at))
    }

    /// Checks, in order: no open session, presence, no open break, then the
    /// order or category the session is booked against.
    async fn check_start_preconditions(
        &self,
        employee_id: i64,
        order_id: Option<i64>,
        category_id: Option<i64>,
    ) -> TrackerResult<TargetTerms> {
        if queries::get_open_work(&self.pool, employee_id)
            .await?
            .is_some()
        {
            return Err(TrackerError::AlreadyWorking(employee_id));
        }
        if queries::get_open_attendance(&self.pool, employee_id)
            .await?
            .is_none()
        {
            return Err(TrackerError::NotPresent(employee_id));
        }
        if queries::get_open_break(&self.pool, employee_id)
            .await?
            .is_some()
        {
            return Err(TrackerError::OnBreak(employee_id));
        }

        match WorkTarget::from_columns(order_id, category_id) {
            None => Err(TrackerError::ConflictingTarget),
            Some(WorkTarget::Order(order_id)) => {
                let order = queries::get_order(&self.pool, order_id)
                    .await?
                    .ok_or(TrackerError::OrderNotFound(order_id))?;
                if !order.status.accepts_work() {
                    return Err(TrackerError::OrderNotActive(order_id));
                }
                Ok(TargetTerms { is_billable: true })
            }
            Some(WorkTarget::Activity(category_id)) => {
                let category = queries::get_category(&self.pool, category_id)
                    .await?
                    .filter(|category| category.usable_for_work())
                    .ok_or(TrackerError::InvalidCategory(category_id))?;
                Ok(TargetTerms {
                    is_billable: category.is_billable,
                })
            }
        }
    }

    async fn explain_rejected_start(
        &self,
        employee_id: i64,
        order_id: Option<i64>,
        category_id: Option<i64>,
    ) -> TrackerResult<TrackerError> {
        match self
            .check_start_preconditions(employee_id, order_id, category_id)
            .await
        {
            Err(TrackerError::Store(e)) => Err(TrackerError::Store(e)),
            Err(violation) => Ok(violation),
            Ok(_) => {
                debug!(
                    "Session start rejected without a visible violation: employee_id={}",
                    employee_id
                );
                Ok(TrackerError::StoreConflict {
                    employee_id,
                    span: SpanKind::Work,
                })
            }
        }
    }
}
