//! Range-scoped aggregation of attendance, break and work time.
//!
//! The three span kinds are summed independently (one range query each)
//! rather than joined, so a person with many sessions inside one attendance
//! never multiplies rows. Open spans count up to the clock's "now" for display
//! only; nothing here writes back to the store.

use crate::accounting::time_accountant::{
    attendance_efficiency, calculated_work_minutes, duration_minutes, idle_minutes, round_money,
    work_cost, work_productivity,
};
use crate::database::models::{
    AttendanceSpan, BreakSpan, Category, Employee, WorkSpan, WorkTarget,
};
use crate::database::queries;
use crate::error::{TrackerError, TrackerResult};
use crate::tracker::state::{self, EmployeeState};
use crate::utils::time::{Clock, local_date, local_range_bounds, start_of_month, start_of_week};
use crate::utils::validation::{DateRange, validate_date_range};
use chrono::{DateTime, Days, FixedOffset, Months, NaiveDate, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Efficiency gaps below this many percentage points count as a tie.
pub const EFFICIENCY_TIE_THRESHOLD: f64 = 1.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SpanTotals {
    pub attendance_minutes: f64,
    pub break_minutes: f64,
    pub work_minutes: f64,
    pub billable_minutes: f64,
    pub productive_minutes: f64,
    pub cost: f64,
    pub session_count: usize,
}

impl SpanTotals {
    pub fn from_spans<'a>(
        attendance: impl IntoIterator<Item = &'a AttendanceSpan>,
        breaks: impl IntoIterator<Item = &'a BreakSpan>,
        work: impl IntoIterator<Item = &'a WorkSpan>,
        categories: &HashMap<i64, Category>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut totals = SpanTotals {
            attendance_minutes: attendance
                .into_iter()
                .map(|span| duration_minutes(span, now))
                .sum(),
            break_minutes: breaks
                .into_iter()
                .map(|span| duration_minutes(span, now))
                .sum(),
            ..SpanTotals::default()
        };

        for session in work {
            let minutes = duration_minutes(session, now);
            totals.work_minutes += minutes;
            totals.session_count += 1;
            if session.is_billable {
                totals.billable_minutes += minutes;
            }
            let productive = match session.target {
                WorkTarget::Order(_) => true,
                WorkTarget::Activity(category_id) => categories
                    .get(&category_id)
                    .is_some_and(|category| category.is_productive),
            };
            if productive {
                totals.productive_minutes += minutes;
            }
            totals.cost += work_cost(session, now).unwrap_or_default();
        }
        totals.cost = round_money(totals.cost);

        totals
    }

    pub fn idle_minutes(&self) -> f64 {
        idle_minutes(self.attendance_minutes, self.break_minutes, self.work_minutes)
    }

    pub fn calculated_work_minutes(&self) -> f64 {
        calculated_work_minutes(self.attendance_minutes, self.break_minutes)
    }

    pub fn attendance_efficiency(&self) -> f64 {
        attendance_efficiency(self.attendance_minutes, self.break_minutes)
    }

    pub fn work_productivity(&self) -> f64 {
        work_productivity(
            self.billable_minutes,
            self.attendance_minutes,
            self.break_minutes,
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakOverrun {
    pub break_id: i64,
    pub category_id: i64,
    pub category_name: String,
    pub minutes: f64,
    pub limit_minutes: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailySummary {
    pub employee_id: i64,
    pub date: NaiveDate,
    pub state: EmployeeState,
    pub totals: SpanTotals,
    pub idle_minutes: f64,
    pub attendance_efficiency: f64,
    pub work_productivity: f64,
    pub first_clock_in: Option<DateTime<Utc>>,
    pub last_clock_out: Option<DateTime<Utc>>,
    pub break_overruns: Vec<BreakOverrun>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Day,
    Week,
    Month,
}

impl Period {
    pub fn bucket_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Period::Day => date,
            Period::Week => start_of_week(date),
            Period::Month => start_of_month(date),
        }
    }

    fn next_bucket(&self, bucket_start: NaiveDate) -> Option<NaiveDate> {
        match self {
            Period::Day => bucket_start.checked_add_days(Days::new(1)),
            Period::Week => bucket_start.checked_add_days(Days::new(7)),
            Period::Month => bucket_start.checked_add_months(Months::new(1)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodStatistics {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub totals: SpanTotals,
    pub idle_minutes: f64,
    pub attendance_efficiency: f64,
    pub work_productivity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceMetrics {
    pub employee_id: i64,
    pub employee_name: String,
    pub totals: SpanTotals,
    pub idle_minutes: f64,
    pub calculated_work_minutes: f64,
    pub attendance_efficiency: f64,
    pub work_productivity: f64,
}

impl PerformanceMetrics {
    pub fn new(employee_id: i64, employee_name: &str, totals: SpanTotals) -> Self {
        Self {
            employee_id,
            employee_name: employee_name.to_string(),
            idle_minutes: totals.idle_minutes(),
            calculated_work_minutes: totals.calculated_work_minutes().max(0.0),
            attendance_efficiency: totals.attendance_efficiency(),
            work_productivity: totals.work_productivity(),
            totals,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedEmployee {
    pub rank: usize,
    pub metrics: PerformanceMetrics,
}

/// Orders employees by attendance efficiency, then work productivity.
///
/// After sorting by efficiency, consecutive employees within
/// [`EFFICIENCY_TIE_THRESHOLD`] of the group's leader form a tie group that
/// is re-ordered by productivity. Grouping against the leader keeps the
/// order total even though "within one point" is not transitive.
pub fn rank_employees(mut metrics: Vec<PerformanceMetrics>) -> Vec<RankedEmployee> {
    metrics.sort_by(|a, b| {
        b.attendance_efficiency
            .total_cmp(&a.attendance_efficiency)
            .then(a.employee_id.cmp(&b.employee_id))
    });

    let mut ordered = Vec::with_capacity(metrics.len());
    let mut remaining = metrics.into_iter().peekable();
    while let Some(leader) = remaining.next() {
        let mut group = vec![leader];
        while let Some(candidate) = remaining.peek() {
            if group[0].attendance_efficiency - candidate.attendance_efficiency
                < EFFICIENCY_TIE_THRESHOLD
            {
                if let Some(member) = remaining.next() {
                    group.push(member);
                }
            } else {
                break;
            }
        }
        group.sort_by(compare_within_tie);
        ordered.extend(group);
    }

    ordered
        .into_iter()
        .enumerate()
        .map(|(index, metrics)| RankedEmployee {
            rank: index + 1,
            metrics,
        })
        .collect()
}

fn compare_within_tie(a: &PerformanceMetrics, b: &PerformanceMetrics) -> Ordering {
    b.work_productivity
        .total_cmp(&a.work_productivity)
        .then(b.attendance_efficiency.total_cmp(&a.attendance_efficiency))
        .then(a.employee_id.cmp(&b.employee_id))
}

struct RangeSpans {
    attendance: Vec<AttendanceSpan>,
    breaks: Vec<BreakSpan>,
    work: Vec<WorkSpan>,
}

#[derive(Clone)]
pub struct PerformanceAggregator {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl PerformanceAggregator {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>, offset: FixedOffset) -> Self {
        Self {
            pool,
            clock,
            offset,
        }
    }

    pub async fn daily_summary(
        &self,
        employee_id: i64,
        date: NaiveDate,
    ) -> TrackerResult<DailySummary> {
        self.require_employee(employee_id).await?;

        let now = self.clock.now();
        let spans = self
            .load_spans(Some(employee_id), DateRange::single_day(date))
            .await?;
        let categories = self.load_categories().await?;
        let totals = SpanTotals::from_spans(
            &spans.attendance,
            &spans.breaks,
            &spans.work,
            &categories,
            now,
        );

        let break_overruns = spans
            .breaks
            .iter()
            .filter_map(|span| {
                let category = categories.get(&span.category_id)?;
                let limit = category.max_duration_minutes?;
                let minutes = duration_minutes(span, now);
                (minutes > limit as f64).then(|| BreakOverrun {
                    break_id: span.id,
                    category_id: category.id,
                    category_name: category.name.clone(),
                    minutes,
                    limit_minutes: limit,
                })
            })
            .collect();

        let status = state::current_status(&self.pool, employee_id).await?;

        Ok(DailySummary {
            employee_id,
            date,
            state: status.state,
            idle_minutes: totals.idle_minutes(),
            attendance_efficiency: totals.attendance_efficiency(),
            work_productivity: totals.work_productivity(),
            first_clock_in: spans.attendance.iter().map(|span| span.started_at).min(),
            last_clock_out: spans.attendance.iter().filter_map(|span| span.ended_at).max(),
            break_overruns,
            totals,
        })
    }

    /// Totals per day, ISO week or month over `range`, for one employee or
    /// the whole team. Buckets are clipped to the range and empty buckets are
    /// returned with zero totals.
    pub async fn statistics(
        &self,
        period: Period,
        range: DateRange,
        employee_id: Option<i64>,
    ) -> TrackerResult<Vec<PeriodStatistics>> {
        validate_date_range(range.from, range.to)?;
        if let Some(employee_id) = employee_id {
            self.require_employee(employee_id).await?;
        }

        let now = self.clock.now();
        let spans = self.load_spans(employee_id, range).await?;
        let categories = self.load_categories().await?;

        let mut buckets = Vec::new();
        let mut bucket = period.bucket_start(range.from);
        while bucket <= range.to {
            let next = period
                .next_bucket(bucket)
                .ok_or_else(|| TrackerError::InvalidDateRange("date out of range".to_string()))?;
            let first = bucket.max(range.from);
            let last = next
                .pred_opt()
                .unwrap_or(next)
                .min(range.to);
            let in_bucket = |at: DateTime<Utc>| {
                let day = local_date(at, self.offset);
                day >= first && day <= last
            };

            let totals = SpanTotals::from_spans(
                spans.attendance.iter().filter(|s| in_bucket(s.started_at)),
                spans.breaks.iter().filter(|s| in_bucket(s.started_at)),
                spans.work.iter().filter(|s| in_bucket(s.started_at)),
                &categories,
                now,
            );

            buckets.push(PeriodStatistics {
                period_start: first,
                period_end: last,
                idle_minutes: totals.idle_minutes(),
                attendance_efficiency: totals.attendance_efficiency(),
                work_productivity: totals.work_productivity(),
                totals,
            });
            bucket = next;
        }

        Ok(buckets)
    }

    pub async fn performance_metrics(
        &self,
        employee_id: i64,
        range: DateRange,
    ) -> TrackerResult<PerformanceMetrics> {
        validate_date_range(range.from, range.to)?;
        let employee = self.require_employee(employee_id).await?;

        let now = self.clock.now();
        let spans = self.load_spans(Some(employee_id), range).await?;
        let categories = self.load_categories().await?;
        let totals = SpanTotals::from_spans(
            &spans.attendance,
            &spans.breaks,
            &spans.work,
            &categories,
            now,
        );

        Ok(PerformanceMetrics::new(employee.id, &employee.name, totals))
    }

    /// Ranks every active employee over `range`.
    pub async fn team_ranking(&self, range: DateRange) -> TrackerResult<Vec<RankedEmployee>> {
        validate_date_range(range.from, range.to)?;

        let now = self.clock.now();
        let employees = queries::list_active_employees(&self.pool).await?;
        let spans = self.load_spans(None, range).await?;
        let categories = self.load_categories().await?;

        let metrics = employees
            .iter()
            .map(|employee| {
                let totals = SpanTotals::from_spans(
                    spans.attendance.iter().filter(|s| s.employee_id == employee.id),
                    spans.breaks.iter().filter(|s| s.employee_id == employee.id),
                    spans.work.iter().filter(|s| s.employee_id == employee.id),
                    &categories,
                    now,
                );
                PerformanceMetrics::new(employee.id, &employee.name, totals)
            })
            .collect();

        Ok(rank_employees(metrics))
    }

    async fn require_employee(&self, employee_id: i64) -> TrackerResult<Employee> {
        queries::get_employee(&self.pool, employee_id)
            .await?
            .ok_or(TrackerError::EmployeeNotFound(employee_id))
    }

    async fn load_spans(
        &self,
        employee_id: Option<i64>,
        range: DateRange,
    ) -> TrackerResult<RangeSpans> {
        let (from, to) = local_range_bounds(range.from, range.to, self.offset);
        debug!(
            "Loading spans: employee_id={:?}, from={}, to={}",
            employee_id, from, to
        );

        Ok(RangeSpans {
            attendance: queries::get_attendance_between(&self.pool, employee_id, from, to).await?,
            breaks: queries::get_breaks_between(&self.pool, employee_id, from, to).await?,
            work: queries::get_work_between(&self.pool, employee_id, from, to).await?,
        })
    }

    async fn load_categories(&self) -> TrackerResult<HashMap<i64, Category>> {
        Ok(queries::list_categories(&self.pool)
            .await?
            .into_iter()
            .map(|category| (category.id, category))
            .collect())
    }
}
