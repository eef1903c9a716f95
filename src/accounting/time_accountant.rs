//! Pure time accounting: durations, cost and the two efficiency stages.
//!
//! Nothing in here touches the store. Open spans are measured up to the
//! `now` handed in by the caller; closed spans always report the value fixed
//! when they were closed.

use crate::database::models::{Span, WorkSpan};
use chrono::{DateTime, Utc};

pub fn elapsed_seconds(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    end.signed_duration_since(start).num_seconds().max(0)
}

pub fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    elapsed_seconds(start, end) as f64 / 60.0
}

pub fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    elapsed_seconds(start, end) as f64 / 3600.0
}

/// Minutes covered by a span: the fixed value once closed, otherwise the
/// running time up to `now`.
pub fn duration_minutes<S: Span>(span: &S, now: DateTime<Utc>) -> f64 {
    match (span.fixed_minutes(), span.ended_at()) {
        (Some(fixed), Some(_)) => fixed,
        (_, Some(end)) => minutes_between(span.started_at(), end),
        (_, None) => minutes_between(span.started_at(), now),
    }
}

/// `(minutes / 60) × rate`, stored unrounded. `None` without a rate.
/// Only sums and rendered amounts are rounded to cents.
pub fn cost(duration_minutes: f64, hourly_rate: Option<f64>) -> Option<f64> {
    hourly_rate.map(|rate| duration_minutes / 60.0 * rate)
}

/// Cost of a work span as of `now`; closed spans report their fixed cost.
pub fn work_cost(span: &WorkSpan, now: DateTime<Utc>) -> Option<f64> {
    if span.ended_at.is_some() {
        return span.cost;
    }
    cost(duration_minutes(span, now), span.hourly_rate)
}

/// Present time that was not spent on breaks.
pub fn calculated_work_minutes(attendance_minutes: f64, break_minutes: f64) -> f64 {
    attendance_minutes - break_minutes
}

/// Stage 1: `(attendance − break) / attendance × 100`, 0 without attendance.
pub fn attendance_efficiency(attendance_minutes: f64, break_minutes: f64) -> f64 {
    if attendance_minutes <= 0.0 {
        return 0.0;
    }
    round_percentage(
        calculated_work_minutes(attendance_minutes, break_minutes) / attendance_minutes * 100.0,
    )
}

/// Stage 2: billable share of the derived work time, 0 when that is not positive.
pub fn work_productivity(billable_minutes: f64, attendance_minutes: f64, break_minutes: f64) -> f64 {
    let denominator = calculated_work_minutes(attendance_minutes, break_minutes);
    if denominator <= 0.0 {
        return 0.0;
    }
    round_percentage(billable_minutes / denominator * 100.0)
}

pub fn idle_minutes(attendance_minutes: f64, break_minutes: f64, work_minutes: f64) -> f64 {
    (attendance_minutes - break_minutes - work_minutes).max(0.0)
}

pub fn round_percentage(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn round_money(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{EntryMethod, WorkTarget};
    use chrono::{TimeDelta, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 7, 0, 0).unwrap()
    }

    fn work_span(ended_after: Option<i64>, rate: Option<f64>) -> WorkSpan {
        WorkSpan {
            id: 1,
            employee_id: 1,
            target: WorkTarget::Order(1),
            task_description: None,
            started_at: t0(),
            ended_at: ended_after.map(|m| t0() + TimeDelta::minutes(m)),
            duration_minutes: ended_after.map(|m| m as f64),
            hourly_rate: rate,
            is_billable: true,
            cost: ended_after.and_then(|m| cost(m as f64, rate)),
            method: EntryMethod::Web,
            note: None,
        }
    }

    #[test]
    fn efficiency_and_productivity_for_a_regular_day() {
        assert_eq!(attendance_efficiency(480.0, 60.0), 87.5);
        assert_eq!(work_productivity(300.0, 480.0, 60.0), 71.43);
    }

    #[test]
    fn metrics_default_to_zero_without_a_denominator() {
        assert_eq!(attendance_efficiency(0.0, 0.0), 0.0);
        assert_eq!(work_productivity(30.0, 60.0, 60.0), 0.0);
        assert_eq!(work_productivity(30.0, 60.0, 90.0), 0.0);
    }

    #[test]
    fn cost_needs_a_rate() {
        assert_eq!(cost(90.0, Some(40.0)), Some(60.0));
        assert_eq!(cost(90.0, None), None);
    }

    #[test]
    fn cost_keeps_fractions_of_a_cent() {
        let fixed = cost(10.0, Some(31.0)).unwrap();
        assert!((fixed - 31.0 / 6.0).abs() < 1e-9);
        assert_ne!(fixed, 5.17);
        assert_eq!(round_money(fixed), 5.17);
    }

    #[test]
    fn closed_spans_keep_their_fixed_values() {
        let span = work_span(Some(45), Some(80.0));
        let much_later = t0() + TimeDelta::days(3);
        assert_eq!(duration_minutes(&span, much_later), 45.0);
        assert_eq!(work_cost(&span, much_later), Some(60.0));
    }

    #[test]
    fn open_spans_run_until_now() {
        let span = work_span(None, Some(60.0));
        let now = t0() + TimeDelta::seconds(90 * 60 + 30);
        assert_eq!(duration_minutes(&span, now), 90.5);
        let running = work_cost(&span, now).unwrap();
        assert!((running - 90.5).abs() < 1e-9);
    }

    #[test]
    fn idle_time_never_goes_negative() {
        assert_eq!(idle_minutes(480.0, 60.0, 400.0), 20.0);
        assert_eq!(idle_minutes(480.0, 60.0, 450.0), 0.0);
    }

    #[test]
    fn negative_intervals_count_as_zero() {
        assert_eq!(minutes_between(t0(), t0() - TimeDelta::minutes(5)), 0.0);
        assert_eq!(hours_between(t0(), t0() + TimeDelta::minutes(90)), 1.5);
    }
}
