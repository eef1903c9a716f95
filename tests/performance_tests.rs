mod common;

use chrono::NaiveDate;
use common::{Harness, harness, shift_date};
use workshop_timeline::ErrorKind;
use workshop_timeline::accounting::Period;
use workshop_timeline::database::models::{Employee, OrderStatus};
use workshop_timeline::database::queries;
use workshop_timeline::tracker::{
    ClockInRequest, ClockOutRequest, EmployeeState, EndBreakRequest, EndSessionRequest,
    StartBreakRequest, StartSessionRequest,
};
use workshop_timeline::utils::validation::DateRange;

/// 08:00-16:00 attendance, 60 min lunch at 12:00, 300 billable minutes.
async fn full_shift(h: &Harness, employee: &Employee, lunch_id: i64, order_id: i64) {
    let presence = h.workshop.presence();
    let work = h.workshop.work();
    let breaks = h.workshop.breaks();

    presence
        .clock_in(employee.id, ClockInRequest::default())
        .await
        .unwrap();
    work.start_session(employee.id, StartSessionRequest::for_order(order_id))
        .await
        .unwrap();
    h.clock.advance_minutes(240);
    work.end_session(employee.id, EndSessionRequest::default())
        .await
        .unwrap();
    breaks
        .start_break(employee.id, StartBreakRequest::new(lunch_id))
        .await
        .unwrap();
    h.clock.advance_minutes(60);
    breaks
        .end_break(employee.id, EndBreakRequest::default())
        .await
        .unwrap();
    work.start_session(employee.id, StartSessionRequest::for_order(order_id))
        .await
        .unwrap();
    h.clock.advance_minutes(60);
    work.end_session(employee.id, EndSessionRequest::default())
        .await
        .unwrap();
    h.clock.advance_minutes(120);
    presence
        .clock_out(employee.id, ClockOutRequest::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn daily_summary_applies_both_efficiency_stages() {
    let h = harness().await;
    let ada = h.employee_with_rate("E001", "Ada", 30.0).await;
    let lunch = h.break_category("Lunch", Some(30)).await;
    let order = h.order("WO-1", OrderStatus::Created).await;

    full_shift(&h, &ada, lunch.id, order.id).await;

    let summary = h
        .workshop
        .performance()
        .daily_summary(ada.id, shift_date())
        .await
        .unwrap();

    assert_eq!(summary.state, EmployeeState::Absent);
    assert_eq!(summary.totals.attendance_minutes, 480.0);
    assert_eq!(summary.totals.break_minutes, 60.0);
    assert_eq!(summary.totals.work_minutes, 300.0);
    assert_eq!(summary.totals.billable_minutes, 300.0);
    assert_eq!(summary.totals.session_count, 2);
    assert_eq!(summary.totals.cost, 150.0);
    assert_eq!(summary.idle_minutes, 120.0);
    assert_eq!(summary.attendance_efficiency, 87.5);
    assert_eq!(summary.work_productivity, 71.43);

    assert_eq!(summary.break_overruns.len(), 1);
    assert_eq!(summary.break_overruns[0].limit_minutes, 30);
    assert_eq!(summary.break_overruns[0].minutes, 60.0);
}

#[tokio::test]
async fn open_attendance_counts_up_to_now_without_being_written() {
    let h = harness().await;
    let ada = h.employee("E001", "Ada").await;

    let span = h
        .workshop
        .presence()
        .clock_in(ada.id, ClockInRequest::default())
        .await
        .unwrap();
    h.clock.advance_minutes(75);

    let summary = h
        .workshop
        .performance()
        .daily_summary(ada.id, shift_date())
        .await
        .unwrap();
    assert_eq!(summary.totals.attendance_minutes, 75.0);
    assert_eq!(summary.state, EmployeeState::PresentIdle);
    assert!(summary.last_clock_out.is_none());

    let stored = queries::get_attendance_span(&h.pool, span.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.ended_at.is_none());
    assert!(stored.duration_hours.is_none());
}

#[tokio::test]
async fn empty_day_reports_zero_metrics() {
    let h = harness().await;
    let ada = h.employee("E001", "Ada").await;

    let summary = h
        .workshop
        .performance()
        .daily_summary(ada.id, shift_date())
        .await
        .unwrap();
    assert_eq!(summary.totals.attendance_minutes, 0.0);
    assert_eq!(summary.attendance_efficiency, 0.0);
    assert_eq!(summary.work_productivity, 0.0);
    assert!(summary.first_clock_in.is_none());
}

#[tokio::test]
async fn weekly_statistics_are_clipped_and_include_empty_weeks() {
    let h = harness().await;
    let ada = h.employee("E001", "Ada").await;
    let lunch = h.break_category("Lunch", None).await;
    let order = h.order("WO-1", OrderStatus::InProgress).await;

    full_shift(&h, &ada, lunch.id, order.id).await;

    let range = DateRange::new(
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
    )
    .unwrap();
    let weeks = h
        .workshop
        .performance()
        .statistics(Period::Week, range, Some(ada.id))
        .await
        .unwrap();

    // Sunday 03-01 belongs to the week starting 02-23.
    assert_eq!(weeks.len(), 3);
    assert_eq!(weeks[0].period_start, range.from);
    assert_eq!(weeks[0].period_end, range.from);
    assert_eq!(weeks[0].totals.attendance_minutes, 0.0);
    assert_eq!(weeks[1].period_start, shift_date());
    assert_eq!(weeks[1].totals.attendance_minutes, 480.0);
    assert_eq!(weeks[1].attendance_efficiency, 87.5);
    assert_eq!(weeks[2].period_end, range.to);

    let days = h
        .workshop
        .performance()
        .statistics(Period::Day, range, None)
        .await
        .unwrap();
    assert_eq!(days.len(), 10);
    assert_eq!(days[1].totals.work_minutes, 300.0);

    let months = h
        .workshop
        .performance()
        .statistics(Period::Month, range, None)
        .await
        .unwrap();
    assert_eq!(months.len(), 1);
    assert_eq!(months[0].totals.billable_minutes, 300.0);
}

#[tokio::test]
async fn team_ranking_orders_by_efficiency() {
    let h = harness().await;
    let ada = h.employee("E001", "Ada").await;
    let linus = h.employee("E002", "Linus").await;
    let grace = h.employee("E003", "Grace").await;
    let lunch = h.break_category("Lunch", None).await;

    let presence = h.workshop.presence();
    presence.clock_in(ada.id, ClockInRequest::default()).await.unwrap();
    presence.clock_in(linus.id, ClockInRequest::default()).await.unwrap();
    h.workshop
        .breaks()
        .start_break(linus.id, StartBreakRequest::new(lunch.id))
        .await
        .unwrap();
    h.clock.advance_minutes(60);
    h.workshop
        .breaks()
        .end_break(linus.id, EndBreakRequest::default())
        .await
        .unwrap();
    h.clock.advance_minutes(60);
    presence.clock_out(ada.id, ClockOutRequest::default()).await.unwrap();
    presence.clock_out(linus.id, ClockOutRequest::default()).await.unwrap();

    let ranking = h
        .workshop
        .performance()
        .team_ranking(DateRange::single_day(shift_date()))
        .await
        .unwrap();

    let ids: Vec<i64> = ranking.iter().map(|r| r.metrics.employee_id).collect();
    assert_eq!(ids, vec![ada.id, linus.id, grace.id]);
    assert_eq!(ranking[0].metrics.attendance_efficiency, 100.0);
    assert_eq!(ranking[1].metrics.attendance_efficiency, 50.0);
    assert_eq!(ranking[2].rank, 3);
}

#[tokio::test]
async fn aggregations_validate_their_inputs() {
    let h = harness().await;
    let ada = h.employee("E001", "Ada").await;

    let err = DateRange::new(
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDateRange);

    let err = h
        .workshop
        .performance()
        .performance_metrics(9999, DateRange::single_day(shift_date()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmployeeNotFound);

    let metrics = h
        .workshop
        .performance()
        .performance_metrics(ada.id, DateRange::single_day(shift_date()))
        .await
        .unwrap();
    assert_eq!(metrics.employee_name, "Ada");
    assert_eq!(metrics.totals.session_count, 0);
}
