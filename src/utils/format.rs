use crate::accounting::{DailySummary, RankedEmployee};
use crate::database::models::Employee;
use crate::tracker::{Anomaly, EmployeeState, EmployeeStatus};
use crate::utils::time::{format_hhmm, format_local_time};
use chrono::FixedOffset;
use std::collections::HashMap;

fn anomaly_label(anomaly: &Anomaly) -> String {
    match anomaly {
        Anomaly::DanglingSession { session_id } => {
            format!("session #{} open without attendance", session_id)
        }
        Anomaly::DanglingBreak { break_id } => {
            format!("break #{} open without attendance", break_id)
        }
        Anomaly::BreakDuringSession {
            break_id,
            session_id,
        } => format!("break #{} overlaps session #{}", break_id, session_id),
    }
}

/// One line per employee: name, state, since when, and any anomaly.
pub fn format_presence_board(
    board: &[EmployeeStatus],
    employees: &[Employee],
    offset: FixedOffset,
) -> String {
    if board.is_empty() {
        return "No employees registered".to_string();
    }

    let names: HashMap<i64, &str> = employees
        .iter()
        .map(|employee| (employee.id, employee.name.as_str()))
        .collect();

    let mut output = String::new();
    let mut present = 0;

    for status in board {
        let name = names.get(&status.employee_id).copied().unwrap_or("(archived)");
        output.push_str(&format!("{:<24} {:<9}", name, status.state.as_str()));

        let since = match status.state {
            EmployeeState::PresentBreak => status.active_break.as_ref().map(|span| span.started_at),
            EmployeeState::PresentWorking => {
                status.active_session.as_ref().map(|span| span.started_at)
            }
            EmployeeState::PresentIdle => status.attendance.as_ref().map(|span| span.started_at),
            EmployeeState::Absent => None,
        };
        if let Some(since) = since {
            output.push_str(&format!(" since {}", format_local_time(since, offset)));
        }
        if status.state != EmployeeState::Absent {
            present += 1;
        }

        for anomaly in &status.anomalies {
            output.push_str(&format!(" [!] {}", anomaly_label(anomaly)));
        }
        output.push('\n');
    }

    output.push_str(&format!("{} of {} present", present, board.len()));
    output
}

pub fn format_daily_summary(summary: &DailySummary, offset: FixedOffset) -> String {
    let mut output = format!("{} ({})\n", summary.date.format("%Y-%m-%d (%a)"), summary.state.as_str());

    match (summary.first_clock_in, summary.last_clock_out) {
        (Some(first), Some(last)) => output.push_str(&format!(
            "  in {} -> out {}\n",
            format_local_time(first, offset),
            format_local_time(last, offset)
        )),
        (Some(first), None) => {
            output.push_str(&format!("  in {} -> still present\n", format_local_time(first, offset)))
        }
        _ => output.push_str("  no attendance\n"),
    }

    let totals = &summary.totals;
    output.push_str(&format!(
        "  attendance {}  breaks {}  work {}  idle {}\n",
        format_hhmm(totals.attendance_minutes),
        format_hhmm(totals.break_minutes),
        format_hhmm(totals.work_minutes),
        format_hhmm(summary.idle_minutes)
    ));
    output.push_str(&format!(
        "  efficiency {:.2}%  productivity {:.2}%  sessions {}",
        summary.attendance_efficiency, summary.work_productivity, totals.session_count
    ));

    if totals.cost > 0.0 {
        output.push_str(&format!("  cost {:.2}", totals.cost));
    }

    for overrun in &summary.break_overruns {
        output.push_str(&format!(
            "\n  [!] {} break #{} lasted {} (limit {} min)",
            overrun.category_name,
            overrun.break_id,
            format_hhmm(overrun.minutes),
            overrun.limit_minutes
        ));
    }

    output
}

pub fn format_ranking(ranking: &[RankedEmployee]) -> String {
    if ranking.is_empty() {
        return "No activity in the selected period".to_string();
    }

    let mut output = String::new();
    for entry in ranking {
        let metrics = &entry.metrics;
        output.push_str(&format!(
            "{:>3}. {:<24} efficiency {:>6.2}%  productivity {:>6.2}%  work {}\n",
            entry.rank,
            metrics.employee_name,
            metrics.attendance_efficiency,
            metrics.work_productivity,
            format_hhmm(metrics.totals.work_minutes)
        ));
    }
    output.pop();
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounting::{PerformanceMetrics, SpanTotals};
    use crate::database::models::Role;

    fn employee(id: i64, name: &str) -> Employee {
        Employee {
            id,
            employee_number: format!("E{:03}", id),
            name: name.to_string(),
            role: Role::Employee,
            is_active: true,
            hourly_rate: None,
            badge_id: None,
        }
    }

    #[test]
    fn empty_board_has_placeholder() {
        let offset = FixedOffset::east_opt(0).unwrap();
        assert_eq!(format_presence_board(&[], &[], offset), "No employees registered");
    }

    #[test]
    fn board_counts_present_employees() {
        let offset = FixedOffset::east_opt(0).unwrap();
        let board = vec![
            EmployeeStatus::from_open_spans(1, None, None, None),
            EmployeeStatus::from_open_spans(2, None, None, None),
        ];
        let employees = vec![employee(1, "Ada"), employee(2, "Linus")];

        let text = format_presence_board(&board, &employees, offset);
        assert!(text.contains("Ada"));
        assert!(text.contains("absent"));
        assert!(text.ends_with("0 of 2 present"));
    }

    #[test]
    fn daily_summary_lists_times_and_overruns() {
        use crate::accounting::{BreakOverrun, DailySummary};
        use chrono::{NaiveDate, TimeZone, Utc};

        let offset = FixedOffset::east_opt(3600).unwrap();
        let totals = SpanTotals {
            attendance_minutes: 480.0,
            break_minutes: 60.0,
            work_minutes: 300.0,
            billable_minutes: 300.0,
            cost: 150.0,
            session_count: 2,
            ..SpanTotals::default()
        };
        let summary = DailySummary {
            employee_id: 1,
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            state: EmployeeState::Absent,
            idle_minutes: totals.idle_minutes(),
            attendance_efficiency: totals.attendance_efficiency(),
            work_productivity: totals.work_productivity(),
            first_clock_in: Some(Utc.with_ymd_and_hms(2026, 3, 2, 7, 0, 0).unwrap()),
            last_clock_out: Some(Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap()),
            break_overruns: vec![BreakOverrun {
                break_id: 4,
                category_id: 2,
                category_name: "Lunch".to_string(),
                minutes: 60.0,
                limit_minutes: 30,
            }],
            totals,
        };

        let text = format_daily_summary(&summary, offset);
        assert!(text.starts_with("2026-03-02 (Mon) (absent)"));
        assert!(text.contains("in 08:00 -> out 16:00"));
        assert!(text.contains("attendance 08:00  breaks 01:00  work 05:00  idle 02:00"));
        assert!(text.contains("efficiency 87.50%  productivity 71.43%  sessions 2  cost 150.00"));
        assert!(text.contains("Lunch break #4 lasted 01:00 (limit 30 min)"));
    }

    #[test]
    fn ranking_lists_ranks_in_order() {
        let totals = SpanTotals {
            attendance_minutes: 480.0,
            break_minutes: 60.0,
            work_minutes: 300.0,
            billable_minutes: 300.0,
            ..SpanTotals::default()
        };
        let ranking = vec![
            RankedEmployee {
                rank: 1,
                metrics: PerformanceMetrics::new(1, "Ada", totals),
            },
            RankedEmployee {
                rank: 2,
                metrics: PerformanceMetrics::new(2, "Linus", SpanTotals::default()),
            },
        ];

        let text = format_ranking(&ranking);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("1. Ada"));
        assert!(lines[0].contains("87.50%"));
        assert!(lines[1].contains("2. Linus"));
    }
}
