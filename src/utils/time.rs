use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveDate, Offset, TimeDelta, Timelike, Utc};
use std::sync::Mutex;

/// Source of "now" for every transition.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock, truncated to whole seconds to match the store's granularity.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        truncate_to_second(Utc::now())
    }
}

/// Settable clock for tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(truncate_to_second(start)),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = truncate_to_second(at);
    }

    pub fn advance_minutes(&self, minutes: i64) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += TimeDelta::minutes(minutes);
    }

    pub fn advance_seconds(&self, seconds: i64) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += TimeDelta::seconds(seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub fn truncate_to_second(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_nanosecond(0).unwrap_or(at)
}

/// Workshop-local offset; out-of-range hours fall back to UTC.
pub fn workshop_offset(utc_offset_hours: i32) -> FixedOffset {
    FixedOffset::east_opt(utc_offset_hours * 3600)
        .unwrap_or_else(|| Utc.fix())
}

/// UTC instants bounding the local calendar day `[start, end)`.
pub fn local_day_bounds(date: NaiveDate, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_midnight_utc(date, offset);
    let end = start + TimeDelta::days(1);
    (start, end)
}

/// UTC instants bounding the inclusive local date range `[from, to]`.
pub fn local_range_bounds(
    from: NaiveDate,
    to: NaiveDate,
    offset: FixedOffset,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let (start, _) = local_day_bounds(from, offset);
    let (_, end) = local_day_bounds(to, offset);
    (start, end)
}

fn local_midnight_utc(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let local_midnight = date.and_time(chrono::NaiveTime::MIN);
    (local_midnight - TimeDelta::seconds(offset.local_minus_utc() as i64)).and_utc()
}

pub fn local_date(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

pub fn start_of_week(date: NaiveDate) -> NaiveDate {
    let days_since_monday = date.weekday().num_days_from_monday() as u64;
    date.checked_sub_days(Days::new(days_since_monday))
        .unwrap_or(date)
}

pub fn start_of_month(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

/// Renders minutes as `HH:MM`, rounded to the nearest whole minute.
pub fn format_hhmm(minutes: f64) -> String {
    let total = minutes.round() as i64;
    let sign = if total < 0 { "-" } else { "" };
    let total = total.abs();
    format!("{}{:02}:{:02}", sign, total / 60, total % 60)
}

pub fn format_local_time(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset).format("%H:%M").to_string()
}
