use crate::error::{TrackerError, TrackerResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Inclusive range of local calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> TrackerResult<Self> {
        validate_date_range(from, to)?;
        Ok(Self { from, to })
    }

    pub fn single_day(date: NaiveDate) -> Self {
        Self { from: date, to: date }
    }

    pub fn days(&self) -> i64 {
        self.to.signed_duration_since(self.from).num_days() + 1
    }
}

pub fn validate_interval(start: DateTime<Utc>, end: DateTime<Utc>) -> TrackerResult<()> {
    if end <= start {
        return Err(TrackerError::InvalidInterval);
    }
    Ok(())
}

pub fn validate_date_range(from: NaiveDate, to: NaiveDate) -> TrackerResult<()> {
    if to < from {
        return Err(TrackerError::InvalidDateRange(format!(
            "{} is after {}",
            from, to
        )));
    }

    let days = to.signed_duration_since(from).num_days();
    if days > 366 {
        return Err(TrackerError::InvalidDateRange(
            "ranges longer than a year are not supported".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_hourly_rate(rate: Option<f64>) -> TrackerResult<()> {
    match rate {
        Some(value) if !value.is_finite() || value < 0.0 => Err(TrackerError::InvalidRate(value)),
        _ => Ok(()),
    }
}

/// Trims free-text input, turning blank strings into `None`.
pub fn normalize_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
