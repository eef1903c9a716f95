//! Error taxonomy for every state transition and read path.
//!
//! Business-rule failures are ordinary values of [`TrackerError`]; only the
//! `Store` variant represents a fault of the underlying database.

use crate::database::models::SpanKind;
use thiserror::Error;

pub type TrackerResult<T> = Result<T, TrackerError>;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("employee {0} is already clocked in")]
    AlreadyPresent(i64),

    #[error("employee {0} is not clocked in")]
    NotPresent(i64),

    #[error("employee {0} is already on a break")]
    AlreadyOnBreak(i64),

    #[error("employee {0} has no active break")]
    NoActiveBreak(i64),

    #[error("employee {0} already has an open work session")]
    AlreadyWorking(i64),

    #[error("employee {0} has no open work session")]
    NoActiveSession(i64),

    #[error("employee {0} is on a break")]
    OnBreak(i64),

    #[error("category {0} is missing, inactive or of the wrong kind")]
    InvalidCategory(i64),

    #[error("order {0} does not exist")]
    OrderNotFound(i64),

    #[error("order {0} is not open for work")]
    OrderNotActive(i64),

    #[error("a work session needs exactly one of an order or an activity category")]
    ConflictingTarget,

    #[error("concurrent {span} change for employee {employee_id} lost the race")]
    StoreConflict { employee_id: i64, span: SpanKind },

    #[error("employee {0} does not exist or is archived")]
    EmployeeNotFound(i64),

    /// Kiosk login by employee number or badge that matched no one.
    #[error("no employee is registered under {0:?}")]
    UnknownEmployeeKey(String),

    #[error("{span} {id} does not exist")]
    SpanNotFound { span: SpanKind, id: i64 },

    #[error("end time must be after start time")]
    InvalidInterval,

    #[error("invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("invalid hourly rate: {0}")]
    InvalidRate(f64),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

/// Stable, payload-free classification of a [`TrackerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AlreadyPresent,
    NotPresent,
    AlreadyOnBreak,
    NoActiveBreak,
    AlreadyWorking,
    NoActiveSession,
    OnBreak,
    InvalidCategory,
    OrderNotFound,
    OrderNotActive,
    ConflictingTarget,
    StoreConflict,
    EmployeeNotFound,
    SpanNotFound,
    InvalidInterval,
    InvalidDateRange,
    InvalidRate,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::AlreadyPresent => "ALREADY_PRESENT",
            ErrorKind::NotPresent => "NOT_PRESENT",
            ErrorKind::AlreadyOnBreak => "ALREADY_ON_BREAK",
            ErrorKind::NoActiveBreak => "NO_ACTIVE_BREAK",
            ErrorKind::AlreadyWorking => "ALREADY_WORKING",
            ErrorKind::NoActiveSession => "NO_ACTIVE_SESSION",
            ErrorKind::OnBreak => "ON_BREAK",
            ErrorKind::InvalidCategory => "INVALID_CATEGORY",
            ErrorKind::OrderNotFound => "ORDER_NOT_FOUND",
            ErrorKind::OrderNotActive => "ORDER_NOT_ACTIVE",
            ErrorKind::ConflictingTarget => "CONFLICTING_TARGET",
            ErrorKind::StoreConflict => "STORE_CONFLICT",
            ErrorKind::EmployeeNotFound => "EMPLOYEE_NOT_FOUND",
            ErrorKind::SpanNotFound => "SPAN_NOT_FOUND",
            ErrorKind::InvalidInterval => "INVALID_INTERVAL",
            ErrorKind::InvalidDateRange => "INVALID_DATE_RANGE",
            ErrorKind::InvalidRate => "INVALID_RATE",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TrackerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TrackerError::AlreadyPresent(_) => ErrorKind::AlreadyPresent,
            TrackerError::NotPresent(_) => ErrorKind::NotPresent,
            TrackerError::AlreadyOnBreak(_) => ErrorKind::AlreadyOnBreak,
            TrackerError::NoActiveBreak(_) => ErrorKind::NoActiveBreak,
            TrackerError::AlreadyWorking(_) => ErrorKind::AlreadyWorking,
            TrackerError::NoActiveSession(_) => ErrorKind::NoActiveSession,
            TrackerError::OnBreak(_) => ErrorKind::OnBreak,
            TrackerError::InvalidCategory(_) => ErrorKind::InvalidCategory,
            TrackerError::OrderNotFound(_) => ErrorKind::OrderNotFound,
            TrackerError::OrderNotActive(_) => ErrorKind::OrderNotActive,
            TrackerError::ConflictingTarget => ErrorKind::ConflictingTarget,
            TrackerError::StoreConflict { .. } => ErrorKind::StoreConflict,
            TrackerError::EmployeeNotFound(_) | TrackerError::UnknownEmployeeKey(_) => {
                ErrorKind::EmployeeNotFound
            }
            TrackerError::SpanNotFound { .. } => ErrorKind::SpanNotFound,
            TrackerError::InvalidInterval => ErrorKind::InvalidInterval,
            TrackerError::InvalidDateRange(_) => ErrorKind::InvalidDateRange,
            TrackerError::InvalidRate(_) => ErrorKind::InvalidRate,
            TrackerError::Store(_) => ErrorKind::Internal,
        }
    }

    /// Kind as reported to callers: a lost race is indistinguishable from
    /// the state violation it raced against.
    pub fn reported_kind(&self) -> ErrorKind {
        match self {
            TrackerError::StoreConflict { span, .. } => match span {
                SpanKind::Attendance => ErrorKind::AlreadyPresent,
                SpanKind::Break => ErrorKind::AlreadyOnBreak,
                SpanKind::Work => ErrorKind::AlreadyWorking,
            },
            other => other.kind(),
        }
    }

    pub fn is_business(&self) -> bool {
        !matches!(self, TrackerError::Store(_))
    }

    /// Stable message for end users, independent of role and front-end.
    pub fn user_message(&self) -> &'static str {
        match self.reported_kind() {
            ErrorKind::AlreadyPresent => "You are already clocked in.",
            ErrorKind::NotPresent => "You are not clocked in.",
            ErrorKind::AlreadyOnBreak => "You are already on a break.",
            ErrorKind::NoActiveBreak => "You have no active break.",
            ErrorKind::AlreadyWorking => "You already have an open work session.",
            ErrorKind::NoActiveSession => "You have no open work session.",
            ErrorKind::OnBreak => "End your break before starting work.",
            ErrorKind::InvalidCategory => "The selected category cannot be used here.",
            ErrorKind::OrderNotFound => "The selected order does not exist.",
            ErrorKind::OrderNotActive => "The selected order is closed for work.",
            ErrorKind::ConflictingTarget => "Choose either an order or an activity, not both.",
            ErrorKind::StoreConflict => "Another terminal changed your status; please retry.",
            ErrorKind::EmployeeNotFound => "Unknown or inactive employee.",
            ErrorKind::SpanNotFound => "The record does not exist.",
            ErrorKind::InvalidInterval => "The end time must be after the start time.",
            ErrorKind::InvalidDateRange => "The date range is invalid.",
            ErrorKind::InvalidRate => "The hourly rate is invalid.",
            ErrorKind::Internal => "An internal error occurred.",
        }
    }
}

/// Maps a failed write to `StoreConflict` when the store rejected it through
/// the one-open-span uniqueness constraint.
pub(crate) fn conflict_or_store(err: sqlx::Error, employee_id: i64, span: SpanKind) -> TrackerError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return TrackerError::StoreConflict { employee_id, span };
        }
    }
    TrackerError::Store(err)
}
