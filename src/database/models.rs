use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("unknown {field} value: {value}")]
pub struct UnknownVariant {
    pub field: &'static str,
    pub value: String,
}

macro_rules! text_enum {
    ($name:ident, $field:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(UnknownVariant { field: $field, value: s.to_string() }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(Role, "role", {
    Employee => "employee",
    Dispatcher => "dispatcher",
    Admin => "admin",
});

text_enum!(CategoryKind, "category kind", {
    Work => "work",
    Break => "break",
    Other => "other",
});

text_enum!(OrderStatus, "order status", {
    Created => "created",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
});

// Which front-end recorded a transition.
text_enum!(EntryMethod, "entry method", {
    Web => "web",
    Kiosk => "kiosk",
});

text_enum!(SpanKind, "span kind", {
    Attendance => "attendance",
    Break => "break",
    Work => "work",
});

impl Default for EntryMethod {
    fn default() -> Self {
        EntryMethod::Web
    }
}

impl OrderStatus {
    /// Orders accept new work sessions only while not finished.
    pub fn accepts_work(&self) -> bool {
        matches!(self, OrderStatus::Created | OrderStatus::InProgress)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    pub employee_number: String,
    pub name: String,
    pub role: Role,
    pub is_active: bool,
    pub hourly_rate: Option<f64>,
    pub badge_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub kind: CategoryKind,
    pub is_active: bool,
    pub is_productive: bool,
    pub is_billable: bool,
    pub max_duration_minutes: Option<i64>,
}

impl Category {
    pub fn usable_for_break(&self) -> bool {
        self.is_active && self.kind == CategoryKind::Break
    }

    pub fn usable_for_work(&self) -> bool {
        self.is_active && self.kind != CategoryKind::Break
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_number: String,
    pub title: String,
    pub status: OrderStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceSpan {
    pub id: i64,
    pub employee_id: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_hours: Option<f64>,
    pub clock_in_method: EntryMethod,
    pub clock_out_method: Option<EntryMethod>,
    pub location: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakSpan {
    pub id: i64,
    pub employee_id: i64,
    pub category_id: i64,
    pub attendance_span_id: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<f64>,
    pub auto_ended: bool,
    pub note: Option<String>,
}

/// What a work session is booked against. Exactly one of the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkTarget {
    Order(i64),
    Activity(i64),
}

impl WorkTarget {
    pub fn from_columns(order_id: Option<i64>, category_id: Option<i64>) -> Option<Self> {
        match (order_id, category_id) {
            (Some(order), None) => Some(WorkTarget::Order(order)),
            (None, Some(category)) => Some(WorkTarget::Activity(category)),
            _ => None,
        }
    }

    pub fn order_id(&self) -> Option<i64> {
        match self {
            WorkTarget::Order(id) => Some(*id),
            WorkTarget::Activity(_) => None,
        }
    }

    pub fn category_id(&self) -> Option<i64> {
        match self {
            WorkTarget::Activity(id) => Some(*id),
            WorkTarget::Order(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkSpan {
    pub id: i64,
    pub employee_id: i64,
    pub target: WorkTarget,
    pub task_description: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<f64>,
    pub hourly_rate: Option<f64>,
    pub is_billable: bool,
    pub cost: Option<f64>,
    pub method: EntryMethod,
    pub note: Option<String>,
}

/// Common view over the three span tables.
pub trait Span {
    fn started_at(&self) -> DateTime<Utc>;
    fn ended_at(&self) -> Option<DateTime<Utc>>;
    /// Minutes fixed when the span was closed, if any.
    fn fixed_minutes(&self) -> Option<f64>;
}

impl Span for AttendanceSpan {
    fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
    fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }
    fn fixed_minutes(&self) -> Option<f64> {
        self.duration_hours.map(|hours| hours * 60.0)
    }
}

impl Span for BreakSpan {
    fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
    fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }
    fn fixed_minutes(&self) -> Option<f64> {
        self.duration_minutes
    }
}

impl Span for WorkSpan {
    fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
    fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }
    fn fixed_minutes(&self) -> Option<f64> {
        self.duration_minutes
    }
}
