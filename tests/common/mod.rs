#![allow(dead_code)]

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use workshop_timeline::Workshop;
use workshop_timeline::database::models::{Category, CategoryKind, Employee, Order, OrderStatus};
use workshop_timeline::database::{self, queries};
use workshop_timeline::utils::time::{Clock, ManualClock};

pub struct Harness {
    pub pool: SqlitePool,
    pub clock: Arc<ManualClock>,
    pub workshop: Workshop,
}

/// Monday 2026-03-02, 08:00 UTC.
pub fn shift_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
}

pub fn shift_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

pub fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

pub async fn harness() -> Harness {
    let pool = database::create_in_memory().await.unwrap();
    with_pool(pool)
}

pub fn with_pool(pool: SqlitePool) -> Harness {
    let clock = Arc::new(ManualClock::new(shift_start()));
    let shared: Arc<dyn Clock> = clock.clone();
    let workshop = Workshop::new(pool.clone(), shared, utc());
    Harness {
        pool,
        clock,
        workshop,
    }
}

impl Harness {
    pub async fn employee(&self, number: &str, name: &str) -> Employee {
        queries::create_employee(&self.pool, &queries::NewEmployee::new(number, name))
            .await
            .unwrap()
    }

    pub async fn employee_with_rate(&self, number: &str, name: &str, rate: f64) -> Employee {
        let mut new = queries::NewEmployee::new(number, name);
        new.hourly_rate = Some(rate);
        queries::create_employee(&self.pool, &new).await.unwrap()
    }

    pub async fn employee_with_badge(&self, number: &str, name: &str, badge: &str) -> Employee {
        let mut new = queries::NewEmployee::new(number, name);
        new.badge_id = Some(badge.to_string());
        queries::create_employee(&self.pool, &new).await.unwrap()
    }

    pub async fn break_category(&self, name: &str, limit: Option<i64>) -> Category {
        let mut new = queries::NewCategory::new(name, CategoryKind::Break);
        new.max_duration_minutes = limit;
        queries::create_category(&self.pool, &new).await.unwrap()
    }

    pub async fn activity(&self, name: &str, billable: bool) -> Category {
        let mut new = queries::NewCategory::new(name, CategoryKind::Work);
        new.is_billable = billable;
        queries::create_category(&self.pool, &new).await.unwrap()
    }

    pub async fn order(&self, number: &str, status: OrderStatus) -> Order {
        queries::create_order(&self.pool, number, "Test order", status, self.clock.now())
            .await
            .unwrap()
    }
}
