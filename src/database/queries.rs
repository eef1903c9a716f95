use crate::database::models::{
    AttendanceSpan, BreakSpan, Category, CategoryKind, Employee, Order, OrderStatus, Role,
    UnknownVariant, WorkSpan, WorkTarget,
};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

type QueryResult<T> = Result<T, sqlx::Error>;

const EMPLOYEE_COLUMNS: &str = "id, employee_number, name, role, is_active, hourly_rate, badge_id";
const CATEGORY_COLUMNS: &str =
    "id, name, kind, is_active, is_productive, is_billable, max_duration_minutes";
const ORDER_COLUMNS: &str = "id, order_number, title, status, updated_at";
const ATTENDANCE_COLUMNS: &str = "id, employee_id, started_at, ended_at, duration_hours, \
     clock_in_method, clock_out_method, location, note";
const BREAK_COLUMNS: &str = "id, employee_id, category_id, attendance_span_id, started_at, \
     ended_at, duration_minutes, auto_ended, note";
const WORK_COLUMNS: &str = "id, employee_id, order_id, category_id, task_description, \
     started_at, ended_at, duration_minutes, hourly_rate, is_billable, cost, method, note";

fn parse_column<T>(row: &SqliteRow, column: &str) -> QueryResult<T>
where
    T: FromStr<Err = UnknownVariant>,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>()
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn parse_optional_column<T>(row: &SqliteRow, column: &str) -> QueryResult<Option<T>>
where
    T: FromStr<Err = UnknownVariant>,
{
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|value| value.parse::<T>())
        .transpose()
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn employee_from_row(row: &SqliteRow) -> QueryResult<Employee> {
    Ok(Employee {
        id: row.try_get("id")?,
        employee_number: row.try_get("employee_number")?,
        name: row.try_get("name")?,
        role: parse_column::<Role>(row, "role")?,
        is_active: row.try_get("is_active")?,
        hourly_rate: row.try_get("hourly_rate")?,
        badge_id: row.try_get("badge_id")?,
    })
}

fn category_from_row(row: &SqliteRow) -> QueryResult<Category> {
    Ok(Category {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        kind: parse_column::<CategoryKind>(row, "kind")?,
        is_active: row.try_get("is_active")?,
        is_productive: row.try_get("is_productive")?,
        is_billable: row.try_get("is_billable")?,
        max_duration_minutes: row.try_get("max_duration_minutes")?,
    })
}

fn order_from_row(row: &SqliteRow) -> QueryResult<Order> {
    Ok(Order {
        id: row.try_get("id")?,
        order_number: row.try_get("order_number")?,
        title: row.try_get("title")?,
        status: parse_column::<OrderStatus>(row, "status")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn attendance_from_row(row: &SqliteRow) -> QueryResult<AttendanceSpan> {
    Ok(AttendanceSpan {
        id: row.try_get("id")?,
        employee_id: row.try_get("employee_id")?,
        started_at: row.try_get("started_at")?,
        ended_at: row.try_get("ended_at")?,
        duration_hours: row.try_get("duration_hours")?,
        clock_in_method: parse_column(row, "clock_in_method")?,
        clock_out_method: parse_optional_column(row, "clock_out_method")?,
        location: row.try_get("location")?,
        note: row.try_get("note")?,
    })
}

fn break_from_row(row: &SqliteRow) -> QueryResult<BreakSpan> {
    Ok(BreakSpan {
        id: row.try_get("id")?,
        employee_id: row.try_get("employee_id")?,
        category_id: row.try_get("category_id")?,
        attendance_span_id: row.try_get("attendance_span_id")?,
        started_at: row.try_get("started_at")?,
        ended_at: row.try_get("ended_at")?,
        duration_minutes: row.try_get("duration_minutes")?,
        auto_ended: row.try_get("auto_ended")?,
        note: row.try_get("note")?,
    })
}

fn work_from_row(row: &SqliteRow) -> QueryResult<WorkSpan> {
    let order_id: Option<i64> = row.try_get("order_id")?;
    let category_id: Option<i64> = row.try_get("category_id")?;
    let target = WorkTarget::from_columns(order_id, category_id).ok_or_else(|| {
        sqlx::Error::Decode("work span must reference exactly one of order or category".into())
    })?;

    Ok(WorkSpan {
        id: row.try_get("id")?,
        employee_id: row.try_get("employee_id")?,
        target,
        task_description: row.try_get("task_description")?,
        started_at: row.try_get("started_at")?,
        ended_at: row.try_get("ended_at")?,
        duration_minutes: row.try_get("duration_minutes")?,
        hourly_rate: row.try_get("hourly_rate")?,
        is_billable: row.try_get("is_billable")?,
        cost: row.try_get("cost")?,
        method: parse_column(row, "method")?,
        note: row.try_get("note")?,
    })
}

fn collect<T>(rows: Vec<SqliteRow>, map: fn(&SqliteRow) -> QueryResult<T>) -> QueryResult<Vec<T>> {
    rows.iter().map(map).collect()
}

// Employee queries

#[derive(Debug, Clone)]
pub struct NewEmployee {
    pub employee_number: String,
    pub name: String,
    pub role: Role,
    pub hourly_rate: Option<f64>,
    pub pin_hash: Option<String>,
    pub badge_id: Option<String>,
}

impl NewEmployee {
    pub fn new(employee_number: &str, name: &str) -> Self {
        Self {
            employee_number: employee_number.to_string(),
            name: name.to_string(),
            role: Role::Employee,
            hourly_rate: None,
            pin_hash: None,
            badge_id: None,
        }
    }
}

pub async fn create_employee(pool: &SqlitePool, employee: &NewEmployee) -> QueryResult<Employee> {
    let result = sqlx::query(
        "INSERT INTO employees (employee_number, name, role, hourly_rate, pin_hash, badge_id)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&employee.employee_number)
    .bind(&employee.name)
    .bind(employee.role.as_str())
    .bind(employee.hourly_rate)
    .bind(&employee.pin_hash)
    .bind(&employee.badge_id)
    .execute(pool)
    .await?;

    let employee_id = result.last_insert_rowid();
    get_employee(pool, employee_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

/// Soft delete. Spans keep referencing the archived row.
pub async fn archive_employee(
    pool: &SqlitePool,
    employee_id: i64,
    at: DateTime<Utc>,
) -> QueryResult<bool> {
    let result = sqlx::query(
        "UPDATE employees SET is_active = FALSE, archived_at = ? WHERE id = ? AND is_active = TRUE",
    )
    .bind(at)
    .bind(employee_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn get_employee(pool: &SqlitePool, employee_id: i64) -> QueryResult<Option<Employee>> {
    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(employee_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(employee_from_row).transpose()
}

pub async fn get_employee_by_number(
    pool: &SqlitePool,
    employee_number: &str,
) -> QueryResult<Option<Employee>> {
    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE employee_number = ?");
    let row = sqlx::query(&sql)
        .bind(employee_number)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(employee_from_row).transpose()
}

pub async fn get_employee_by_badge(
    pool: &SqlitePool,
    badge_id: &str,
) -> QueryResult<Option<Employee>> {
    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE badge_id = ?");
    let row = sqlx::query(&sql)
        .bind(badge_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(employee_from_row).transpose()
}

pub async fn list_active_employees(pool: &SqlitePool) -> QueryResult<Vec<Employee>> {
    let sql = format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE is_active = TRUE ORDER BY name ASC, id ASC"
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    collect(rows, employee_from_row)
}

// Category queries

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub kind: CategoryKind,
    pub is_productive: bool,
    pub is_billable: bool,
    pub max_duration_minutes: Option<i64>,
}

impl NewCategory {
    pub fn new(name: &str, kind: CategoryKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            is_productive: kind == CategoryKind::Work,
            is_billable: false,
            max_duration_minutes: None,
        }
    }
}

pub async fn create_category(pool: &SqlitePool, category: &NewCategory) -> QueryResult<Category> {
    let result = sqlx::query(
        "INSERT INTO categories (name, kind, is_productive, is_billable, max_duration_minutes)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&category.name)
    .bind(category.kind.as_str())
    .bind(category.is_productive)
    .bind(category.is_billable)
    .bind(category.max_duration_minutes)
    .execute(pool)
    .await?;

    let category_id = result.last_insert_rowid();
    get_category(pool, category_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

pub async fn set_category_active(
    pool: &SqlitePool,
    category_id: i64,
    is_active: bool,
) -> QueryResult<()> {
    sqlx::query("UPDATE categories SET is_active = ? WHERE id = ?")
        .bind(is_active)
        .bind(category_id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn get_category(pool: &SqlitePool, category_id: i64) -> QueryResult<Option<Category>> {
    let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(category_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(category_from_row).transpose()
}

pub async fn list_categories(pool: &SqlitePool) -> QueryResult<Vec<Category>> {
    let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY id ASC");
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    collect(rows, category_from_row)
}

// Order queries

pub async fn create_order(
    pool: &SqlitePool,
    order_number: &str,
    title: &str,
    status: OrderStatus,
    at: DateTime<Utc>,
) -> QueryResult<Order> {
    let result = sqlx::query(
        "INSERT INTO orders (order_number, title, status, updated_at) VALUES (?, ?, ?, ?)",
    )
    .bind(order_number)
    .bind(title)
    .bind(status.as_str())
    .bind(at)
    .execute(pool)
    .await?;

    let order_id = result.last_insert_rowid();
    get_order(pool, order_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

pub async fn get_order(pool: &SqlitePool, order_id: i64) -> QueryResult<Option<Order>> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(order_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(order_from_row).transpose()
}

// Attendance span queries

pub async fn get_attendance_span(
    pool: &SqlitePool,
    span_id: i64,
) -> QueryResult<Option<AttendanceSpan>> {
    let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance_spans WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(span_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(attendance_from_row).transpose()
}

pub async fn get_open_attendance(
    pool: &SqlitePool,
    employee_id: i64,
) -> QueryResult<Option<AttendanceSpan>> {
    let sql = format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance_spans
         WHERE employee_id = ? AND ended_at IS NULL
         ORDER BY started_at DESC
         LIMIT 1"
    );
    let row = sqlx::query(&sql)
        .bind(employee_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(attendance_from_row).transpose()
}

pub async fn get_all_open_attendance(pool: &SqlitePool) -> QueryResult<Vec<AttendanceSpan>> {
    let sql = format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance_spans
         WHERE ended_at IS NULL
         ORDER BY started_at ASC"
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    collect(rows, attendance_from_row)
}

pub async fn get_last_closed_attendance(
    pool: &SqlitePool,
    employee_id: i64,
) -> QueryResult<Option<AttendanceSpan>> {
    let sql = format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance_spans
         WHERE employee_id = ? AND ended_at IS NOT NULL
         ORDER BY ended_at DESC
         LIMIT 1"
    );
    let row = sqlx::query(&sql)
        .bind(employee_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(attendance_from_row).transpose()
}

/// Spans starting in `[from, to)`, optionally for a single employee.
pub async fn get_attendance_between(
    pool: &SqlitePool,
    employee_id: Option<i64>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> QueryResult<Vec<AttendanceSpan>> {
    let sql = format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance_spans
         WHERE (? IS NULL OR employee_id = ?) AND started_at >= ? AND started_at < ?
         ORDER BY started_at ASC"
    );
    let rows = sqlx::query(&sql)
        .bind(employee_id)
        .bind(employee_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;
    collect(rows, attendance_from_row)
}

// Break span queries

pub async fn get_break_span(pool: &SqlitePool, span_id: i64) -> QueryResult<Option<BreakSpan>> {
    let sql = format!("SELECT {BREAK_COLUMNS} FROM break_spans WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(span_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(break_from_row).transpose()
}

pub async fn get_open_break(pool: &SqlitePool, employee_id: i64) -> QueryResult<Option<BreakSpan>> {
    let sql = format!(
        "SELECT {BREAK_COLUMNS} FROM break_spans
         WHERE employee_id = ? AND ended_at IS NULL
         ORDER BY started_at DESC
         LIMIT 1"
    );
    let row = sqlx::query(&sql)
        .bind(employee_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(break_from_row).transpose()
}

pub async fn get_all_open_breaks(pool: &SqlitePool) -> QueryResult<Vec<BreakSpan>> {
    let sql = format!(
        "SELECT {BREAK_COLUMNS} FROM break_spans
         WHERE ended_at IS NULL
         ORDER BY started_at ASC"
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    collect(rows, break_from_row)
}

pub async fn get_breaks_between(
    pool: &SqlitePool,
    employee_id: Option<i64>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> QueryResult<Vec<BreakSpan>> {
    let sql = format!(
        "SELECT {BREAK_COLUMNS} FROM break_spans
         WHERE (? IS NULL OR employee_id = ?) AND started_at >= ? AND started_at < ?
         ORDER BY started_at ASC"
    );
    let rows = sqlx::query(&sql)
        .bind(employee_id)
        .bind(employee_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;
    collect(rows, break_from_row)
}

/// Open breaks whose employee has no open attendance.
pub async fn get_dangling_breaks(pool: &SqlitePool) -> QueryResult<Vec<BreakSpan>> {
    let sql = format!(
        "SELECT {BREAK_COLUMNS} FROM break_spans b
         WHERE b.ended_at IS NULL
           AND NOT EXISTS (
               SELECT 1 FROM attendance_spans a
               WHERE a.employee_id = b.employee_id AND a.ended_at IS NULL
           )
         ORDER BY b.started_at ASC"
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    collect(rows, break_from_row)
}

// Work span queries

pub async fn get_work_span(pool: &SqlitePool, span_id: i64) -> QueryResult<Option<WorkSpan>> {
    let sql = format!("SELECT {WORK_COLUMNS} FROM work_spans WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(span_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(work_from_row).transpose()
}

pub async fn get_open_work(pool: &SqlitePool, employee_id: i64) -> QueryResult<Option<WorkSpan>> {
    let sql = format!(
        "SELECT {WORK_COLUMNS} FROM work_spans
         WHERE employee_id = ? AND ended_at IS NULL
         ORDER BY started_at DESC
         LIMIT 1"
    );
    let row = sqlx::query(&sql)
        .bind(employee_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(work_from_row).transpose()
}

pub async fn get_all_open_work(pool: &SqlitePool) -> QueryResult<Vec<WorkSpan>> {
    let sql = format!(
        "SELECT {WORK_COLUMNS} FROM work_spans
         WHERE ended_at IS NULL
         ORDER BY started_at ASC"
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    collect(rows, work_from_row)
}

pub async fn count_open_work(pool: &SqlitePool, employee_id: i64) -> QueryResult<i64> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM work_spans WHERE employee_id = ? AND ended_at IS NULL",
    )
    .bind(employee_id)
    .fetch_one(pool)
    .await
}

pub async fn get_work_between(
    pool: &SqlitePool,
    employee_id: Option<i64>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> QueryResult<Vec<WorkSpan>> {
    let sql = format!(
        "SELECT {WORK_COLUMNS} FROM work_spans
         WHERE (? IS NULL OR employee_id = ?) AND started_at >= ? AND started_at < ?
         ORDER BY started_at ASC"
    );
    let rows = sqlx::query(&sql)
        .bind(employee_id)
        .bind(employee_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;
    collect(rows, work_from_row)
}

/// Open work sessions left behind by a clock-out.
pub async fn get_dangling_work(pool: &SqlitePool) -> QueryResult<Vec<WorkSpan>> {
    let sql = format!(
        "SELECT {WORK_COLUMNS} FROM work_spans w
         WHERE w.ended_at IS NULL
           AND NOT EXISTS (
               SELECT 1 FROM attendance_spans a
               WHERE a.employee_id = w.employee_id AND a.ended_at IS NULL
           )
         ORDER BY w.started_at ASC"
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    collect(rows, work_from_row)
}
