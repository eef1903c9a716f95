use sqlx::SqlitePool;
use tracing::info;

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    info!("Running database migrations...");

    create_employees_table(pool).await?;
    create_categories_table(pool).await?;
    create_orders_table(pool).await?;
    create_attendance_spans_table(pool).await?;
    create_break_spans_table(pool).await?;
    create_work_spans_table(pool).await?;

    info!("Database migrations completed successfully");
    Ok(())
}

async fn create_employees_table(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS employees (
            id INTEGER PRIMARY KEY,
            employee_number TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'employee'
                CHECK (role IN ('employee', 'dispatcher', 'admin')),
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            hourly_rate REAL CHECK (hourly_rate IS NULL OR hourly_rate >= 0),
            pin_hash TEXT,
            badge_id TEXT UNIQUE,
            archived_at DATETIME,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_categories_table(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('work', 'break', 'other')),
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            is_productive BOOLEAN NOT NULL DEFAULT TRUE,
            is_billable BOOLEAN NOT NULL DEFAULT FALSE,
            max_duration_minutes INTEGER,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_orders_table(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            id INTEGER PRIMARY KEY,
            order_number TEXT UNIQUE NOT NULL,
            title TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'created'
                CHECK (status IN ('created', 'in_progress', 'completed', 'cancelled')),
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_attendance_spans_table(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attendance_spans (
            id INTEGER PRIMARY KEY,
            employee_id INTEGER NOT NULL,
            started_at DATETIME NOT NULL,
            ended_at DATETIME,
            duration_hours REAL,
            clock_in_method TEXT NOT NULL CHECK (clock_in_method IN ('web', 'kiosk')),
            clock_out_method TEXT CHECK (clock_out_method IN ('web', 'kiosk')),
            location TEXT,
            note TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (employee_id) REFERENCES employees (id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One open attendance per employee, enforced by the store itself.
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_attendance_one_open
         ON attendance_spans (employee_id) WHERE ended_at IS NULL",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_attendance_employee_start
         ON attendance_spans (employee_id, started_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_break_spans_table(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS break_spans (
            id INTEGER PRIMARY KEY,
            employee_id INTEGER NOT NULL,
            category_id INTEGER NOT NULL,
            attendance_span_id INTEGER,
            started_at DATETIME NOT NULL,
            ended_at DATETIME,
            duration_minutes REAL,
            auto_ended BOOLEAN NOT NULL DEFAULT FALSE,
            note TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (employee_id) REFERENCES employees (id),
            FOREIGN KEY (category_id) REFERENCES categories (id),
            FOREIGN KEY (attendance_span_id) REFERENCES attendance_spans (id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_break_one_open
         ON break_spans (employee_id) WHERE ended_at IS NULL",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_break_employee_start
         ON break_spans (employee_id, started_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_work_spans_table(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS work_spans (
            id INTEGER PRIMARY KEY,
            employee_id INTEGER NOT NULL,
            order_id INTEGER,
            category_id INTEGER,
            task_description TEXT,
            started_at DATETIME NOT NULL,
            ended_at DATETIME,
            duration_minutes REAL,
            hourly_rate REAL,
            is_billable BOOLEAN NOT NULL DEFAULT FALSE,
            cost REAL,
            method TEXT NOT NULL CHECK (method IN ('web', 'kiosk')),
            note TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            CHECK ((order_id IS NULL) <> (category_id IS NULL)),
            FOREIGN KEY (employee_id) REFERENCES employees (id),
            FOREIGN KEY (order_id) REFERENCES orders (id),
            FOREIGN KEY (category_id) REFERENCES categories (id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_work_one_open
         ON work_spans (employee_id) WHERE ended_at IS NULL",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_work_employee_start
         ON work_spans (employee_id, started_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
