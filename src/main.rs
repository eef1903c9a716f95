use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use workshop_timeline::config::Config;
use workshop_timeline::database::{self, queries};
use workshop_timeline::utils::format::{format_presence_board, format_ranking};
use workshop_timeline::utils::time::{Clock, SystemClock, local_date, workshop_offset};
use workshop_timeline::utils::validation::DateRange;
use workshop_timeline::Workshop;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "workshop_timeline=info,sqlx=warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let pool = database::create_connection(
        &config.database_url,
        config.max_connections,
        config.busy_timeout,
    )
    .await?;
    tracing::info!("Connected to {}", config.database_url);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let offset = workshop_offset(config.utc_offset_hours);
    let workshop = Workshop::new(pool.clone(), clock.clone(), offset);

    let employees = queries::list_active_employees(&pool).await?;
    let board = workshop.presence_board().await?;
    println!("{}", format_presence_board(&board, &employees, offset));

    let anomalies = workshop.anomalies().await?;
    for session in &anomalies.dangling_sessions {
        tracing::warn!(
            "Session {} of employee {} is open without attendance",
            session.id,
            session.employee_id
        );
    }
    for open_break in &anomalies.dangling_breaks {
        tracing::warn!(
            "Break {} of employee {} is open without attendance",
            open_break.id,
            open_break.employee_id
        );
    }

    let today = DateRange::single_day(local_date(clock.now(), offset));
    let ranking = workshop.performance().team_ranking(today).await?;
    println!();
    println!("{}", format_ranking(&ranking));

    pool.close().await;
    Ok(())
}
