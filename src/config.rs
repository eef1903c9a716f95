use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub busy_timeout: Duration,
    pub utc_offset_hours: i32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:workshop.db".to_string());

        let max_connections = parse_var("DATABASE_MAX_CONNECTIONS", 5u32)?;
        if max_connections == 0 {
            anyhow::bail!("DATABASE_MAX_CONNECTIONS must be at least 1");
        }

        let busy_timeout = Duration::from_secs(parse_var("DATABASE_BUSY_TIMEOUT_SECS", 5u64)?);

        let utc_offset_hours = parse_var("WORKSHOP_UTC_OFFSET_HOURS", 0i32)?;
        if !(-12..=14).contains(&utc_offset_hours) {
            anyhow::bail!(
                "WORKSHOP_UTC_OFFSET_HOURS must be between -12 and 14, got {}",
                utc_offset_hours
            );
        }

        Ok(Config {
            database_url,
            max_connections,
            busy_timeout,
            utc_offset_hours,
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value: {}", name, raw)),
        Err(_) => Ok(default),
    }
}
