//! PostgreSQL connection management
//!
//! The pool is created once in `main` and shared by the member store and the
//! notification queue.

use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use thiserror::Error;

pub mod members;
pub mod update;

pub use members::{MemberStore, PgMemberStore};
pub use update::{ConditionalUpdate, FieldAssignment, UpdateCondition};

/// Database setup errors
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Database configuration error: {0}. Check DATABASE_URL and connection settings.")]
    Config(String),
}

pub type DbResult<T> = Result<T, DbError>;

pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/roster";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_MIN_CONNECTIONS: u32 = 2;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: Option<u64>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            idle_timeout_secs: Some(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }
}

impl DbConfig {
    pub fn from_source<F>(lookup: &F) -> DbResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_connections =
            parse_var::<u32, F>(lookup, "DATABASE_MAX_CONNECTIONS")?.unwrap_or(defaults.max_connections);
        let min_connections =
            parse_var::<u32, F>(lookup, "DATABASE_MIN_CONNECTIONS")?.unwrap_or(defaults.min_connections);

        Ok(Self {
            url: lookup("DATABASE_URL").unwrap_or_default(),
            max_connections,
            min_connections,
            connect_timeout_secs: parse_var::<u64, F>(lookup, "DATABASE_CONNECT_TIMEOUT")?
                .unwrap_or(defaults.connect_timeout_secs),
            idle_timeout_secs: parse_var::<u64, F>(lookup, "DATABASE_IDLE_TIMEOUT")?
                .or(defaults.idle_timeout_secs),
        })
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> DbResult<Option<T>>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| DbError::Config(format!("{} is not a valid number: {}", name, raw)))
        })
        .transpose()
}

pub async fn create_pool(config: &DbConfig) -> DbResult<PgPool> {
    if config.max_connections == 0 {
        return Err(DbError::Config("max_connections must be greater than 0".to_string()));
    }

    let mut options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs));

    if let Some(idle_timeout) = config.idle_timeout_secs {
        options = options.idle_timeout(Duration::from_secs(idle_timeout));
    }

    let pool = options.connect(&config.url).await?;

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database connection pool created"
    );

    Ok(pool)
}

/// Apply the bundled schema migrations (`members`, `notification_queue`).
pub async fn migrate(pool: &PgPool) -> DbResult<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    tracing::info!("Database migrations completed");
    Ok(())
}

pub async fn health_check(pool: &PgPool) -> DbResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(DbError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_from_source_defaults() {
        let config = DbConfig::from_source(&|_: &str| None).unwrap();
        assert!(config.url.is_empty());
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.idle_timeout_secs, Some(DEFAULT_IDLE_TIMEOUT_SECS));
    }

    #[test]
    fn test_from_source_overrides() {
        let vars = HashMap::from([
            ("DATABASE_URL", "postgresql://db/roster"),
            ("DATABASE_MAX_CONNECTIONS", "32"),
        ]);
        let config =
            DbConfig::from_source(&|name: &str| vars.get(name).map(|v| v.to_string())).unwrap();

        assert_eq!(config.url, "postgresql://db/roster");
        assert_eq!(config.max_connections, 32);
    }

    #[test]
    fn test_from_source_rejects_garbage() {
        let err = DbConfig::from_source(&|name: &str| {
            (name == "DATABASE_CONNECT_TIMEOUT").then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, DbError::Config(_)));
    }

    #[test]
    fn test_from_source_rejects_connection_count_overflow() {
        let err = DbConfig::from_source(&|name: &str| {
            (name == "DATABASE_MAX_CONNECTIONS").then(|| "4294967296".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, DbError::Config(ref msg) if msg.contains("DATABASE_MAX_CONNECTIONS")));
    }
}
