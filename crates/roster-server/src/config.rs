//! Configuration management
//!
//! Everything is read from the environment once at start-up (after `.env` is
//! loaded), validated, then handed to the components that need it. Storage
//! credentials live in [`crate::storage::config::StorageConfig`].

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::db::DbConfig;

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";
pub const DEFAULT_SERVER_PORT: u16 = 8000;
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Resource every notification links to.
pub const DEFAULT_LINK_KEY: &str = "index.html";

/// Validity window of the emailed link (2 hours).
pub const DEFAULT_LINK_TTL_SECS: u64 = 2 * 60 * 60;

pub const DEFAULT_EXPORT_INTERVAL_SECS: u64 = 3600;

pub const DEFAULT_QUEUE_NAME: &str = "member-notifications";
pub const DEFAULT_QUEUE_BATCH_SIZE: u32 = 10;
pub const DEFAULT_QUEUE_VISIBILITY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_QUEUE_MAX_RECEIVES: u32 = 5;
pub const DEFAULT_QUEUE_PUBLISH_DELAY_SECS: u64 = 1;
pub const DEFAULT_QUEUE_POLL_INTERVAL_SECS: u64 = 5;

/// Subject of the measurement request email ("please record your weight").
pub const DEFAULT_MAIL_SUBJECT: &str = "体重測定のお願い";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DbConfig,
    pub pipeline: PipelineConfig,
    pub queue: QueueConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Buckets, keys and schedule used by the notifier and the exporter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub link_bucket: String,
    pub link_key: String,
    pub link_ttl_secs: u64,
    pub export_bucket: String,
    pub export_prefix: String,
    pub export_interval_secs: u64,
    pub export_enabled: bool,
}

impl PipelineConfig {
    pub fn link_ttl(&self) -> Duration {
        Duration::from_secs(self.link_ttl_secs)
    }

    pub fn export_interval(&self) -> Duration {
        Duration::from_secs(self.export_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub name: String,
    pub batch_size: u32,
    pub visibility_timeout_secs: u64,
    /// Deliveries beyond this count are discarded instead of processed
    pub max_receives: u32,
    pub publish_delay_secs: u64,
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub api_url: String,
    #[serde(skip_serializing)]
    pub api_token: Option<String>,
    pub sender: String,
    pub subject: String,
}

impl Config {
    /// Load configuration from `.env` and the process environment
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_source(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_source<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let config = Config {
            server: ServerConfig {
                host: vars.string("ROSTER_HOST", DEFAULT_SERVER_HOST),
                port: vars.parse("ROSTER_PORT", DEFAULT_SERVER_PORT)?,
                shutdown_timeout_secs: vars
                    .parse("ROSTER_SHUTDOWN_TIMEOUT", DEFAULT_SHUTDOWN_TIMEOUT_SECS)?,
            },
            database: DbConfig::from_source(&lookup)?,
            pipeline: PipelineConfig {
                link_bucket: vars.string("LINK_BUCKET", ""),
                link_key: vars.string("LINK_KEY", DEFAULT_LINK_KEY),
                link_ttl_secs: vars.parse("LINK_TTL_SECS", DEFAULT_LINK_TTL_SECS)?,
                export_bucket: vars.string("EXPORT_BUCKET", ""),
                export_prefix: vars.string("EXPORT_PREFIX", ""),
                export_interval_secs: vars
                    .parse("EXPORT_INTERVAL_SECS", DEFAULT_EXPORT_INTERVAL_SECS)?,
                export_enabled: vars.parse("EXPORT_ENABLED", true)?,
            },
            queue: QueueConfig {
                name: vars.string("QUEUE_NAME", DEFAULT_QUEUE_NAME),
                batch_size: vars.parse("QUEUE_BATCH_SIZE", DEFAULT_QUEUE_BATCH_SIZE)?,
                visibility_timeout_secs: vars.parse(
                    "QUEUE_VISIBILITY_TIMEOUT_SECS",
                    DEFAULT_QUEUE_VISIBILITY_TIMEOUT_SECS,
                )?,
                max_receives: vars.parse("QUEUE_MAX_RECEIVES", DEFAULT_QUEUE_MAX_RECEIVES)?,
                publish_delay_secs: vars
                    .parse("QUEUE_PUBLISH_DELAY_SECS", DEFAULT_QUEUE_PUBLISH_DELAY_SECS)?,
                poll_interval_secs: vars
                    .parse("QUEUE_POLL_INTERVAL_SECS", DEFAULT_QUEUE_POLL_INTERVAL_SECS)?,
            },
            mail: MailConfig {
                api_url: vars.string("MAIL_API_URL", ""),
                api_token: lookup("MAIL_API_TOKEN").filter(|t| !t.is_empty()),
                sender: vars.string("ADMIN_MAIL_ADDRESS", ""),
                subject: vars.string("MAIL_SUBJECT", DEFAULT_MAIL_SUBJECT),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("DATABASE_URL cannot be empty");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        for (name, value) in [
            ("LINK_BUCKET", &self.pipeline.link_bucket),
            ("LINK_KEY", &self.pipeline.link_key),
            ("EXPORT_BUCKET", &self.pipeline.export_bucket),
            ("MAIL_API_URL", &self.mail.api_url),
            ("ADMIN_MAIL_ADDRESS", &self.mail.sender),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("{} must be set", name);
            }
        }

        if self.pipeline.link_ttl_secs == 0 {
            anyhow::bail!("LINK_TTL_SECS must be greater than 0");
        }

        if self.pipeline.export_interval_secs == 0 {
            anyhow::bail!("EXPORT_INTERVAL_SECS must be greater than 0");
        }

        if self.queue.batch_size == 0 {
            anyhow::bail!("QUEUE_BATCH_SIZE must be greater than 0");
        }

        if self.queue.max_receives == 0 {
            anyhow::bail!("QUEUE_MAX_RECEIVES must be greater than 0");
        }

        Ok(())
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str, default: &str) -> String {
        (self.0)(name).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, name: &str, default: T) -> anyhow::Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match (self.0)(name) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid value for {}: {} ({})", name, raw, e)),
            None => Ok(default),
        }
    }
}
