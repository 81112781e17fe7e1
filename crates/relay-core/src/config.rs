use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_CONFIG_PATH: &str = "relay.toml";
pub const DEFAULT_JOB_NAME: &str = "fetch-messages";
pub const DEFAULT_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_BATCH_LIMIT: usize = 2;
/// Upper bound for `scheduler.batch_limit`; one cycle holds this many
/// deliveries inside a single transaction.
pub const MAX_BATCH_LIMIT: usize = 500;
pub const DEFAULT_DELIVERY_TIMEOUT_MS: u64 = 5_000;
pub const LOG_LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];

/// Top-level config (relay.toml + RELAY_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// One of `debug`, `info`, `warn`, `error`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// The message delivery job registered at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_job_name")]
    pub job_name: String,
    /// Tick period of the delivery job in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Maximum number of messages picked up per cycle.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
    /// Start every registered job right after boot.
    #[serde(default = "bool_true")]
    pub autostart: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            job_name: default_job_name(),
            interval_ms: default_interval_ms(),
            batch_limit: default_batch_limit(),
            autostart: true,
        }
    }
}

/// How a message leaves the process.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryMode {
    /// Log the message and report success.
    #[default]
    Log,
    /// POST the message as JSON to `webhook_url`.
    Webhook,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default)]
    pub mode: DeliveryMode,
    pub webhook_url: Option<String>,
    #[serde(default = "default_delivery_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            mode: DeliveryMode::Log,
            webhook_url: None,
            timeout_ms: default_delivery_timeout_ms(),
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_db_path() -> String {
    "relay.db".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_job_name() -> String {
    DEFAULT_JOB_NAME.to_string()
}
fn default_interval_ms() -> u64 {
    DEFAULT_INTERVAL_MS
}
fn default_batch_limit() -> usize {
    DEFAULT_BATCH_LIMIT
}
fn default_delivery_timeout_ms() -> u64 {
    DEFAULT_DELIVERY_TIMEOUT_MS
}

impl RelayConfig {
    /// Load config from a TOML file with RELAY_* env var overrides.
    ///
    /// Nested keys use a double underscore: `RELAY_HTTP__PORT=9090`.
    /// A missing file is not an error; every field has a default.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path.unwrap_or(DEFAULT_CONFIG_PATH);

        let config: RelayConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("RELAY_").split("__"))
            .extract()
            .map_err(|e| RelayError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the rest of the system cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.http.port == 0 {
            return Err(RelayError::Config("http.port must be in 1..=65535".into()));
        }
        if !LOG_LEVELS.contains(&self.log.level.as_str()) {
            return Err(RelayError::Config(format!(
                "log.level must be one of {}, got '{}'",
                LOG_LEVELS.join("|"),
                self.log.level
            )));
        }
        if self.database.path.trim().is_empty() {
            return Err(RelayError::Config("database.path is required".into()));
        }
        if self.scheduler.job_name.trim().is_empty() {
            return Err(RelayError::Config("scheduler.job_name is required".into()));
        }
        if self.scheduler.interval_ms == 0 {
            return Err(RelayError::Config(
                "scheduler.interval_ms must be at least 1".into(),
            ));
        }
        if self.scheduler.batch_limit == 0 || self.scheduler.batch_limit > MAX_BATCH_LIMIT {
            return Err(RelayError::Config(format!(
                "scheduler.batch_limit must be in 1..={MAX_BATCH_LIMIT}, got {}",
                self.scheduler.batch_limit
            )));
        }
        if self.delivery.mode == DeliveryMode::Webhook && self.delivery.webhook_url.is_none() {
            return Err(RelayError::Config(
                "delivery.webhook_url is required when delivery.mode = \"webhook\"".into(),
            ));
        }
        Ok(())
    }
}
