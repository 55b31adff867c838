//! Bot settings and configuration structures.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use validator::Validate;

use crate::shared::error::BotError;
use crate::shared::validation::validation_error;
use crate::shared::RetryPolicy;

/// Root configuration structure containing all bot settings.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    /// Remote service connectivity
    #[serde(default)]
    pub bot: BotSettings,

    /// Log level and output format
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Engine queue sizes, pacing and retry limits
    #[serde(default)]
    pub dispatch: DispatchSettings,

    /// Process plumbing (PID file)
    #[serde(default)]
    pub server: ServerSettings,

    /// Current environment (development, staging, production)
    #[serde(default)]
    pub environment: String,

    /// The merged source, kept for plugin sections
    #[serde(skip)]
    raw: Option<Arc<Config>>,
}

/// Remote service settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BotSettings {
    /// API token handed to the transport
    pub api_token: String,

    /// Verbose transport logging
    pub debug: bool,

    /// Channels joined on every connection, by name
    pub join_channels: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Level directive (e.g. "info", "debug"); unparsable values mean "info"
    pub level: String,

    /// "text" or "json"
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl LoggingSettings {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

pub const DEFAULT_EVENT_BUFFER: usize = 500;
pub const DEFAULT_REPLY_QUEUE_CAPACITY: usize = 500;
pub const DEFAULT_SEND_INTERVAL_MS: u64 = 50;
pub const DEFAULT_SEND_MAX_RETRIES: u32 = 3;
pub const DEFAULT_SEND_RETRY_BASE_MS: u64 = 250;
pub const DEFAULT_DIRECTORY_FETCH_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_DIRECTORY_FETCH_BACKOFF_MS: u64 = 500;
pub const DEFAULT_MAX_MANAGED_LISTENERS: usize = 1024;
pub const DEFAULT_ACK_TIMEOUT_SECS: u64 = 20;

/// Engine tuning.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct DispatchSettings {
    /// Capacity of the raw event channel feeding the dispatcher
    #[validate(range(min = 1, max = 1_000_000, message = "must be between 1 and 1000000"))]
    pub event_buffer: usize,

    /// Capacity of the outgoing queue
    #[validate(range(min = 1, max = 1_000_000, message = "must be between 1 and 1000000"))]
    pub reply_queue_capacity: usize,

    /// Minimum delay between two outbound calls
    pub send_interval_ms: u64,

    /// Retries of a transient outbound failure
    #[validate(range(max = 10, message = "must be at most 10"))]
    pub send_max_retries: u32,

    pub send_retry_base_ms: u64,

    /// Attempts of the bulk directory fetch on connection
    #[validate(range(min = 1, max = 20, message = "must be between 1 and 20"))]
    pub directory_fetch_max_attempts: u32,

    pub directory_fetch_backoff_ms: u64,

    /// Upper bound of concurrently running managed listener workers
    #[validate(range(min = 1, message = "must be positive"))]
    pub max_managed_listeners: usize,

    /// How long a reply handle waits for the sender loop
    #[validate(range(min = 1, message = "must be positive"))]
    pub ack_timeout_secs: u64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            event_buffer: DEFAULT_EVENT_BUFFER,
            reply_queue_capacity: DEFAULT_REPLY_QUEUE_CAPACITY,
            send_interval_ms: DEFAULT_SEND_INTERVAL_MS,
            send_max_retries: DEFAULT_SEND_MAX_RETRIES,
            send_retry_base_ms: DEFAULT_SEND_RETRY_BASE_MS,
            directory_fetch_max_attempts: DEFAULT_DIRECTORY_FETCH_MAX_ATTEMPTS,
            directory_fetch_backoff_ms: DEFAULT_DIRECTORY_FETCH_BACKOFF_MS,
            max_managed_listeners: DEFAULT_MAX_MANAGED_LISTENERS,
            ack_timeout_secs: DEFAULT_ACK_TIMEOUT_SECS,
        }
    }
}

impl DispatchSettings {
    pub fn send_interval(&self) -> Duration {
        Duration::from_millis(self.send_interval_ms)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_secs)
    }

    /// Retry policy for outbound calls.
    pub fn send_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.send_max_retries,
            Duration::from_millis(self.send_retry_base_ms),
        )
    }

    /// Retry policy for the bulk directory fetch.
    pub fn directory_fetch_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.directory_fetch_max_attempts.saturating_sub(1),
            Duration::from_millis(self.directory_fetch_backoff_ms),
        )
    }
}

/// Process-level settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerSettings {
    /// Where to write the process ID, if anywhere
    pub pid_file: Option<PathBuf>,
}

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. Built-in defaults
    /// 2. config/default.* and config/{RUN_ENV}.* (both optional)
    /// 3. Environment variables prefixed `BOT__` (highest priority), plus
    ///    `BOT_API_TOKEN`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Like [`Settings::load`], but reading one explicit file instead of the
    /// `config/` directory.
    ///
    /// On unix the file must not be readable by group or others; it holds the
    /// API token.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        // Determine the running environment
        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "text")?
            .set_default("dispatch.event_buffer", DEFAULT_EVENT_BUFFER as i64)?
            .set_default("dispatch.reply_queue_capacity", DEFAULT_REPLY_QUEUE_CAPACITY as i64)?
            .set_default("dispatch.send_interval_ms", DEFAULT_SEND_INTERVAL_MS as i64)?
            .set_default("dispatch.send_max_retries", DEFAULT_SEND_MAX_RETRIES as i64)?
            .set_default("dispatch.send_retry_base_ms", DEFAULT_SEND_RETRY_BASE_MS as i64)?
            .set_default(
                "dispatch.directory_fetch_max_attempts",
                DEFAULT_DIRECTORY_FETCH_MAX_ATTEMPTS as i64,
            )?
            .set_default(
                "dispatch.directory_fetch_backoff_ms",
                DEFAULT_DIRECTORY_FETCH_BACKOFF_MS as i64,
            )?
            .set_default(
                "dispatch.max_managed_listeners",
                DEFAULT_MAX_MANAGED_LISTENERS as i64,
            )?
            .set_default("dispatch.ack_timeout_secs", DEFAULT_ACK_TIMEOUT_SECS as i64)?;

        builder = match path {
            Some(path) => {
                check_permissions(path)?;
                builder.add_source(File::from(path).required(true))
            }
            None => builder
                .add_source(File::with_name("config/default").required(false))
                .add_source(File::with_name(&format!("config/{}", environment)).required(false)),
        };

        let config = builder
            // BOT__DISPATCH__EVENT_BUFFER=100 -> dispatch.event_buffer = 100
            .add_source(
                Environment::with_prefix("BOT")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("bot.join_channels")
                    .try_parsing(true),
            )
            .set_override_option("bot.api_token", std::env::var("BOT_API_TOKEN").ok())?
            .build()?;

        Self::from_config(config)
    }

    /// Deserialize and validate an already merged source.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let mut settings: Self = config.clone().try_deserialize()?;
        settings
            .dispatch
            .validate()
            .map_err(|e| ConfigError::Message(validation_error(e).to_string()))?;
        settings.raw = Some(Arc::new(config));
        Ok(settings)
    }

    /// Deserialize the section at `key` into a plugin-owned structure.
    pub fn section<T: DeserializeOwned>(&self, key: &str) -> Result<T, BotError> {
        match &self.raw {
            Some(config) => Ok(config.get::<T>(key)?),
            None => Err(BotError::Config(ConfigError::NotFound(key.to_string()))),
        }
    }
}

#[cfg(unix)]
fn check_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path)
        .map_err(|e| ConfigError::Message(format!("{}: {}", path.display(), e)))?;
    let mode = metadata.permissions().mode();
    if mode & 0o077 != 0 {
        return Err(ConfigError::Message(format!(
            "{} is accessible by group or others (mode {:o}); restrict it to the owner",
            path.display(),
            mode & 0o777
        )));
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}
