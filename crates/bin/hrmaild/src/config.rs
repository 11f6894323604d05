//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `hrmail.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use hrmail_app::dispatcher::DispatcherConfig;
use hrmail_domain::automation::looks_like_address;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Mail dispatch settings.
    pub mail: MailConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Mail dispatcher and outbox configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// Number of worker tasks sending mail.
    pub workers: usize,
    /// Jobs that may wait in the queue before mutations block.
    pub queue_capacity: usize,
    /// Sent mails kept for `/api/outbox`.
    pub outbox_capacity: usize,
    /// Sender address on every mail.
    pub from_address: String,
}

impl Config {
    /// Load configuration from `hrmail.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting values are invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("hrmail.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("HRMAIL_HOST") {
            self.server.host = val;
        }
        if let Some(port) = var("HRMAIL_PORT").and_then(|val| val.parse().ok()) {
            self.server.port = port;
        }
        if let Some(val) = var("HRMAIL_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.server.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.server.port = port;
                }
            }
        }
        if let Some(val) = var("HRMAIL_DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(val) = var("HRMAIL_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(workers) = var("HRMAIL_MAIL_WORKERS").and_then(|val| val.parse().ok()) {
            self.mail.workers = workers;
        }
        if let Some(capacity) = var("HRMAIL_QUEUE_CAPACITY").and_then(|val| val.parse().ok()) {
            self.mail.queue_capacity = capacity;
        }
        if let Some(capacity) = var("HRMAIL_OUTBOX_CAPACITY").and_then(|val| val.parse().ok()) {
            self.mail.outbox_capacity = capacity;
        }
        if let Some(val) = var("HRMAIL_FROM_ADDRESS") {
            self.mail.from_address = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.mail.workers == 0 {
            return Err(ConfigError::Validation(
                "mail.workers must be non-zero".to_string(),
            ));
        }
        if self.mail.queue_capacity == 0 || self.mail.outbox_capacity == 0 {
            return Err(ConfigError::Validation(
                "mail capacities must be non-zero".to_string(),
            ));
        }
        if !looks_like_address(&self.mail.from_address) {
            return Err(ConfigError::Validation(format!(
                "`{}` is not a valid sender address",
                self.mail.from_address
            )));
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    /// Settings for the mail worker pool.
    #[must_use]
    pub fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig {
            workers: self.mail.workers,
            capacity: self.mail.queue_capacity,
            from_address: self.mail.from_address.clone(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:hrmail.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "hrmaild=info,hrmail_app=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        let dispatcher = DispatcherConfig::default();
        Self {
            workers: dispatcher.workers,
            queue_capacity: dispatcher.capacity,
            outbox_capacity: 100,
            from_address: dispatcher.from_address,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
