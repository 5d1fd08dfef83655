// Daemon configuration (environment variables)

use jobrelay_core::application::worker::constants::DEFAULT_MAX_CONCURRENT_DISPATCHES;
use jobrelay_core::port::state_notifier::DEFAULT_CAPACITY;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_DB_PATH: &str = "~/.jobrelay/jobs.db";

pub const ENV_DB_PATH: &str = "JOBRELAY_DB_PATH";
pub const ENV_MAX_CONCURRENT_DISPATCHES: &str = "JOBRELAY_MAX_CONCURRENT_DISPATCHES";
pub const ENV_EVENT_BUFFER: &str = "JOBRELAY_EVENT_BUFFER";
pub const ENV_LOG_FORMAT: &str = "JOBRELAY_LOG_FORMAT";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got '{value}'")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} must be 'pretty' or 'json', got '{value}'")]
    InvalidLogFormat { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Development: pretty formatting with colors
    #[default]
    Pretty,
    /// Production: JSON structured logging
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::InvalidLogFormat {
                key: ENV_LOG_FORMAT,
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Job Store location: a file path (tilde expanded) or a `sqlite:` URL
    pub db_path: String,
    pub max_concurrent_dispatches: usize,
    /// Capacity of the transition broadcast buffer
    pub event_buffer: usize,
    pub log_format: LogFormat,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            db_path: shellexpand::tilde(DEFAULT_DB_PATH).into_owned(),
            max_concurrent_dispatches: DEFAULT_MAX_CONCURRENT_DISPATCHES,
            event_buffer: DEFAULT_CAPACITY,
            log_format: LogFormat::default(),
        }
    }
}

impl DaemonConfig {
    /// Load from `JOBRELAY_*` environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let db_path = lookup(ENV_DB_PATH)
            .map(|path| shellexpand::tilde(&path).into_owned())
            .unwrap_or(defaults.db_path);

        let max_concurrent_dispatches = match lookup(ENV_MAX_CONCURRENT_DISPATCHES) {
            Some(value) => parse_positive(ENV_MAX_CONCURRENT_DISPATCHES, &value)?,
            None => defaults.max_concurrent_dispatches,
        };

        let event_buffer = match lookup(ENV_EVENT_BUFFER) {
            Some(value) => parse_positive(ENV_EVENT_BUFFER, &value)?,
            None => defaults.event_buffer,
        };

        let log_format = match lookup(ENV_LOG_FORMAT) {
            Some(value) => value.parse()?,
            None => defaults.log_format,
        };

        Ok(Self {
            db_path,
            max_concurrent_dispatches,
            event_buffer,
            log_format,
        })
    }
}

fn parse_positive(key: &'static str, value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidNumber {
            key,
            value: value.to_string(),
        }),
    }
}
