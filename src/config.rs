//! Environment configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use assist_api::{normalize_base_url, ApiConfig, DetailLevel, DEFAULT_BASE_URL};
use thiserror::Error;

use crate::dispatcher::DEFAULT_QUIET_PERIOD;
use crate::logging::LogConfig;
use crate::orchestrator::OrchestratorOptions;
use crate::reconnect::{
    ExponentialBackoff, FixedDelay, ReconnectStrategy, DEFAULT_MAX_RECONNECT_DELAY,
    DEFAULT_RECONNECT_DELAY,
};

pub const ENV_BACKEND_URL: &str = "ASSIST_BACKEND_URL";
pub const ENV_STREAM_URL: &str = "ASSIST_STREAM_URL";
pub const ENV_ACCESS_TOKEN: &str = "ASSIST_ACCESS_TOKEN";
pub const ENV_DEBOUNCE_MS: &str = "ASSIST_DEBOUNCE_MS";
pub const ENV_RECONNECT_DELAY_MS: &str = "ASSIST_RECONNECT_DELAY_MS";
pub const ENV_RECONNECT_MAX_DELAY_MS: &str = "ASSIST_RECONNECT_MAX_DELAY_MS";
pub const ENV_RECONNECT_MAX_ATTEMPTS: &str = "ASSIST_RECONNECT_MAX_ATTEMPTS";
pub const ENV_RECONNECT_BACKOFF: &str = "ASSIST_RECONNECT_BACKOFF";
pub const ENV_REQUEST_TIMEOUT_SEC: &str = "ASSIST_REQUEST_TIMEOUT_SEC";
pub const ENV_EXECUTE_TIMEOUT_SEC: &str = "ASSIST_EXECUTE_TIMEOUT_SEC";
pub const ENV_DETAIL_LEVEL: &str = "ASSIST_DETAIL_LEVEL";
pub const ENV_SINGLE_FLIGHT: &str = "ASSIST_SINGLE_FLIGHT";
pub const ENV_LOG: &str = "ASSIST_LOG";
pub const ENV_LOG_FILE: &str = "ASSIST_LOG_FILE";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key} must be a non-negative integer, got '{value}'")]
    InvalidNumber { key: &'static str, value: String },
    #[error("{key} must be one of {expected}, got '{value}'")]
    InvalidChoice {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("{key} must be a ws:// or wss:// URL, got '{value}'")]
    InvalidStreamUrl { key: &'static str, value: String },
}

/// Raw values read from the process environment. Empty values count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvConfig {
    pub backend_url: Option<String>,
    pub stream_url: Option<String>,
    pub access_token: Option<String>,
    pub debounce_ms: Option<u64>,
    pub reconnect_delay_ms: Option<u64>,
    pub reconnect_max_delay_ms: Option<u64>,
    pub reconnect_max_attempts: Option<u32>,
    pub reconnect_backoff: Option<String>,
    pub request_timeout_sec: Option<u64>,
    pub execute_timeout_sec: Option<u64>,
    pub detail_level: Option<String>,
    pub single_flight: bool,
    pub log_filter: Option<String>,
    pub log_file: Option<PathBuf>,
}

impl EnvConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            backend_url: env_string_opt(ENV_BACKEND_URL),
            stream_url: env_string_opt(ENV_STREAM_URL),
            access_token: env_string_opt(ENV_ACCESS_TOKEN),
            debounce_ms: env_u64_opt(ENV_DEBOUNCE_MS)?,
            reconnect_delay_ms: env_u64_opt(ENV_RECONNECT_DELAY_MS)?,
            reconnect_max_delay_ms: env_u64_opt(ENV_RECONNECT_MAX_DELAY_MS)?,
            reconnect_max_attempts: env_u32_opt(ENV_RECONNECT_MAX_ATTEMPTS)?,
            reconnect_backoff: env_string_opt(ENV_RECONNECT_BACKOFF),
            request_timeout_sec: env_u64_opt(ENV_REQUEST_TIMEOUT_SEC)?,
            execute_timeout_sec: env_u64_opt(ENV_EXECUTE_TIMEOUT_SEC)?,
            detail_level: env_string_opt(ENV_DETAIL_LEVEL),
            single_flight: env_flag(ENV_SINGLE_FLIGHT),
            log_filter: env_string_opt(ENV_LOG),
            log_file: env_string_opt(ENV_LOG_FILE).map(PathBuf::from),
        })
    }

    /// Validates the raw values and builds a session configuration.
    pub fn session_config(&self) -> Result<SessionConfig, ConfigError> {
        let mut config = SessionConfig::new(
            self.backend_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        );

        if let Some(stream_url) = &self.stream_url {
            let trimmed = stream_url.trim();
            if !(trimmed.starts_with("ws://") || trimmed.starts_with("wss://")) {
                return Err(ConfigError::InvalidStreamUrl {
                    key: ENV_STREAM_URL,
                    value: stream_url.clone(),
                });
            }
            config = config.with_stream_url(trimmed);
        }
        if let Some(token) = &self.access_token {
            config = config.with_access_token(token.trim());
        }
        if let Some(debounce_ms) = self.debounce_ms {
            config = config.with_debounce(Duration::from_millis(debounce_ms));
        }
        config = config.with_reconnect(self.reconnect_strategy()?);
        if let Some(timeout_sec) = self.request_timeout_sec {
            config = config.with_request_timeout(Duration::from_secs(timeout_sec));
        }
        if let Some(timeout_sec) = self.execute_timeout_sec {
            config = config.with_execute_timeout_sec(timeout_sec);
        }
        if let Some(level) = &self.detail_level {
            let parsed = DetailLevel::parse(level).ok_or_else(|| ConfigError::InvalidChoice {
                key: ENV_DETAIL_LEVEL,
                value: level.clone(),
                expected: "basic, medium, detailed",
            })?;
            config = config.with_detail_level(parsed);
        }

        Ok(config.with_single_flight(self.single_flight))
    }

    pub fn log_config(&self) -> LogConfig {
        let mut config = LogConfig::default();
        if let Some(filter) = &self.log_filter {
            config.filter = filter.clone();
        }
        config.file = self.log_file.clone();
        config
    }

    fn reconnect_strategy(&self) -> Result<ReconnectStrategy, ConfigError> {
        let backoff = self
            .reconnect_backoff
            .as_deref()
            .map(|value| value.trim().to_ascii_lowercase());

        let strategy = match backoff.as_deref() {
            None | Some("fixed") => ReconnectStrategy::Fixed(FixedDelay {
                delay: self
                    .reconnect_delay_ms
                    .map_or(DEFAULT_RECONNECT_DELAY, Duration::from_millis),
                max_attempts: self.reconnect_max_attempts,
            }),
            Some("exponential") => ReconnectStrategy::Exponential(ExponentialBackoff {
                base: self
                    .reconnect_delay_ms
                    .map_or(DEFAULT_RECONNECT_DELAY, Duration::from_millis),
                max: self
                    .reconnect_max_delay_ms
                    .map_or(DEFAULT_MAX_RECONNECT_DELAY, Duration::from_millis),
                max_attempts: self.reconnect_max_attempts,
            }),
            Some(_) => {
                return Err(ConfigError::InvalidChoice {
                    key: ENV_RECONNECT_BACKOFF,
                    value: self.reconnect_backoff.clone().unwrap_or_default(),
                    expected: "fixed, exponential",
                })
            }
        };

        Ok(strategy)
    }
}

/// Everything a [`crate::Session`] needs to wire its components.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub backend_url: String,
    /// Overrides the stream URL derived from `backend_url`.
    pub stream_url: Option<String>,
    pub access_token: Option<String>,
    pub debounce: Duration,
    pub reconnect: ReconnectStrategy,
    /// Client-side HTTP timeout for execute/explain calls.
    pub request_timeout: Option<Duration>,
    pub execute_timeout_sec: Option<u64>,
    pub detail_level: DetailLevel,
    pub single_flight: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl SessionConfig {
    pub fn new(backend_url: impl Into<String>) -> Self {
        Self {
            backend_url: normalize_base_url(&backend_url.into()),
            stream_url: None,
            access_token: None,
            debounce: DEFAULT_QUIET_PERIOD,
            reconnect: ReconnectStrategy::default(),
            request_timeout: None,
            execute_timeout_sec: None,
            detail_level: DetailLevel::default(),
            single_flight: false,
        }
    }

    pub fn with_stream_url(mut self, stream_url: impl Into<String>) -> Self {
        self.stream_url = Some(stream_url.into());
        self
    }

    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectStrategy) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_execute_timeout_sec(mut self, timeout_sec: u64) -> Self {
        self.execute_timeout_sec = Some(timeout_sec);
        self
    }

    pub fn with_detail_level(mut self, detail_level: DetailLevel) -> Self {
        self.detail_level = detail_level;
        self
    }

    pub fn with_single_flight(mut self, single_flight: bool) -> Self {
        self.single_flight = single_flight;
        self
    }

    /// HTTP client configuration tagged with `session_id`.
    pub fn api_config(&self, session_id: &str) -> ApiConfig {
        let mut config = ApiConfig::new(&self.backend_url).with_session_id(session_id);
        if let Some(token) = &self.access_token {
            config = config.with_access_token(token);
        }
        if let Some(timeout) = self.request_timeout {
            config = config.with_timeout(timeout);
        }
        config
    }

    pub fn orchestrator_options(&self) -> OrchestratorOptions {
        OrchestratorOptions {
            execute_timeout_sec: self.execute_timeout_sec,
            single_flight: self.single_flight,
        }
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|value| matches!(value.trim(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

fn env_u64_opt(key: &'static str) -> Result<Option<u64>, ConfigError> {
    env_string_opt(key)
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidNumber { key, value })
        })
        .transpose()
}

fn env_u32_opt(key: &'static str) -> Result<Option<u32>, ConfigError> {
    env_string_opt(key)
        .map(|value| {
            value
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidNumber { key, value })
        })
        .transpose()
}
