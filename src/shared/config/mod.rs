//! Client configuration module
//!
//! Provides configuration types for the realtime client. Defaults mirror
//! the backend deployment the client ships against: a 2 second base
//! reconnect delay growing linearly per attempt, capped at 10 seconds and
//! 10 attempts, and a 500ms settle delay before the identity announcement
//! after each successful connect.

use std::time::Duration;
use thiserror::Error;

/// Default REST base URL
const DEFAULT_API_URL: &str = "http://localhost:8082";
/// Default realtime endpoint URL
const DEFAULT_WS_URL: &str = "ws://localhost:8082/ws";

const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(2000);
const DEFAULT_MAX_RECONNECT_DELAY: Duration = Duration::from_millis(10_000);
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;
const DEFAULT_CONNECT_SETTLE_DELAY: Duration = Duration::from_millis(500);
const DEFAULT_PRESENCE_RETRY_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Realtime client configuration
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// REST base URL (presence bootstrap)
    pub api_base_url: String,
    /// Realtime endpoint URL
    pub ws_url: String,
    /// Base reconnect delay; actual delay is `base * attempt`
    pub reconnect_delay: Duration,
    /// Upper bound on the per-attempt reconnect delay
    pub max_reconnect_delay: Duration,
    /// Reconnect attempts before surfacing a terminal failure
    pub max_reconnect_attempts: u32,
    /// Delay between a successful connect and the identity announcement
    pub connect_settle_delay: Duration,
    /// Interval at which presence retries its live subscribe while the
    /// transport is still connecting
    pub presence_retry_interval: Duration,
    /// How long to wait for the remote handshake acknowledgment
    pub handshake_timeout: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        let api_base_url =
            std::env::var("BLOOM_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let ws_url = std::env::var("BLOOM_WS_URL").unwrap_or_else(|_| DEFAULT_WS_URL.to_string());
        Self {
            api_base_url,
            ws_url,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_reconnect_delay: DEFAULT_MAX_RECONNECT_DELAY,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            connect_settle_delay: DEFAULT_CONNECT_SETTLE_DELAY,
            presence_retry_interval: DEFAULT_PRESENCE_RETRY_INTERVAL,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

impl RealtimeConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new RealtimeConfigBuilder
    pub fn builder() -> RealtimeConfigBuilder {
        RealtimeConfigBuilder::default()
    }

    /// Get the full URL for a REST endpoint
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }
}

/// Builder for RealtimeConfig
#[derive(Debug, Default)]
pub struct RealtimeConfigBuilder {
    api_base_url: Option<String>,
    ws_url: Option<String>,
    reconnect_delay: Option<Duration>,
    max_reconnect_delay: Option<Duration>,
    max_reconnect_attempts: Option<u32>,
    connect_settle_delay: Option<Duration>,
    presence_retry_interval: Option<Duration>,
    handshake_timeout: Option<Duration>,
}

impl RealtimeConfigBuilder {
    /// Set the REST base URL
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Set the realtime endpoint URL
    pub fn ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = Some(url.into());
        self
    }

    /// Set the base reconnect delay
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = Some(delay);
        self
    }

    /// Set the reconnect delay cap
    pub fn max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.max_reconnect_delay = Some(delay);
        self
    }

    /// Set the reconnect attempt bound
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = Some(attempts);
        self
    }

    /// Set the post-connect settle delay
    pub fn connect_settle_delay(mut self, delay: Duration) -> Self {
        self.connect_settle_delay = Some(delay);
        self
    }

    /// Set the presence subscribe retry interval
    pub fn presence_retry_interval(mut self, interval: Duration) -> Self {
        self.presence_retry_interval = Some(interval);
        self
    }

    /// Set the handshake acknowledgment timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<RealtimeConfig, ConfigError> {
        let defaults = RealtimeConfig::default();
        let config = RealtimeConfig {
            api_base_url: self.api_base_url.unwrap_or(defaults.api_base_url),
            ws_url: self.ws_url.unwrap_or(defaults.ws_url),
            reconnect_delay: self.reconnect_delay.unwrap_or(defaults.reconnect_delay),
            max_reconnect_delay: self
                .max_reconnect_delay
                .unwrap_or(defaults.max_reconnect_delay),
            max_reconnect_attempts: self
                .max_reconnect_attempts
                .unwrap_or(defaults.max_reconnect_attempts),
            connect_settle_delay: self
                .connect_settle_delay
                .unwrap_or(defaults.connect_settle_delay),
            presence_retry_interval: self
                .presence_retry_interval
                .unwrap_or(defaults.presence_retry_interval),
            handshake_timeout: self.handshake_timeout.unwrap_or(defaults.handshake_timeout),
        };
        if config.api_base_url.is_empty() {
            return Err(ConfigError::MissingValue("api_base_url"));
        }
        if config.ws_url.is_empty() {
            return Err(ConfigError::MissingValue("ws_url"));
        }
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
}
