use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::time::Duration;

/// Full relay configuration.
///
/// Every section falls back to its defaults, so an empty environment yields a
/// runnable config pointing at `redis://redis-broker:6379` and port 8004.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Public HTTP port for `GET /notifications`.
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub relay: RelaySettings,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

fn default_port() -> u16 {
    8004
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://redis-broker:6379".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Pub/sub channel the subscriber listens on.
    pub channel: String,
    /// List key holding the history buffer.
    pub history_key: String,
    /// Maximum number of entries kept in the history buffer.
    pub history_limit: usize,
    pub retry: RetryConfig,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            channel: "lelang_notifications".to_string(),
            history_key: "history_notif".to_string(),
            history_limit: 50,
            retry: RetryConfig::default(),
        }
    }
}

/// Delay policy between failed receives.
///
/// `multiplier = 1.0` gives a fixed delay, `initial_delay_ms = 0` retries
/// immediately. The delay resets after every successful receive and never
/// exceeds `max_delay_ms`, jitter included.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 100,
            max_delay_ms: 5_000,
            multiplier: 2.0,
            jitter: false,
        }
    }
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Build a backoff that never gives up; the subscriber retries forever.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_delay(),
            initial_interval: self.initial_delay(),
            max_interval: self.max_delay(),
            multiplier: self.multiplier,
            randomization_factor: if self.jitter { 0.5 } else { 0.0 },
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Next delay from `backoff`, clamped to `max_delay_ms`.
    ///
    /// `backoff` applies jitter after its own `max_interval` cap.
    pub fn next_delay(&self, backoff: &mut ExponentialBackoff) -> Duration {
        backoff
            .next_backoff()
            .map_or(self.max_delay(), |delay| delay.min(self.max_delay()))
    }
}

/// Listener for health, readiness and metrics probes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub port: u16,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self { port: 9004 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// OTLP collector endpoint; span export is off when unset.
    pub otlp_endpoint: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            otlp_endpoint: None,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            redis: RedisConfig::default(),
            relay: RelaySettings::default(),
            admin: AdminConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl RelayConfig {
    pub fn load() -> Result<Self, AppError> {
        let config: RelayConfig = core_config::load_layered()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.redis.url.trim().is_empty() {
            return Err(config_error("redis.url must not be empty"));
        }
        if self.relay.channel.trim().is_empty() {
            return Err(config_error("relay.channel must not be empty"));
        }
        if self.relay.history_key.trim().is_empty() {
            return Err(config_error("relay.history_key must not be empty"));
        }
        if self.relay.history_limit == 0 {
            return Err(config_error("relay.history_limit must be at least 1"));
        }

        let retry = &self.relay.retry;
        if retry.multiplier.is_nan() || retry.multiplier < 1.0 {
            return Err(config_error("relay.retry.multiplier must be >= 1.0"));
        }
        if retry.max_delay_ms < retry.initial_delay_ms {
            return Err(config_error(
                "relay.retry.max_delay_ms must be >= relay.retry.initial_delay_ms",
            ));
        }

        Ok(())
    }
}

fn config_error(message: &str) -> AppError {
    AppError::ConfigError(anyhow::anyhow!("{}", message))
}
