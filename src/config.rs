//! Configuration management

use crate::error::{ArbError, Result};
use crate::exchange;
use crate::retry::RetryPolicy;
use crate::types::ExchangeId;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Snapshot cadence for the run loop, seconds.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// Upper bound on any single connector query inside one snapshot.
    #[serde(default = "default_snapshot_timeout")]
    pub snapshot_timeout_secs: u64,
    #[serde(default)]
    pub exchanges: Vec<ExchangeConfig>,
}

fn default_refresh_interval() -> u64 {
    10
}

fn default_snapshot_timeout() -> u64 {
    20
}

/// Which connector variant to run for an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorMode {
    Streaming,
    Polled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    pub exchange: ExchangeId,
    #[serde(default = "default_mode")]
    pub mode: ConnectorMode,
    /// WebSocket endpoint override (streaming mode).
    pub ws_url: Option<String>,
    /// Primary REST ticker endpoint override (polled mode).
    pub rest_primary: Option<String>,
    /// Fallback REST ticker endpoint override (polled mode).
    pub rest_fallback: Option<String>,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub reconnect: Option<ReconnectConfig>,
    /// Bounded wait for the first streamed price, seconds.
    #[serde(default = "default_first_price_timeout")]
    pub first_price_timeout_secs: u64,
}

fn default_mode() -> ConnectorMode {
    ConnectorMode::Streaming
}

fn default_first_price_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RateLimitConfig {
    /// Permits per window.
    pub limit: u32,
    pub window_ms: u64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: u32,
    pub delay_ms: u64,
    pub timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay_ms: 5_000,
            timeout_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ReconnectConfig {
    pub base_delay_ms: u64,
    pub max_attempts: u32,
}

impl ExchangeConfig {
    /// Minimal entry for one exchange; endpoints and tuning come from the
    /// built-in per-exchange defaults.
    pub fn new(exchange: ExchangeId, mode: ConnectorMode) -> Self {
        Self {
            exchange,
            mode,
            ws_url: None,
            rest_primary: None,
            rest_fallback: None,
            rate_limit: None,
            retry: RetryConfig::default(),
            reconnect: None,
            first_price_timeout_secs: default_first_price_timeout(),
        }
    }

    pub fn ws_url(&self) -> String {
        self.ws_url
            .clone()
            .unwrap_or_else(|| exchange::defaults(self.exchange).ws_url.to_string())
    }

    pub fn rest_primary(&self) -> String {
        self.rest_primary
            .clone()
            .unwrap_or_else(|| exchange::defaults(self.exchange).rest_primary.to_string())
    }

    pub fn rest_fallback(&self) -> Option<String> {
        self.rest_fallback.clone().or_else(|| {
            exchange::defaults(self.exchange)
                .rest_fallback
                .map(str::to_string)
        })
    }

    pub fn rate_limit(&self) -> (u32, Duration) {
        match self.rate_limit {
            Some(rl) => (rl.limit, Duration::from_millis(rl.window_ms)),
            None => (
                exchange::defaults(self.exchange).messages_per_sec,
                Duration::from_secs(1),
            ),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry.attempts,
            delay: Duration::from_millis(self.retry.delay_ms),
            timeout: Duration::from_millis(self.retry.timeout_ms),
        }
    }

    pub fn reconnect_base_delay(&self) -> Duration {
        match self.reconnect {
            Some(rc) => Duration::from_millis(rc.base_delay_ms),
            None => exchange::defaults(self.exchange).reconnect_base_delay,
        }
    }

    pub fn reconnect_max_attempts(&self) -> u32 {
        match self.reconnect {
            Some(rc) => rc.max_attempts,
            None => exchange::defaults(self.exchange).reconnect_max_attempts,
        }
    }

    pub fn first_price_timeout(&self) -> Duration {
        Duration::from_secs(self.first_price_timeout_secs)
    }
}

impl Config {
    /// Load configuration from file, with `BTC_ARB_`-prefixed environment
    /// overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path.as_ref().to_str().unwrap()))
            .add_source(config::Environment::with_prefix("BTC_ARB"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from default locations, falling back to built-in defaults when
    /// no file exists.
    pub fn load_default() -> anyhow::Result<Self> {
        let paths = ["config.toml", "~/.config/btc-arb/config.toml"];

        for path in paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::load(expanded.as_ref());
            }
        }

        Ok(Self::default())
    }

    /// Rejects empty and duplicate exchange lists.
    pub fn validate(&self) -> Result<()> {
        if self.exchanges.is_empty() {
            return Err(ArbError::Config("no exchanges configured".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for ex in &self.exchanges {
            if !seen.insert(ex.exchange) {
                return Err(ArbError::Config(format!(
                    "duplicate exchange: {}",
                    ex.exchange
                )));
            }
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_secs(self.snapshot_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
            snapshot_timeout_secs: default_snapshot_timeout(),
            exchanges: ExchangeId::ALL
                .iter()
                .map(|&id| ExchangeConfig::new(id, ConnectorMode::Streaming))
                .collect(),
        }
    }
}
