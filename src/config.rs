//! Simulator configuration
//!
//! Static for the process lifetime. Loaded from TOML with every field
//! defaulted, then overridden from `TRADESIM_*` environment variables.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

use crate::sim::engine::{CostModelConfig, SimulationParams};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Snapshots retained in memory
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Simulations slower than this are logged as warnings
    #[serde(default = "default_latency_warn_ms")]
    pub latency_warn_ms: u64,

    /// Presentation refresh period
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    /// Log destination; `log_file = ""` (or `TRADESIM_LOG_FILE=""`) logs to stderr
    #[serde(default = "default_log_file")]
    pub log_file: Option<String>,

    #[serde(default)]
    pub feed: FeedConfig,

    /// Display-only labels
    #[serde(default)]
    pub labels: Labels,

    /// Parameters the coordinator simulates with
    #[serde(default)]
    pub simulation: SimulationParams,

    /// Cost model coefficients
    #[serde(default)]
    pub model: CostModelConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

fn default_history_capacity() -> usize {
    1000
}

fn default_latency_warn_ms() -> u64 {
    100
}

fn default_refresh_interval_ms() -> u64 {
    200
}

fn default_log_file() -> Option<String> {
    Some("simulator.log".to_string())
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            feed: FeedConfig::default(),
            labels: Labels::default(),
            simulation: SimulationParams::default(),
            model: CostModelConfig::default(),
            session: SessionConfig::default(),
            history_capacity: default_history_capacity(),
            latency_warn_ms: default_latency_warn_ms(),
            refresh_interval_ms: default_refresh_interval_ms(),
            log_file: default_log_file(),
        }
    }
}

impl SimulatorConfig {
    /// Load from TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let mut config: Self = toml::from_str(&contents)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        if config.log_file.as_deref().is_some_and(|f| f.trim().is_empty()) {
            config.log_file = None;
        }
        Ok(config)
    }

    /// Load `path` if given, otherwise defaults; env overrides apply to both
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Save to TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("TRADESIM_FEED_HOST") {
            self.feed.host = v;
        }
        if let Ok(v) = std::env::var("TRADESIM_FEED_PORT") {
            self.feed.port = v.parse().unwrap_or(self.feed.port);
        }
        if let Ok(v) = std::env::var("TRADESIM_FEED_PATH") {
            self.feed.path = v;
        }
        if let Ok(v) = std::env::var("TRADESIM_QUANTITY") {
            self.simulation.quantity = v.parse().unwrap_or(self.simulation.quantity);
        }
        if let Ok(v) = std::env::var("TRADESIM_VOLATILITY") {
            self.simulation.volatility = v.parse().unwrap_or(self.simulation.volatility);
        }
        if let Ok(v) = std::env::var("TRADESIM_FEE_TIER") {
            self.simulation.fee_tier = v.parse().unwrap_or(self.simulation.fee_tier);
        }
        if let Ok(v) = std::env::var("TRADESIM_LOG_FILE") {
            self.log_file = if v.trim().is_empty() { None } else { Some(v) };
        }
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.history_capacity == 0 {
            bail!("history_capacity must be at least 1");
        }
        if self.feed.host.trim().is_empty() {
            bail!("feed.host must not be empty");
        }
        if self.refresh_interval_ms == 0 {
            bail!("refresh_interval_ms must be positive");
        }
        if !(self.model.time_horizon_secs > 0.0) {
            bail!("model.time_horizon_secs must be positive");
        }
        self.simulation
            .validate()
            .context("Invalid default simulation parameters")?;
        Ok(())
    }

    pub fn latency_warn(&self) -> Duration {
        Duration::from_millis(self.latency_warn_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

/// Feed endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_path")]
    pub path: String,
    /// wss when true, ws otherwise
    #[serde(default = "default_true")]
    pub tls: bool,
    /// Reconnect after the remote closes the stream cleanly
    #[serde(default = "default_true")]
    pub reconnect_on_close: bool,
}

fn default_host() -> String {
    "gomarket-cpp.goquant.io".to_string()
}

fn default_port() -> u16 {
    443
}

fn default_path() -> String {
    "/ws/l2-orderbook/okx/BTC-USDT-SWAP".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            path: default_path(),
            tls: true,
            reconnect_on_close: true,
        }
    }
}

impl FeedConfig {
    pub fn url(&self) -> String {
        let scheme = if self.tls { "wss" } else { "ws" };
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("{}://{}:{}{}", scheme, self.host, self.port, path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Labels {
    #[serde(default = "default_exchange")]
    pub exchange: String,
    #[serde(default = "default_asset")]
    pub asset: String,
}

fn default_exchange() -> String {
    "OKX".to_string()
}

fn default_asset() -> String {
    "BTC-USDT-SWAP".to_string()
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            exchange: default_exchange(),
            asset: default_asset(),
        }
    }
}

/// Connection lifecycle tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    // Backoff parameters
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,

    /// Consecutive failed attempts before the ingestor gives up (0 = never)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Idle time on the outbound side before a keepalive ping
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
}

fn default_retry_base_ms() -> u64 {
    5_000
}

fn default_retry_max_ms() -> u64 {
    60_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter_factor() -> f64 {
    0.2
}

fn default_max_retries() -> u32 {
    10
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_heartbeat_interval_ms() -> u64 {
    20_000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retry_base_ms: default_retry_base_ms(),
            retry_max_ms: default_retry_max_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter_factor: default_jitter_factor(),
            max_retries: default_max_retries(),
            connect_timeout_ms: default_connect_timeout_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
        }
    }
}

impl SessionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}
