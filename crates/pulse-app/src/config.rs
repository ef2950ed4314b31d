//! Application configuration.
//!
//! Loaded from an optional TOML file layered under `PULSE__`-prefixed
//! environment variables, e.g. `PULSE__API_BASE_URL` or
//! `PULSE__STORE__ACTIVITY_CAP`.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use pulse_api::HttpBackendConfig;
use pulse_dashboard::DashboardConfig;
use pulse_store::{Channel, RoutingTable, StoreConfig};
use pulse_ws::TransportConfig;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "PULSE";

/// Push transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportSection {
    /// Path of the general trading channel.
    #[serde(default = "default_trading_path")]
    pub trading_path: String,
    /// Path of the AI reasoning channel.
    #[serde(default = "default_reasoning_path")]
    pub reasoning_path: String,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
}

fn default_trading_path() -> String {
    "/ws/trading".to_string()
}

fn default_reasoning_path() -> String {
    "/ws/reasoning".to_string()
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_base_delay_ms() -> u64 {
    1_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    30_000
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            trading_path: default_trading_path(),
            reasoning_path: default_reasoning_path(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
        }
    }
}

/// Snapshot synchronization timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Snapshot poll interval while the trading channel is not connected.
    #[serde(default = "default_fallback_poll_interval_ms")]
    pub fallback_poll_interval_ms: u64,
    /// Delay before reconnecting after the trading channel errors.
    #[serde(default = "default_error_retry_delay_ms")]
    pub error_retry_delay_ms: u64,
    /// Timeout for on-demand REST calls.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_fallback_poll_interval_ms() -> u64 {
    30_000
}

fn default_error_retry_delay_ms() -> u64 {
    5_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fallback_poll_interval_ms: default_fallback_poll_interval_ms(),
            error_retry_delay_ms: default_error_retry_delay_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl SyncConfig {
    pub fn fallback_poll_interval(&self) -> Duration {
        Duration::from_millis(self.fallback_poll_interval_ms)
    }

    pub fn error_retry_delay(&self) -> Duration {
        Duration::from_millis(self.error_retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Optional views.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// Read transaction history from the trades resource.
    #[serde(default)]
    pub trades_view: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend REST base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Backend WebSocket base URL.
    #[serde(default = "default_ws_base_url")]
    pub ws_base_url: String,
    #[serde(default)]
    pub transport: TransportSection,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub features: FeatureFlags,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    /// Event type name to channel, overriding the default routing.
    #[serde(default)]
    pub routes: HashMap<String, Channel>,
}

fn default_api_base_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_ws_base_url() -> String {
    "ws://localhost:3001".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            ws_base_url: default_ws_base_url(),
            transport: TransportSection::default(),
            sync: SyncConfig::default(),
            store: StoreConfig::default(),
            features: FeatureFlags::default(),
            dashboard: DashboardConfig::default(),
            routes: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Load `path` (if it exists) under environment overrides.
    pub fn load(path: &str) -> AppResult<Self> {
        let mut builder = ::config::Config::builder();
        if Path::new(path).exists() {
            builder = builder.add_source(::config::File::from(Path::new(path)));
        } else {
            tracing::warn!(path, "Config file not found, using defaults");
        }
        let config = builder
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;
        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML text without environment overrides.
    pub fn from_toml(text: &str) -> AppResult<Self> {
        let config: Self = ::config::Config::builder()
            .add_source(::config::File::from_str(text, ::config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the client cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        if self.transport.trading_path == self.transport.reasoning_path {
            return Err(AppError::Config(
                "trading_path and reasoning_path must differ".to_string(),
            ));
        }
        if self.sync.fallback_poll_interval_ms == 0 {
            return Err(AppError::Config(
                "fallback_poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.store.activity_cap == 0 {
            return Err(AppError::Config("activity_cap must be positive".to_string()));
        }
        self.routing_table()?;
        Ok(())
    }

    /// Default routing with the configured overrides applied.
    pub fn routing_table(&self) -> AppResult<RoutingTable> {
        Ok(RoutingTable::default().with_overrides(&self.routes)?)
    }

    /// Path a channel is read from.
    pub fn path_for(&self, channel: Channel) -> &str {
        match channel {
            Channel::Trading => &self.transport.trading_path,
            Channel::Reasoning => &self.transport.reasoning_path,
        }
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            base_url: self.ws_base_url.clone(),
            max_reconnect_attempts: self.transport.max_reconnect_attempts,
            reconnect_base_delay_ms: self.transport.reconnect_base_delay_ms,
            reconnect_max_delay_ms: self.transport.reconnect_max_delay_ms,
            heartbeat_interval_ms: self.transport.heartbeat_interval_ms,
        }
    }

    pub fn backend_config(&self) -> HttpBackendConfig {
        HttpBackendConfig {
            base_url: self.api_base_url.clone(),
            timeout: self.sync.request_timeout(),
            trades_view: self.features.trades_view,
        }
    }
}
