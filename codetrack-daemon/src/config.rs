//! Configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use codetrack_broadcaster::HubConfig;

/// Broadcast hub tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubSection {
    /// Pending hub commands before producers are made to wait
    pub queue_capacity: usize,

    /// Deadline for one write to one subscriber (milliseconds)
    pub write_timeout_ms: u64,

    /// Outbound frames buffered per subscriber connection
    pub client_queue_capacity: usize,
}

impl Default for HubSection {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            write_timeout_ms: 2000,
            client_queue_capacity: 64,
        }
    }
}

/// Rolling session ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSection {
    /// Length of the rolling window in days
    pub window_days: i64,
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self { window_days: 7 }
    }
}

/// WebSocket keepalive timings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WsSection {
    /// Idle read timeout on /ws/track (seconds)
    pub track_read_timeout_secs: u64,

    /// Idle read timeout on subscriber endpoints (seconds)
    pub subscriber_read_timeout_secs: u64,

    /// Interval between server pings (seconds)
    pub ping_interval_secs: u64,
}

impl Default for WsSection {
    fn default() -> Self {
        Self {
            track_read_timeout_secs: 60,
            subscriber_read_timeout_secs: 90,
            ping_interval_secs: 30,
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Path to configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Listen address
    pub bind: String,

    /// Listen port (the PORT env var wins)
    pub port: u16,

    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,

    /// Metrics sampling period (milliseconds)
    pub metrics_interval_ms: u64,

    pub hub: HubSection,

    pub ledger: LedgerSection,

    pub ws: WsSection,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            config_path: Self::default_config_path(),
            bind: "0.0.0.0".to_string(),
            port: 8081,
            log_level: "codetrack=info".to_string(),
            metrics_interval_ms: 1000,
            hub: HubSection::default(),
            ledger: LedgerSection::default(),
            ws: WsSection::default(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default location, or create it
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_config_path())
    }

    /// Load configuration from `config_path`, writing defaults there if missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            // Load existing config
            let contents = std::fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config file {}", config_path.display()))?;

            let mut config: DaemonConfig = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", config_path.display()))?;

            config.config_path = config_path.to_path_buf();
            Ok(config)
        } else {
            // Create default config
            let config = Self {
                config_path: config_path.to_path_buf(),
                ..Self::default()
            };
            config.save()
                .context("Failed to save default config")?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        // Ensure config directory exists
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(&self.config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Apply the PORT environment variable, if set
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(port) = std::env::var("PORT") {
            self.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT value '{}'", port))?;
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            queue_capacity: self.hub.queue_capacity,
            write_timeout: Duration::from_millis(self.hub.write_timeout_ms),
        }
    }

    pub fn metrics_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_interval_ms.max(1))
    }

    pub fn ledger_window(&self) -> chrono::TimeDelta {
        chrono::TimeDelta::days(self.ledger.window_days.max(1))
    }

    /// Get default config path
    fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("codetrack")
            .join("config.toml")
    }
}
