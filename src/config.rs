use serde::{Deserialize, Serialize};
use std::fs;

use anyhow::{Context, Result};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub depth: DepthConfig,
    #[serde(default)]
    pub sim: SimConfig,
}

/// Event-sink endpoint (QuestDB ILP over TCP).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SinkConfig {
    pub host: String,
    pub port: u16,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9009,
        }
    }
}

/// Loopback depth HTTP endpoint.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DepthConfig {
    pub port: u16,
}

impl Default for DepthConfig {
    fn default() -> Self {
        Self { port: 9100 }
    }
}

/// Simulated order-flow knobs.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SimConfig {
    pub producers_per_instrument: usize,
    pub enable_wash: bool,
    /// Instrument the wash producer trades on.
    pub wash_instrument_id: u32,
    pub enable_ring: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            producers_per_instrument: 20,
            enable_wash: false,
            wash_instrument_id: 1,
            enable_ring: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: "./logs".to_string(),
            log_file: "matchbook.log".to_string(),
            use_json: false,
            rotation: "daily".to_string(),
            sink: SinkConfig::default(),
            depth: DepthConfig::default(),
            sim: SimConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load config from YAML file based on environment
    pub fn load(env: &str) -> Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        let mut config: Self =
            serde_yaml::from_str(&content).context("Failed to parse config yaml")?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Load, falling back to defaults (plus overrides) when the file is absent.
    pub fn load_or_default(env: &str) -> Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        if !std::path::Path::new(&config_path).exists() {
            tracing::warn!(%config_path, "config file not found, using defaults");
            let mut config = Self::default();
            config.apply_env_overrides();
            config.validate()?;
            return Ok(config);
        }
        Self::load(env)
    }

    /// Apply environment variable overrides
    ///
    /// Environment variables take precedence over YAML config.
    ///
    /// Supported overrides:
    /// - MB_LOG_LEVEL: Log level (trace/debug/info/warn/error)
    /// - MB_SINK_HOST / MB_SINK_PORT: ILP endpoint
    /// - MB_DEPTH_PORT: Depth HTTP port
    /// - MB_ENABLE_WASH / MB_ENABLE_RING: coordinated-pattern toggles
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("MB_LOG_LEVEL") {
            tracing::info!("Config override: log_level = {} (from MB_LOG_LEVEL)", level);
            self.log_level = level;
        }
        if let Ok(host) = std::env::var("MB_SINK_HOST") {
            tracing::info!("Config override: sink.host = {} (from MB_SINK_HOST)", host);
            self.sink.host = host;
        }
        if let Ok(port) = std::env::var("MB_SINK_PORT") {
            if let Ok(p) = port.parse::<u16>() {
                tracing::info!("Config override: sink.port = {} (from MB_SINK_PORT)", p);
                self.sink.port = p;
            }
        }
        if let Ok(port) = std::env::var("MB_DEPTH_PORT") {
            if let Ok(p) = port.parse::<u16>() {
                tracing::info!("Config override: depth.port = {} (from MB_DEPTH_PORT)", p);
                self.depth.port = p;
            }
        }
        if let Ok(flag) = std::env::var("MB_ENABLE_WASH") {
            if let Ok(b) = flag.parse::<bool>() {
                tracing::info!("Config override: sim.enable_wash = {} (from MB_ENABLE_WASH)", b);
                self.sim.enable_wash = b;
            }
        }
        if let Ok(flag) = std::env::var("MB_ENABLE_RING") {
            if let Ok(b) = flag.parse::<bool>() {
                tracing::info!("Config override: sim.enable_ring = {} (from MB_ENABLE_RING)", b);
                self.sim.enable_ring = b;
            }
        }
    }

    /// Validate configuration at startup
    ///
    /// Returns an error if any critical configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.sink.port == 0 {
            anyhow::bail!("Invalid sink.port: must be > 0");
        }
        if self.depth.port == 0 {
            anyhow::bail!("Invalid depth.port: must be > 0");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid log_level '{}': must be one of {:?}",
                self.log_level,
                valid_levels
            );
        }

        if self.sim.producers_per_instrument == 0 {
            anyhow::bail!("Invalid sim.producers_per_instrument: must be > 0");
        }

        Ok(())
    }
}
