//! Agent configuration

use anyhow::{Context, Result};
use health_lib::{api, health, provider};
use serde::Deserialize;
use std::time::Duration;

/// Environment variable naming an optional configuration file
pub const CONFIG_FILE_ENV: &str = "HEALTH_AGENT_CONFIG";

/// Prefix of configuration environment variables
const ENV_PREFIX: &str = "HEALTH_AGENT";

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Node name used to scope structured logs
    pub node_name: String,

    /// Host the health endpoint binds to
    pub bind_host: String,

    /// Port the health endpoint binds to
    pub bind_port: u16,

    /// Path of the health endpoint
    pub health_path: String,

    /// Docker Engine API address used as the workload count provider
    pub docker_host: String,

    /// Docker Engine API version
    pub docker_api_version: String,

    /// Count provider request timeout in milliseconds
    pub provider_timeout_ms: u64,

    /// Reconciliation interval in milliseconds
    pub tick_interval_ms: u64,

    /// Skip the "stats" comparison group
    pub skip_stats: bool,

    /// Skip the "logs" comparison group
    pub skip_logs: bool,

    /// Number of health verdicts retained for debouncing
    pub window_capacity: usize,

    /// Depth of the heartbeat queue
    pub heartbeat_buffer: usize,
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "unknown".to_string())
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            bind_host: "0.0.0.0".to_string(),
            bind_port: 8123,
            health_path: api::DEFAULT_HEALTH_PATH.to_string(),
            docker_host: provider::DEFAULT_DOCKER_HOST.to_string(),
            docker_api_version: provider::DEFAULT_DOCKER_API_VERSION.to_string(),
            provider_timeout_ms: 5000,
            tick_interval_ms: 2500,
            skip_stats: false,
            skip_logs: false,
            window_capacity: health::DEFAULT_WINDOW_CAPACITY,
            heartbeat_buffer: 1024,
        }
    }
}

impl AgentConfig {
    /// Load configuration from the optional config file and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(std::env::var(CONFIG_FILE_ENV).ok().as_deref())
    }

    /// Load configuration from `file` (if given) overlaid with the environment
    pub fn load_from(file: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }
        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        let config: AgentConfig = config
            .try_deserialize()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the agent cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.window_capacity < 2 {
            anyhow::bail!(
                "window_capacity must be at least 2, got {}",
                self.window_capacity
            );
        }
        if self.tick_interval_ms == 0 {
            anyhow::bail!("tick_interval_ms must be positive");
        }
        if self.heartbeat_buffer == 0 {
            anyhow::bail!("heartbeat_buffer must be positive");
        }
        if !self.health_path.starts_with('/') {
            anyhow::bail!("health_path must start with '/', got '{}'", self.health_path);
        }
        if self.health_path == "/metrics" || self.health_path == api::HEARTBEAT_PATH {
            anyhow::bail!("health_path '{}' collides with a built-in route", self.health_path);
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.bind_port)
    }
}
