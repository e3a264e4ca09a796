//! Configuration for scenelink-broker

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main broker configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Relay configuration
    #[serde(default)]
    pub relay: RelayConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

impl ServerConfig {
    /// `host:port` as handed to the listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            enable_cors: true,
            max_body_size: default_max_body_size(),
        }
    }
}

/// Relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Deadline for broadcast-and-collect, in milliseconds
    #[serde(default = "default_collect_timeout")]
    pub collect_timeout_ms: u64,

    /// SSE keep-alive interval in seconds
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    /// Capacity of the publish channel
    #[serde(default = "default_publish_buffer")]
    pub publish_buffer: usize,
}

impl RelayConfig {
    pub fn collect_timeout(&self) -> Duration {
        Duration::from_millis(self.collect_timeout_ms)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            collect_timeout_ms: default_collect_timeout(),
            keep_alive_secs: default_keep_alive(),
            publish_buffer: default_publish_buffer(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_body_size() -> usize {
    100 * 1024 * 1024 // 100MB
}

fn default_collect_timeout() -> u64 {
    5000
}

fn default_keep_alive() -> u64 {
    15
}

fn default_publish_buffer() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

impl BrokerConfig {
    /// Load configuration: defaults, then the optional file, then `SCENELINK_*`
    /// environment variables (`SCENELINK_SERVER__PORT=4000`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&BrokerConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("SCENELINK")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
