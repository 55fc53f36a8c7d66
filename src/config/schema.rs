//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the mock server.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default listen port, also used to build the proxy upstream URL.
pub const DEFAULT_PORT: u16 = 6677;

/// Root configuration for the mock server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Location of the OpenAPI document (URL or path). Required.
    pub openapi_url: String,

    /// Optional custom handler file.
    pub handlers: Option<PathBuf>,

    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Contract-mock engine settings.
    pub engine: EngineConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind.
    pub host: String,

    /// Port to bind.
    pub port: u16,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl ListenerConfig {
    /// `host:port` bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// External contract-mock engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base URL of the engine (e.g. a Prism mock server).
    pub url: String,

    /// Base URL of a validating proxy (e.g. Prism in proxy mode) whose
    /// upstream is this server's `/_/` namespace. Requests on paths claimed by
    /// a custom handler go through it, so custom responses are checked
    /// against the contract. Unset: they re-enter `/_/` directly, unchecked.
    pub proxy_url: Option<String>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Response header carrying the engine's violation report.
    pub violations_header: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:4010".to_string(),
            proxy_url: None,
            timeout_secs: 30,
            violations_header: "sl-violations".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
