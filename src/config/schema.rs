//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the controller.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Listener purpose serving client API traffic.
pub const PURPOSE_API: &str = "api";

/// Listener purpose serving traffic between control-plane and worker nodes.
pub const PURPOSE_CLUSTER: &str = "cluster";

/// KMS purpose for encrypting secrets at rest.
pub const KMS_PURPOSE_ROOT: &str = "root";

/// KMS purpose for authenticating cluster members.
pub const KMS_PURPOSE_WORKER_AUTH: &str = "worker-auth";

/// Root configuration for the controller.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ControllerConfig {
    /// Listener definitions, in declaration order.
    pub listeners: Vec<ListenerConfig>,

    /// Log level (trace, debug, info, notice, warn, err). Empty means unset.
    pub log_level: String,

    /// Log format (standard, json). Empty means unset.
    pub log_format: String,

    /// Optional path for an additional file log sink.
    pub log_file: Option<String>,

    /// Skip locking process memory into RAM.
    pub disable_mlock: bool,

    /// Where to record the process id. Empty disables the PID file.
    pub pid_file: String,

    /// Global request duration override in seconds. Zero keeps the default.
    pub default_max_request_duration_secs: u64,

    /// Trigger a reload whenever the config file changes on disk.
    pub reload_on_change: bool,

    /// Key material blocks.
    pub kms: Vec<KmsConfig>,

    /// Metrics exposition.
    pub telemetry: TelemetryConfig,

    /// Memory profiler.
    pub profiler: ProfilerConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:9200").
    pub address: String,

    /// Declared purposes. Empty means both "api" and "cluster".
    pub purpose: Vec<String>,

    /// Serve plaintext instead of TLS.
    pub tls_disable: bool,

    /// Path to certificate file (PEM).
    pub tls_cert_file: Option<String>,

    /// Path to private key file (PEM).
    pub tls_key_file: Option<String>,

    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:9200".to_string(),
            purpose: Vec::new(),
            tls_disable: false,
            tls_cert_file: None,
            tls_key_file: None,
            max_connections: 10_000,
        }
    }
}

impl ListenerConfig {
    /// Whether this listener serves the given purpose. An empty purpose list serves all.
    pub fn serves(&self, purpose: &str) -> bool {
        self.purpose.is_empty() || self.purpose.iter().any(|p| p == purpose)
    }
}

/// A single KMS key block.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KmsConfig {
    /// "root" or "worker-auth".
    pub purpose: String,

    /// Identifier reported in logs.
    #[serde(default)]
    pub key_id: String,

    /// Hex encoded key material.
    pub key: String,
}

/// Telemetry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9203".to_string(),
        }
    }
}

/// Memory profiler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProfilerConfig {
    /// Enable periodic memory sampling.
    pub enabled: bool,

    /// Sampling interval in seconds.
    pub interval_secs: u64,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
        }
    }
}
