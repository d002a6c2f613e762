//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the node server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::health::PeerNode;
use crate::security::Credentials;

/// Root configuration for the node server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct NodeConfig {
    /// Host, port and credential file of this server.
    pub server: ServerConfig,

    /// This node's own identity. Its password, when set, becomes the
    /// single credential accepted by the server.
    pub node: Option<NodeIdentity>,

    /// Peer nodes whose liveness is tracked.
    pub peers: Vec<PeerConfig>,

    /// Heartbeat monitor settings.
    pub heartbeat: HeartbeatConfig,

    /// Listener limits and draining.
    pub listener: ListenerConfig,

    /// Static resource serving.
    pub static_files: StaticFilesConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Server address and startup behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Hostname or IP address to bind.
    pub hostname: String,

    /// TCP port (1-65535).
    pub port: u16,

    /// Block the caller of `start` until the server is stopped.
    pub join: bool,

    /// Explicit credentials file, overriding the well-known locations.
    pub password_file: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            port: 8080,
            join: true,
            password_file: None,
        }
    }
}

/// Identity of this node.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeIdentity {
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl NodeIdentity {
    /// Credentials hint used by realm resolution.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }
}

/// A peer node tracked by the heartbeat monitor.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PeerConfig {
    pub name: String,
    pub hostname: String,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl PeerConfig {
    pub fn to_peer(&self) -> PeerNode {
        let credentials = match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some(Credentials::new(user.clone(), pass.clone())),
            _ => None,
        };
        PeerNode::new(self.name.clone(), self.hostname.clone(), self.port, credentials)
    }
}

/// Heartbeat monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// Delay before the first heartbeat, in milliseconds.
    pub initial_delay_ms: u64,

    /// Interval between heartbeats, in milliseconds.
    pub interval_ms: u64,

    /// Timeout of a single status probe, in milliseconds.
    pub probe_timeout_ms: u64,

    /// Path probed on each peer.
    pub status_path: String,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 20_000,
            interval_ms: 20_000,
            probe_timeout_ms: 10_000,
            status_path: "/api/status".to_string(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Time allowed for in-flight connections to drain on stop, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            max_connections: 10_000,
            request_timeout_secs: 30,
            shutdown_grace_secs: 5,
        }
    }
}

/// Static resource serving (generated images and other artifacts).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    /// URL prefix the directory is served under.
    pub mount_path: String,

    /// Directory served read-only.
    pub directory: String,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            mount_path: "/resources".to_string(),
            directory: "temp".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of human readable ones.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: NodeConfig = toml::from_str(
            r#"
            [server]
            hostname = "0.0.0.0"
            port = 8181
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8181);
        assert!(config.server.join);
        assert_eq!(config.heartbeat.interval_ms, 20_000);
        assert_eq!(config.heartbeat.initial_delay_ms, 20_000);
        assert_eq!(config.static_files.directory, "temp");
        assert!(config.peers.is_empty());
    }

    #[test]
    fn peers_carry_credentials() {
        let config: NodeConfig = toml::from_str(
            r#"
            [[peers]]
            name = "worker-1"
            hostname = "10.0.0.5"
            port = 8082
            username = "cluster"
            password = "cluster"
            "#,
        )
        .unwrap();

        let peer = config.peers[0].to_peer();
        assert_eq!(peer.name, "worker-1");
        assert_eq!(peer.port, 8082);
        assert_eq!(peer.credentials.unwrap().username, "cluster");
    }
}
