//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports, intervals, limits)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: NodeConfig → Result<(), Vec<ValidationError>>
//! - Runs when a config file is loaded and again before the server starts

use thiserror::Error;

use crate::config::schema::NodeConfig;
use crate::handlers::registry::{is_segment_prefix, API_PREFIX};

/// Upper bound for heartbeat delays: one day.
pub const MAX_HEARTBEAT_DELAY_MS: u64 = 86_400_000;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &NodeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.hostname.trim().is_empty() {
        errors.push(ValidationError::new("server.hostname", "must not be empty"));
    }
    if config.server.port == 0 {
        errors.push(ValidationError::new("server.port", "must be between 1 and 65535"));
    }

    if config.heartbeat.interval_ms == 0 {
        errors.push(ValidationError::new("heartbeat.interval_ms", "must be greater than zero"));
    } else if config.heartbeat.interval_ms > MAX_HEARTBEAT_DELAY_MS {
        errors.push(ValidationError::new(
            "heartbeat.interval_ms",
            format!("must not exceed {} ms", MAX_HEARTBEAT_DELAY_MS),
        ));
    }
    if config.heartbeat.initial_delay_ms > MAX_HEARTBEAT_DELAY_MS {
        errors.push(ValidationError::new(
            "heartbeat.initial_delay_ms",
            format!("must not exceed {} ms", MAX_HEARTBEAT_DELAY_MS),
        ));
    }
    if config.heartbeat.probe_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "heartbeat.probe_timeout_ms",
            "must be greater than zero",
        ));
    }
    if !config.heartbeat.status_path.starts_with('/') {
        errors.push(ValidationError::new("heartbeat.status_path", "must start with '/'"));
    }

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than zero"));
    }

    let mount = &config.static_files.mount_path;
    if !mount.starts_with('/') || mount.len() < 2 || mount.contains('*') {
        errors.push(ValidationError::new(
            "static_files.mount_path",
            "must be a non-root path starting with '/'",
        ));
    } else {
        let mount = mount.trim_end_matches('/');
        if is_segment_prefix(API_PREFIX, mount) || is_segment_prefix(mount, API_PREFIX) {
            errors.push(ValidationError::new(
                "static_files.mount_path",
                format!("must not overlap the {} routes", API_PREFIX),
            ));
        }
    }

    for (i, peer) in config.peers.iter().enumerate() {
        if peer.hostname.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("peers[{}].hostname", i),
                "must not be empty",
            ));
        }
        if peer.port == 0 {
            errors.push(ValidationError::new(
                format!("peers[{}].port", i),
                "must be between 1 and 65535",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
