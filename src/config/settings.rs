//! Process-wide settings.
//!
//! Tuning values and the delegated login configuration are read from the
//! environment once, into an immutable snapshot. Tests build snapshots by hand.

use std::collections::HashMap;

use thiserror::Error;

/// Number of acceptor tasks.
pub const ACCEPTORS: &str = "NODE_SERVER_ACCEPTORS";
/// Listen backlog of the server socket.
pub const ACCEPT_QUEUE_SIZE: &str = "NODE_SERVER_ACCEPT_QUEUE_SIZE";
/// Idle timeout (ms) for connections accepted under low resources.
pub const LOW_RES_MAX_IDLE_TIME: &str = "NODE_SERVER_LOW_RES_MAX_IDLE_TIME";
/// Name of the delegated login module.
pub const LOGIN_MODULE: &str = "NODE_SERVER_LOGIN_MODULE";
/// Configuration file handed to the delegated login module.
pub const LOGIN_CONFIG: &str = "NODE_SERVER_LOGIN_CONFIG";
/// Home directory holding `node.pwd`.
pub const NODE_HOME: &str = "NODE_SERVER_HOME";

const PREFIX: &str = "NODE_SERVER_";

/// A setting that is present but unusable.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid value {value:?} for {key}: expected a positive integer")]
pub struct SettingError {
    pub key: String,
    pub value: String,
}

/// Snapshot of process-wide settings.
#[derive(Debug, Clone, Default)]
pub struct ProcessSettings {
    values: HashMap<String, String>,
}

impl ProcessSettings {
    /// Capture all `NODE_SERVER_*` variables plus `HOME`.
    pub fn from_env() -> Self {
        Self {
            values: std::env::vars()
                .filter(|(key, _)| key.starts_with(PREFIX) || key == "HOME")
                .collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Value of a setting; empty values count as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Parse an optional positive integer setting.
    pub fn positive(&self, key: &str) -> Result<Option<u32>, SettingError> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        match raw.trim().parse::<u32>() {
            Ok(value) if value > 0 => Ok(Some(value)),
            _ => Err(SettingError {
                key: key.to_string(),
                value: raw.to_string(),
            }),
        }
    }
}
