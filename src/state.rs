//! State shared between the server core and mounted handlers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use crate::health::DetectionList;
use crate::net::SocketRepository;

/// A job or transformation registered with this node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionEntry {
    pub id: String,
    pub name: String,
    pub status: String,
    pub registered_at: DateTime<Utc>,
}

/// Executions known to this node, keyed by id. Their content is managed by
/// the handlers; the core only reports on it.
#[derive(Debug, Default)]
pub struct ExecutionRegistry {
    entries: DashMap<String, ExecutionEntry>,
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: impl Into<String>, name: impl Into<String>) -> ExecutionEntry {
        let entry = ExecutionEntry {
            id: id.into(),
            name: name.into(),
            status: "waiting".to_string(),
            registered_at: Utc::now(),
        };
        self.entries.insert(entry.id.clone(), entry.clone());
        entry
    }

    pub fn set_status(&self, id: &str, status: impl Into<String>) -> bool {
        match self.entries.get_mut(id) {
            Some(mut entry) => {
                entry.status = status.into();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<ExecutionEntry> {
        self.entries.get(id).map(|e| e.clone())
    }

    pub fn remove(&self, id: &str) -> Option<ExecutionEntry> {
        self.entries.remove(id).map(|(_, e)| e)
    }

    /// All entries, oldest first.
    pub fn list(&self) -> Vec<ExecutionEntry> {
        let mut entries: Vec<_> = self.entries.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| a.registered_at.cmp(&b.registered_at).then_with(|| a.id.cmp(&b.id)));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Identity of a running server, handed to hooks and status endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    /// Fresh for every start, so clients can tell a restart happened.
    pub instance_id: Uuid,
    pub hostname: String,
    pub port: u16,
    pub started_at: DateTime<Utc>,
}

impl ServerInfo {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            hostname: hostname.into(),
            port,
            started_at: Utc::now(),
        }
    }

    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds().max(0)
    }
}

/// Everything injected into handlers when they are mounted.
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    pub jobs: Arc<ExecutionRegistry>,
    pub transformations: Arc<ExecutionRegistry>,
    pub sockets: Arc<SocketRepository>,
    pub detections: Arc<DetectionList>,
}

impl SharedState {
    pub fn new(detections: Arc<DetectionList>) -> Self {
        Self {
            detections,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_tracks_status() {
        let registry = ExecutionRegistry::new();
        registry.register("t-1", "load customers");
        assert!(registry.set_status("t-1", "running"));
        assert!(!registry.set_status("missing", "running"));

        assert_eq!(registry.get("t-1").unwrap().status, "running");
        assert_eq!(registry.list().len(), 1);
        assert!(registry.remove("t-1").is_some());
        assert!(registry.is_empty());
    }
}
