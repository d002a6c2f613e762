//! Peer liveness records.
//!
//! # Responsibilities
//! - Describe a peer node (address and credentials)
//! - Hold the peer's liveness: active flag plus last active/inactive times
//! - Update all three fields as one unit
//!
//! # Design Decisions
//! - One lock per detection; readers always see a consistent triple
//! - Each update stamps exactly one timestamp
//! - The list is append-only here; membership is owned by the caller

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;

use crate::security::Credentials;

/// A remote node server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerNode {
    pub name: String,
    pub hostname: String,
    pub port: u16,
    pub credentials: Option<Credentials>,
}

impl PeerNode {
    pub fn new(
        name: impl Into<String>,
        hostname: impl Into<String>,
        port: u16,
        credentials: Option<Credentials>,
    ) -> Self {
        Self {
            name: name.into(),
            hostname: hostname.into(),
            port,
            credentials,
        }
    }

    /// Base URL of the peer, e.g. `http://10.0.0.5:8082/`.
    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!("http://{}:{}/", self.hostname, self.port))
    }
}

/// Liveness state derived from a detection's fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerState {
    /// Never probed.
    Unknown,
    Active,
    Inactive,
}

/// Consistent snapshot of a detection's health fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetectionStatus {
    pub active: bool,
    pub last_active_at: Option<DateTime<Utc>>,
    pub last_inactive_at: Option<DateTime<Utc>>,
}

impl DetectionStatus {
    pub fn state(&self) -> PeerState {
        match (self.active, self.last_active_at, self.last_inactive_at) {
            (true, _, _) => PeerState::Active,
            (false, None, None) => PeerState::Unknown,
            (false, _, _) => PeerState::Inactive,
        }
    }
}

/// Tracked liveness of one peer.
#[derive(Debug)]
pub struct SlaveDetection {
    peer: PeerNode,
    status: RwLock<DetectionStatus>,
}

impl SlaveDetection {
    pub fn new(peer: PeerNode) -> Self {
        Self {
            peer,
            status: RwLock::new(DetectionStatus::default()),
        }
    }

    pub fn peer(&self) -> &PeerNode {
        &self.peer
    }

    /// Read all health fields at once.
    pub fn status(&self) -> DetectionStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Record a successful probe. Returns the previous state.
    pub fn mark_active(&self, at: DateTime<Utc>) -> PeerState {
        let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
        let previous = status.state();
        status.active = true;
        status.last_active_at = Some(at);
        previous
    }

    /// Record a failed probe. Returns the previous state.
    pub fn mark_inactive(&self, at: DateTime<Utc>) -> PeerState {
        let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
        let previous = status.state();
        status.active = false;
        status.last_inactive_at = Some(at);
        previous
    }
}

/// The shared list of peers being tracked.
#[derive(Debug, Default)]
pub struct DetectionList {
    entries: RwLock<Vec<Arc<SlaveDetection>>>,
}

impl DetectionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_peers(peers: impl IntoIterator<Item = PeerNode>) -> Self {
        Self {
            entries: RwLock::new(
                peers
                    .into_iter()
                    .map(|p| Arc::new(SlaveDetection::new(p)))
                    .collect(),
            ),
        }
    }

    /// Start tracking a peer.
    pub fn push(&self, peer: PeerNode) -> Arc<SlaveDetection> {
        let detection = Arc::new(SlaveDetection::new(peer));
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(detection.clone());
        detection
    }

    /// Entries at this moment, in insertion order.
    pub fn snapshot(&self) -> Vec<Arc<SlaveDetection>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn find(&self, name: &str) -> Option<Arc<SlaveDetection>> {
        self.snapshot().into_iter().find(|d| d.peer.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn active_count(&self) -> usize {
        self.snapshot().iter().filter(|d| d.status().active).count()
    }
}
