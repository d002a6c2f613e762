//! Root status endpoint.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::handlers::registry::HandlerSummary;
use crate::state::{ServerInfo, SharedState};

/// State behind the fixed endpoints.
#[derive(Clone)]
pub struct StatusState {
    pub shared: SharedState,
    pub info: ServerInfo,
    pub handlers: Arc<Vec<HandlerSummary>>,
}

#[derive(Debug, Serialize)]
pub struct StatusDocument {
    pub name: &'static str,
    pub version: &'static str,
    pub instance_id: Uuid,
    pub hostname: String,
    pub port: u16,
    pub uptime_secs: i64,
    pub handlers: Vec<String>,
    pub peers: usize,
    pub active_peers: usize,
    pub jobs: usize,
    pub transformations: usize,
}

impl StatusDocument {
    pub fn collect(state: &StatusState) -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            instance_id: state.info.instance_id,
            hostname: state.info.hostname.clone(),
            port: state.info.port,
            uptime_secs: state.info.uptime_secs(),
            handlers: state.handlers.iter().map(|h| h.path.clone()).collect(),
            peers: state.shared.detections.len(),
            active_peers: state.shared.detections.active_count(),
            jobs: state.shared.jobs.len(),
            transformations: state.shared.transformations.len(),
        }
    }
}

pub async fn get_root(State(state): State<StatusState>) -> Json<StatusDocument> {
    Json(StatusDocument::collect(&state))
}
