//! REST endpoint group under `/api`.

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::handlers::registry::HandlerSummary;
use crate::handlers::root::{StatusDocument, StatusState};
use crate::health::PeerState;
use crate::state::ExecutionEntry;

#[derive(Debug, Serialize)]
pub struct PeerReport {
    pub name: String,
    pub hostname: String,
    pub port: u16,
    pub active: bool,
    pub state: PeerState,
    pub last_active_at: Option<DateTime<Utc>>,
    pub last_inactive_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ExecutionsReport {
    pub jobs: Vec<ExecutionEntry>,
    pub transformations: Vec<ExecutionEntry>,
}

pub fn api_router(state: StatusState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/peers", get(get_peers))
        .route("/handlers", get(get_handlers))
        .route("/executions", get(get_executions))
        .with_state(state)
}

pub async fn get_status(State(state): State<StatusState>) -> Json<StatusDocument> {
    Json(StatusDocument::collect(&state))
}

pub async fn get_peers(State(state): State<StatusState>) -> Json<Vec<PeerReport>> {
    let reports = state
        .shared
        .detections
        .snapshot()
        .iter()
        .map(|detection| {
            let peer = detection.peer();
            let status = detection.status();
            PeerReport {
                name: peer.name.clone(),
                hostname: peer.hostname.clone(),
                port: peer.port,
                active: status.active,
                state: status.state(),
                last_active_at: status.last_active_at,
                last_inactive_at: status.last_inactive_at,
            }
        })
        .collect();

    Json(reports)
}

pub async fn get_handlers(State(state): State<StatusState>) -> Json<Vec<HandlerSummary>> {
    Json(state.handlers.as_ref().clone())
}

pub async fn get_executions(State(state): State<StatusState>) -> Json<ExecutionsReport> {
    Json(ExecutionsReport {
        jobs: state.shared.jobs.list(),
        transformations: state.shared.transformations.list(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{DetectionList, PeerNode};
    use crate::state::{ServerInfo, SharedState};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state() -> StatusState {
        let detections = Arc::new(DetectionList::from_peers([
            PeerNode::new("worker-1", "10.0.0.5", 8082, None),
            PeerNode::new("worker-2", "10.0.0.6", 8082, None),
        ]));
        detections.find("worker-1").unwrap().mark_active(Utc::now());
        let shared = SharedState::new(detections);
        shared.transformations.register("t-1", "load customers");

        StatusState {
            shared,
            info: ServerInfo::new("localhost", 8081),
            handlers: Arc::new(vec![HandlerSummary {
                name: "status".into(),
                path: "/status".into(),
            }]),
        }
    }

    async fn get_json(uri: &str) -> serde_json::Value {
        let res = Router::new()
            .nest("/api", api_router(state()))
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = axum::body::to_bytes(res.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn status_counts_peers_and_executions() {
        let json = get_json("/api/status").await;
        assert_eq!(json["port"], 8081);
        assert_eq!(json["peers"], 2);
        assert_eq!(json["active_peers"], 1);
        assert_eq!(json["transformations"], 1);
        assert_eq!(json["handlers"][0], "/status");
    }

    #[tokio::test]
    async fn peers_report_state_and_timestamps() {
        let json = get_json("/api/peers").await;
        assert_eq!(json[0]["state"], "active");
        assert!(json[0]["last_active_at"].is_string());
        assert_eq!(json[1]["state"], "unknown");
        assert!(json[1]["last_inactive_at"].is_null());
    }

    #[tokio::test]
    async fn executions_lists_registries() {
        let json = get_json("/api/executions").await;
        assert_eq!(json["transformations"][0]["name"], "load customers");
        assert_eq!(json["jobs"].as_array().unwrap().len(), 0);
    }
}
