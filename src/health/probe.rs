//! Status probes against peer nodes.

use std::time::Duration;

use axum::body::Body;
use base64::prelude::*;
use futures_util::future::BoxFuture;
use hyper::{header, Request, StatusCode};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::time;

use crate::health::detection::PeerNode;

/// Any reason a peer did not answer its status probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid peer address: {0}")]
    Address(String),

    #[error("connection error: {0}")]
    Connect(String),

    #[error("peer answered with status {0}")]
    Status(StatusCode),

    #[error("no answer within {0:?}")]
    Timeout(Duration),

    #[error("probe panicked")]
    Panicked,
}

/// Asks a peer whether it is alive.
pub trait StatusProbe: Send + Sync {
    fn probe<'a>(&'a self, peer: &'a PeerNode) -> BoxFuture<'a, Result<(), ProbeError>>;
}

/// Probes a peer's status endpoint over HTTP.
pub struct HttpStatusProbe {
    client: Client<HttpConnector, Body>,
    path: String,
    timeout: Duration,
}

impl HttpStatusProbe {
    pub fn new(path: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            client,
            path: path.into(),
            timeout,
        }
    }

    async fn check(&self, peer: &PeerNode) -> Result<(), ProbeError> {
        let url = peer
            .base_url()
            .and_then(|base| base.join(&self.path))
            .map_err(|e| ProbeError::Address(e.to_string()))?;

        let mut builder = Request::builder()
            .method("GET")
            .uri(url.as_str())
            .header(header::USER_AGENT, "node-server-heartbeat");
        if let Some(creds) = &peer.credentials {
            let token = BASE64_STANDARD.encode(format!("{}:{}", creds.username, creds.password));
            builder = builder.header(header::AUTHORIZATION, format!("Basic {}", token));
        }
        let request = builder
            .body(Body::empty())
            .map_err(|e| ProbeError::Address(e.to_string()))?;

        match time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) if response.status().is_success() => Ok(()),
            Ok(Ok(response)) => Err(ProbeError::Status(response.status())),
            Ok(Err(e)) => Err(ProbeError::Connect(e.to_string())),
            Err(_) => Err(ProbeError::Timeout(self.timeout)),
        }
    }
}

impl StatusProbe for HttpStatusProbe {
    fn probe<'a>(&'a self, peer: &'a PeerNode) -> BoxFuture<'a, Result<(), ProbeError>> {
        Box::pin(self.check(peer))
    }
}
