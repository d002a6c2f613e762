//! HTTP server setup and connection serving.
//!
//! # Responsibilities
//! - Create the Axum Router: fixed endpoints, static files, mounted handlers
//! - Wire up middleware (auth, timeout, request ID, tracing)
//! - Run acceptor tasks on the bound listener
//! - Serve each connection with HTTP/1.1 or HTTP/2
//! - Stop accepting and drain connections on halt

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use hyper_util::{
    rt::{TokioExecutor, TokioIo, TokioTimer},
    server::conn::auto,
    service::TowerToHyperService,
};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::StaticFilesConfig;
use crate::handlers::api::api_router;
use crate::handlers::root::{get_root, StatusState};
use crate::handlers::{MountedHandlerSet, API_PREFIX};
use crate::net::connection::{ConnectionGuard, ConnectionTracker};
use crate::net::listener::{ConnectionPermit, Listener, ListenerError};
use crate::security::auth::{basic_auth_middleware, Authenticator};

/// Build the Axum router with all endpoints and middleware layers.
///
/// Authentication wraps everything, including the 404 fallback, so no
/// request reaches a handler without valid credentials.
#[allow(deprecated)]
pub fn build_router(
    mounted: &MountedHandlerSet,
    status: StatusState,
    static_files: &StaticFilesConfig,
    auth: Arc<Authenticator>,
    request_timeout: Duration,
) -> Router {
    Router::new()
        .route("/", get(get_root))
        .with_state(status.clone())
        .nest(API_PREFIX, api_router(status))
        .nest_service(&static_files.mount_path, ServeDir::new(&static_files.directory))
        .merge(mounted.router())
        .layer(middleware::from_fn_with_state(auth, basic_auth_middleware))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// HTTP server bound to a listener, not yet accepting.
pub struct HttpServer {
    router: Router,
    listener: Arc<Listener>,
}

impl HttpServer {
    pub fn new(router: Router, listener: Listener) -> Self {
        Self {
            router,
            listener: Arc::new(listener),
        }
    }

    /// Start the acceptor tasks.
    pub fn spawn(self) -> Result<ServingHandle, ListenerError> {
        let local_addr = self.listener.local_addr().map_err(ListenerError::Accept)?;
        let (stop, stopped) = watch::channel(false);
        let tracker = ConnectionTracker::new();
        let acceptors = self.listener.tuning().acceptors();

        let tasks = (0..acceptors)
            .map(|index| {
                tokio::spawn(accept_loop(
                    index,
                    self.listener.clone(),
                    self.router.clone(),
                    tracker.clone(),
                    stopped.clone(),
                ))
            })
            .collect();

        tracing::info!(address = %local_addr, acceptors, "HTTP server accepting connections");

        Ok(ServingHandle {
            local_addr,
            stop,
            acceptors: tasks,
            tracker,
        })
    }
}

/// Handle to a serving HTTP server. Dropping it stops the acceptors.
pub struct ServingHandle {
    local_addr: SocketAddr,
    stop: watch::Sender<bool>,
    acceptors: Vec<JoinHandle<()>>,
    tracker: ConnectionTracker,
}

impl ServingHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Stop accepting, release the listening socket and give open
    /// connections `grace` to finish.
    pub async fn halt(self, grace: Duration) -> Result<(), ListenerError> {
        let _ = self.stop.send(true);

        let mut failure = None;
        for task in self.acceptors {
            if let Err(e) = task.await {
                failure.get_or_insert(ListenerError::Task(e.to_string()));
            }
        }

        let remaining = self.tracker.wait_for_drain(grace).await;
        if let Some(e) = failure {
            return Err(e);
        }
        if remaining > 0 {
            return Err(ListenerError::DrainTimeout { remaining, grace });
        }

        tracing::info!(address = %self.local_addr, "HTTP server stopped");
        Ok(())
    }
}

async fn accept_loop(
    index: usize,
    listener: Arc<Listener>,
    router: Router,
    tracker: ConnectionTracker,
    mut stop: watch::Receiver<bool>,
) {
    while !*stop.borrow() {
        let accepted = tokio::select! {
            _ = stop.changed() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer_addr, permit)) => {
                let idle_timeout = if listener.is_low_on_resources() {
                    listener.tuning().low_resource_idle_timeout
                } else {
                    None
                };
                let guard = tracker.track(peer_addr);
                tokio::spawn(serve_connection(
                    stream,
                    router.clone(),
                    idle_timeout,
                    stop.clone(),
                    guard,
                    permit,
                ));
            }
            Err(ListenerError::Closed) => break,
            Err(e) => {
                tracing::warn!(acceptor = index, error = %e, "Accept failed");
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    }

    tracing::debug!(acceptor = index, "Acceptor stopped");
}

async fn serve_connection(
    stream: TcpStream,
    router: Router,
    idle_timeout: Option<Duration>,
    mut stop: watch::Receiver<bool>,
    guard: ConnectionGuard,
    _permit: ConnectionPermit,
) {
    let mut builder = auto::Builder::new(TokioExecutor::new());
    builder.http1().timer(TokioTimer::new());
    if let Some(timeout) = idle_timeout {
        tracing::debug!(connection_id = %guard.id(), idle_timeout_ms = timeout.as_millis() as u64, "Low on resources, limiting idle time");
        builder.http1().header_read_timeout(timeout);
    }

    let service = TowerToHyperService::new(router);
    let conn = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = stop.changed() => {
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };

    if let Err(e) = result {
        tracing::debug!(connection_id = %guard.id(), peer_addr = %guard.peer_addr(), error = %e, "Connection ended with error");
    }
}
