//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use node_server::config::settings::ProcessSettings;
use node_server::handlers::{HandlerContext, MountMode, NodeHandler};
use node_server::{NodeConfig, NodeServer, SharedState};

pub const USER: &str = "cluster";
pub const PASSWORD: &str = "s3cret";

/// Request heads seen by a mock peer, one entry per request.
pub type SeenRequests = Arc<Mutex<Vec<String>>>;

/// Start a mock peer that answers every request with `f()`.
pub async fn start_programmable_peer<F, Fut>(addr: SocketAddr, f: F) -> SeenRequests
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.unwrap();
    let f = Arc::new(f);
    let seen: SeenRequests = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    let recorder = recorder.clone();
                    tokio::spawn(async move {
                        let head = read_head(&mut socket).await;
                        recorder.lock().unwrap().push(head);

                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            401 => "401 Unauthorized",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    seen
}

/// Start a mock peer that always returns `status`.
pub async fn start_mock_peer(addr: SocketAddr, status: u16) -> SeenRequests {
    start_programmable_peer(addr, move || async move { (status, "{}".to_string()) }).await
}

async fn read_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match tokio::time::timeout(Duration::from_secs(2), socket.read(&mut chunk)).await {
            Ok(Ok(n)) if n > 0 => buf.extend_from_slice(&chunk[..n]),
            _ => break,
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Config for a server on `127.0.0.1:port` that authenticates with the
/// node's own credentials and does not heartbeat during the test.
pub fn node_config(port: u16) -> NodeConfig {
    let mut config = NodeConfig::default();
    config.server.hostname = "127.0.0.1".into();
    config.server.port = port;
    config.server.join = false;
    config.node = Some(node_server::config::schema::NodeIdentity {
        name: "master".into(),
        username: USER.into(),
        password: PASSWORD.into(),
    });
    config.heartbeat.initial_delay_ms = 60_000;
    config.listener.shutdown_grace_secs = 1;
    config
}

/// Server with an empty environment, so host settings cannot leak in.
pub fn isolated_server(config: NodeConfig) -> NodeServer {
    NodeServer::new(config, SharedState::default()).with_settings(ProcessSettings::default())
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}

pub fn url(port: u16, path: &str) -> String {
    format!("http://127.0.0.1:{}{}", port, path)
}

/// A listener could be bound to `port` the way the server binds it.
pub fn port_is_free(port: u16) -> bool {
    let Ok(socket) = tokio::net::TcpSocket::new_v4() else {
        return false;
    };
    let _ = socket.set_reuseaddr(true);
    socket.bind(SocketAddr::from(([127, 0, 0, 1], port))).is_ok() && socket.listen(1).is_ok()
}

/// Replies `<handler name> <context path> <request path>`.
pub struct EchoHandler {
    path: &'static str,
    mode: Option<MountMode>,
}

impl EchoHandler {
    pub fn at(path: &'static str) -> Self {
        Self { path, mode: None }
    }
}

impl NodeHandler for EchoHandler {
    fn context_path(&self) -> &str {
        self.path
    }

    fn mount(&mut self, _shared: SharedState, mode: MountMode) {
        self.mode = Some(mode);
    }

    fn handle(&self, request: Request<Body>) -> BoxFuture<'_, Response> {
        Box::pin(async move {
            let context = request
                .extensions()
                .get::<HandlerContext>()
                .map(|c| format!("{} {}", c.name, c.context_path))
                .unwrap_or_default();
            let mode = match self.mode {
                Some(MountMode::Server) => "server",
                Some(MountMode::Embedded) => "embedded",
                None => "unmounted",
            };
            format!("{} {} {}", context, request.uri().path(), mode).into_response()
        })
    }
}

/// Holds every request for `delay` before answering.
pub struct SlowHandler {
    path: &'static str,
    delay: Duration,
}

impl SlowHandler {
    pub fn at(path: &'static str, delay: Duration) -> Self {
        Self { path, delay }
    }
}

impl NodeHandler for SlowHandler {
    fn context_path(&self) -> &str {
        self.path
    }

    fn mount(&mut self, _shared: SharedState, _mode: MountMode) {}

    fn handle(&self, _request: Request<Body>) -> BoxFuture<'_, Response> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            "done".into_response()
        })
    }
}
