//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Resolve and bind `hostname:port` with the configured accept queue
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore
//! - Report when the connection limit is nearly exhausted

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::{lookup_host, TcpListener, TcpSocket, TcpStream};
use tokio::sync::Semaphore;

use crate::config::settings::{self, ProcessSettings};

/// Acceptor tasks when none are configured.
pub const DEFAULT_ACCEPTORS: usize = 1;
/// Listen backlog when none is configured.
pub const DEFAULT_ACCEPT_QUEUE_SIZE: u32 = 1024;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to resolve or bind the address.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to accept connection.
    #[error("failed to accept: {0}")]
    Accept(std::io::Error),

    /// The connection limit was shut down.
    #[error("listener closed")]
    Closed,

    /// An acceptor task ended abnormally.
    #[error("acceptor task failed: {0}")]
    Task(String),

    /// Connections still open after the grace period.
    #[error("{remaining} connection(s) still open after {grace:?}")]
    DrainTimeout { remaining: u64, grace: Duration },
}

/// Optional listener tuning from process settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerTuning {
    pub acceptors: Option<usize>,
    pub accept_queue_size: Option<u32>,
    pub low_resource_idle_timeout: Option<Duration>,
}

impl ListenerTuning {
    /// Read tuning values. Invalid values are logged and left unset.
    pub fn from_settings(settings: &ProcessSettings) -> Self {
        let mut tuning = Self::default();

        if let Some(n) = valid(settings, settings::ACCEPTORS) {
            tuning.acceptors = Some(n as usize);
            tracing::info!(acceptors = n, "Listener option set");
        }
        if let Some(n) = valid(settings, settings::ACCEPT_QUEUE_SIZE) {
            tuning.accept_queue_size = Some(n);
            tracing::info!(accept_queue_size = n, "Listener option set");
        }
        if let Some(n) = valid(settings, settings::LOW_RES_MAX_IDLE_TIME) {
            tuning.low_resource_idle_timeout = Some(Duration::from_millis(n as u64));
            tracing::info!(low_resource_max_idle_ms = n, "Listener option set");
        }

        tuning
    }

    pub fn acceptors(&self) -> usize {
        self.acceptors.unwrap_or(DEFAULT_ACCEPTORS)
    }

    pub fn accept_queue_size(&self) -> u32 {
        self.accept_queue_size.unwrap_or(DEFAULT_ACCEPT_QUEUE_SIZE)
    }
}

fn valid(settings: &ProcessSettings, key: &str) -> Option<u32> {
    match settings.positive(key) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(
                option = key,
                error = %e,
                "Ignoring invalid listener option, using default"
            );
            None
        }
    }
}

/// A bounded TCP listener that limits concurrent connections.
///
/// Uses a semaphore to enforce `max_connections`. When the limit is reached,
/// new connections will wait until a slot becomes available.
pub struct Listener {
    /// The underlying TCP listener.
    inner: TcpListener,
    /// Semaphore to limit concurrent connections.
    connection_limit: Arc<Semaphore>,
    /// Configured maximum connections.
    max_connections: usize,
    tuning: ListenerTuning,
}

impl Listener {
    /// Bind to `hostname:port` with connection limits and tuning applied.
    pub async fn bind(
        hostname: &str,
        port: u16,
        max_connections: usize,
        tuning: ListenerTuning,
    ) -> Result<Self, ListenerError> {
        let address = format!("{}:{}", hostname, port);
        let bind_error = |source: std::io::Error| ListenerError::Bind {
            address: address.clone(),
            source,
        };

        let addr: SocketAddr = lookup_host(address.as_str())
            .await
            .map_err(bind_error)?
            .next()
            .ok_or_else(|| {
                bind_error(std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    "hostname did not resolve",
                ))
            })?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_error)?;
        #[cfg(unix)]
        socket.set_reuseaddr(true).map_err(bind_error)?;
        socket.bind(addr).map_err(bind_error)?;
        let inner = socket.listen(tuning.accept_queue_size()).map_err(bind_error)?;

        let local_addr = inner.local_addr().map_err(bind_error)?;

        tracing::info!(
            address = %local_addr,
            max_connections,
            acceptors = tuning.acceptors(),
            accept_queue_size = tuning.accept_queue_size(),
            "Listener bound"
        );

        Ok(Self {
            inner,
            connection_limit: Arc::new(Semaphore::new(max_connections)),
            max_connections,
            tuning,
        })
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// This will wait if the connection limit has been reached.
    /// Returns the stream and a permit that must be held for the connection's lifetime.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        // Acquire permit first (backpressure)
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::debug!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    /// Get configured maximum connections.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn tuning(&self) -> ListenerTuning {
        self.tuning
    }

    /// At most a tenth of the connection slots are free.
    pub fn is_low_on_resources(&self) -> bool {
        self.available_permits() <= self.max_connections / 10
    }
}

/// A permit representing a connection slot.
///
/// When dropped, the connection slot is released back to the pool.
/// This ensures backpressure is maintained even if the connection handler panics.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}
