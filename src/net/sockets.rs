//! Pooled server sockets shared with request handlers.
//!
//! Handlers that stream data between nodes open server sockets through the
//! repository so the sockets can be reused and closed together on shutdown.
//! Handlers only ever get a [`PooledSocket`] handle; the listener itself is
//! owned by the repository, so `close_all` frees the port even while handles
//! are still alive.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, RwLock, RwLockReadGuard};
use tokio::time;

/// How long `close_all` waits for a handle to give up the listener.
const RELEASE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum SocketError {
    #[error("failed to open socket on {address}: {source}")]
    Open {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("port {0} is already in use by another handler")]
    InUse(u16),

    #[error("socket on port {0} has been closed")]
    Closed(u16),

    #[error("failed to accept on port {port}: {source}")]
    Accept {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("sockets still held by handlers after close: {0:?}")]
    NotReleased(Vec<u16>),

    #[error("socket repository lock poisoned")]
    Poisoned,
}

#[derive(Debug)]
struct SocketSlot {
    listener: RwLock<Option<TcpListener>>,
    closed: watch::Sender<bool>,
}

#[derive(Debug)]
struct PoolEntry {
    slot: Arc<SocketSlot>,
    in_use: bool,
}

/// Handle to a pooled server socket.
///
/// Stops working once the repository closes the socket.
#[derive(Debug, Clone)]
pub struct PooledSocket {
    port: u16,
    slot: Arc<SocketSlot>,
}

impl PooledSocket {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_closed(&self) -> bool {
        *self.slot.closed.borrow()
    }

    pub fn same_socket(&self, other: &PooledSocket) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }

    /// Borrow the underlying listener.
    ///
    /// `close_all` waits for outstanding guards, so keep them short-lived.
    pub async fn listener(&self) -> Result<RwLockReadGuard<'_, TcpListener>, SocketError> {
        let guard = self.slot.listener.read().await;
        RwLockReadGuard::try_map(guard, |listener| listener.as_ref())
            .map_err(|_| SocketError::Closed(self.port))
    }

    pub async fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        let listener = self.listener().await?;
        listener.local_addr().map_err(|source| SocketError::Accept {
            port: self.port,
            source,
        })
    }

    /// Accept the next connection, or fail with `Closed` once the
    /// repository shuts the socket.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), SocketError> {
        let mut closed = self.slot.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(SocketError::Closed(self.port));
        }
        let listener = self.listener().await?;

        tokio::select! {
            accepted = listener.accept() => accepted.map_err(|source| SocketError::Accept {
                port: self.port,
                source,
            }),
            _ = closed.changed() => Err(SocketError::Closed(self.port)),
        }
    }
}

/// Server sockets keyed by port.
#[derive(Debug, Default)]
pub struct SocketRepository {
    sockets: Mutex<HashMap<u16, PoolEntry>>,
}

impl SocketRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the pooled socket for `port`, binding it on first use.
    pub fn open(&self, hostname: &str, port: u16) -> Result<PooledSocket, SocketError> {
        let mut sockets = self.sockets.lock().map_err(|_| SocketError::Poisoned)?;

        if let Some(entry) = sockets.get_mut(&port) {
            if entry.in_use {
                return Err(SocketError::InUse(port));
            }
            entry.in_use = true;
            tracing::debug!(port, "Reusing pooled socket");
            return Ok(PooledSocket {
                port,
                slot: entry.slot.clone(),
            });
        }

        let address = format!("{}:{}", hostname, port);
        let open_error = |source: std::io::Error| SocketError::Open {
            address: address.clone(),
            source,
        };
        let std_listener = std::net::TcpListener::bind(address.as_str()).map_err(open_error)?;
        std_listener.set_nonblocking(true).map_err(open_error)?;
        let listener = TcpListener::from_std(std_listener).map_err(open_error)?;

        let (closed, _) = watch::channel(false);
        let slot = Arc::new(SocketSlot {
            listener: RwLock::new(Some(listener)),
            closed,
        });

        tracing::debug!(address = %address, "Opened pooled socket");
        sockets.insert(
            port,
            PoolEntry {
                slot: slot.clone(),
                in_use: true,
            },
        );
        Ok(PooledSocket { port, slot })
    }

    /// Return a socket to the pool without closing it.
    pub fn release(&self, port: u16) -> Result<(), SocketError> {
        let mut sockets = self.sockets.lock().map_err(|_| SocketError::Poisoned)?;
        if let Some(entry) = sockets.get_mut(&port) {
            entry.in_use = false;
        }
        Ok(())
    }

    /// Close every pooled socket and free its port, whether or not a
    /// handler still holds a handle. Returns how many were closed.
    ///
    /// Fails with `NotReleased` for sockets whose listener guard was not
    /// given up within the release timeout.
    pub async fn close_all(&self) -> Result<usize, SocketError> {
        let drained: Vec<(u16, PoolEntry)> = {
            let mut sockets = self.sockets.lock().map_err(|_| SocketError::Poisoned)?;
            sockets.drain().collect()
        };

        let mut closed = 0;
        let mut held = Vec::new();
        for (port, entry) in drained {
            entry.slot.closed.send_replace(true);
            match time::timeout(RELEASE_TIMEOUT, entry.slot.listener.write()).await {
                Ok(mut listener) => {
                    if listener.take().is_some() {
                        closed += 1;
                    }
                    tracing::debug!(port, in_use = entry.in_use, "Closed pooled socket");
                }
                Err(_) => {
                    tracing::warn!(port, "Pooled socket still held by a handler");
                    held.push(port);
                }
            }
        }

        if held.is_empty() {
            Ok(closed)
        } else {
            held.sort_unstable();
            Err(SocketError::NotReleased(held))
        }
    }

    pub fn len(&self) -> usize {
        self.sockets.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
