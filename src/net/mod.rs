//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! hostname:port + ListenerTuning
//!     → listener.rs (bind with backlog, accept, connection limits)
//!     → connection.rs (per-connection ids, drain tracking)
//!     → Hand off to HTTP layer
//!
//! Handlers:
//!     → sockets.rs (pooled server sockets, closed together on stop)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - Tuning is optional; invalid values never prevent startup

pub mod connection;
pub mod listener;
pub mod sockets;

pub use listener::{Listener, ListenerError, ListenerTuning};
pub use sockets::{PooledSocket, SocketError, SocketRepository};
