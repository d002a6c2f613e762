//! Request handler subsystem.
//!
//! # Data Flow
//! ```text
//! Plugin discovery (external)
//!     → descriptor.rs (HandlerDescriptor: name + factory)
//!     → registry.rs (instantiate, inject SharedState, validate path, bind)
//!     → MountedHandlerSet router, one HandlerContext + session.rs store each
//!
//! Fixed endpoints:
//!     /        → root.rs (status document)
//!     /api/*   → api.rs (status, peers, handlers, executions)
//!     static   → tower-http ServeDir over the temp directory
//! ```
//!
//! # Design Decisions
//! - Handlers are trait objects; the core never knows what they do
//! - A handler is told whether it runs inside the server or embedded
//! - Mounting is all-or-nothing

pub mod api;
pub mod descriptor;
pub mod registry;
pub mod root;
pub mod session;

use axum::{body::Body, http::Request, response::Response};
use futures_util::future::BoxFuture;

use crate::state::SharedState;

pub use descriptor::HandlerDescriptor;
pub use registry::{mount, HandlerSummary, MountError, MountedHandlerSet, API_PREFIX};
pub use session::SessionStore;

/// Where a handler is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountMode {
    /// Mounted by this server, behind its authentication.
    Server,
    /// Hosted by some other container.
    Embedded,
}

/// Request extension describing the context a request was routed to.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub name: String,
    pub context_path: String,
    pub sessions: SessionStore,
}

/// A pluggable request handler.
pub trait NodeHandler: Send + Sync {
    /// Declared mount path, e.g. `/status/*`.
    fn context_path(&self) -> &str;

    /// Receive shared state before serving any request.
    fn mount(&mut self, shared: SharedState, mode: MountMode);

    /// Serve one request. The request carries a [`HandlerContext`] extension.
    fn handle(&self, request: Request<Body>) -> BoxFuture<'_, Response>;
}
