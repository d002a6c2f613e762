//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Listener (net)
//!     → server.rs acceptor tasks (one per configured acceptor)
//!     → hyper auto connection (HTTP/1.1 or HTTP/2)
//!     → request ID → trace → timeout → Basic auth
//!     → fixed endpoints | static files | mounted handlers
//! ```

pub mod server;

pub use server::{build_router, HttpServer, ServingHandle};
