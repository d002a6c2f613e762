//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (server.rs):
//!     Validate config → Resolve realm → Mount handlers → Bind listener
//!     → Startup hooks → Heartbeat monitor → [join]
//!
//! Shutdown (server.rs, shutdown.rs):
//!     Shutdown hooks → Cancel monitor → Close pooled sockets → Halt listener
//!     → ShutdownReport
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → NodeServer::stop
//! ```
//!
//! # Design Decisions
//! - Only configuration and bind errors fail startup
//! - Shutdown continues past failed steps and reports each one
//! - Stopping a server that is not running is a no-op

pub mod hooks;
pub mod server;
pub mod shutdown;
pub mod signals;

pub use hooks::{HookError, Hooks, LifecycleEvent, LifecycleHook};
pub use server::{NodeServer, StartupError};
pub use shutdown::{ShutdownReport, ShutdownStep, StepOutcome};
pub use signals::wait_for_signal;
