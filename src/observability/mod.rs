//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (heartbeat and auth counters, peer gauges)
//!
//! Consumers:
//!     → stdout (text or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID (x-request-id) is set by the HTTP layer and shows up in spans
//! - Metrics are only exported when enabled in config

pub mod logging;
pub mod metrics;
