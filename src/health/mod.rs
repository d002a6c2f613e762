//! Peer health subsystem.
//!
//! # Data Flow
//! ```text
//! Heartbeat (monitor.rs):
//!     initial delay, then fixed interval
//!     → snapshot DetectionList
//!     → probe.rs (status request per peer)
//!     → detection.rs (mark active / inactive, stamp time)
//!
//! Readers (API handlers):
//!     DetectionList → SlaveDetection::status() (consistent snapshot)
//! ```
//!
//! # Design Decisions
//! - Every probe result causes a transition; no thresholds, no retries
//! - All probe failures collapse into "inactive"
//! - Long-inactive peers are never evicted
//! - The monitor belongs to a server instance, not the process

pub mod detection;
pub mod monitor;
pub mod probe;

pub use detection::{DetectionList, DetectionStatus, PeerNode, PeerState, SlaveDetection};
pub use monitor::{HeartbeatMonitor, MonitorError, MonitorSchedule};
pub use probe::{HttpStatusProbe, ProbeError, StatusProbe};
