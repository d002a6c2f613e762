//! Cluster node server library.

pub mod config;
pub mod handlers;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;
pub mod state;

pub use config::schema::NodeConfig;
pub use handlers::{HandlerDescriptor, NodeHandler};
pub use health::{DetectionList, PeerNode};
pub use lifecycle::{NodeServer, ShutdownReport, StartupError};
pub use state::SharedState;
