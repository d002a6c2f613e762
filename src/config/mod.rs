//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → NodeConfig (validated, immutable)
//!
//! environment (NODE_SERVER_*)
//!     → settings.rs (ProcessSettings snapshot)
//!     → listener tuning, delegated login, password file home
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Process-wide settings are snapshotted, never read lazily

pub mod loader;
pub mod schema;
pub mod settings;
pub mod validation;

pub use schema::HeartbeatConfig;
pub use schema::ListenerConfig;
pub use schema::NodeConfig;
pub use schema::ObservabilityConfig;
pub use schema::ServerConfig;
pub use schema::StaticFilesConfig;
pub use settings::ProcessSettings;
pub use validation::MAX_HEARTBEAT_DELAY_MS;
