//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     ProcessSettings + ServerConfig + node credentials
//!     → realm.rs (resolve exactly one SecurityRealm)
//!     → auth.rs (Authenticator: login module, single pair, or credentials.rs store)
//!
//! Per request:
//!     Authorization: Basic ...
//!     → auth.rs middleware
//!     → 401 or AuthenticatedUser extension + next layer
//! ```
//!
//! # Design Decisions
//! - Realm is resolved once per start, never re-resolved while running
//! - Resolution never fails; a missing credentials file rejects requests instead
//! - Every path is protected, including static files

pub mod auth;
pub mod credentials;
pub mod login;
pub mod realm;

pub use auth::{AuthenticatedUser, Authenticator};
pub use credentials::{CredentialStore, Credentials};
pub use login::{LoginModule, LoginModules};
pub use realm::{resolve_realm, SecurityRealm};
