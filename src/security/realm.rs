//! Security realm resolution.
//!
//! Exactly one realm is chosen at startup, first match wins:
//! 1. delegated login module (module name and config file both set)
//! 2. the node's own credentials, if they carry a password
//! 3. a credentials file: explicit path, `<home>/node.pwd` if present,
//!    otherwise `pwd/node.pwd`

use std::fmt;
use std::path::PathBuf;

use crate::config::settings::{self, ProcessSettings};
use crate::config::ServerConfig;
use crate::security::credentials::Credentials;

/// Realm name announced in `WWW-Authenticate`.
pub const REALM_NAME: &str = "NodeServer";

/// Name of the credentials file in the home and local directories.
pub const PASSWORD_FILE_NAME: &str = "node.pwd";

const HOME_DIR_NAME: &str = ".node-server";
const LOCAL_DIR: &str = "pwd";

/// The authentication source enforced on every HTTP path.
#[derive(Clone, PartialEq, Eq)]
pub enum SecurityRealm {
    /// Authentication delegated to a named login module.
    Delegated {
        module_name: String,
        config_file: PathBuf,
    },
    /// A single username/password pair held in memory.
    SingleCredential(Credentials),
    /// Users read from a credentials file at startup.
    FileBacked { path: PathBuf },
}

impl SecurityRealm {
    pub fn kind(&self) -> &'static str {
        match self {
            SecurityRealm::Delegated { .. } => "delegated",
            SecurityRealm::SingleCredential(_) => "single-credential",
            SecurityRealm::FileBacked { .. } => "file",
        }
    }
}

impl fmt::Debug for SecurityRealm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityRealm::Delegated {
                module_name,
                config_file,
            } => f
                .debug_struct("Delegated")
                .field("module_name", module_name)
                .field("config_file", config_file)
                .finish(),
            SecurityRealm::SingleCredential(creds) => {
                f.debug_tuple("SingleCredential").field(creds).finish()
            }
            SecurityRealm::FileBacked { path } => {
                f.debug_struct("FileBacked").field("path", path).finish()
            }
        }
    }
}

/// Pick the realm for a server. Never fails.
pub fn resolve_realm(
    config: &ServerConfig,
    hint: Option<&Credentials>,
    settings: &ProcessSettings,
) -> SecurityRealm {
    if let (Some(module_name), Some(config_file)) = (
        settings.get(settings::LOGIN_MODULE),
        settings.get(settings::LOGIN_CONFIG),
    ) {
        tracing::info!(module = %module_name, config_file = %config_file, "Using delegated login realm");
        return SecurityRealm::Delegated {
            module_name: module_name.to_string(),
            config_file: PathBuf::from(config_file),
        };
    }

    if let Some(creds) = hint.filter(|c| !c.password.is_empty()) {
        tracing::info!(username = %creds.username, "Using single-credential realm");
        return SecurityRealm::SingleCredential(creds.clone());
    }

    let path = match config.password_file.as_deref().filter(|p| !p.is_empty()) {
        Some(explicit) => PathBuf::from(explicit),
        None => match home_password_file(settings) {
            Some(home) if home.exists() => home,
            _ => local_password_file(),
        },
    };

    tracing::info!(path = %path.display(), "Using credentials file realm");
    SecurityRealm::FileBacked { path }
}

/// `<NODE_SERVER_HOME>/node.pwd`, or `$HOME/.node-server/node.pwd`.
pub fn home_password_file(settings: &ProcessSettings) -> Option<PathBuf> {
    if let Some(home) = settings.get(settings::NODE_HOME) {
        return Some(PathBuf::from(home).join(PASSWORD_FILE_NAME));
    }
    settings
        .get("HOME")
        .map(|home| PathBuf::from(home).join(HOME_DIR_NAME).join(PASSWORD_FILE_NAME))
}

/// Default credentials file relative to the working directory.
pub fn local_password_file() -> PathBuf {
    PathBuf::from(LOCAL_DIR).join(PASSWORD_FILE_NAME)
}
