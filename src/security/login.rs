//! Delegated login modules.
//!
//! When the process settings name a login module and its configuration file,
//! authentication is handed to the module registered under that name.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// An external authentication backend.
pub trait LoginModule: Send + Sync {
    /// Check a username/password pair. `config_file` is the configuration
    /// file named in the process settings.
    fn authenticate(&self, config_file: &Path, username: &str, password: &str) -> bool;
}

/// Login modules available to the server, keyed by module name.
#[derive(Clone, Default)]
pub struct LoginModules {
    modules: HashMap<String, Arc<dyn LoginModule>>,
}

impl LoginModules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, module: Arc<dyn LoginModule>) {
        self.modules.insert(name.into(), module);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn LoginModule>> {
        self.modules.get(name).cloned()
    }
}

impl fmt::Debug for LoginModules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.modules.keys()).finish()
    }
}
