//! Handler descriptors supplied by plugin discovery.

use std::fmt;
use std::sync::Arc;

use crate::handlers::NodeHandler;

type HandlerFactory = dyn Fn() -> Box<dyn NodeHandler> + Send + Sync;

/// A discovered handler: a name and a way to create fresh instances.
#[derive(Clone)]
pub struct HandlerDescriptor {
    name: String,
    factory: Arc<HandlerFactory>,
}

impl HandlerDescriptor {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn NodeHandler> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
        }
    }

    /// Descriptor for a handler type with a `Default` constructor.
    pub fn of<H>(name: impl Into<String>) -> Self
    where
        H: NodeHandler + Default + 'static,
    {
        Self::new(name, || Box::new(H::default()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instantiate(&self) -> Box<dyn NodeHandler> {
        (self.factory)()
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
