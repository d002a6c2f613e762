//! Startup and shutdown extension points.
//!
//! Hooks let an embedding application react to the server coming up or
//! going down. A hook that fails or panics is logged; the lifecycle step
//! that invoked it carries on.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use thiserror::Error;

use crate::state::ServerInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Startup,
    Shutdown,
}

impl std::fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleEvent::Startup => write!(f, "startup"),
            LifecycleEvent::Shutdown => write!(f, "shutdown"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HookError {
    #[error("{0}")]
    Failed(String),

    #[error("hook panicked")]
    Panicked,
}

/// Something to run when the server starts or stops.
pub trait LifecycleHook: Send + Sync {
    fn name(&self) -> &str;

    fn call<'a>(
        &'a self,
        event: LifecycleEvent,
        info: &'a ServerInfo,
    ) -> BoxFuture<'a, Result<(), HookError>>;
}

/// Registered hooks, called in registration order.
#[derive(Clone, Default)]
pub struct Hooks {
    hooks: Vec<Arc<dyn LifecycleHook>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Arc<dyn LifecycleHook>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Call every hook for `event`. Returns the failures, each already
    /// logged, as `(hook name, error)`.
    pub async fn invoke(
        &self,
        event: LifecycleEvent,
        info: &ServerInfo,
    ) -> Vec<(String, HookError)> {
        let mut failures = Vec::new();

        for hook in &self.hooks {
            let result = AssertUnwindSafe(hook.call(event, info))
                .catch_unwind()
                .await
                .unwrap_or(Err(HookError::Panicked));

            match result {
                Ok(()) => tracing::debug!(hook = %hook.name(), event = %event, "Hook completed"),
                Err(e) => {
                    tracing::warn!(hook = %hook.name(), event = %event, error = %e, "Hook failed, continuing");
                    failures.push((hook.name().to_string(), e));
                }
            }
        }

        failures
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|h| h.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        name: &'static str,
        calls: AtomicUsize,
        behaviour: Behaviour,
    }

    enum Behaviour {
        Succeed,
        Fail,
        Panic,
    }

    impl LifecycleHook for Counting {
        fn name(&self) -> &str {
            self.name
        }

        fn call<'a>(
            &'a self,
            _event: LifecycleEvent,
            _info: &'a ServerInfo,
        ) -> BoxFuture<'a, Result<(), HookError>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                match self.behaviour {
                    Behaviour::Succeed => Ok(()),
                    Behaviour::Fail => Err(HookError::Failed("database unavailable".into())),
                    Behaviour::Panic => panic!("hook exploded"),
                }
            })
        }
    }

    fn hook(name: &'static str, behaviour: Behaviour) -> Arc<Counting> {
        Arc::new(Counting {
            name,
            calls: AtomicUsize::new(0),
            behaviour,
        })
    }

    #[tokio::test]
    async fn every_hook_runs_despite_failures() {
        let failing = hook("failing", Behaviour::Fail);
        let panicking = hook("panicking", Behaviour::Panic);
        let fine = hook("fine", Behaviour::Succeed);

        let mut hooks = Hooks::new();
        hooks.register(failing.clone());
        hooks.register(panicking.clone());
        hooks.register(fine.clone());

        let failures = hooks
            .invoke(LifecycleEvent::Startup, &ServerInfo::new("localhost", 8080))
            .await;

        assert_eq!(
            failures,
            vec![
                ("failing".to_string(), HookError::Failed("database unavailable".into())),
                ("panicking".to_string(), HookError::Panicked),
            ]
        );
        assert_eq!(fine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_hooks_no_failures() {
        let failures = Hooks::new()
            .invoke(LifecycleEvent::Shutdown, &ServerInfo::new("localhost", 8080))
            .await;
        assert!(failures.is_empty());
    }
}
