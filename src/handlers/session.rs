//! Per-context session storage.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

/// Session values private to one mounted handler.
#[derive(Debug, Clone)]
pub struct SessionStore {
    namespace: Arc<str>,
    values: Arc<DashMap<String, Value>>,
}

impl SessionStore {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: Arc::from(namespace),
            values: Arc::new(DashMap::new()),
        }
    }

    /// The context path owning this store.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).map(|v| v.clone())
    }

    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(key.into(), value)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.values.remove(key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True if both handles point at the same storage.
    pub fn same_store(&self, other: &SessionStore) -> bool {
        Arc::ptr_eq(&self.values, &other.values)
    }
}
