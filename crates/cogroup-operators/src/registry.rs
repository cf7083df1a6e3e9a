//! Name → implementation registries.
//!
//! Configurations refer to custom comparators and group handlers by name; the
//! registries resolve those names once, when comparators and workers are built.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use cogroup_core::error::{Error, Result};
use cogroup_core::types::Value;

use crate::handler::GroupHandler;

/// Custom order over field values. Must be a total order consistent with itself
/// on decoded values, because both comparator paths call it.
pub trait FieldComparator: Send + Sync {
    fn compare(&self, a: &Value, b: &Value) -> Ordering;
}

impl fmt::Debug for dyn FieldComparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FieldComparator")
    }
}

impl<F> FieldComparator for F
where
    F: Fn(&Value, &Value) -> Ordering + Send + Sync,
{
    fn compare(&self, a: &Value, b: &Value) -> Ordering {
        self(a, b)
    }
}

#[derive(Clone, Default)]
pub struct ComparatorRegistry {
    comparators: HashMap<String, Arc<dyn FieldComparator>>,
}

impl ComparatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, cmp: Arc<dyn FieldComparator>) {
        self.comparators.insert(name.into(), cmp);
    }

    pub fn with(mut self, name: impl Into<String>, cmp: impl FieldComparator + 'static) -> Self {
        self.register(name, Arc::new(cmp));
        self
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn FieldComparator>> {
        self.comparators
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Config(format!("no comparator registered as '{name}'")))
    }
}

impl fmt::Debug for ComparatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.comparators.keys().collect();
        names.sort();
        f.debug_struct("ComparatorRegistry")
            .field("comparators", &names)
            .finish()
    }
}

pub type HandlerFactory = Arc<dyn Fn() -> Box<dyn GroupHandler> + Send + Sync>;

/// Handler factories keyed by the name a `GroupingConfig` refers to.
#[derive(Clone, Default)]
pub struct Registry {
    handlers: HashMap<String, HandlerFactory>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, key: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn GroupHandler> + Send + Sync + 'static,
    {
        self.handlers.insert(key.into(), Arc::new(factory));
    }

    /// A fresh handler instance for `key`, if registered.
    pub fn make(&self, key: &str) -> Option<Box<dyn GroupHandler>> {
        self.handlers.get(key).map(|f| f())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.handlers.contains_key(key)
    }

    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("handlers", &self.keys())
            .finish()
    }
}
