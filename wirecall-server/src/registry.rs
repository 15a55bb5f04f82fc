//! Method registry
//!
//! Maps method names to [`MethodDescriptor`]s. The registry is built before a
//! server starts and only read afterwards; it is cloned into every connection
//! task, so the map lives behind an `Arc` and clones are cheap.
//!
//! # Examples
//!
//! ```rust
//! use wirecall_server::{from_fn, Registry};
//!
//! let mut registry = Registry::new();
//! registry.register("ping", from_fn(|_ctx| async {}));
//!
//! assert!(registry.contains("ping"));
//! assert!(registry.lookup("pong").is_none());
//! ```

use crate::handler::MethodDescriptor;
use std::collections::HashMap;
use std::sync::Arc;

/// Name to descriptor table, shared read-only across connections
#[derive(Clone, Default)]
pub struct Registry {
    methods: Arc<HashMap<String, MethodDescriptor>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Register a method, replacing any previous descriptor under that name
    pub fn register(&mut self, name: impl Into<String>, descriptor: MethodDescriptor) {
        Arc::make_mut(&mut self.methods).insert(name.into(), descriptor);
    }

    /// Look up a method by exact, case-sensitive name
    pub fn lookup(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Registered method names, sorted
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("methods", &self.methods())
            .finish()
    }
}

/// Builder for constructing a registry
#[derive(Default)]
pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a method
    pub fn handler(mut self, name: impl Into<String>, descriptor: MethodDescriptor) -> Self {
        self.registry.register(name, descriptor);
        self
    }

    pub fn build(self) -> Registry {
        self.registry
    }
}
