//! Registry of device types
//!
//! Types are kept in registration order. Lookup is by prefix match: a type
//! answers to every request that starts with its own name, and the first
//! registered type that answers wins.

use std::sync::Arc;

use crate::device::DeviceType;
use crate::error::{Result, VInputError};

#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: Vec<Arc<DeviceType>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self { types: Vec::new() }
    }

    /// Append a type. Never fails; duplicate policy is the caller's business.
    pub fn register(&mut self, kind: Arc<DeviceType>) {
        self.types.push(kind);
    }

    /// Remove a type by identity. Returns whether it was registered.
    pub fn unregister(&mut self, kind: &Arc<DeviceType>) -> bool {
        let before = self.types.len();
        self.types.retain(|t| !Arc::ptr_eq(t, kind));
        self.types.len() != before
    }

    /// First registered type whose name is a prefix of `request`.
    pub fn resolve(&self, request: &str) -> Result<Arc<DeviceType>> {
        self.types
            .iter()
            .find(|t| t.answers_to(request))
            .cloned()
            .ok_or_else(|| VInputError::UnknownType(request.trim_end().to_string()))
    }

    /// A registered type that would shadow, or be shadowed by, `name`.
    pub fn conflicting(&self, name: &str) -> Option<&Arc<DeviceType>> {
        self.types
            .iter()
            .find(|t| t.answers_to(name) || t.name().starts_with(name))
    }

    pub fn contains(&self, kind: &Arc<DeviceType>) -> bool {
        self.types.iter().any(|t| Arc::ptr_eq(t, kind))
    }

    /// Names in registration order
    pub fn names(&self) -> Vec<String> {
        self.types.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn count(&self) -> usize {
        self.types.len()
    }
}
