//! Capability registry.
//!
//! The registry collects the capability surface a host exposes for one
//! execution. Registration is fail-fast: two capabilities sharing a name
//! would silently shadow each other's promise settlement, so duplicates are
//! rejected before any script runs.

use std::collections::HashSet;

use thiserror::Error;

use crate::capability::CapabilityEntry;

/// Errors raised while assembling a capability set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Two capabilities were registered under the same script-visible name.
    #[error("duplicate capability: {0}")]
    DuplicateCapability(String),
}

/// The ordered set of capabilities registered for one execution.
#[derive(Default)]
pub struct CapabilitySet {
    entries: Vec<CapabilityEntry>,
    names: HashSet<String>,
}

impl CapabilitySet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect a handler's declared capabilities, failing fast on duplicate
    /// names.
    pub fn from_handler(handler: &dyn CapabilityHandler) -> Result<Self, RegistryError> {
        let mut set = Self::new();
        for entry in handler.capabilities() {
            set.register(entry)?;
        }
        Ok(set)
    }

    /// Register one capability.
    pub fn register(&mut self, entry: CapabilityEntry) -> Result<(), RegistryError> {
        let name = entry.name();
        if !self.names.insert(name.clone()) {
            return Err(RegistryError::DuplicateCapability(name));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Iterate entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &CapabilityEntry> {
        self.entries.iter()
    }

    /// Look up an entry by script-visible name.
    pub fn get(&self, name: &str) -> Option<&CapabilityEntry> {
        self.entries.iter().find(|e| e.name() == name)
    }

    /// Number of registered capabilities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A host object exposing native operations to script code.
///
/// The engine asks the handler for its capability surface once per
/// execution; the returned entries are registered into a fresh
/// [`CapabilitySet`] before the script is evaluated.
pub trait CapabilityHandler: Send + Sync {
    /// The capabilities this handler exposes.
    fn capabilities(&self) -> Vec<CapabilityEntry>;
}
