//! Named policy registry resolved by the dispatcher.
//!
//! The registry is populated once at startup and read-mostly afterwards, so
//! resolution takes a read lock and concurrent request flows never serialize
//! on each other. Registration fails on duplicate keys rather than silently
//! replacing a policy another component already resolved by name.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use crate::policy::Policy;

/// Well-known policy keys agreed between the dispatcher and the registry at
/// startup.
pub mod keys {
    /// Bounded wait-and-retry, applied to idempotent requests.
    pub const RETRYING: &str = "retrying";
    /// Single-shot execution, applied to everything else.
    pub const PASSTHROUGH: &str = "passthrough";
}

/// Configuration errors from the registry. These belong to startup, not the
/// per-request path: the dispatcher validates its keys when constructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("policy '{key}' is already registered")]
    DuplicateKey { key: String },
    #[error("policy '{key}' not found")]
    UnknownPolicy { key: String },
}

/// Map of policy key → policy.
#[derive(Debug, Default)]
pub struct PolicyRegistry {
    inner: RwLock<HashMap<String, Policy>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the two standard policies under their
    /// well-known keys.
    pub fn with_standard_policies(retrying: Policy) -> Self {
        let mut map = HashMap::new();
        map.insert(keys::RETRYING.to_string(), retrying);
        map.insert(keys::PASSTHROUGH.to_string(), Policy::passthrough());
        Self { inner: RwLock::new(map) }
    }

    /// Register `policy` under `key`. Keys are unique; a second registration
    /// for the same key fails.
    pub fn register(&self, key: impl Into<String>, policy: Policy) -> Result<(), RegistryError> {
        let key = key.into();
        let mut map = self.inner.write().expect("policy registry poisoned");
        match map.entry(key) {
            Entry::Occupied(entry) => {
                Err(RegistryError::DuplicateKey { key: entry.key().clone() })
            }
            Entry::Vacant(slot) => {
                slot.insert(policy);
                Ok(())
            }
        }
    }

    /// Look up the policy registered under `key`.
    pub fn resolve(&self, key: &str) -> Result<Policy, RegistryError> {
        let map = self.inner.read().expect("policy registry poisoned");
        map.get(key).cloned().ok_or_else(|| RegistryError::UnknownPolicy { key: key.to_string() })
    }

    /// Fail fast if any referenced key is missing. Called by the dispatcher
    /// at construction so stringly-typed lookups cannot fail mid-request.
    pub fn validate(&self, required: &[&str]) -> Result<(), RegistryError> {
        let map = self.inner.read().expect("policy registry poisoned");
        for key in required {
            if !map.contains_key(*key) {
                return Err(RegistryError::UnknownPolicy { key: (*key).to_string() });
            }
        }
        Ok(())
    }
}
