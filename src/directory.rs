//! Payment target directory
//!
//! The directory decides which payment destinations the receiver will route
//! value to. The orchestrator only checks membership.

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

use crate::errors::Result;

/// Registry of authorized payment targets
pub trait Directory: Send + Sync {
    /// Returns true if `target` is an authorized payment destination
    fn has_target(&self, target: &str) -> Result<bool>;
}

/// In-memory directory
///
/// Useful for tests and for deployments where the target set is loaded
/// once at startup.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    targets: RwLock<HashSet<String>>,
}

impl MemoryDirectory {
    /// Creates an empty directory
    pub fn new() -> Self { Self::default() }

    /// Creates a directory holding `targets`
    pub fn with_targets<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { targets: RwLock::new(targets.into_iter().map(Into::into).collect()) }
    }

    /// Authorizes a target
    pub fn add_target(&self, target: impl Into<String>) {
        self.targets.write().unwrap_or_else(PoisonError::into_inner).insert(target.into());
    }

    /// Revokes a target, returning whether it was present
    pub fn remove_target(&self, target: &str) -> bool {
        self.targets.write().unwrap_or_else(PoisonError::into_inner).remove(target)
    }
}

impl Directory for MemoryDirectory {
    fn has_target(&self, target: &str) -> Result<bool> {
        Ok(self.targets.read().unwrap_or_else(PoisonError::into_inner).contains(target))
    }
}
