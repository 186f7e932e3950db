//! Per-session record of candidates that could not be materialized.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Maps url hashes to the reason their snippet fetch failed.
///
/// A later failure for the same hash replaces the reason; a hash is
/// never removed.
#[derive(Debug, Default)]
pub struct FailureRegistry {
    failures: Mutex<HashMap<String, String>>,
}

impl FailureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a failure for `url_hash`.
    pub fn register(&self, url_hash: &str, reason: impl Into<String>) {
        let reason = reason.into();
        log::info!("sorted out hash {} during search: {}", url_hash, reason);
        self.lock().insert(url_hash.to_string(), reason);
    }

    pub fn contains(&self, url_hash: &str) -> bool {
        self.lock().contains_key(url_hash)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of all recorded failures.
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let registry = FailureRegistry::new();
        assert!(registry.is_empty());

        registry.register("abc", "no text snippet");
        assert!(registry.contains("abc"));
        assert!(!registry.contains("def"));
        assert_eq!(
            registry.snapshot().get("abc").map(String::as_str),
            Some("no text snippet")
        );
    }

    #[test]
    fn test_later_failure_replaces_reason() {
        let registry = FailureRegistry::new();
        registry.register("abc", "first");
        registry.register("abc", "second");

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.snapshot()["abc"], "second");
    }
}
