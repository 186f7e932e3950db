//! Score-ordered result container shared between workers and readers.
//!
//! Elements are kept in descending score order. Elements with equal scores
//! keep their insertion order, so any interleaving of the same set of
//! pushes converges to the same final order.
//!
//! The store only grows: there is no removal, and an identity can be
//! present at most once. `push` checks and inserts under one lock.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::models::{MediaSnippet, ResultEntry};

/// Anything with a stable identity used for deduplication.
pub trait Identified {
    fn identity(&self) -> String;
}

impl Identified for ResultEntry {
    fn identity(&self) -> String {
        self.url_hash().to_string()
    }
}

impl Identified for MediaSnippet {
    fn identity(&self) -> String {
        self.href_hash()
    }
}

impl<T: Identified> Identified for std::sync::Arc<T> {
    fn identity(&self) -> String {
        (**self).identity()
    }
}

/// An element together with the score it was pushed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranked<T> {
    pub element: T,
    pub score: i64,
}

#[derive(Debug)]
struct StoreInner<T> {
    entries: Vec<Ranked<T>>,
    identities: HashSet<String>,
    pushed: usize,
}

/// Thread-safe, score-ordered, append-only store.
#[derive(Debug)]
pub struct SortedResultStore<T> {
    inner: Mutex<StoreInner<T>>,
}

impl<T: Identified + Clone> SortedResultStore<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                entries: Vec::new(),
                identities: HashSet::new(),
                pushed: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert `element` unless an element with the same identity exists.
    ///
    /// Returns `false` if the element was a duplicate.
    pub fn push(&self, element: T, score: i64) -> bool {
        let identity = element.identity();
        let mut inner = self.lock();
        if !inner.identities.insert(identity) {
            return false;
        }

        // after every element with an equal or higher score
        let position = inner.entries.partition_point(|e| e.score >= score);
        inner.entries.insert(position, Ranked { element, score });
        inner.pushed += 1;
        true
    }

    /// Whether an element with the same identity is stored.
    pub fn exists(&self, element: &T) -> bool {
        self.contains(&element.identity())
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.lock().identities.contains(identity)
    }

    /// Number of elements visible to readers.
    pub fn size(&self) -> usize {
        self.lock().entries.len()
    }

    /// Number of elements ever pushed.
    pub fn size_store(&self) -> usize {
        self.lock().pushed
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// The element at `index` in current order, if materialized.
    pub fn element(&self, index: usize) -> Option<Ranked<T>> {
        self.lock().entries.get(index).cloned()
    }

    /// Snapshot of all elements in current order.
    pub fn list(&self) -> Vec<Ranked<T>> {
        self.lock().entries.clone()
    }
}

impl<T: Identified + Clone> Default for SortedResultStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Item(&'static str);

    impl Identified for Item {
        fn identity(&self) -> String {
            self.0.to_string()
        }
    }

    #[test]
    fn test_orders_by_descending_score() {
        let store = SortedResultStore::new();
        store.push(Item("low"), 1);
        store.push(Item("high"), 10);
        store.push(Item("mid"), 5);

        let order: Vec<_> = store.list().into_iter().map(|r| r.element.0).collect();
        assert_eq!(order, vec!["high", "mid", "low"]);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let store = SortedResultStore::new();
        store.push(Item("first"), 7);
        store.push(Item("second"), 7);
        store.push(Item("top"), 9);
        store.push(Item("third"), 7);

        let order: Vec<_> = store.list().into_iter().map(|r| r.element.0).collect();
        assert_eq!(order, vec!["top", "first", "second", "third"]);
    }

    #[test]
    fn test_rejects_duplicate_identity() {
        let store = SortedResultStore::new();
        assert!(store.push(Item("a"), 1));
        assert!(!store.push(Item("a"), 100));
        assert_eq!(store.size(), 1);
        assert_eq!(store.size_store(), 1);
        assert_eq!(store.element(0).unwrap().score, 1);
        assert!(store.exists(&Item("a")));
        assert!(!store.exists(&Item("b")));
    }

    #[test]
    fn test_element_out_of_range() {
        let store: SortedResultStore<Item> = SortedResultStore::new();
        assert!(store.is_empty());
        assert!(store.element(0).is_none());
        store.push(Item("a"), 1);
        assert!(store.element(0).is_some());
        assert!(store.element(1).is_none());
    }

    #[test]
    fn test_concurrent_pushes_never_duplicate() {
        const NAMES: [&str; 8] = ["a", "b", "c", "d", "e", "f", "g", "h"];
        let store = Arc::new(SortedResultStore::new());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for (i, name) in NAMES.into_iter().enumerate() {
                        store.push(Item(name), i as i64);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.size(), NAMES.len());
        let mut seen = HashSet::new();
        for ranked in store.list() {
            assert!(seen.insert(ranked.element.0));
        }
    }
}
