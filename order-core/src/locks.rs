//! Per-entity async locks
//!
//! Operations on the same order, shipment, item or user are serialized for
//! the whole validate, append, commit sequence. Keys are acquired in sorted
//! order so two operations locking overlapping sets cannot deadlock.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lock key for an entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockKey(String);

impl LockKey {
    /// Key for a user row
    pub fn user(id: impl std::fmt::Display) -> Self {
        Self(format!("user:{}", id))
    }

    /// Key for an item row
    pub fn item(id: impl std::fmt::Display) -> Self {
        Self(format!("item:{}", id))
    }

    /// Key for an order row
    pub fn order(id: impl std::fmt::Display) -> Self {
        Self(format!("order:{}", id))
    }

    /// Key for a shipment row
    pub fn shipment(id: impl std::fmt::Display) -> Self {
        Self(format!("shipment:{}", id))
    }
}

/// Registry of entity mutexes
#[derive(Debug, Clone, Default)]
pub struct EntityLocks {
    locks: Arc<DashMap<LockKey, Arc<Mutex<()>>>>,
}

/// Guards held for the duration of one operation
#[derive(Debug)]
pub struct LockSet {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl EntityLocks {
    /// Create empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire every key, in sorted order, without duplicates
    pub async fn acquire(&self, keys: impl IntoIterator<Item = LockKey>) -> LockSet {
        let mut keys: Vec<LockKey> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            let mutex = self
                .locks
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            guards.push(mutex.lock_owned().await);
        }

        LockSet { _guards: guards }
    }

    /// Number of keys ever locked
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no key was ever locked
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
