//! Per-URL fetch locks.
//!
//! Concurrent requests for the same normalized URL are serialized so that a
//! burst of identical submissions produces one outbound fetch at a time.
//! Distinct URLs never wait on each other.

use crate::core::UrlKey;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Holds the fetch lock for one normalized URL; released on drop.
#[derive(Debug)]
pub struct FetchLockGuard {
    key: UrlKey,
    _guard: OwnedMutexGuard<()>,
}

impl FetchLockGuard {
    /// The key this guard locks.
    pub fn key(&self) -> &UrlKey {
        &self.key
    }
}

/// A registry of lazily created per-key async locks.
///
/// The map only grows. Its own mutex is held for insert-if-absent and
/// never across the wait for a per-key lock.
#[derive(Debug, Default)]
pub struct FetchLockRegistry {
    locks: Mutex<HashMap<UrlKey, Arc<AsyncMutex<()>>>>,
}

impl FetchLockRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`.
    pub async fn acquire(&self, key: &UrlKey) -> FetchLockGuard {
        let lock = self.lock_for(key);

        let guard = match lock.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::debug!(url_key = %key.short(), "Waiting for in-flight fetch");
                lock.lock_owned().await
            }
        };

        FetchLockGuard {
            key: key.clone(),
            _guard: guard,
        }
    }

    /// Number of distinct keys ever locked.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Returns `true` if no key was ever locked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_for(&self, key: &UrlKey) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(locks.entry(key.clone()).or_default())
    }
}
