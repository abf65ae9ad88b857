//! In-memory storage backend for testing.

use crate::backend::{generate_key, Backend, KeyGenerator};
use crate::error::StorageResult;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;

/// An in-memory storage backend.
///
/// This backend stores all records in a map and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral databases that don't need persistence
///
/// Every operation yields to the scheduler once before touching the map,
/// so tasks sharing this backend interleave the same way they would over
/// a real I/O backend.
///
/// # Example
///
/// ```rust
/// use lockkv_storage::{Backend, InMemoryBackend};
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let backend = InMemoryBackend::new();
/// backend.set("answer", b"42").await.unwrap();
/// assert_eq!(backend.len(), 1);
/// # });
/// ```
pub struct InMemoryBackend {
    records: RwLock<HashMap<String, Vec<u8>>>,
    next_key: KeyGenerator,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::with_key_generator(Box::new(generate_key))
    }

    /// Creates an empty backend that draws candidate keys from `next_key`.
    ///
    /// Useful for testing collision handling in [`Backend::create`].
    #[must_use]
    pub fn with_key_generator(next_key: KeyGenerator) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            next_key,
        }
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Returns all stored keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.records.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryBackend")
            .field("records", &self.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn create(&self, value: &[u8]) -> StorageResult<String> {
        tokio::task::yield_now().await;

        let mut records = self.records.write();
        loop {
            let key = (self.next_key)();
            if records.contains_key(&key) {
                tracing::debug!(%key, "key collision on create, retrying");
                continue;
            }
            records.insert(key.clone(), value.to_vec());
            return Ok(key);
        }
    }

    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        tokio::task::yield_now().await;
        Ok(self.records.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        tokio::task::yield_now().await;
        self.records.write().insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        tokio::task::yield_now().await;
        // Removing a missing key is a no-op
        self.records.write().remove(key);
        Ok(())
    }
}
