//! Storage backend trait definition.

use crate::error::StorageResult;
use async_trait::async_trait;
use std::fmt;
use uuid::Uuid;

/// Source of candidate keys for [`Backend::create`].
///
/// Candidates are not required to be unique; backends retry until they
/// find one that is not in use.
pub type KeyGenerator = Box<dyn Fn() -> String + Send + Sync>;

/// Generates a random candidate key (UUID v4, simple form).
#[must_use]
pub fn generate_key() -> String {
    Uuid::new_v4().simple().to_string()
}

/// A key-value storage backend for LockKV.
///
/// Backends are **opaque payload stores**. The database layer owns all
/// concurrency control; a backend only has to make each individual
/// operation consistent on its own.
///
/// # Invariants
///
/// - `create` never returns a key that is already in use, retrying
///   internally on collision
/// - `get` returns `None` for a key that does not exist, which is distinct
///   from any stored payload (including an empty one)
/// - `set` creates the record when it is absent (upsert)
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
#[async_trait]
pub trait Backend: Send + Sync + fmt::Debug {
    /// Stores `value` under a fresh key and returns the key.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written. Key collisions are
    /// not errors; they are retried.
    async fn create(&self, value: &[u8]) -> StorageResult<String>;

    /// Reads the payload stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid for this backend or an I/O
    /// error occurs. A missing key is `Ok(None)`.
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any previous payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid for this backend or an I/O
    /// error occurs.
    async fn set(&self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Removes the record stored under `key`.
    ///
    /// Whether removing a missing key is an error is up to the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid for this backend or an I/O
    /// error occurs.
    async fn remove(&self, key: &str) -> StorageResult<()>;
}
