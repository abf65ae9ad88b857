//! Locker with a single lock for the whole keyspace.

use super::{Locker, LockerKind, ReadWriteLock};
use crate::types::Key;
use async_trait::async_trait;

/// A locker backed by one [`ReadWriteLock`].
///
/// The keys of each request are ignored: every write is serialized against
/// every other write and every read, wherever they land in the keyspace.
#[derive(Debug, Default)]
pub struct GlobalLocker {
    lock: ReadWriteLock,
}

impl GlobalLocker {
    /// Creates a global locker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the underlying lock.
    #[must_use]
    pub fn lock(&self) -> &ReadWriteLock {
        &self.lock
    }
}

#[async_trait]
impl Locker for GlobalLocker {
    fn kind(&self) -> LockerKind {
        LockerKind::Global
    }

    async fn acquire_read(&self, keys: &[Key]) {
        tracing::trace!(?keys, "acquire global read");
        self.lock.acquire_read().await;
    }

    fn release_read(&self, keys: &[Key]) {
        tracing::trace!(?keys, "release global read");
        self.lock.release_read();
    }

    async fn acquire_write(&self, keys: &[Key]) {
        tracing::trace!(?keys, "acquire global write");
        self.lock.acquire_write().await;
    }

    fn release_write(&self, keys: &[Key]) {
        tracing::trace!(?keys, "release global write");
        self.lock.release_write();
    }
}
