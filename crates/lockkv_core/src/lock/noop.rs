//! Locker that provides no exclusion.

use super::{Locker, LockerKind};
use crate::types::Key;
use async_trait::async_trait;

/// A locker that grants every request immediately.
///
/// Each acquisition still yields to the scheduler once, so the cost of a
/// suspension point is paid without any concurrency control. Used as the
/// baseline when measuring the other strategies; it gives no correctness
/// guarantee.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpLocker;

impl NoOpLocker {
    /// Creates a no-op locker.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Locker for NoOpLocker {
    fn kind(&self) -> LockerKind {
        LockerKind::None
    }

    async fn acquire_read(&self, _keys: &[Key]) {
        tokio::task::yield_now().await;
    }

    fn release_read(&self, _keys: &[Key]) {}

    async fn acquire_write(&self, _keys: &[Key]) {
        tokio::task::yield_now().await;
    }

    fn release_write(&self, _keys: &[Key]) {}
}
