//! Lock management.
//!
//! A [`Locker`] grants shared or exclusive access to a *set* of keys. Three
//! strategies are provided:
//!
//! - [`NoOpLocker`]: yields once and grants everything; no exclusion at all
//! - [`GlobalLocker`]: one [`ReadWriteLock`] for the whole keyspace
//! - [`FineGrainedLocker`]: one [`ReadWriteLock`] per key plus a set-level
//!   claim that makes multi-key write acquisitions appear atomic
//!
//! No strategy detects deadlocks or supports timeouts: a task that cannot
//! get its locks waits forever.

mod fine_grained;
mod global;
mod noop;
mod rwlock;

pub use fine_grained::{FineGrainedLocker, KeyOrdering};
pub use global::GlobalLocker;
pub use noop::NoOpLocker;
pub use rwlock::ReadWriteLock;

use crate::types::Key;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A strategy for granting access to sets of keys.
///
/// Keys are passed as an ordered slice and treated as a set; duplicates are
/// allowed. After `acquire_write(keys)` returns, the caller has exclusive
/// access to every key in `keys` relative to all other acquisitions on the
/// same locker until it calls `release_write` with the same keys.
#[async_trait]
pub trait Locker: Send + Sync + fmt::Debug {
    /// Returns which strategy this is.
    fn kind(&self) -> LockerKind;

    /// Waits for shared access to `keys`.
    async fn acquire_read(&self, keys: &[Key]);

    /// Releases shared access previously granted for `keys`.
    fn release_read(&self, keys: &[Key]);

    /// Waits for exclusive access to `keys`.
    async fn acquire_write(&self, keys: &[Key]);

    /// Releases exclusive access previously granted for `keys`.
    fn release_write(&self, keys: &[Key]);
}

/// The available locking strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LockerKind {
    /// [`NoOpLocker`].
    None,
    /// [`GlobalLocker`].
    Global,
    /// [`FineGrainedLocker`].
    #[default]
    FineGrained,
}

impl LockerKind {
    /// All strategies, in a stable order.
    pub const ALL: [LockerKind; 3] = [Self::FineGrained, Self::Global, Self::None];

    /// Returns the canonical name of the strategy.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Global => "global",
            Self::FineGrained => "fine-grained",
        }
    }

    /// Returns true if this strategy provides mutual exclusion.
    #[must_use]
    pub const fn is_exclusive(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Builds a locker of this kind.
    ///
    /// `ordering` only affects [`FineGrainedLocker`].
    #[must_use]
    pub fn build(self, ordering: KeyOrdering) -> Arc<dyn Locker> {
        match self {
            Self::None => Arc::new(NoOpLocker::new()),
            Self::Global => Arc::new(GlobalLocker::new()),
            Self::FineGrained => Arc::new(FineGrainedLocker::with_ordering(ordering)),
        }
    }
}

impl fmt::Display for LockerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LockerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "noop" => Ok(Self::None),
            "global" => Ok(Self::Global),
            "fine-grained" | "finegrained" | "fine_grained" => Ok(Self::FineGrained),
            other => Err(format!(
                "unknown locker `{other}` (expected none, global or fine-grained)"
            )),
        }
    }
}
