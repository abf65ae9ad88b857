//! Per-key locker with a set-level claim for multi-key writes.

use super::{Locker, LockerKind, ReadWriteLock};
use crate::types::Key;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::borrow::Cow;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Notify;

/// Order in which [`FineGrainedLocker`] takes per-key locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyOrdering {
    /// Lock keys in the order the caller passed them.
    #[default]
    AsGiven,
    /// Sort each key set before locking, so every acquisition follows one
    /// global order. Duplicates are kept.
    Canonical,
}

impl KeyOrdering {
    /// Returns the canonical name of the ordering.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AsGiven => "as-given",
            Self::Canonical => "canonical",
        }
    }
}

impl fmt::Display for KeyOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KeyOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "as-given" | "given" => Ok(Self::AsGiven),
            "canonical" | "sorted" => Ok(Self::Canonical),
            other => Err(format!(
                "unknown key ordering `{other}` (expected as-given or canonical)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

impl Access {
    async fn acquire(self, lock: &ReadWriteLock) {
        match self {
            Self::Read => lock.acquire_read().await,
            Self::Write => lock.acquire_write().await,
        }
    }

    fn release(self, lock: &ReadWriteLock) {
        match self {
            Self::Read => lock.release_read(),
            Self::Write => lock.release_write(),
        }
    }
}

/// Lock table state. Mutated only inside short critical sections that
/// never span a suspension point.
#[derive(Debug, Default)]
struct LockTable {
    /// One lock per key ever touched. Never shrinks.
    locks: HashMap<Key, Arc<ReadWriteLock>>,
    /// Outstanding read requests per key. A key is present exactly while
    /// this locker holds one read grant on its lock.
    pending_reads: HashMap<Key, usize>,
    /// Outstanding write requests per key. A key is present exactly while
    /// this locker holds the write grant on its lock.
    pending_writes: HashMap<Key, usize>,
    /// Keys held by completed multi-key write acquisitions.
    claimed: HashSet<Key>,
}

impl LockTable {
    fn lock_for(&mut self, key: &Key) -> Arc<ReadWriteLock> {
        Arc::clone(self.locks.entry(key.clone()).or_default())
    }

    fn pending_mut(&mut self, access: Access) -> &mut HashMap<Key, usize> {
        match access {
            Access::Read => &mut self.pending_reads,
            Access::Write => &mut self.pending_writes,
        }
    }

    /// Counts one more request for `key` if the locker already holds a
    /// grant for it. Returns false if a grant must be obtained first.
    fn count_if_held(&mut self, key: &Key, access: Access) -> bool {
        match self.pending_mut(access).get_mut(key) {
            Some(count) => {
                *count += 1;
                true
            }
            None => false,
        }
    }

    fn can_claim(&self, keys: &[Key]) -> bool {
        keys.iter()
            .all(|key| self.pending_writes.contains_key(key) && !self.claimed.contains(key))
    }

    fn release_key(&mut self, key: &Key, access: Access) {
        let pending = match access {
            Access::Read => &mut self.pending_reads,
            Access::Write => &mut self.pending_writes,
        };
        let Some(count) = pending.get_mut(key) else {
            tracing::warn!(%key, ?access, "release of a key that is not held");
            return;
        };
        if *count > 1 {
            *count -= 1;
            return;
        }
        pending.remove(key);
        if let Some(lock) = self.locks.get(key) {
            access.release(lock);
        }
    }
}

/// A locker with one [`ReadWriteLock`] per key.
///
/// Acquisition is two-phase:
///
/// 1. **Per-key grants.** For each key, in order: if this locker already
///    holds a grant of the requested kind for the key (from this request
///    or any other outstanding one), only the key's request count goes up;
///    otherwise the task waits for the key's lock and records a count of
///    one.
/// 2. **Set-level claim (writes only).** The task waits until none of its
///    keys is claimed by another completed write acquisition, then claims
///    all of them at once.
///
/// Per-key locks alone would let two multi-key writers interleave partial
/// updates of a shared key set; the claim in phase 2 serializes them.
/// Release undoes both phases: the claim is dropped and each key's count
/// goes down, the underlying lock being released when the count reaches
/// zero.
///
/// # Limitations
///
/// Phase 1 waits on per-key locks one at a time in the caller's order and
/// keeps what it already obtained while waiting for the next key. There is
/// no deadlock detection: if acquisitions ever wait on each other in a
/// cycle, they suspend forever. With [`KeyOrdering::Canonical`] every
/// acquisition locks keys in the same order, which rules such cycles out.
///
/// The lock table grows by one entry per distinct key ever locked and is
/// never pruned.
pub struct FineGrainedLocker {
    table: Mutex<LockTable>,
    claims_changed: Notify,
    ordering: KeyOrdering,
}

impl FineGrainedLocker {
    /// Creates a locker that takes keys in the order given.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ordering(KeyOrdering::AsGiven)
    }

    /// Creates a locker with the given key ordering.
    #[must_use]
    pub fn with_ordering(ordering: KeyOrdering) -> Self {
        Self {
            table: Mutex::new(LockTable::default()),
            claims_changed: Notify::new(),
            ordering,
        }
    }

    /// Returns the key ordering in use.
    #[must_use]
    pub fn ordering(&self) -> KeyOrdering {
        self.ordering
    }

    /// Returns how many distinct keys have a lock in the table.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.table.lock().locks.len()
    }

    /// Returns the number of outstanding write requests for `key`.
    #[must_use]
    pub fn pending_writes(&self, key: &str) -> usize {
        self.table.lock().pending_writes.get(key).copied().unwrap_or(0)
    }

    /// Returns the number of outstanding read requests for `key`.
    #[must_use]
    pub fn pending_reads(&self, key: &str) -> usize {
        self.table.lock().pending_reads.get(key).copied().unwrap_or(0)
    }

    /// Returns true if `key` is claimed by a completed write acquisition.
    #[must_use]
    pub fn is_claimed(&self, key: &str) -> bool {
        self.table.lock().claimed.contains(key)
    }

    /// Returns true if the per-key lock for `key` has an active writer.
    #[must_use]
    pub fn is_write_locked(&self, key: &str) -> bool {
        self.table
            .lock()
            .locks
            .get(key)
            .is_some_and(|lock| lock.is_write_locked())
    }

    /// Returns the number of read grants on the per-key lock for `key`.
    #[must_use]
    pub fn readers(&self, key: &str) -> usize {
        self.table
            .lock()
            .locks
            .get(key)
            .map_or(0, |lock| lock.readers())
    }

    fn ordered<'k>(&self, keys: &'k [Key]) -> Cow<'k, [Key]> {
        match self.ordering {
            KeyOrdering::AsGiven => Cow::Borrowed(keys),
            KeyOrdering::Canonical => {
                let mut sorted = keys.to_vec();
                sorted.sort();
                Cow::Owned(sorted)
            }
        }
    }

    /// Phase 1: obtain or count a per-key grant for every key.
    async fn acquire_keys(&self, keys: &[Key], access: Access) {
        for key in self.ordered(keys).iter() {
            let lock = {
                let mut table = self.table.lock();
                if table.count_if_held(key, access) {
                    continue;
                }
                table.lock_for(key)
            };

            tracing::trace!(%key, ?access, "waiting for key lock");
            access.acquire(&lock).await;

            let mut table = self.table.lock();
            match table.pending_mut(access).entry(key.clone()) {
                Entry::Vacant(entry) => {
                    entry.insert(1);
                }
                Entry::Occupied(mut entry) => {
                    // Another reader registered the key while we waited.
                    // The locker keeps a single grant per key.
                    *entry.get_mut() += 1;
                    access.release(&lock);
                }
            }
        }
    }

    /// Phase 2: wait until no key is claimed, then claim them all.
    async fn claim(&self, keys: &[Key]) {
        loop {
            let notified = self.claims_changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let claimed = {
                let mut table = self.table.lock();
                let ready = table.can_claim(keys);
                if ready {
                    table.claimed.extend(keys.iter().cloned());
                }
                ready
            };
            if claimed {
                return;
            }

            tracing::trace!(?keys, "waiting for claimed keys");
            notified.await;
        }
    }
}

impl Default for FineGrainedLocker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FineGrainedLocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table.lock();
        f.debug_struct("FineGrainedLocker")
            .field("ordering", &self.ordering)
            .field("tracked_keys", &table.locks.len())
            .field("pending_reads", &table.pending_reads.len())
            .field("pending_writes", &table.pending_writes.len())
            .field("claimed", &table.claimed.len())
            .finish()
    }
}

#[async_trait]
impl Locker for FineGrainedLocker {
    fn kind(&self) -> LockerKind {
        LockerKind::FineGrained
    }

    async fn acquire_read(&self, keys: &[Key]) {
        self.acquire_keys(keys, Access::Read).await;
        tracing::trace!(?keys, "acquired read");
    }

    fn release_read(&self, keys: &[Key]) {
        let mut table = self.table.lock();
        for key in keys {
            table.release_key(key, Access::Read);
        }
        tracing::trace!(?keys, "released read");
    }

    async fn acquire_write(&self, keys: &[Key]) {
        self.acquire_keys(keys, Access::Write).await;
        self.claim(keys).await;
        tracing::trace!(?keys, "acquired write");
    }

    fn release_write(&self, keys: &[Key]) {
        {
            let mut table = self.table.lock();
            for key in keys {
                table.claimed.remove(key);
                table.release_key(key, Access::Write);
            }
        }
        self.claims_changed.notify_waiters();
        tracing::trace!(?keys, "released write");
    }
}
