//! Single-resource read-write lock with writer priority on entry.

use parking_lot::Mutex;
use std::fmt;
use tokio::sync::Notify;

#[derive(Debug, Default, Clone, Copy)]
struct LockState {
    readers: usize,
    writer: bool,
}

/// A read-write lock for cooperative tasks.
///
/// Readers share the lock; a writer excludes everybody else. A writer
/// announces itself before waiting for existing readers to drain, so
/// readers that arrive after it queue behind it instead of starving it.
///
/// The lock has no owner and no guard: every `acquire_*` must be paired
/// with the matching `release_*` by the caller. Acquisition futures must be
/// driven to completion; dropping one halfway (for example after a
/// writer has announced itself) leaves the lock held.
///
/// # Example
///
/// ```rust
/// use lockkv_core::ReadWriteLock;
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let lock = ReadWriteLock::new();
/// lock.acquire_read().await;
/// lock.acquire_read().await;
/// assert_eq!(lock.readers(), 2);
/// lock.release_read();
/// lock.release_read();
///
/// lock.acquire_write().await;
/// assert!(lock.is_write_locked());
/// lock.release_write();
/// # });
/// ```
#[derive(Default)]
pub struct ReadWriteLock {
    state: Mutex<LockState>,
    changed: Notify,
}

impl ReadWriteLock {
    /// Creates an unlocked lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no writer is active, then registers a reader.
    pub async fn acquire_read(&self) {
        self.wait_until(|state| {
            if state.writer {
                return false;
            }
            state.readers += 1;
            true
        })
        .await;
    }

    /// Unregisters a reader.
    pub fn release_read(&self) {
        {
            let mut state = self.state.lock();
            debug_assert!(state.readers > 0, "release_read without a reader");
            state.readers = state.readers.saturating_sub(1);
        }
        self.changed.notify_waiters();
    }

    /// Waits for exclusive access.
    ///
    /// Waits until no other writer is active, marks the writer active
    /// (turning away new readers), then waits for the current readers to
    /// drain.
    pub async fn acquire_write(&self) {
        self.wait_until(|state| {
            if state.writer {
                return false;
            }
            state.writer = true;
            true
        })
        .await;
        self.drain_readers().await;
    }

    /// Attempts to become the writer without waiting for another writer.
    ///
    /// Returns `false` at once if a writer is active. Otherwise marks the
    /// writer active, waits for the current readers to drain, and returns
    /// `true`.
    pub async fn try_acquire_write(&self) -> bool {
        {
            let mut state = self.state.lock();
            if state.writer {
                return false;
            }
            state.writer = true;
        }
        self.drain_readers().await;
        true
    }

    /// Clears the active writer.
    pub fn release_write(&self) {
        {
            let mut state = self.state.lock();
            debug_assert!(state.writer, "release_write without a writer");
            state.writer = false;
        }
        self.changed.notify_waiters();
    }

    /// Returns the number of readers currently holding the lock.
    #[must_use]
    pub fn readers(&self) -> usize {
        self.state.lock().readers
    }

    /// Returns true if a writer is active (or waiting for readers to drain).
    #[must_use]
    pub fn is_write_locked(&self) -> bool {
        self.state.lock().writer
    }

    async fn drain_readers(&self) {
        self.wait_until(|state| state.readers == 0).await;
    }

    /// Suspends until `ready` returns true for the current state.
    ///
    /// `ready` runs under the state mutex and may mutate the state when it
    /// returns true. Interest in wake-ups is registered before each check,
    /// so a release between the check and the sleep is never missed.
    async fn wait_until(&self, mut ready: impl FnMut(&mut LockState) -> bool) {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let done = {
                let mut state = self.state.lock();
                ready(&mut state)
            };
            if done {
                return;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for ReadWriteLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = *self.state.lock();
        f.debug_struct("ReadWriteLock")
            .field("readers", &state.readers)
            .field("writer", &state.writer)
            .finish()
    }
}
