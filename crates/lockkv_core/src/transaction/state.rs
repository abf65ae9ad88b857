//! Transaction state.

use crate::codec::{self, EMPTY_RECORD};
use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use crate::types::{Key, TransactionId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been aborted.
    Aborted,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
        })
    }
}

/// A transaction holding write access to a fixed set of keys.
///
/// Created by [`Database::new_transaction`], which waits until the locker
/// grants write access to every declared key. The access is held until
/// [`commit`](Self::commit) or [`abort`](Self::abort). Dropping an active
/// transaction releases it as well, with a warning.
///
/// # Example
///
/// ```rust
/// use lockkv_core::{Database, LockerKind};
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let db = Database::open_in_memory(LockerKind::FineGrained);
///
/// let mut txn = db.new_transaction(["alice", "bob"]).await;
/// txn.set("alice", b"10").await.unwrap();
/// txn.set("bob", b"20").await.unwrap();
/// txn.commit().unwrap();
///
/// assert_eq!(db.get("bob").await.unwrap(), Some(b"20".to_vec()));
/// # });
/// ```
pub struct Transaction<'db> {
    db: &'db Database,
    id: TransactionId,
    keys: Vec<Key>,
    created: Vec<Key>,
    state: TransactionState,
}

impl<'db> Transaction<'db> {
    /// Creates an active transaction. The caller has already acquired
    /// write access to `keys`.
    pub(crate) fn new(db: &'db Database, id: TransactionId, keys: Vec<Key>) -> Self {
        Self {
            db,
            id,
            keys,
            created: Vec::new(),
            state: TransactionState::Active,
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Returns the keys declared when the transaction began, in
    /// declaration order. These are the keys it holds locks on.
    #[must_use]
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Returns the keys of records created by this transaction.
    ///
    /// They may be used like declared keys but are not locked.
    #[must_use]
    pub fn created_keys(&self) -> &[Key] {
        &self.created
    }

    /// Creates a new record holding the empty record and lets this
    /// transaction use its key.
    ///
    /// The key is fresh, so nobody else can reference it before this call
    /// returns. It is not locked, and commit or abort does not release it.
    pub async fn create(&mut self) -> CoreResult<Key> {
        self.ensure_active()?;
        let key = Key::from(self.db.backend().create(EMPTY_RECORD).await?);
        tracing::debug!(txn = %self.id, %key, "created record");
        self.created.push(key.clone());
        Ok(key)
    }

    /// Reads the payload stored under `key`.
    ///
    /// Returns `Ok(None)` if the record does not exist.
    pub async fn get(&self, key: impl AsRef<str>) -> CoreResult<Option<Vec<u8>>> {
        let key = key.as_ref();
        self.ensure_usable(key)?;
        Ok(self.db.backend().get(key).await?)
    }

    /// Stores `value` under `key`, creating the record if needed.
    pub async fn set(&self, key: impl AsRef<str>, value: &[u8]) -> CoreResult<()> {
        let key = key.as_ref();
        self.ensure_usable(key)?;
        Ok(self.db.backend().set(key, value).await?)
    }

    /// Removes the record stored under `key`.
    ///
    /// The key stays in the transaction's key set.
    pub async fn remove(&self, key: impl AsRef<str>) -> CoreResult<()> {
        let key = key.as_ref();
        self.ensure_usable(key)?;
        Ok(self.db.backend().remove(key).await?)
    }

    /// Reads and decodes the value stored under `key`.
    pub async fn get_as<T: DeserializeOwned>(&self, key: impl AsRef<str>) -> CoreResult<Option<T>> {
        self.get(key)
            .await?
            .map(|bytes| codec::decode(&bytes))
            .transpose()
    }

    /// Encodes and stores `value` under `key`.
    pub async fn set_as<T: Serialize + ?Sized>(
        &self,
        key: impl AsRef<str>,
        value: &T,
    ) -> CoreResult<()> {
        let bytes = codec::encode(value)?;
        self.set(key, &bytes).await
    }

    /// Commits the transaction, releasing its locks.
    ///
    /// Writes were applied when they were issued; commit only ends the
    /// transaction.
    pub fn commit(&mut self) -> CoreResult<()> {
        self.finish(TransactionState::Committed)
    }

    /// Aborts the transaction, releasing its locks.
    ///
    /// Writes already issued stay in the backend.
    pub fn abort(&mut self) -> CoreResult<()> {
        self.finish(TransactionState::Aborted)
    }

    fn finish(&mut self, outcome: TransactionState) -> CoreResult<()> {
        self.ensure_active()?;
        self.db.locker().release_write(&self.keys);
        self.state = outcome;
        tracing::debug!(txn = %self.id, keys = self.keys.len(), %outcome, "transaction finished");
        Ok(())
    }

    /// Ensures the transaction is active.
    fn ensure_active(&self) -> CoreResult<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            state => Err(CoreError::TransactionNotActive { state }),
        }
    }

    /// Ensures the transaction is active and `key` belongs to it.
    fn ensure_usable(&self, key: &str) -> CoreResult<()> {
        self.ensure_active()?;
        if self.keys.iter().chain(&self.created).any(|k| k.as_str() == key) {
            Ok(())
        } else {
            Err(CoreError::KeyNotInTransaction {
                key: Key::from(key),
            })
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.is_active() {
            tracing::warn!(txn = %self.id, "transaction dropped while active, releasing its locks");
            self.db.locker().release_write(&self.keys);
            self.state = TransactionState::Aborted;
        }
    }
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("keys", &self.keys)
            .field("created", &self.created)
            .finish_non_exhaustive()
    }
}
