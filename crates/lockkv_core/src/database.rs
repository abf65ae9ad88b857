//! Database facade.

use crate::codec;
use crate::config::{Config, StorageConfig};
use crate::error::{CoreError, CoreResult};
use crate::lock::{KeyOrdering, Locker, LockerKind};
use crate::transaction::Transaction;
use crate::types::{Key, TransactionId};
use lockkv_storage::{Backend, FileBackend, InMemoryBackend};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A transactional key-value database.
///
/// The database pairs a storage [`Backend`] with a [`Locker`], both fixed
/// for its lifetime. Single-key reads take a read lock around the backend
/// call; everything else goes through a [`Transaction`].
///
/// Share a database between tasks by wrapping it in an [`Arc`].
///
/// # Example
///
/// ```rust
/// use lockkv_core::{Config, Database, LockerKind};
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let db = Database::open(&Config::new().locker(LockerKind::Global)).unwrap();
///
/// let mut txn = db.new_transaction([".node1"]).await;
/// txn.set_as(".node1", &1u32).await.unwrap();
/// txn.commit().unwrap();
///
/// assert_eq!(db.get_as::<u32>(".node1").await.unwrap(), Some(1));
/// assert_eq!(db.get("missing").await.unwrap(), None);
/// # });
/// ```
pub struct Database {
    backend: Arc<dyn Backend>,
    locker: Arc<dyn Locker>,
    next_txid: AtomicU64,
}

impl Database {
    /// Creates a database from an existing backend and locker.
    pub fn new(backend: Arc<dyn Backend>, locker: Arc<dyn Locker>) -> Self {
        Self {
            backend,
            locker,
            next_txid: AtomicU64::new(1),
        }
    }

    /// Opens a database as described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage directory path is empty or the
    /// directory cannot be created.
    pub fn open(config: &Config) -> CoreResult<Self> {
        let backend: Arc<dyn Backend> = match &config.storage {
            StorageConfig::InMemory => Arc::new(InMemoryBackend::new()),
            StorageConfig::Directory(dir) if dir.as_os_str().is_empty() => {
                return Err(CoreError::invalid_config("storage directory path is empty"));
            }
            StorageConfig::Directory(dir) => Arc::new(FileBackend::open(dir)?),
        };
        let locker = config.locker.build(config.key_ordering);
        tracing::debug!(locker = %config.locker, storage = ?config.storage, "database opened");
        Ok(Self::new(backend, locker))
    }

    /// Opens an in-memory database with the given locking strategy.
    #[must_use]
    pub fn open_in_memory(kind: LockerKind) -> Self {
        Self::new(
            Arc::new(InMemoryBackend::new()),
            kind.build(KeyOrdering::AsGiven),
        )
    }

    /// Returns the storage backend.
    #[must_use]
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Returns the locker.
    #[must_use]
    pub fn locker(&self) -> &dyn Locker {
        self.locker.as_ref()
    }

    /// Returns the locking strategy in use.
    #[must_use]
    pub fn locker_kind(&self) -> LockerKind {
        self.locker.kind()
    }

    /// Reads the payload stored under `key` outside any transaction.
    ///
    /// Holds a read lock on `key` for the duration of the backend call.
    /// Returns `Ok(None)` if the record does not exist.
    ///
    /// # Errors
    ///
    /// Returns backend errors unchanged.
    pub async fn get(&self, key: impl AsRef<str>) -> CoreResult<Option<Vec<u8>>> {
        let keys = [Key::from(key.as_ref())];
        self.locker.acquire_read(&keys).await;
        let result = self.backend.get(keys[0].as_str()).await;
        self.locker.release_read(&keys);
        Ok(result?)
    }

    /// Reads and decodes the value stored under `key` outside any
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns backend errors unchanged, or a codec error if the payload
    /// does not decode as `T`.
    pub async fn get_as<T: DeserializeOwned>(&self, key: impl AsRef<str>) -> CoreResult<Option<T>> {
        self.get(key)
            .await?
            .map(|bytes| codec::decode(&bytes))
            .transpose()
    }

    /// Begins a transaction over `keys`.
    ///
    /// Waits until the locker grants write access to every key, which may
    /// take forever if the keys stay contended.
    pub async fn new_transaction<I>(&self, keys: I) -> Transaction<'_>
    where
        I: IntoIterator,
        I::Item: Into<Key>,
    {
        let keys: Vec<Key> = keys.into_iter().map(Into::into).collect();
        let id = TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst));

        tracing::trace!(txn = %id, ?keys, "waiting for write locks");
        self.locker.acquire_write(&keys).await;
        tracing::debug!(txn = %id, keys = keys.len(), "transaction began");

        Transaction::new(self, id, keys)
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("backend", &self.backend)
            .field("locker", &self.locker)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::FineGrainedLocker;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::AtomicBool;
    use tempfile::tempdir;

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Account {
        #[serde(default)]
        balance: i64,
    }

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    async fn transfer(db: &Database, from: &str, to: &str, amount: i64) {
        let mut txn = db.new_transaction([from, to]).await;
        let mut a: Account = txn.get_as(from).await.unwrap().unwrap_or_default();
        let mut b: Account = txn.get_as(to).await.unwrap().unwrap_or_default();
        a.balance -= amount;
        b.balance += amount;
        txn.set_as(from, &a).await.unwrap();
        txn.set_as(to, &b).await.unwrap();
        txn.commit().unwrap();
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        for kind in LockerKind::ALL {
            let db = Database::open_in_memory(kind);
            assert_eq!(db.get("never-created").await.unwrap(), None);
            assert_eq!(db.locker_kind(), kind);
        }
    }

    #[tokio::test]
    async fn empty_record_is_not_absent() {
        let locker = Arc::new(FineGrainedLocker::new());
        let db = Database::new(Arc::new(InMemoryBackend::new()), locker.clone());
        let mut txn = db.new_transaction(Vec::<Key>::new()).await;
        let key = txn.create().await.unwrap();
        txn.commit().unwrap();

        assert_eq!(db.get(&key).await.unwrap(), Some(codec::EMPTY_RECORD.to_vec()));
        assert_eq!(db.get("other").await.unwrap(), None);

        // The created key was never locked; the read above left nothing behind.
        assert_eq!(locker.pending_writes(key.as_str()), 0);
        assert_eq!(locker.pending_reads(key.as_str()), 0);
        assert!(!locker.is_claimed(key.as_str()));
    }

    #[tokio::test]
    async fn open_directory_persists() {
        let dir = tempdir().unwrap();
        let config = Config::new().directory(dir.path().join("db"));

        {
            let db = Database::open(&config).unwrap();
            let mut txn = db.new_transaction(["0"]).await;
            txn.set_as("0", &Account { balance: 7 }).await.unwrap();
            txn.commit().unwrap();
        }

        let db = Database::open(&config).unwrap();
        let account: Account = db.get_as("0").await.unwrap().unwrap();
        assert_eq!(account.balance, 7);
    }

    #[test]
    fn open_rejects_empty_directory() {
        let err = Database::open(&Config::new().directory("")).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig { .. }));
        assert_eq!(
            err.to_string(),
            "invalid configuration: storage directory path is empty"
        );
        assert!(!err.is_usage_error());
    }

    #[tokio::test]
    async fn get_accepts_any_string_key() {
        let db = Database::open_in_memory(LockerKind::FineGrained);
        let mut txn = db.new_transaction(["k"]).await;
        txn.set("k", b"v").await.unwrap();
        txn.commit().unwrap();

        let owned = String::from("k");
        let key = Key::from("k");
        assert_eq!(db.get("k").await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(db.get(&owned).await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(db.get(owned).await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(db.get(&key).await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(db.get(key).await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn backend_errors_propagate() {
        let dir = tempdir().unwrap();
        let db = Database::open(&Config::new().directory(dir.path())).unwrap();

        let result = db.get("a/b").await;
        assert!(matches!(result, Err(CoreError::Storage(_))));

        let mut txn = db.new_transaction(["missing"]).await;
        let result = txn.remove("missing").await;
        assert!(matches!(result, Err(CoreError::Storage(_))));
        txn.commit().unwrap();

        // The failed read released its lock.
        let mut txn = db.new_transaction(["a/b"]).await;
        txn.commit().unwrap();
    }

    #[tokio::test]
    async fn read_waits_for_transaction_on_same_key() {
        for kind in [LockerKind::Global, LockerKind::FineGrained] {
            let db = Arc::new(Database::open_in_memory(kind));
            let mut txn = db.new_transaction(["a"]).await;
            txn.set("a", b"new").await.unwrap();

            let reader = tokio::spawn({
                let db = Arc::clone(&db);
                async move { db.get("a").await.unwrap() }
            });

            settle().await;
            assert!(!reader.is_finished(), "{kind}: read should wait");

            txn.commit().unwrap();
            assert_eq!(reader.await.unwrap(), Some(b"new".to_vec()));
        }
    }

    #[tokio::test]
    async fn fine_grained_read_of_other_key_does_not_wait() {
        let db = Database::open_in_memory(LockerKind::FineGrained);
        let mut txn = db.new_transaction(["a"]).await;

        assert_eq!(db.get("b").await.unwrap(), None);

        txn.commit().unwrap();
    }

    #[tokio::test]
    async fn global_transactions_on_disjoint_keys_are_serialized() {
        let db = Arc::new(Database::open_in_memory(LockerKind::Global));
        let mut first = db.new_transaction(["a"]).await;

        let began = Arc::new(AtomicBool::new(false));
        let second = tokio::spawn({
            let db = Arc::clone(&db);
            let began = Arc::clone(&began);
            async move {
                let mut txn = db.new_transaction(["z"]).await;
                began.store(true, Ordering::SeqCst);
                txn.commit().unwrap();
            }
        });

        settle().await;
        assert!(!began.load(Ordering::SeqCst));

        first.commit().unwrap();
        second.await.unwrap();
        assert!(began.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn set_atomicity_hides_partial_updates() {
        let db = Arc::new(Database::open_in_memory(LockerKind::FineGrained));
        let mut txn = db.new_transaction(["a", "b"]).await;
        txn.set_as("a", &Account { balance: -1 }).await.unwrap();

        // A second transaction over an overlapping set cannot observe `a`
        // before `b` is written too.
        let observer = tokio::spawn({
            let db = Arc::clone(&db);
            async move {
                let mut txn = db.new_transaction(["b", "a"]).await;
                let a: Account = txn.get_as("a").await.unwrap().unwrap_or_default();
                let b: Account = txn.get_as("b").await.unwrap().unwrap_or_default();
                txn.commit().unwrap();
                a.balance + b.balance
            }
        });

        settle().await;
        txn.set_as("b", &Account { balance: 1 }).await.unwrap();
        txn.commit().unwrap();

        assert_eq!(observer.await.unwrap(), 0);
    }

    #[tokio::test]
    async fn noop_locker_loses_updates() {
        let db = Database::open_in_memory(LockerKind::None);
        for key in ["a", "b", "c"] {
            let mut txn = db.new_transaction([key]).await;
            txn.set_as(key, &Account::default()).await.unwrap();
            txn.commit().unwrap();
        }

        // Both transactions are granted at once and read the same `a`.
        let mut t1 = db.new_transaction(["a", "b"]).await;
        let mut t2 = db.new_transaction(["a", "c"]).await;
        let a1: Account = t1.get_as("a").await.unwrap().unwrap();
        let a2: Account = t2.get_as("a").await.unwrap().unwrap();

        t1.set_as("a", &Account { balance: a1.balance - 1 }).await.unwrap();
        t1.set_as("b", &Account { balance: 1 }).await.unwrap();
        t2.set_as("a", &Account { balance: a2.balance - 1 }).await.unwrap();
        t2.set_as("c", &Account { balance: 1 }).await.unwrap();
        t1.commit().unwrap();
        t2.commit().unwrap();

        let mut total = 0;
        for key in ["a", "b", "c"] {
            total += db.get_as::<Account>(key).await.unwrap().unwrap().balance;
        }
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn concurrent_transfers_conserve_balance() {
        for kind in [LockerKind::Global, LockerKind::FineGrained] {
            let db = Arc::new(Database::open_in_memory(kind));
            let accounts = 5;
            for i in 0..accounts {
                let key = i.to_string();
                let mut txn = db.new_transaction([key.as_str()]).await;
                txn.set_as(&key, &Account::default()).await.unwrap();
                txn.commit().unwrap();
            }

            let tasks: Vec<_> = (0..200usize)
                .map(|i| {
                    let db = Arc::clone(&db);
                    tokio::spawn(async move {
                        let from = (i % accounts).to_string();
                        let to = ((i * 7 + 1) % accounts).to_string();
                        if from == to {
                            db.get(from).await.unwrap();
                        } else {
                            transfer(&db, &from, &to, 1).await;
                        }
                    })
                })
                .collect();
            for task in tasks {
                task.await.unwrap();
            }

            let mut total = 0;
            for i in 0..accounts {
                total += db
                    .get_as::<Account>(i.to_string())
                    .await
                    .unwrap()
                    .unwrap()
                    .balance;
            }
            assert_eq!(total, 0, "{kind}");
        }
    }

    #[tokio::test]
    async fn custom_locker_is_used() {
        let locker = Arc::new(FineGrainedLocker::new());
        let db = Database::new(Arc::new(InMemoryBackend::new()), locker.clone());

        let mut txn = db.new_transaction(["a", "b"]).await;
        assert!(locker.is_claimed("a"));
        assert!(locker.is_claimed("b"));
        txn.commit().unwrap();
        assert!(!locker.is_claimed("a"));
        assert_eq!(locker.tracked_keys(), 2);
    }
}
