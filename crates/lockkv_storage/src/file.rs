//! File-per-key storage backend for persistent storage.

use crate::backend::{generate_key, Backend, KeyGenerator};
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

/// A directory-based storage backend.
///
/// Each record lives in its own file named after its key, so keys must be
/// valid single path components. Data survives process restarts.
///
/// # Durability
///
/// Writes go through the OS page cache; no `fsync` is issued. Durability is
/// whatever the file system provides.
///
/// # Example
///
/// ```no_run
/// use lockkv_storage::{Backend, FileBackend};
/// use std::path::Path;
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let backend = FileBackend::open(Path::new("db")).unwrap();
/// let key = backend.create(b"persistent data").await.unwrap();
/// # });
/// ```
pub struct FileBackend {
    dir: PathBuf,
    next_key: KeyGenerator,
}

impl FileBackend {
    /// Opens a backend rooted at `dir`, creating the directory if needed.
    ///
    /// An existing directory is reused along with every record in it.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: &Path) -> StorageResult<Self> {
        Self::open_with_key_generator(dir, Box::new(generate_key))
    }

    /// Opens a backend that draws candidate keys from `next_key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open_with_key_generator(dir: &Path, next_key: KeyGenerator) -> StorageResult<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            next_key,
        })
    }

    /// Returns the directory holding the records.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(key))
    }
}

/// Rejects keys that would not map to a single file inside the directory.
fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::invalid_key(key, "key is empty"));
    }
    if key == "." || key == ".." {
        return Err(StorageError::invalid_key(key, "key is a relative path"));
    }
    if key.contains(['/', '\\', '\0']) {
        return Err(StorageError::invalid_key(
            key,
            "key contains a path separator or NUL",
        ));
    }
    Ok(())
}

impl fmt::Debug for FileBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileBackend")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Backend for FileBackend {
    async fn create(&self, value: &[u8]) -> StorageResult<String> {
        loop {
            let key = (self.next_key)();
            let path = self.record_path(&key)?;

            let file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;

            match file {
                Ok(mut file) => {
                    file.write_all(value).await?;
                    file.flush().await?;
                    return Ok(key);
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    tracing::debug!(%key, "key collision on create, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let path = self.record_path(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        let path = self.record_path(key)?;
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .await?;
        file.write_all(value).await?;
        file.flush().await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.record_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StorageError::NotFound {
                key: key.to_owned(),
            }),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn file_open_creates_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("db");

        let backend = FileBackend::open(&path).unwrap();
        assert!(path.is_dir());
        assert_eq!(backend.path(), path);
    }

    #[tokio::test]
    async fn file_open_existing_directory() {
        let dir = tempdir().unwrap();
        FileBackend::open(dir.path()).unwrap();
        assert!(FileBackend::open(dir.path()).is_ok());
    }

    #[tokio::test]
    async fn file_create_and_get() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        let key = backend.create(b"hello").await.unwrap();
        assert!(dir.path().join(&key).exists());
        assert_eq!(backend.get(&key).await.unwrap(), Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn file_create_retries_on_collision() {
        let dir = tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let backend = FileBackend::open_with_key_generator(
            dir.path(),
            Box::new(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    "taken".to_string()
                } else {
                    format!("fresh{n}")
                }
            }),
        )
        .unwrap();

        assert_eq!(backend.create(b"1").await.unwrap(), "taken");
        assert_eq!(backend.create(b"2").await.unwrap(), "fresh2");
        assert_eq!(backend.get("taken").await.unwrap(), Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn file_get_missing_is_none() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        assert_eq!(backend.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_set_upserts_and_truncates() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        backend.set("k", b"a much longer value").await.unwrap();
        backend.set("k", b"short").await.unwrap();

        assert_eq!(backend.get("k").await.unwrap(), Some(b"short".to_vec()));
    }

    #[tokio::test]
    async fn file_empty_payload_is_not_absent() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        backend.set("empty", b"").await.unwrap();
        assert_eq!(backend.get("empty").await.unwrap(), Some(Vec::new()));
    }

    #[tokio::test]
    async fn file_remove_missing_fails() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        backend.set("k", b"v").await.unwrap();
        backend.remove("k").await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), None);

        let result = backend.remove("k").await;
        assert!(matches!(result, Err(StorageError::NotFound { .. })));
    }

    #[tokio::test]
    async fn file_persistence() {
        let dir = tempdir().unwrap();

        {
            let backend = FileBackend::open(dir.path()).unwrap();
            backend.set(".node1", b"persistent data").await.unwrap();
        }

        {
            let backend = FileBackend::open(dir.path()).unwrap();
            assert_eq!(
                backend.get(".node1").await.unwrap(),
                Some(b"persistent data".to_vec())
            );
        }
    }

    #[tokio::test]
    async fn file_rejects_path_keys() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        for key in ["", ".", "..", "a/b", "..\\x", "nul\0"] {
            let result = backend.set(key, b"v").await;
            assert!(
                matches!(result, Err(StorageError::InvalidKey { .. })),
                "key {key:?} should be rejected"
            );
        }
    }
}
