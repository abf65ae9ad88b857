//! Test fixtures and database helpers.
//!
//! Provides convenience functions for setting up test databases for every
//! combination of storage backend and locking strategy.

use lockkv_core::{Config, CoreResult, Database, LockerKind};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempDir;

/// Storage backend of a test setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    /// In-memory backend.
    Ram,
    /// File-per-key backend.
    Fs,
}

impl StorageKind {
    /// Returns the short label used in reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ram => "RAM",
            Self::Fs => "FS",
        }
    }
}

/// A storage/locker combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Setup {
    /// Storage backend.
    pub storage: StorageKind,
    /// Locking strategy.
    pub locker: LockerKind,
}

impl Setup {
    /// Creates a setup.
    #[must_use]
    pub const fn new(storage: StorageKind, locker: LockerKind) -> Self {
        Self { storage, locker }
    }

    /// Returns the configuration for this setup.
    ///
    /// `dir` is used by file-backed setups and ignored otherwise.
    #[must_use]
    pub fn config(&self, dir: &Path) -> Config {
        let config = Config::new().locker(self.locker);
        match self.storage {
            StorageKind::Ram => config.in_memory(),
            StorageKind::Fs => config.directory(dir),
        }
    }

    /// Opens a database for this setup.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage directory cannot be created.
    pub fn open(&self, dir: &Path) -> CoreResult<Database> {
        Database::open(&self.config(dir))
    }
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ram" | "memory" => Ok(Self::Ram),
            "fs" | "file" => Ok(Self::Fs),
            other => Err(format!("unknown storage `{other}` (expected ram or fs)")),
        }
    }
}

impl fmt::Display for Setup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let locker = match self.locker {
            LockerKind::FineGrained => "FineGrained",
            LockerKind::Global => "Global",
            LockerKind::None => "None",
        };
        write!(f, "{}/{}", self.storage.label(), locker)
    }
}

/// The combinations compared by the benchmark, in reporting order.
pub const DEFAULT_MATRIX: [Setup; 5] = [
    Setup::new(StorageKind::Ram, LockerKind::FineGrained),
    Setup::new(StorageKind::Ram, LockerKind::Global),
    Setup::new(StorageKind::Fs, LockerKind::FineGrained),
    Setup::new(StorageKind::Fs, LockerKind::Global),
    Setup::new(StorageKind::Ram, LockerKind::None),
];

/// A test database with automatic cleanup.
pub struct TestDatabase {
    /// The database instance.
    pub db: Arc<Database>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestDatabase {
    /// Creates a new in-memory test database.
    pub fn memory(locker: LockerKind) -> Self {
        Self {
            db: Arc::new(Database::open_in_memory(locker)),
            _temp_dir: None,
        }
    }

    /// Creates a new file-backed test database in a temporary directory.
    pub fn file(locker: LockerKind) -> Self {
        Self::open(Setup::new(StorageKind::Fs, locker))
    }

    /// Creates a test database for `setup`.
    pub fn open(setup: Setup) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = setup
            .open(&temp_dir.path().join("db"))
            .expect("Failed to open test database");

        Self {
            db: Arc::new(db),
            _temp_dir: (setup.storage == StorageKind::Fs).then_some(temp_dir),
        }
    }

    /// Returns a shared handle to the database.
    pub fn shared(&self) -> Arc<Database> {
        Arc::clone(&self.db)
    }

    /// Returns the storage directory if file-backed, None if in-memory.
    pub fn path(&self) -> Option<&Path> {
        self._temp_dir.as_ref().map(|d| d.path())
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Creates a shared in-memory database.
pub fn memory_db(locker: LockerKind) -> Arc<Database> {
    Arc::new(Database::open_in_memory(locker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_labels() {
        let labels: Vec<_> = DEFAULT_MATRIX.iter().map(ToString::to_string).collect();
        assert_eq!(
            labels,
            [
                "RAM/FineGrained",
                "RAM/Global",
                "FS/FineGrained",
                "FS/Global",
                "RAM/None"
            ]
        );
    }

    #[test]
    fn storage_kind_parses() {
        assert_eq!("RAM".parse::<StorageKind>().unwrap(), StorageKind::Ram);
        assert_eq!("file".parse::<StorageKind>().unwrap(), StorageKind::Fs);
        assert!("tape".parse::<StorageKind>().is_err());
    }

    #[test]
    fn memory_database_has_no_path() {
        let db = TestDatabase::memory(LockerKind::Global);
        assert!(db.path().is_none());
        assert_eq!(db.locker_kind(), LockerKind::Global);
    }

    #[test]
    fn file_database_has_path() {
        let db = TestDatabase::file(LockerKind::FineGrained);
        let path = db.path().unwrap();
        assert!(path.join("db").is_dir());
    }
}
