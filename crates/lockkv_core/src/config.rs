//! Database configuration.

use crate::lock::{KeyOrdering, LockerKind};
use std::path::PathBuf;

/// Where records are stored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StorageConfig {
    /// Keep records in memory; nothing survives the process.
    #[default]
    InMemory,
    /// One file per record inside this directory.
    Directory(PathBuf),
}

/// Configuration for opening a database.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Locking strategy.
    pub locker: LockerKind,

    /// Order in which the fine-grained locker takes per-key locks.
    pub key_ordering: KeyOrdering,

    /// Storage backend.
    pub storage: StorageConfig,
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the locking strategy.
    #[must_use]
    pub const fn locker(mut self, kind: LockerKind) -> Self {
        self.locker = kind;
        self
    }

    /// Sets the key ordering used by the fine-grained locker.
    #[must_use]
    pub const fn key_ordering(mut self, ordering: KeyOrdering) -> Self {
        self.key_ordering = ordering;
        self
    }

    /// Stores records in memory.
    #[must_use]
    pub fn in_memory(mut self) -> Self {
        self.storage = StorageConfig::InMemory;
        self
    }

    /// Stores records as files inside `dir`.
    #[must_use]
    pub fn directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage = StorageConfig::Directory(dir.into());
        self
    }
}
