//! # LockKV Core
//!
//! Lock manager, database and transaction layer for LockKV.
//!
//! This crate provides:
//! - [`ReadWriteLock`], a single-resource lock with writer priority on entry
//! - Three [`Locker`] strategies: [`NoOpLocker`], [`GlobalLocker`] and
//!   [`FineGrainedLocker`]
//! - [`Database`], which pairs a storage backend with a locker
//! - [`Transaction`], which holds write access to a declared key set from
//!   creation until commit or abort
//!
//! All waiting happens at `.await` points; nothing blocks a thread. There is
//! no timeout, cancellation or deadlock detection.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
mod config;
mod database;
mod error;
pub mod lock;
pub mod transaction;
mod types;

pub use config::{Config, StorageConfig};
pub use database::Database;
pub use error::{CoreError, CoreResult};
pub use lock::{
    FineGrainedLocker, GlobalLocker, KeyOrdering, Locker, LockerKind, NoOpLocker, ReadWriteLock,
};
pub use transaction::{Transaction, TransactionState};
pub use types::{Key, TransactionId};

/// Re-exported storage layer.
pub use lockkv_storage as storage;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
