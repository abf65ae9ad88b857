//! # LockKV Storage
//!
//! Storage backend trait and implementations for LockKV.
//!
//! Backends are **opaque key-value stores** - they do not interpret the
//! payloads they store and know nothing about locks or transactions.
//!
//! ## Design Principles
//!
//! - Four operations: `create`, `get`, `set`, `remove`
//! - Every operation is `async` and may suspend the calling task
//! - `create` always returns a key that was never in use
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral storage
//! - [`FileBackend`] - One file per key inside a directory
//!
//! ## Example
//!
//! ```rust
//! use lockkv_storage::{Backend, InMemoryBackend};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let backend = InMemoryBackend::new();
//! let key = backend.create(b"hello").await.unwrap();
//! assert_eq!(backend.get(&key).await.unwrap(), Some(b"hello".to_vec()));
//! # });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::{generate_key, Backend, KeyGenerator};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
