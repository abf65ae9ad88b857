//! # LockKV Testkit
//!
//! Test utilities for LockKV.
//!
//! This crate provides:
//! - Database fixtures for every locker/storage combination
//! - The bank-transfer workload used by tests, benchmarks and the CLI
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lockkv_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn transfers_conserve_balance() {
//!     let db = memory_db(LockerKind::FineGrained);
//!     let report = run_workload(db, &WorkloadConfig::default()).await.unwrap();
//!     assert_eq!(report.total_balance, 0);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod workload;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::workload::*;
    pub use lockkv_core::{Database, LockerKind};
}

pub use fixtures::*;
pub use generators::*;
pub use workload::*;
