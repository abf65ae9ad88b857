//! Transactions over a fixed key set.
//!
//! A transaction declares every key it will touch up front. Beginning one
//! acquires write access to all of them through the database's locker;
//! committing or aborting releases it. Operations are restricted to the
//! declared keys (plus any created inside the transaction).
//!
//! There is no write-ahead log: `set` and `remove` reach the backend
//! immediately and `abort` does not undo them.

mod state;

pub use state::{Transaction, TransactionState};
