//! Error types for LockKV core.

use crate::transaction::TransactionState;
use crate::types::Key;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in LockKV core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] lockkv_storage::StorageError),

    /// The key was not declared when the transaction began.
    #[error("key `{key}` not in transaction")]
    KeyNotInTransaction {
        /// The offending key.
        key: Key,
    },

    /// The transaction has already committed or aborted.
    #[error("transaction not active: already {state}")]
    TransactionNotActive {
        /// The terminal state the transaction is in.
        state: TransactionState,
    },

    /// A value could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// The configuration cannot be used.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns true for errors caused by misusing a transaction.
    #[must_use]
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::KeyNotInTransaction { .. } | Self::TransactionNotActive { .. }
        )
    }
}
