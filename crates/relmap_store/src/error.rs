//! Error types for row store operations.

use crate::row::{RowKey, TableId};
use thiserror::Error;

/// Result type for row store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during row store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed row does not exist.
    #[error("row not found: {key} in {table}")]
    RowNotFound {
        /// The table that was searched.
        table: TableId,
        /// The key that was not found.
        key: RowKey,
    },

    /// No statement bracket is open.
    #[error("no open store transaction")]
    NoOpenTransaction,

    /// A statement bracket is already open.
    #[error("store transaction already open")]
    TransactionAlreadyOpen,

    /// The backing implementation failed.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Creates a row-not-found error.
    #[must_use]
    pub fn row_not_found(table: TableId, key: RowKey) -> Self {
        Self::RowNotFound { table, key }
    }

    /// Creates a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}
