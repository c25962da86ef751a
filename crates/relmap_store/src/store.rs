//! Row store trait definition.

use crate::error::StoreResult;
use crate::row::{RowImage, RowKey, TableId};

/// A row-level persistence collaborator for RelMap.
///
/// Row stores are **flat keyed row spaces**. They read, write, and delete
/// single rows addressed by `(TableId, RowKey)` and bracket groups of
/// statements in a store-level transaction. RelMap owns all object-graph
/// interpretation - stores do not understand references, cascade policies,
/// or lock state.
///
/// # Invariants
///
/// - `read` after `write` for the same address returns the written image
///   within the same statement bracket
/// - `rollback` undoes every statement issued since the matching `begin`
/// - `delete` of an absent row is not an error (delete is idempotent at
///   the store level; the core decides when a missing row is a bug)
/// - Stores must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing and ephemeral embedding
pub trait RowStore: Send + Sync {
    /// Reads the current image of a row.
    ///
    /// Returns `None` if no row exists at the address.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing implementation fails.
    fn read(&self, table: TableId, key: &RowKey) -> StoreResult<Option<RowImage>>;

    /// Writes (inserts or replaces) a row image.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing implementation fails.
    fn write(&self, table: TableId, key: &RowKey, row: RowImage) -> StoreResult<()>;

    /// Deletes a row. Deleting an absent row succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing implementation fails.
    fn delete(&self, table: TableId, key: &RowKey) -> StoreResult<()>;

    /// Opens a multi-statement bracket.
    ///
    /// Statements issued until `commit` or `rollback` form one atomic
    /// group from the store's point of view.
    ///
    /// # Errors
    ///
    /// Returns an error if a bracket is already open.
    fn begin(&self) -> StoreResult<()>;

    /// Commits the open statement bracket.
    ///
    /// # Errors
    ///
    /// Returns an error if no bracket is open.
    fn commit(&self) -> StoreResult<()>;

    /// Rolls back the open statement bracket, undoing all statements
    /// issued since `begin`.
    ///
    /// # Errors
    ///
    /// Returns an error if no bracket is open.
    fn rollback(&self) -> StoreResult<()>;
}
