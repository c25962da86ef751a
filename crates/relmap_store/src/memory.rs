//! In-memory row store for testing.

use crate::error::{StoreError, StoreResult};
use crate::row::{RowImage, RowKey, TableId};
use crate::store::RowStore;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;

/// One undoable statement recorded inside a bracket.
#[derive(Debug)]
enum UndoOp {
    /// Restore a row to its previous image (or remove it if `None`).
    Restore {
        table: TableId,
        key: RowKey,
        prior: Option<RowImage>,
    },
}

/// An in-memory row store.
///
/// This store keeps all rows in a process-local map and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral embeddings that don't need persistence
///
/// It implements the multi-statement bracket with an undo log, so a
/// `rollback` physically restores every row touched since `begin`.
///
/// # Thread Safety
///
/// The store is thread-safe and can be shared across threads. Only one
/// statement bracket can be open at a time; concurrent writers outside a
/// bracket interleave at row granularity.
///
/// # Example
///
/// ```rust
/// use relmap_store::{InMemoryStore, RowImage, RowKey, RowStore, TableId, Value};
///
/// let store = InMemoryStore::new();
/// let table = TableId::new(1);
/// let key = RowKey::from_i64(1);
/// store.begin().unwrap();
/// store.write(table, &key, RowImage::new()).unwrap();
/// store.rollback().unwrap();
/// assert!(store.read(table, &key).unwrap().is_none());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    rows: RwLock<HashMap<(TableId, RowKey), RowImage>>,
    undo: Mutex<Option<Vec<UndoOp>>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of rows currently in a table.
    #[must_use]
    pub fn row_count(&self, table: TableId) -> usize {
        self.rows
            .read()
            .keys()
            .filter(|(t, _)| *t == table)
            .count()
    }

    /// Returns all `(key, image)` pairs of a table, in unspecified order.
    #[must_use]
    pub fn rows_of(&self, table: TableId) -> Vec<(RowKey, RowImage)> {
        self.rows
            .read()
            .iter()
            .filter(|((t, _), _)| *t == table)
            .map(|((_, k), v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Removes all rows and any open bracket.
    pub fn clear(&self) {
        self.rows.write().clear();
        *self.undo.lock() = None;
    }

    /// Records the prior state of an address if a bracket is open.
    fn record_undo(&self, table: TableId, key: &RowKey, prior: Option<RowImage>) {
        if let Some(log) = self.undo.lock().as_mut() {
            log.push(UndoOp::Restore {
                table,
                key: key.clone(),
                prior,
            });
        }
    }
}

impl RowStore for InMemoryStore {
    fn read(&self, table: TableId, key: &RowKey) -> StoreResult<Option<RowImage>> {
        Ok(self.rows.read().get(&(table, key.clone())).cloned())
    }

    fn write(&self, table: TableId, key: &RowKey, row: RowImage) -> StoreResult<()> {
        let prior = self.rows.write().insert((table, key.clone()), row);
        self.record_undo(table, key, prior);
        Ok(())
    }

    fn delete(&self, table: TableId, key: &RowKey) -> StoreResult<()> {
        let prior = self.rows.write().remove(&(table, key.clone()));
        if prior.is_some() {
            self.record_undo(table, key, prior);
        }
        Ok(())
    }

    fn begin(&self) -> StoreResult<()> {
        let mut undo = self.undo.lock();
        if undo.is_some() {
            return Err(StoreError::TransactionAlreadyOpen);
        }
        *undo = Some(Vec::new());
        Ok(())
    }

    fn commit(&self) -> StoreResult<()> {
        self.undo.lock().take().ok_or(StoreError::NoOpenTransaction)?;
        Ok(())
    }

    fn rollback(&self) -> StoreResult<()> {
        let log = self.undo.lock().take().ok_or(StoreError::NoOpenTransaction)?;
        let mut rows = self.rows.write();
        // Undo in reverse so multiple touches of one row resolve to the
        // image seen at begin().
        for op in log.into_iter().rev() {
            match op {
                UndoOp::Restore { table, key, prior } => match prior {
                    Some(image) => {
                        rows.insert((table, key), image);
                    }
                    None => {
                        rows.remove(&(table, key));
                    }
                },
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn row(v: i64) -> RowImage {
        let mut image = RowImage::new();
        image.set("v", Value::Int(v));
        image
    }

    #[test]
    fn new_store_is_empty() {
        let store = InMemoryStore::new();
        assert_eq!(store.row_count(TableId::new(1)), 0);
    }

    #[test]
    fn write_then_read() {
        let store = InMemoryStore::new();
        let table = TableId::new(1);
        let key = RowKey::from_i64(1);

        store.write(table, &key, row(5)).unwrap();

        let image = store.read(table, &key).unwrap().unwrap();
        assert_eq!(image.get("v"), Some(&Value::Int(5)));
    }

    #[test]
    fn delete_removes_row() {
        let store = InMemoryStore::new();
        let table = TableId::new(1);
        let key = RowKey::from_i64(1);

        store.write(table, &key, row(5)).unwrap();
        store.delete(table, &key).unwrap();

        assert!(store.read(table, &key).unwrap().is_none());
    }

    #[test]
    fn delete_absent_row_succeeds() {
        let store = InMemoryStore::new();
        assert!(store.delete(TableId::new(1), &RowKey::from_i64(9)).is_ok());
    }

    #[test]
    fn rollback_restores_overwritten_row() {
        let store = InMemoryStore::new();
        let table = TableId::new(1);
        let key = RowKey::from_i64(1);

        store.write(table, &key, row(1)).unwrap();
        store.begin().unwrap();
        store.write(table, &key, row(2)).unwrap();
        store.write(table, &key, row(3)).unwrap();
        store.rollback().unwrap();

        let image = store.read(table, &key).unwrap().unwrap();
        assert_eq!(image.get("v"), Some(&Value::Int(1)));
    }

    #[test]
    fn rollback_removes_inserted_row() {
        let store = InMemoryStore::new();
        let table = TableId::new(1);
        let key = RowKey::from_i64(1);

        store.begin().unwrap();
        store.write(table, &key, row(1)).unwrap();
        store.rollback().unwrap();

        assert!(store.read(table, &key).unwrap().is_none());
    }

    #[test]
    fn rollback_restores_deleted_row() {
        let store = InMemoryStore::new();
        let table = TableId::new(1);
        let key = RowKey::from_i64(1);

        store.write(table, &key, row(7)).unwrap();
        store.begin().unwrap();
        store.delete(table, &key).unwrap();
        store.rollback().unwrap();

        let image = store.read(table, &key).unwrap().unwrap();
        assert_eq!(image.get("v"), Some(&Value::Int(7)));
    }

    #[test]
    fn commit_keeps_changes() {
        let store = InMemoryStore::new();
        let table = TableId::new(1);
        let key = RowKey::from_i64(1);

        store.begin().unwrap();
        store.write(table, &key, row(1)).unwrap();
        store.commit().unwrap();

        assert!(store.read(table, &key).unwrap().is_some());
    }

    #[test]
    fn nested_begin_fails() {
        let store = InMemoryStore::new();
        store.begin().unwrap();
        assert!(matches!(
            store.begin(),
            Err(StoreError::TransactionAlreadyOpen)
        ));
    }

    #[test]
    fn commit_without_begin_fails() {
        let store = InMemoryStore::new();
        assert!(matches!(store.commit(), Err(StoreError::NoOpenTransaction)));
    }

    #[test]
    fn rows_of_filters_by_table() {
        let store = InMemoryStore::new();
        store.write(TableId::new(1), &RowKey::from_i64(1), row(1)).unwrap();
        store.write(TableId::new(2), &RowKey::from_i64(1), row(2)).unwrap();

        assert_eq!(store.rows_of(TableId::new(1)).len(), 1);
        assert_eq!(store.row_count(TableId::new(2)), 1);
    }
}
