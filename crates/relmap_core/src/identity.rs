//! Object identity.

use relmap_store::{RowKey, TableId};
use std::fmt;

/// Stable handle naming one logical persisted row.
///
/// An identity is an immutable `(table, primary key)` tuple. Within one
/// transaction scope at most one tracked object exists per identity
/// (the identity-map invariant); across scopes a fresh tracked object is
/// created per lookup unless a shared cache is layered underneath.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    table: TableId,
    key: RowKey,
}

impl Identity {
    /// Creates an identity from a table and primary key.
    #[must_use]
    pub const fn new(table: TableId, key: RowKey) -> Self {
        Self { table, key }
    }

    /// Returns the table the row lives in.
    #[must_use]
    pub const fn table(&self) -> TableId {
        self.table
    }

    /// Returns the primary key.
    #[must_use]
    pub const fn key(&self) -> &RowKey {
        &self.key
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.table, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identities_compare_by_table_and_key() {
        let a = Identity::new(TableId::new(1), RowKey::from_i64(1));
        let b = Identity::new(TableId::new(1), RowKey::from_i64(1));
        let c = Identity::new(TableId::new(2), RowKey::from_i64(1));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn display_includes_table_and_key() {
        let id = Identity::new(TableId::new(3), RowKey::from_text("k"));
        assert_eq!(format!("{id}"), "table:3/k");
    }
}
