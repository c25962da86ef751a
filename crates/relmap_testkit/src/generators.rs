//! Property-based test generators using proptest.
//!
//! Provides strategies for random row data and reference graphs that
//! maintain required invariants.

use proptest::prelude::*;
use relmap_core::Identity;
use relmap_store::{RowImage, RowKey, TableId, Value};

/// Strategy for generating scalar field values.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        "[a-z]{0,16}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..64).prop_map(Value::Bytes),
    ]
}

/// Strategy for generating single-column row keys.
pub fn row_key_strategy() -> impl Strategy<Value = RowKey> {
    prop_oneof![
        any::<i64>().prop_map(RowKey::from_i64),
        "[a-z]{1,12}".prop_map(RowKey::from_text),
    ]
}

/// Strategy for generating identities within one table.
pub fn identity_strategy(table: TableId) -> impl Strategy<Value = Identity> {
    row_key_strategy().prop_map(move |key| Identity::new(table, key))
}

/// Strategy for generating row images with lowercase column names.
pub fn row_image_strategy() -> impl Strategy<Value = RowImage> {
    prop::collection::vec(("[a-z]{1,10}", value_strategy()), 0..8)
        .prop_map(|fields| fields.into_iter().collect())
}

/// Strategy for generating acyclic edge lists over `n` nodes.
///
/// Edges always point from a higher index to a lower one, so the
/// resulting graph is a DAG by construction.
pub fn acyclic_edges_strategy(n: usize) -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((1..n.max(2), any::<prop::sample::Index>()), 0..n * 2).prop_map(
        move |raw| {
            raw.into_iter()
                .filter(|&(from, _)| from < n)
                .map(|(from, to)| (from, to.index(from)))
                .collect()
        },
    )
}
