//! Shared helpers for benchmark setup.

use relmap_core::{
    Cardinality, CascadePolicy, Identity, LinkSource, MetadataRepository, ObjectRef,
    ReferenceTemplate, TableDescriptor, TransactionManager,
};
use relmap_store::{InMemoryStore, RowImage, RowKey, TableId, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// The single benchmark table.
pub const NODES: TableId = TableId::new(1);

/// Identity of one benchmark row.
#[must_use]
pub fn node(key: i64) -> Identity {
    Identity::new(NODES, RowKey::from_i64(key))
}

/// A small row image for one benchmark node.
#[must_use]
pub fn node_row(key: i64) -> RowImage {
    let mut image = RowImage::new();
    image.set("key", Value::Int(key));
    image.set("payload", Value::text("x".repeat(32)));
    image
}

/// Metadata with one self-referencing OBJECT-cascade reference.
#[must_use]
pub fn self_ref_metadata(constrained: bool) -> Arc<MetadataRepository> {
    let metadata = MetadataRepository::new();
    metadata.register_table(TableDescriptor::new(NODES, "nodes"));
    metadata.register_reference(
        ReferenceTemplate::new("next", NODES, NODES, Cardinality::SelfReferencing)
            .on_insert(CascadePolicy::Object)
            .constrained(constrained),
    );
    Arc::new(metadata)
}

/// A manager over a fresh in-memory store with the benchmark schema.
#[must_use]
pub fn bench_manager(constrained: bool) -> TransactionManager {
    TransactionManager::new(Arc::new(InMemoryStore::new()), self_ref_metadata(constrained))
}

/// Link source backed by a plain map, for expansion benchmarks that
/// bypass the transaction layer.
#[derive(Default)]
pub struct MapLinks {
    links: HashMap<Identity, Vec<ObjectRef>>,
}

impl MapLinks {
    /// Records a `next` link between two nodes.
    pub fn link(&mut self, from: i64, to: i64) {
        self.links
            .entry(node(from))
            .or_default()
            .push(ObjectRef::lazy(node(to)));
    }

    /// Builds a linear chain `0 -> 1 -> .. -> n-1`.
    #[must_use]
    pub fn chain(n: i64) -> Self {
        let mut links = Self::default();
        for key in 0..n - 1 {
            links.link(key, key + 1);
        }
        links
    }

    /// Builds a fan: node 0 links to every other node.
    #[must_use]
    pub fn fan(n: i64) -> Self {
        let mut links = Self::default();
        for key in 1..n {
            links.link(0, key);
        }
        links
    }
}

impl LinkSource for MapLinks {
    fn links_of(&self, identity: &Identity, _reference: &str) -> Vec<ObjectRef> {
        self.links.get(identity).cloned().unwrap_or_default()
    }
}
