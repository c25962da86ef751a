//! Test fixtures and manager helpers.
//!
//! Provides a canonical schema and convenience functions for setting up
//! a transaction manager over an in-memory store.

use relmap_core::{
    Cardinality, CoreResult, Identity, MetadataRepository, ObjectHandle, ReferenceTemplate,
    TableDescriptor, Transaction, TransactionManager,
};
use relmap_store::{InMemoryStore, RowImage, RowKey, RowStore, TableId, Value};
use std::sync::Arc;

/// Table of people in the canonical test schema.
pub const PEOPLE: TableId = TableId::new(1);
/// Table of projects owned by people.
pub const PROJECTS: TableId = TableId::new(2);
/// Table of tasks belonging to projects.
pub const TASKS: TableId = TableId::new(3);

/// Builds the canonical test schema.
///
/// - `people` carries a `version` column for optimistic locking and a
///   self-referencing `manager` reference
/// - `people -> projects` is a one-to-many named `projects` with foreign
///   key `owner_id`
/// - `projects -> tasks` is a one-to-many named `tasks` with foreign key
///   `project_id`
///
/// All cascade policies default to NONE; tests override per scenario.
pub fn canonical_metadata() -> Arc<MetadataRepository> {
    let metadata = MetadataRepository::new();
    metadata.register_table(TableDescriptor::new(PEOPLE, "people").version_field("version"));
    metadata.register_table(TableDescriptor::new(PROJECTS, "projects"));
    metadata.register_table(TableDescriptor::new(TASKS, "tasks"));
    metadata.register_reference(
        ReferenceTemplate::new("projects", PEOPLE, PROJECTS, Cardinality::OneToMany)
            .foreign_key("owner_id"),
    );
    metadata.register_reference(
        ReferenceTemplate::new("manager", PEOPLE, PEOPLE, Cardinality::SelfReferencing)
            .foreign_key("manager_id"),
    );
    metadata.register_reference(
        ReferenceTemplate::new("tasks", PROJECTS, TASKS, Cardinality::OneToMany)
            .foreign_key("project_id"),
    );
    Arc::new(metadata)
}

/// A transaction manager over a fresh in-memory store, pre-wired with
/// the canonical schema.
pub struct TestHarness {
    /// The manager under test.
    pub manager: TransactionManager,
    /// The backing store, kept for direct row assertions.
    pub store: Arc<InMemoryStore>,
}

impl TestHarness {
    /// Creates a harness with the canonical schema.
    #[must_use]
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            manager: TransactionManager::new(store.clone(), canonical_metadata()),
            store,
        }
    }

    /// Creates a harness with a caller-supplied schema.
    #[must_use]
    pub fn with_metadata(metadata: Arc<MetadataRepository>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            manager: TransactionManager::new(store.clone(), metadata),
            store,
        }
    }

    /// Writes a row directly to the store, bypassing the manager.
    pub fn seed(&self, identity: &Identity, image: RowImage) {
        self.store
            .write(identity.table(), identity.key(), image)
            .expect("seed write failed");
    }

    /// Reads a row directly from the store.
    #[must_use]
    pub fn stored(&self, identity: &Identity) -> Option<RowImage> {
        self.store
            .read(identity.table(), identity.key())
            .expect("store read failed")
    }

    /// Registers a named person row for insert.
    pub fn insert_person(&self, txn: &mut Transaction, key: i64, name: &str) -> ObjectHandle {
        self.manager
            .mark_for_insert(txn, person(key), named_row(name))
            .expect("insert failed")
    }

    /// Registers a named project row for insert.
    pub fn insert_project(&self, txn: &mut Transaction, key: i64, name: &str) -> ObjectHandle {
        self.manager
            .mark_for_insert(txn, project(key), named_row(name))
            .expect("insert failed")
    }

    /// Registers a named task row for insert.
    pub fn insert_task(&self, txn: &mut Transaction, key: i64, name: &str) -> ObjectHandle {
        self.manager
            .mark_for_insert(txn, task(key), named_row(name))
            .expect("insert failed")
    }

    /// Commits a transaction, surfacing the manager's error unchanged.
    pub fn commit(&self, txn: &mut Transaction) -> CoreResult<()> {
        self.manager.commit(txn)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestHarness {
    type Target = TransactionManager;

    fn deref(&self) -> &Self::Target {
        &self.manager
    }
}

/// Identity of a person row.
#[must_use]
pub fn person(key: i64) -> Identity {
    Identity::new(PEOPLE, RowKey::from_i64(key))
}

/// Identity of a project row.
#[must_use]
pub fn project(key: i64) -> Identity {
    Identity::new(PROJECTS, RowKey::from_i64(key))
}

/// Identity of a task row.
#[must_use]
pub fn task(key: i64) -> Identity {
    Identity::new(TASKS, RowKey::from_i64(key))
}

/// A single-field row image carrying a name column.
#[must_use]
pub fn named_row(name: &str) -> RowImage {
    let mut image = RowImage::new();
    image.set("name", Value::text(name));
    image
}
