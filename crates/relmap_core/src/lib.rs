//! # RelMap Core
//!
//! Transactional unit-of-work core for RelMap.
//!
//! This crate coordinates how in-memory objects become row writes: it
//! tracks object identity, modification state, and reference links
//! inside a transaction scope, and turns the tracked set into a
//! constraint-safe sequence of store operations at commit.
//!
//! ## Components
//!
//! - [`IdentityMap`] - one instance per `(table, key)` identity per scope
//! - [`ModificationState`] / [`StateTable`] - the tracked-object state machine
//! - [`MetadataRepository`] - reference templates and cascade policies
//! - [`expand`] / [`order`] - reference-graph expansion and dependency ordering
//! - [`LockManager`] - fail-fast per-object read/write locks
//! - [`TransactionManager`] - checkpoint / commit / abort over a row store
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use relmap_core::{Identity, MetadataRepository, TableDescriptor, TransactionManager};
//! use relmap_store::{InMemoryStore, RowImage, RowKey, TableId, Value};
//!
//! let metadata = Arc::new(MetadataRepository::new());
//! metadata.register_table(TableDescriptor::new(TableId::new(1), "person"));
//! let manager = TransactionManager::new(Arc::new(InMemoryStore::new()), metadata);
//!
//! let mut txn = manager.begin();
//! let mut row = RowImage::new();
//! row.set("name", Value::text("ada"));
//! let identity = Identity::new(TableId::new(1), RowKey::from_i64(1));
//! manager.mark_for_insert(&mut txn, identity.clone(), row).unwrap();
//! manager.commit(&mut txn).unwrap();
//!
//! let mut reader = manager.begin();
//! assert!(manager.find(&mut reader, &identity).unwrap().is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod error;
mod graph;
mod identity;
mod identity_map;
mod lock;
mod metadata;
mod object;
mod ordering;
mod reference;
mod state;
mod transaction;
mod types;

pub use cache::ObjectCache;
pub use error::{CoreError, CoreResult};
pub use graph::{expand, Direction, GraphEdge, LinkSource, ReferenceGraph};
pub use identity::Identity;
pub use identity_map::IdentityMap;
pub use lock::{LockKind, LockManager};
pub use metadata::{
    Cardinality, CascadePolicy, MetadataRepository, ReferenceTemplate, TableDescriptor,
};
pub use object::{new_handle, ObjectHandle, TrackedObject};
pub use ordering::order;
pub use reference::ObjectRef;
pub use state::{transition, ModificationState, StateEvent, StateTable};
pub use transaction::{Transaction, TransactionManager, TxState};
pub use types::{TransactionId, VersionStamp};
