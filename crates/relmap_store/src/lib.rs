//! # RelMap Store
//!
//! Row store collaborator surface for RelMap.
//!
//! This crate defines the lowest-level persistence abstraction the
//! unit-of-work core talks to. A row store is a **flat keyed row space**:
//! it reads, writes, and deletes single rows given a `(TableId, RowKey)`
//! address, and supports a multi-statement begin/commit/rollback bracket.
//!
//! ## Design Principles
//!
//! - Stores hold materialized [`RowImage`]s keyed by table and primary key
//! - No knowledge of object graphs, cascade policies, or lock state -
//!   the core owns all of that
//! - Must be `Send + Sync` for concurrent access from multiple transactions
//! - SQL generation, dialects, and connection pooling live behind
//!   implementations of [`RowStore`], never in front of it
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral embedding
//!
//! ## Example
//!
//! ```rust
//! use relmap_store::{InMemoryStore, RowImage, RowKey, RowStore, TableId, Value};
//!
//! let store = InMemoryStore::new();
//! let table = TableId::new(1);
//! let key = RowKey::from_i64(7);
//! let mut row = RowImage::new();
//! row.set("name", Value::text("widget"));
//! store.write(table, &key, row).unwrap();
//! assert!(store.read(table, &key).unwrap().is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod memory;
mod row;
mod store;
mod value;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use row::{RowImage, RowKey, TableId};
pub use store::RowStore;
pub use value::Value;
