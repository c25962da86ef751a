//! # RelMap Testkit
//!
//! Test utilities for RelMap.
//!
//! This crate provides:
//! - A canonical test schema and pre-wired manager harness
//! - Scenario builders for tree, cyclic, and self-referencing graphs
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use relmap_testkit::prelude::*;
//!
//! let harness = TestHarness::new();
//! let mut txn = harness.begin();
//! let person = harness.insert_person(&mut txn, 1, "ada");
//! assert!(person.read().get("name").is_some());
//! harness.commit(&mut txn).unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod scenarios;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::scenarios::*;
}

pub use fixtures::*;
pub use generators::*;
pub use scenarios::*;
