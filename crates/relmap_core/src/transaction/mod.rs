//! Transaction coordination.
//!
//! A RelMap transaction owns an isolated identity-map scope and tracked
//! object set. The coordinator orchestrates begin / checkpoint / commit /
//! abort: it expands the reference graph along cascade-eligible edges,
//! asks the dependency orderer for a constraint-safe sequence, confirms
//! locks with the lock manager, and delegates the actual row I/O to the
//! store collaborator in the computed order.
//!
//! On commit, locks release and tracked objects transition to
//! persistent-clean; on abort, all in-memory state reverts and the open
//! store bracket is rolled back.

mod handle;
mod manager;

pub use handle::{Transaction, TxState};
pub use manager::TransactionManager;
