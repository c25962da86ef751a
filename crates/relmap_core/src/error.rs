//! Error types for the RelMap core.

use crate::identity::Identity;
use crate::types::{TransactionId, VersionStamp};
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in RelMap core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Two different object instances claim the same identity.
    ///
    /// This is a programmer error and is never retried.
    #[error("identity conflict: a different instance is already registered for {identity}")]
    IdentityConflict {
        /// The contested identity.
        identity: Identity,
    },

    /// A constrained reference cycle has no valid write/delete order.
    ///
    /// Surfaced at plan time; the owning transaction stays Active so the
    /// caller can break the cycle (null one reference) and retry.
    #[error("unorderable cycle over {} constrained object(s)", members.len())]
    UnorderableCycle {
        /// The identities participating in the cycle, in discovery order.
        members: Vec<Identity>,
    },

    /// A write or upgrade lock is already held by another transaction.
    #[error("lock not granted on {identity}: held by {holder}")]
    LockNotGranted {
        /// The identity that could not be locked.
        identity: Identity,
        /// The transaction currently holding the conflicting lock.
        holder: TransactionId,
    },

    /// Version-stamp mismatch detected at commit time.
    ///
    /// This is the one recoverable-by-retry failure: re-read, re-apply,
    /// re-commit.
    #[error("optimistic conflict on {identity}: expected version {expected}, found {found}")]
    OptimisticConflict {
        /// The identity whose version stamp no longer matches.
        identity: Identity,
        /// The version recorded when the write lock was taken.
        expected: VersionStamp,
        /// The version currently stored.
        found: VersionStamp,
    },

    /// The object was already deleted inside this transaction.
    ///
    /// `PersistentDeleted` is terminal for the scope.
    #[error("object already deleted in this transaction: {identity}")]
    ObjectDeleted {
        /// The deleted identity.
        identity: Identity,
    },

    /// A state-machine event is not legal in the current state.
    #[error("invalid state transition: {event} in state {state}")]
    InvalidTransition {
        /// The current modification state.
        state: &'static str,
        /// The rejected event.
        event: String,
    },

    /// Operation not permitted in the current transaction state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// The store collaborator failed, tagged with the identity being
    /// operated on for diagnostics.
    #[error("store error on {identity}: {source}")]
    Store {
        /// The identity that was being read, written, or deleted.
        identity: Identity,
        /// The underlying store failure.
        source: relmap_store::StoreError,
    },

    /// The store collaborator failed outside any single-row operation
    /// (opening, committing, or rolling back a statement bracket).
    #[error("store transaction error: {source}")]
    StoreTx {
        /// The underlying store failure.
        source: relmap_store::StoreError,
    },
}

impl CoreError {
    /// Creates an identity conflict error.
    #[must_use]
    pub fn identity_conflict(identity: Identity) -> Self {
        Self::IdentityConflict { identity }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Wraps a store failure with the identity being operated on.
    #[must_use]
    pub fn store(identity: Identity, source: relmap_store::StoreError) -> Self {
        Self::Store { identity, source }
    }

    /// Returns true if this failure is recoverable by re-read and retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::OptimisticConflict { .. })
    }

    /// Returns true if this failure leaves the transaction Active.
    ///
    /// An unorderable cycle is surfaced at plan time, before any row
    /// I/O, so the caller can break the cycle and retry.
    #[must_use]
    pub fn leaves_transaction_active(&self) -> bool {
        matches!(self, Self::UnorderableCycle { .. })
    }

    /// Returns true if this failure forces the owning transaction into
    /// Aborted with full lock release.
    ///
    /// Programmer errors (`InvalidOperation`, `InvalidTransition`,
    /// `ObjectDeleted`) fail fast without tearing the transaction down;
    /// an unorderable cycle leaves it Active for cycle-breaking.
    #[must_use]
    pub fn forces_abort(&self) -> bool {
        matches!(
            self,
            Self::IdentityConflict { .. }
                | Self::LockNotGranted { .. }
                | Self::OptimisticConflict { .. }
                | Self::Store { .. }
                | Self::StoreTx { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmap_store::{RowKey, TableId};

    fn identity() -> Identity {
        Identity::new(TableId::new(1), RowKey::from_i64(1))
    }

    #[test]
    fn optimistic_conflict_is_retryable() {
        let err = CoreError::OptimisticConflict {
            identity: identity(),
            expected: VersionStamp::new(4),
            found: VersionStamp::new(5),
        };
        assert!(err.is_retryable());
        assert!(!err.leaves_transaction_active());
    }

    #[test]
    fn unorderable_cycle_leaves_transaction_active() {
        let err = CoreError::UnorderableCycle {
            members: vec![identity()],
        };
        assert!(err.leaves_transaction_active());
        assert!(!err.is_retryable());
    }

    #[test]
    fn lock_not_granted_is_not_retryable() {
        let err = CoreError::LockNotGranted {
            identity: identity(),
            holder: TransactionId::new(2),
        };
        assert!(!err.is_retryable());
    }
}
