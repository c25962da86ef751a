//! Transaction handle and per-transaction state.

use crate::error::{CoreError, CoreResult};
use crate::graph::LinkSource;
use crate::identity::Identity;
use crate::identity_map::IdentityMap;
use crate::reference::ObjectRef;
use crate::state::StateTable;
use crate::types::TransactionId;
use std::fmt;

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been aborted.
    Aborted,
}

/// An unlink registered inside the transaction, flushed as a
/// foreign-key-null update at the next checkpoint.
#[derive(Debug, Clone)]
pub(crate) struct PendingUnlink {
    pub owner: Identity,
    pub reference: String,
    pub target: Identity,
}

/// A transaction scope.
///
/// Each transaction owns an isolated identity map and tracked-object
/// side table; nothing here is shared across transactions. All
/// operations go through [`super::TransactionManager`].
pub struct Transaction {
    id: TransactionId,
    state: TxState,
    pub(crate) identity_map: IdentityMap,
    pub(crate) states: StateTable,
    pub(crate) pending_unlinks: Vec<PendingUnlink>,
    /// Identities written or deleted by this transaction, for cache
    /// invalidation at commit.
    pub(crate) touched: Vec<Identity>,
    /// True once a store statement bracket has been opened by a flush.
    pub(crate) store_txn_open: bool,
    ordering_enabled: bool,
    implicit_locking_enabled: bool,
}

impl Transaction {
    pub(crate) fn new(id: TransactionId) -> Self {
        Self {
            id,
            state: TxState::Active,
            identity_map: IdentityMap::new(),
            states: StateTable::new(),
            pending_unlinks: Vec::new(),
            touched: Vec::new(),
            store_txn_open: false,
            ordering_enabled: true,
            implicit_locking_enabled: true,
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> TxState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TxState::Active
    }

    /// Enables or disables automatic insert/delete ordering.
    ///
    /// With ordering disabled the caller takes manual responsibility for
    /// flush order: rows are written and removed in registration order.
    pub fn set_ordering_enabled(&mut self, enabled: bool) {
        self.ordering_enabled = enabled;
    }

    /// Returns true if automatic ordering is enabled.
    #[must_use]
    pub fn ordering_enabled(&self) -> bool {
        self.ordering_enabled
    }

    /// Enables or disables implicit per-object locking.
    ///
    /// With implicit locking disabled, `lock()` must be called explicitly
    /// before a dirty object is accepted at flush time.
    pub fn set_implicit_locking_enabled(&mut self, enabled: bool) {
        self.implicit_locking_enabled = enabled;
    }

    /// Returns true if implicit locking is enabled.
    #[must_use]
    pub fn implicit_locking_enabled(&self) -> bool {
        self.implicit_locking_enabled
    }

    /// Returns the number of tracked objects.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.identity_map.len()
    }

    pub(crate) fn ensure_active(&self) -> CoreResult<()> {
        match self.state {
            TxState::Active => Ok(()),
            TxState::Committed => Err(CoreError::invalid_operation(
                "transaction already committed",
            )),
            TxState::Aborted => Err(CoreError::invalid_operation("transaction already aborted")),
        }
    }

    pub(crate) fn mark_committed(&mut self) {
        self.state = TxState::Committed;
    }

    pub(crate) fn mark_aborted(&mut self) {
        self.state = TxState::Aborted;
    }
}

impl LinkSource for Transaction {
    fn links_of(&self, identity: &Identity, reference: &str) -> Vec<ObjectRef> {
        self.identity_map
            .lookup(identity)
            .map(|tracked| tracked.links_of(reference).to_vec())
            .unwrap_or_default()
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("tracked", &self.identity_map.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_transaction_is_active() {
        let txn = Transaction::new(TransactionId::new(1));
        assert!(txn.is_active());
        assert_eq!(txn.state(), TxState::Active);
        assert_eq!(txn.tracked_count(), 0);
    }

    #[test]
    fn flags_default_on() {
        let txn = Transaction::new(TransactionId::new(1));
        assert!(txn.ordering_enabled());
        assert!(txn.implicit_locking_enabled());
    }

    #[test]
    fn flags_can_be_toggled() {
        let mut txn = Transaction::new(TransactionId::new(1));
        txn.set_ordering_enabled(false);
        txn.set_implicit_locking_enabled(false);
        assert!(!txn.ordering_enabled());
        assert!(!txn.implicit_locking_enabled());
    }

    #[test]
    fn ensure_active_rejects_finished_states() {
        let mut txn = Transaction::new(TransactionId::new(1));
        txn.mark_committed();
        assert!(txn.ensure_active().is_err());

        let mut txn = Transaction::new(TransactionId::new(2));
        txn.mark_aborted();
        assert!(txn.ensure_active().is_err());
    }
}
