//! Lock manager.
//!
//! Grants and releases per-object, per-transaction locks and answers
//! lock-state queries. The lock table is sharded by identity hash so
//! unrelated transactions never contend on one global mutex.
//!
//! Policy is fail-fast: a denied lock returns immediately, it never
//! blocks. Retry and backoff belong to the embedding.

use crate::identity::Identity;
use crate::types::TransactionId;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Kind of lock held on one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKind {
    /// Shared read lock. Coexists with other read locks.
    Read,
    /// Exclusive write lock.
    Write,
    /// Exclusive lock taken over the caller's own read lock.
    Upgrade,
}

impl LockKind {
    /// Returns true if the kind excludes all other transactions.
    #[must_use]
    pub const fn is_exclusive(self) -> bool {
        matches!(self, Self::Write | Self::Upgrade)
    }
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
            Self::Upgrade => f.write_str("upgrade"),
        }
    }
}

/// Lock state of one identity.
#[derive(Debug, Default)]
struct LockSlot {
    /// Holder of the exclusive lock, if any.
    writer: Option<TransactionId>,
    /// Holders of shared read locks.
    readers: HashSet<TransactionId>,
}

impl LockSlot {
    fn is_free(&self) -> bool {
        self.writer.is_none() && self.readers.is_empty()
    }
}

const SHARD_COUNT: usize = 16;

/// Per-object, per-transaction lock manager.
///
/// Invariants:
/// - at most one Write/Upgrade holder per identity across all transactions
/// - Read locks are shared, but exclude an exclusive lock held elsewhere
/// - re-acquiring a kind the transaction already holds (or a weaker kind
///   under a stronger one) succeeds without changing lock state
#[derive(Debug)]
pub struct LockManager {
    shards: Vec<Mutex<HashMap<Identity, LockSlot>>>,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LockManager {
    /// Creates a lock manager with the default shard count.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, identity: &Identity) -> &Mutex<HashMap<Identity, LockSlot>> {
        let mut hasher = DefaultHasher::new();
        identity.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        &self.shards[index]
    }

    /// Attempts to acquire a lock. Fail-fast: never blocks.
    ///
    /// Returns `Ok(true)` if granted (or already held), `Err(holder)` with
    /// the conflicting transaction if denied.
    pub fn acquire(
        &self,
        txid: TransactionId,
        identity: &Identity,
        kind: LockKind,
    ) -> Result<bool, TransactionId> {
        let mut shard = self.shard(identity).lock();
        let slot = shard.entry(identity.clone()).or_default();

        match kind {
            LockKind::Read => {
                if let Some(writer) = slot.writer {
                    if writer != txid {
                        return Err(writer);
                    }
                    // Own exclusive lock is stronger than the requested
                    // read; nothing to do.
                    return Ok(true);
                }
                slot.readers.insert(txid);
                Ok(true)
            }
            LockKind::Write | LockKind::Upgrade => {
                if let Some(writer) = slot.writer {
                    if writer != txid {
                        return Err(writer);
                    }
                    return Ok(true);
                }
                if let Some(&other) = slot.readers.iter().find(|&&reader| reader != txid) {
                    return Err(other);
                }
                // Upgrade consumes the caller's own read lock.
                slot.readers.remove(&txid);
                slot.writer = Some(txid);
                Ok(true)
            }
        }
    }

    /// Releases whatever lock the transaction holds on an identity.
    ///
    /// Returns true if a lock was actually released.
    pub fn release(&self, txid: TransactionId, identity: &Identity) -> bool {
        let mut shard = self.shard(identity).lock();
        let Some(slot) = shard.get_mut(identity) else {
            return false;
        };
        let mut released = false;
        if slot.writer == Some(txid) {
            slot.writer = None;
            released = true;
        }
        released |= slot.readers.remove(&txid);
        if slot.is_free() {
            shard.remove(identity);
        }
        released
    }

    /// Releases every lock held by a transaction.
    pub fn release_all(&self, txid: TransactionId) {
        for shard in &self.shards {
            let mut shard = shard.lock();
            shard.retain(|_, slot| {
                if slot.writer == Some(txid) {
                    slot.writer = None;
                }
                slot.readers.remove(&txid);
                !slot.is_free()
            });
        }
    }

    /// Returns true if the transaction holds at least the given kind.
    #[must_use]
    pub fn check(&self, txid: TransactionId, identity: &Identity, kind: LockKind) -> bool {
        let shard = self.shard(identity).lock();
        let Some(slot) = shard.get(identity) else {
            return false;
        };
        match kind {
            LockKind::Read => slot.writer == Some(txid) || slot.readers.contains(&txid),
            LockKind::Write | LockKind::Upgrade => slot.writer == Some(txid),
        }
    }

    /// Returns the exclusive holder of an identity, if any.
    #[must_use]
    pub fn exclusive_holder(&self, identity: &Identity) -> Option<TransactionId> {
        self.shard(identity).lock().get(identity).and_then(|slot| slot.writer)
    }

    /// Returns the number of identities with any lock held.
    #[must_use]
    pub fn locked_count(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmap_store::{RowKey, TableId};

    fn identity(n: i64) -> Identity {
        Identity::new(TableId::new(1), RowKey::from_i64(n))
    }

    #[test]
    fn write_lock_is_exclusive_across_transactions() {
        let locks = LockManager::new();
        let id = identity(1);

        assert!(locks.acquire(TransactionId::new(1), &id, LockKind::Write).is_ok());
        let denied = locks.acquire(TransactionId::new(2), &id, LockKind::Write);
        assert_eq!(denied, Err(TransactionId::new(1)));
    }

    #[test]
    fn re_lock_same_kind_is_noop() {
        let locks = LockManager::new();
        let id = identity(1);
        let tx = TransactionId::new(1);

        assert!(locks.acquire(tx, &id, LockKind::Write).is_ok());
        assert!(locks.acquire(tx, &id, LockKind::Write).is_ok());
        assert_eq!(locks.locked_count(), 1);
    }

    #[test]
    fn weaker_lock_under_stronger_is_noop() {
        let locks = LockManager::new();
        let id = identity(1);
        let tx = TransactionId::new(1);

        assert!(locks.acquire(tx, &id, LockKind::Write).is_ok());
        assert!(locks.acquire(tx, &id, LockKind::Read).is_ok());
        assert!(locks.check(tx, &id, LockKind::Write));
    }

    #[test]
    fn read_locks_are_shared() {
        let locks = LockManager::new();
        let id = identity(1);

        assert!(locks.acquire(TransactionId::new(1), &id, LockKind::Read).is_ok());
        assert!(locks.acquire(TransactionId::new(2), &id, LockKind::Read).is_ok());
    }

    #[test]
    fn read_lock_excludes_foreign_writer() {
        let locks = LockManager::new();
        let id = identity(1);

        assert!(locks.acquire(TransactionId::new(1), &id, LockKind::Write).is_ok());
        assert!(locks.acquire(TransactionId::new(2), &id, LockKind::Read).is_err());
    }

    #[test]
    fn upgrade_over_own_read_succeeds() {
        let locks = LockManager::new();
        let id = identity(1);
        let tx = TransactionId::new(1);

        assert!(locks.acquire(tx, &id, LockKind::Read).is_ok());
        assert!(locks.acquire(tx, &id, LockKind::Upgrade).is_ok());
        assert!(locks.check(tx, &id, LockKind::Write));
    }

    #[test]
    fn upgrade_denied_when_other_reader_exists() {
        let locks = LockManager::new();
        let id = identity(1);

        assert!(locks.acquire(TransactionId::new(1), &id, LockKind::Read).is_ok());
        assert!(locks.acquire(TransactionId::new(2), &id, LockKind::Read).is_ok());
        assert!(locks.acquire(TransactionId::new(1), &id, LockKind::Upgrade).is_err());
    }

    #[test]
    fn release_frees_the_slot() {
        let locks = LockManager::new();
        let id = identity(1);
        let tx1 = TransactionId::new(1);
        let tx2 = TransactionId::new(2);

        assert!(locks.acquire(tx1, &id, LockKind::Write).is_ok());
        assert!(locks.release(tx1, &id));
        assert!(locks.acquire(tx2, &id, LockKind::Write).is_ok());
    }

    #[test]
    fn release_all_frees_every_lock_of_transaction() {
        let locks = LockManager::new();
        let tx = TransactionId::new(1);

        for n in 0..20 {
            assert!(locks.acquire(tx, &identity(n), LockKind::Write).is_ok());
        }
        assert_eq!(locks.locked_count(), 20);

        locks.release_all(tx);
        assert_eq!(locks.locked_count(), 0);
    }

    #[test]
    fn release_all_keeps_other_transactions_locks() {
        let locks = LockManager::new();
        let id = identity(1);
        let other = identity(2);

        assert!(locks.acquire(TransactionId::new(1), &id, LockKind::Write).is_ok());
        assert!(locks.acquire(TransactionId::new(2), &other, LockKind::Write).is_ok());

        locks.release_all(TransactionId::new(1));
        assert!(locks.check(TransactionId::new(2), &other, LockKind::Write));
        assert_eq!(locks.locked_count(), 1);
    }

    #[test]
    fn check_reports_held_kind() {
        let locks = LockManager::new();
        let id = identity(1);
        let tx = TransactionId::new(1);

        assert!(!locks.check(tx, &id, LockKind::Read));
        assert!(locks.acquire(tx, &id, LockKind::Read).is_ok());
        assert!(locks.check(tx, &id, LockKind::Read));
        assert!(!locks.check(tx, &id, LockKind::Write));
    }
}
