//! Transaction manager.

use crate::cache::ObjectCache;
use crate::error::{CoreError, CoreResult};
use crate::graph::{expand, Direction, LinkSource, ReferenceGraph};
use crate::identity::Identity;
use crate::lock::{LockKind, LockManager};
use crate::metadata::{Cardinality, CascadePolicy, MetadataRepository, ReferenceTemplate};
use crate::object::{new_handle, ObjectHandle};
use crate::ordering::order;
use crate::reference::ObjectRef;
use crate::state::{ModificationState, StateEvent};
use crate::transaction::handle::{PendingUnlink, Transaction, TxState};
use crate::types::{TransactionId, VersionStamp};
use relmap_store::{RowImage, RowStore, TableId, Value};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Coordinates transactions over a row store.
///
/// The manager owns the shared collaborators - lock manager, metadata
/// repository, optional object cache, and the store - while each
/// [`Transaction`] owns its isolated identity-map scope. The manager
/// provides:
///
/// - registration of objects for insert, update, and delete
/// - cascade-aware reference-graph expansion at flush time
/// - constraint-safe write and delete ordering
/// - pessimistic locks plus optimistic version checks at commit
/// - the checkpoint / commit / abort protocol
///
/// All public operations take `&mut Transaction`; a failed operation
/// that belongs to the error taxonomy (identity conflict, denied lock,
/// optimistic conflict, store failure) forces the transaction into
/// Aborted with full lock release. An unorderable cycle leaves it
/// Active so the caller can break the cycle and retry.
pub struct TransactionManager {
    store: Arc<dyn RowStore>,
    metadata: Arc<MetadataRepository>,
    locks: Arc<LockManager>,
    cache: Option<Arc<ObjectCache>>,
    next_txid: AtomicU64,
}

impl TransactionManager {
    /// Creates a manager without a shared object cache.
    pub fn new(store: Arc<dyn RowStore>, metadata: Arc<MetadataRepository>) -> Self {
        Self {
            store,
            metadata,
            locks: Arc::new(LockManager::new()),
            cache: None,
            next_txid: AtomicU64::new(1),
        }
    }

    /// Creates a manager with a shared read-through object cache.
    pub fn with_cache(
        store: Arc<dyn RowStore>,
        metadata: Arc<MetadataRepository>,
        cache: Arc<ObjectCache>,
    ) -> Self {
        Self {
            cache: Some(cache),
            ..Self::new(store, metadata)
        }
    }

    /// Returns the metadata repository.
    #[must_use]
    pub fn metadata(&self) -> &MetadataRepository {
        &self.metadata
    }

    /// Returns the lock manager.
    #[must_use]
    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// Overrides the cascade policies of one declared reference.
    ///
    /// Takes effect on the next graph expansion of any transaction.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the reference is not declared.
    pub fn set_cascade_policy(
        &self,
        table: TableId,
        reference: &str,
        on_insert: CascadePolicy,
        on_delete: CascadePolicy,
    ) -> CoreResult<()> {
        self.metadata
            .set_cascade_policy(table, reference, on_insert, on_delete)
    }

    /// Begins a new transaction with a fresh identity-map scope.
    pub fn begin(&self) -> Transaction {
        let id = TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst));
        debug!(txid = id.as_u64(), "begin transaction");
        Transaction::new(id)
    }

    /// Looks up an object by identity.
    ///
    /// Resolution order: this transaction's identity map, then the
    /// shared cache (if configured), then the store. A store hit is
    /// registered in the identity map, so two lookups of one identity
    /// return pointer-equal handles.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ObjectDeleted`] if the identity was deleted
    /// inside this transaction, or a store error on read failure.
    pub fn find(&self, tx: &mut Transaction, identity: &Identity) -> CoreResult<Option<ObjectHandle>> {
        tx.ensure_active()?;

        if let Some(state) = tx.states.state_of(identity) {
            if state == ModificationState::PersistentDeleted {
                return Err(CoreError::ObjectDeleted {
                    identity: identity.clone(),
                });
            }
            return Ok(tx.identity_map.lookup(identity).map(|t| t.handle().clone()));
        }

        let cached = self.cache.as_ref().and_then(|cache| cache.get(identity));
        let image = match cached {
            Some(image) => Some(image),
            None => {
                let loaded = match self.store.read(identity.table(), identity.key()) {
                    Ok(loaded) => loaded,
                    Err(err) => return Err(self.fail(tx, CoreError::store(identity.clone(), err))),
                };
                if let (Some(cache), Some(image)) = (&self.cache, &loaded) {
                    cache.put(identity.clone(), image.clone());
                }
                loaded
            }
        };

        let Some(image) = image else {
            return Ok(None);
        };
        let handle = new_handle(image);
        self.track_persistent(tx, identity.clone(), handle.clone())?;
        Ok(Some(handle))
    }

    /// Resolves a reference, materializing a lazy proxy on demand.
    ///
    /// Materialization goes through [`Self::find`], so the identity-map
    /// invariant holds for proxied objects too.
    pub fn resolve(&self, tx: &mut Transaction, reference: &ObjectRef) -> CoreResult<Option<ObjectHandle>> {
        match reference {
            ObjectRef::Materialized { handle, .. } => Ok(Some(handle.clone())),
            ObjectRef::Lazy { identity } => self.find(tx, identity),
        }
    }

    /// Registers a new object for insert.
    ///
    /// Returns the tracked handle. With implicit locking enabled the
    /// object is write-locked immediately.
    pub fn mark_for_insert(
        &self,
        tx: &mut Transaction,
        identity: Identity,
        image: RowImage,
    ) -> CoreResult<ObjectHandle> {
        tx.ensure_active()?;
        let handle = new_handle(image);
        match self.register_insert(tx, identity, handle.clone()) {
            Ok(()) => Ok(handle),
            Err(err) => Err(self.fail(tx, err)),
        }
    }

    fn register_insert(
        &self,
        tx: &mut Transaction,
        identity: Identity,
        handle: ObjectHandle,
    ) -> CoreResult<()> {
        if tx.states.state_of(&identity) == Some(ModificationState::PersistentDeleted) {
            return Err(CoreError::ObjectDeleted { identity });
        }
        tx.identity_map.register(identity.clone(), handle)?;
        if tx.states.state_of(&identity).is_none() {
            tx.states.track(identity.clone(), ModificationState::TransientClean);
        }
        tx.states.apply(&identity, StateEvent::MarkDirty)?;
        self.capture_snapshot(tx, &identity);
        if tx.implicit_locking_enabled() {
            self.ensure_write_lock(tx, &identity)?;
        }
        Ok(())
    }

    /// Marks a tracked object as modified.
    ///
    /// Idempotent: marking a dirty object dirty again is a no-op.
    pub fn mark_dirty(&self, tx: &mut Transaction, identity: &Identity) -> CoreResult<()> {
        tx.ensure_active()?;
        if tx.states.state_of(identity) == Some(ModificationState::PersistentDeleted) {
            return Err(CoreError::ObjectDeleted {
                identity: identity.clone(),
            });
        }
        if tx.states.state_of(identity).is_none() {
            return Err(CoreError::invalid_operation(format!(
                "cannot mark untracked object dirty: {identity}"
            )));
        }
        tx.states.apply(identity, StateEvent::MarkDirty)?;
        if tx.implicit_locking_enabled() {
            if let Err(err) = self.ensure_write_lock(tx, identity) {
                return Err(self.fail(tx, err));
            }
        }
        Ok(())
    }

    /// Registers a persisted object for delete.
    ///
    /// The object is read through the identity map (or the store, if not
    /// yet tracked). `PersistentDeleted` is terminal: any further
    /// reference to the identity inside this transaction is an error.
    pub fn mark_for_delete(&self, tx: &mut Transaction, identity: &Identity) -> CoreResult<()> {
        tx.ensure_active()?;
        match self.register_delete(tx, identity) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(tx, err)),
        }
    }

    fn register_delete(&self, tx: &mut Transaction, identity: &Identity) -> CoreResult<()> {
        match tx.states.state_of(identity) {
            Some(ModificationState::PersistentDeleted) => {
                return Err(CoreError::ObjectDeleted {
                    identity: identity.clone(),
                })
            }
            Some(_) => {}
            None => {
                if self.find(tx, identity)?.is_none() {
                    return Err(CoreError::invalid_operation(format!(
                        "cannot delete unknown object: {identity}"
                    )));
                }
            }
        }
        if tx.implicit_locking_enabled() {
            self.ensure_write_lock(tx, identity)?;
        } else if !self.locks.check(tx.id(), identity, LockKind::Write) {
            return Err(CoreError::invalid_operation(format!(
                "implicit locking disabled: {identity} must be write-locked before delete"
            )));
        }
        tx.states.apply(identity, StateEvent::MarkDeleted)?;
        Ok(())
    }

    /// Acquires a lock on an object, reading it through if untracked.
    ///
    /// Re-locking with the same or a weaker kind is a no-op; duplicate
    /// `lock()` calls never create duplicate bookkeeping or duplicate
    /// writes.
    pub fn lock(
        &self,
        tx: &mut Transaction,
        identity: &Identity,
        kind: LockKind,
    ) -> CoreResult<ObjectHandle> {
        tx.ensure_active()?;
        let Some(handle) = self.find(tx, identity)? else {
            return Err(CoreError::invalid_operation(format!(
                "cannot lock unknown object: {identity}"
            )));
        };
        match self.lock_tracked(tx, identity, kind) {
            Ok(()) => Ok(handle),
            Err(err) => Err(self.fail(tx, err)),
        }
    }

    /// Acquires a lock on a caller-supplied (possibly detached) instance.
    ///
    /// The instance is registered in the identity map first, so a
    /// different instance already tracked under the identity surfaces as
    /// an identity conflict.
    pub fn lock_handle(
        &self,
        tx: &mut Transaction,
        identity: Identity,
        handle: ObjectHandle,
        kind: LockKind,
    ) -> CoreResult<()> {
        tx.ensure_active()?;
        let result = (|| {
            if tx.states.state_of(&identity) == Some(ModificationState::PersistentDeleted) {
                return Err(CoreError::ObjectDeleted { identity: identity.clone() });
            }
            tx.identity_map.register(identity.clone(), handle)?;
            if tx.states.state_of(&identity).is_none() {
                tx.states
                    .track(identity.clone(), ModificationState::PersistentClean);
            }
            self.lock_tracked(tx, &identity, kind)
        })();
        match result {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(tx, err)),
        }
    }

    fn lock_tracked(&self, tx: &mut Transaction, identity: &Identity, kind: LockKind) -> CoreResult<()> {
        tx.states.apply(identity, StateEvent::Lock(kind))?;
        match self.locks.acquire(tx.id(), identity, kind) {
            Ok(_) => {
                if kind.is_exclusive() {
                    self.capture_snapshot(tx, identity);
                }
                Ok(())
            }
            Err(holder) => Err(CoreError::LockNotGranted {
                identity: identity.clone(),
                holder,
            }),
        }
    }

    /// Records a reference link from a tracked owner to a target.
    ///
    /// The reference must be declared in the metadata repository for the
    /// owner's table. Links are explicit identity edges; the core never
    /// chases language-level object pointers.
    pub fn link(
        &self,
        tx: &mut Transaction,
        owner: &Identity,
        reference: &str,
        target: ObjectRef,
    ) -> CoreResult<()> {
        tx.ensure_active()?;
        if self.template(owner.table(), reference).is_none() {
            return Err(CoreError::invalid_operation(format!(
                "reference '{reference}' not declared on {}",
                owner.table()
            )));
        }
        let Some(tracked) = tx.identity_map.lookup_mut(owner) else {
            return Err(CoreError::invalid_operation(format!(
                "cannot link untracked owner: {owner}"
            )));
        };
        tracked.link(reference, target);
        Ok(())
    }

    /// Removes a reference link.
    ///
    /// Removing an element from a tracked collection is an *unlink*: the
    /// target's foreign key is nulled at the next flush, the target row
    /// survives. With `auto_delete` set on the reference template the
    /// target is registered for delete instead.
    pub fn unlink(
        &self,
        tx: &mut Transaction,
        owner: &Identity,
        reference: &str,
        target: &Identity,
    ) -> CoreResult<()> {
        tx.ensure_active()?;
        let Some(template) = self.template(owner.table(), reference) else {
            return Err(CoreError::invalid_operation(format!(
                "reference '{reference}' not declared on {}",
                owner.table()
            )));
        };
        let Some(tracked) = tx.identity_map.lookup_mut(owner) else {
            return Err(CoreError::invalid_operation(format!(
                "cannot unlink from untracked owner: {owner}"
            )));
        };
        if !tracked.unlink(reference, target) {
            return Ok(());
        }

        if template.auto_delete {
            return self.mark_for_delete(tx, target);
        }

        match template.cardinality {
            // The foreign key lives on the owner; null it in place.
            Cardinality::OneToOne => {
                if let Some(field) = &template.foreign_key {
                    if let Some(tracked) = tx.identity_map.lookup(owner) {
                        tracked.handle().write().set(field.clone(), Value::Null);
                    }
                    self.mark_dirty(tx, owner)?;
                }
            }
            // The foreign key lives on the target row.
            Cardinality::OneToMany | Cardinality::SelfReferencing => {
                tx.pending_unlinks.push(PendingUnlink {
                    owner: owner.clone(),
                    reference: reference.to_owned(),
                    target: target.clone(),
                });
            }
            // Indirection rows are the store's concern.
            Cardinality::ManyToMany => {}
        }
        Ok(())
    }

    /// Flushes all pending work to the store without ending the
    /// transaction.
    ///
    /// Locks are retained: a concurrent transaction still cannot lock
    /// the flushed objects until this transaction commits or aborts.
    /// Reads issued on this transaction after the checkpoint observe the
    /// flushed state.
    pub fn checkpoint(&self, tx: &mut Transaction) -> CoreResult<()> {
        tx.ensure_active()?;
        debug!(txid = tx.id().as_u64(), "checkpoint");
        match self.flush(tx) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(tx, err)),
        }
    }

    /// Commits the transaction: final checkpoint, optimistic version
    /// checks, store commit, lock release.
    ///
    /// Double-commit fails fast with `InvalidOperation`. An optimistic
    /// conflict aborts the transaction entirely - no partial commit.
    pub fn commit(&self, tx: &mut Transaction) -> CoreResult<()> {
        tx.ensure_active()?;
        match self.commit_inner(tx) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(tx, err)),
        }
    }

    fn commit_inner(&self, tx: &mut Transaction) -> CoreResult<()> {
        self.check_optimistic(tx)?;
        self.flush(tx)?;
        if tx.store_txn_open {
            self.store
                .commit()
                .map_err(|source| CoreError::StoreTx { source })?;
            tx.store_txn_open = false;
        }
        self.locks.release_all(tx.id());
        if let Some(cache) = &self.cache {
            for identity in &tx.touched {
                cache.invalidate(identity);
            }
        }
        tx.mark_committed();
        debug!(txid = tx.id().as_u64(), touched = tx.touched.len(), "committed");
        Ok(())
    }

    /// Aborts the transaction, discarding all in-memory changes and
    /// releasing every lock.
    ///
    /// Row I/O already flushed by a checkpoint is undone through the
    /// store's own rollback; this core only guarantees the in-memory
    /// state reverts. Double-abort is a no-op; aborting a committed
    /// transaction is an error.
    pub fn abort(&self, tx: &mut Transaction) -> CoreResult<()> {
        match tx.state() {
            TxState::Aborted => Ok(()),
            TxState::Committed => Err(CoreError::invalid_operation(
                "transaction already committed",
            )),
            TxState::Active => {
                debug!(txid = tx.id().as_u64(), "abort");
                self.rollback_inner(tx);
                Ok(())
            }
        }
    }

    /// Tears the transaction down after a taxonomy failure.
    fn fail(&self, tx: &mut Transaction, err: CoreError) -> CoreError {
        if err.forces_abort() && tx.is_active() {
            debug!(txid = tx.id().as_u64(), error = %err, "forced abort");
            self.rollback_inner(tx);
        }
        err
    }

    fn rollback_inner(&self, tx: &mut Transaction) {
        for tracked in tx.identity_map.iter() {
            tracked.revert_image();
        }
        tx.states.revert();
        tx.pending_unlinks.clear();
        if tx.store_txn_open {
            // A failing rollback leaves nothing more for this core to
            // do; the store owns durability of the open bracket.
            if let Err(err) = self.store.rollback() {
                debug!(error = %err, "store rollback failed during abort");
            }
            tx.store_txn_open = false;
        }
        self.locks.release_all(tx.id());
        tx.mark_aborted();
    }

    // === flush pipeline ===

    fn flush(&self, tx: &mut Transaction) -> CoreResult<()> {
        self.autodetect_changes(tx)?;
        self.promote_insert_cascade(tx)?;

        let write_roots = self.pending_writes(tx);

        let delete_roots = self.pending_deletes(tx);
        let delete_graph = expand(&delete_roots, Direction::Delete, &self.metadata, tx);
        self.promote_delete_cascade(tx, &delete_graph)?;
        let delete_set = self.pending_deletes(tx);

        for identity in write_roots.iter().chain(delete_set.iter()) {
            self.ensure_write_lock(tx, identity)?;
        }

        let write_sequence = if tx.ordering_enabled() {
            let graph = expand(&write_roots, Direction::Insert, &self.metadata, tx);
            order(&graph, Direction::Insert)?
                .into_iter()
                .filter(|id| {
                    tx.states
                        .state_of(id)
                        .is_some_and(|s| s.needs_insert() || s.needs_update())
                })
                .collect()
        } else {
            write_roots
        };

        let delete_sequence = if tx.ordering_enabled() {
            let graph = expand(&delete_set, Direction::Delete, &self.metadata, tx);
            order(&graph, Direction::Delete)?
                .into_iter()
                .filter(|id| tx.states.state_of(id).is_some_and(ModificationState::needs_delete))
                .collect()
        } else {
            delete_set
        };

        let unlink_updates = self.collect_unlinks(tx);

        let has_work =
            !write_sequence.is_empty() || !delete_sequence.is_empty() || !unlink_updates.is_empty();
        if has_work && !tx.store_txn_open {
            self.store
                .begin()
                .map_err(|source| CoreError::StoreTx { source })?;
            tx.store_txn_open = true;
        }

        trace!(
            txid = tx.id().as_u64(),
            writes = write_sequence.len(),
            deletes = delete_sequence.len(),
            unlinks = unlink_updates.len(),
            "flush"
        );

        for identity in &write_sequence {
            self.write_row(tx, identity)?;
        }
        for (target, field) in unlink_updates {
            self.null_foreign_key(tx, &target, &field)?;
        }
        for identity in &delete_sequence {
            self.store
                .delete(identity.table(), identity.key())
                .map_err(|err| CoreError::store(identity.clone(), err))?;
            tx.touched.push(identity.clone());
        }

        tx.pending_unlinks.clear();
        tx.states.checkpoint();
        Ok(())
    }

    /// Marks write-locked clean objects whose image drifted from the
    /// lock snapshot as dirty.
    fn autodetect_changes(&self, tx: &mut Transaction) -> CoreResult<()> {
        for identity in tx.identity_map.identities() {
            if tx.states.state_of(&identity) != Some(ModificationState::PersistentClean) {
                continue;
            }
            if !self.locks.check(tx.id(), &identity, LockKind::Write) {
                continue;
            }
            let changed = tx
                .identity_map
                .lookup(&identity)
                .is_some_and(|t| t.changed_since_lock());
            if changed {
                tx.states.apply(&identity, StateEvent::MarkDirty)?;
            }
        }
        Ok(())
    }

    /// Walks OBJECT-policy write edges from the pending write set,
    /// pulling materialized link targets into the write set.
    fn promote_insert_cascade(&self, tx: &mut Transaction) -> CoreResult<()> {
        let mut worklist: VecDeque<Identity> = self.pending_writes(tx).into();
        let mut seen: HashSet<Identity> = worklist.iter().cloned().collect();

        while let Some(current) = worklist.pop_front() {
            for template in self.metadata.references_of(current.table()) {
                if template.on_insert != CascadePolicy::Object {
                    continue;
                }
                for target in tx.links_of(&current, &template.name) {
                    let target_identity = target.identity().clone();
                    if !seen.insert(target_identity.clone()) {
                        continue;
                    }
                    self.promote_write_target(tx, &target_identity, target.handle().cloned())?;
                    worklist.push_back(target_identity);
                }
            }
        }
        Ok(())
    }

    fn promote_write_target(
        &self,
        tx: &mut Transaction,
        identity: &Identity,
        handle: Option<ObjectHandle>,
    ) -> CoreResult<()> {
        match tx.states.state_of(identity) {
            // Stale link to a deleted object; nothing to cascade.
            Some(ModificationState::PersistentDeleted) => Ok(()),
            Some(ModificationState::TransientClean) => {
                tx.states.apply(identity, StateEvent::MarkDirty)?;
                Ok(())
            }
            Some(ModificationState::PersistentClean) => {
                let changed = tx
                    .identity_map
                    .lookup(identity)
                    .is_some_and(|t| t.changed_since_lock());
                if changed {
                    tx.states.apply(identity, StateEvent::MarkDirty)?;
                }
                Ok(())
            }
            Some(_) => Ok(()),
            None => {
                // Lazy targets stay identity-only: ordering tolerates a
                // proxy and never forces materialization.
                let Some(handle) = handle else { return Ok(()) };
                let stored = self
                    .store
                    .read(identity.table(), identity.key())
                    .map_err(|err| CoreError::store(identity.clone(), err))?;
                tx.identity_map.register(identity.clone(), handle.clone())?;
                match stored {
                    Some(row) => {
                        tx.states
                            .track(identity.clone(), ModificationState::PersistentClean);
                        self.capture_snapshot(tx, identity);
                        if row != *handle.read() {
                            tx.states.apply(identity, StateEvent::MarkDirty)?;
                        }
                    }
                    None => {
                        tx.states
                            .track(identity.clone(), ModificationState::TransientClean);
                        self.capture_snapshot(tx, identity);
                        tx.states.apply(identity, StateEvent::MarkDirty)?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Registers every cascade-discovered delete target for delete.
    fn promote_delete_cascade(&self, tx: &mut Transaction, graph: &ReferenceGraph) -> CoreResult<()> {
        for node in graph.nodes() {
            match tx.states.state_of(node) {
                Some(ModificationState::PersistentClean | ModificationState::PersistentDirty) => {
                    tx.states.apply(node, StateEvent::MarkDeleted)?;
                }
                Some(_) => {}
                None => {
                    let Some(row) = self
                        .store
                        .read(node.table(), node.key())
                        .map_err(|err| CoreError::store(node.clone(), err))?
                    else {
                        continue;
                    };
                    tx.identity_map.register(node.clone(), new_handle(row))?;
                    tx.states
                        .track(node.clone(), ModificationState::PersistentClean);
                    self.capture_snapshot(tx, node);
                    tx.states.apply(node, StateEvent::MarkDeleted)?;
                }
            }
        }
        Ok(())
    }

    fn pending_writes(&self, tx: &Transaction) -> Vec<Identity> {
        tx.identity_map
            .identities()
            .into_iter()
            .filter(|id| {
                tx.states
                    .state_of(id)
                    .is_some_and(|s| s.needs_insert() || s.needs_update())
            })
            .collect()
    }

    fn pending_deletes(&self, tx: &Transaction) -> Vec<Identity> {
        tx.identity_map
            .identities()
            .into_iter()
            .filter(|id| tx.states.state_of(id).is_some_and(ModificationState::needs_delete))
            .collect()
    }

    /// Foreign-key-null updates due at this flush: explicit unlinks plus
    /// non-cascaded references of every deleted owner.
    fn collect_unlinks(&self, tx: &Transaction) -> Vec<(Identity, String)> {
        let mut updates = Vec::new();
        let deleted = |identity: &Identity| {
            tx.states
                .state_of(identity)
                .is_some_and(ModificationState::needs_delete)
        };

        for unlink in &tx.pending_unlinks {
            let Some(template) = self.template(unlink.owner.table(), &unlink.reference) else {
                continue;
            };
            if let Some(field) = Self::foreign_key_on_target(&template) {
                if !deleted(&unlink.target) {
                    updates.push((unlink.target.clone(), field));
                }
            }
        }

        for identity in self.pending_deletes(tx) {
            for template in self.metadata.references_of(identity.table()) {
                if template.on_delete == CascadePolicy::Object {
                    continue;
                }
                let Some(field) = Self::foreign_key_on_target(&template) else {
                    continue;
                };
                for target in tx.links_of(&identity, &template.name) {
                    if !deleted(target.identity()) {
                        updates.push((target.identity().clone(), field.clone()));
                    }
                }
            }
        }

        updates
    }

    fn foreign_key_on_target(template: &ReferenceTemplate) -> Option<String> {
        match template.cardinality {
            Cardinality::OneToMany | Cardinality::SelfReferencing => template.foreign_key.clone(),
            // One-to-one keys live on the owner; many-to-many indirection
            // rows belong to the store.
            Cardinality::OneToOne | Cardinality::ManyToMany => None,
        }
    }

    fn write_row(&self, tx: &mut Transaction, identity: &Identity) -> CoreResult<()> {
        let Some(state) = tx.states.state_of(identity) else {
            return Ok(());
        };
        let Some(handle) = tx.identity_map.lookup(identity).map(|t| t.handle().clone()) else {
            return Ok(());
        };

        let version_field = self.metadata.version_field(identity.table());
        if let Some(field) = &version_field {
            let mut image = handle.write();
            let next = match image.get(field).and_then(Value::as_i64) {
                Some(current) if state.needs_update() => current + 1,
                Some(current) => current,
                None => 1,
            };
            image.set(field.clone(), Value::Int(next));
        }

        let image = handle.read().clone();
        self.store
            .write(identity.table(), identity.key(), image)
            .map_err(|err| CoreError::store(identity.clone(), err))?;

        tx.states.apply(identity, StateEvent::MarkPersisted)?;
        if let Some(tracked) = tx.identity_map.lookup_mut(identity) {
            tracked.refresh_lock_snapshot(version_field.as_deref());
        }
        tx.touched.push(identity.clone());
        Ok(())
    }

    fn null_foreign_key(&self, tx: &mut Transaction, target: &Identity, field: &str) -> CoreResult<()> {
        let image = if let Some(tracked) = tx.identity_map.lookup(target) {
            tracked.handle().write().set(field, Value::Null);
            Some(tracked.current_image())
        } else {
            let row = self
                .store
                .read(target.table(), target.key())
                .map_err(|err| CoreError::store(target.clone(), err))?;
            row.map(|mut row| {
                row.set(field, Value::Null);
                row
            })
        };
        if let Some(image) = image {
            self.store
                .write(target.table(), target.key(), image)
                .map_err(|err| CoreError::store(target.clone(), err))?;
            tx.touched.push(target.clone());
        }
        Ok(())
    }

    /// Compares the version stamp recorded at write-lock time against
    /// the stored row, for every exclusively locked object.
    fn check_optimistic(&self, tx: &Transaction) -> CoreResult<()> {
        for tracked in tx.identity_map.iter() {
            let identity = tracked.identity();
            let Some(expected) = tracked.version_at_lock() else {
                continue;
            };
            if !self.locks.check(tx.id(), identity, LockKind::Write) {
                continue;
            }
            let Some(field) = self.metadata.version_field(identity.table()) else {
                continue;
            };
            let stored = self
                .store
                .read(identity.table(), identity.key())
                .map_err(|err| CoreError::store(identity.clone(), err))?;
            let Some(found) = stored
                .as_ref()
                .and_then(|row| row.get(&field))
                .and_then(Value::as_i64)
                .map(|v| VersionStamp::new(v.unsigned_abs()))
            else {
                continue;
            };
            if found != expected {
                return Err(CoreError::OptimisticConflict {
                    identity: identity.clone(),
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }

    fn ensure_write_lock(&self, tx: &mut Transaction, identity: &Identity) -> CoreResult<()> {
        if self.locks.check(tx.id(), identity, LockKind::Write) {
            return Ok(());
        }
        if !tx.implicit_locking_enabled() {
            return Err(CoreError::invalid_operation(format!(
                "implicit locking disabled: {identity} must be locked explicitly"
            )));
        }
        match self.locks.acquire(tx.id(), identity, LockKind::Write) {
            Ok(_) => {
                self.capture_snapshot(tx, identity);
                Ok(())
            }
            Err(holder) => Err(CoreError::LockNotGranted {
                identity: identity.clone(),
                holder,
            }),
        }
    }

    fn capture_snapshot(&self, tx: &mut Transaction, identity: &Identity) {
        let version_field = self.metadata.version_field(identity.table());
        if let Some(tracked) = tx.identity_map.lookup_mut(identity) {
            tracked.capture_lock_snapshot(version_field.as_deref());
        }
    }

    fn template(&self, table: TableId, reference: &str) -> Option<ReferenceTemplate> {
        self.metadata
            .references_of(table)
            .into_iter()
            .find(|t| t.name == reference)
    }

    fn track_persistent(
        &self,
        tx: &mut Transaction,
        identity: Identity,
        handle: ObjectHandle,
    ) -> CoreResult<()> {
        tx.identity_map.register(identity.clone(), handle)?;
        tx.states
            .track(identity.clone(), ModificationState::PersistentClean);
        self.capture_snapshot(tx, &identity);
        Ok(())
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("locked", &self.locks.locked_count())
            .field("cached", &self.cache.as_ref().map(|c| c.len()))
            .finish_non_exhaustive()
    }
}
