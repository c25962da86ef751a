//! Per-transaction identity map.

use crate::error::{CoreError, CoreResult};
use crate::identity::Identity;
use crate::object::{ObjectHandle, TrackedObject};
use std::collections::HashMap;
use std::sync::Arc;

/// Maps a `(table, primary key)` identity to exactly one tracked object
/// within a transaction scope.
///
/// The map is the single path by which an object becomes tracked, and it
/// guarantees referential uniqueness: two lookups of one identity return
/// the same pointer-equal handle. Registering a *different* instance for
/// an already-mapped identity is a caller bug surfaced as
/// [`CoreError::IdentityConflict`].
///
/// The map is owned by one transaction and does no locking or I/O.
#[derive(Debug, Default)]
pub struct IdentityMap {
    entries: HashMap<Identity, TrackedObject>,
    /// Registration order, for deterministic iteration.
    order: Vec<Identity>,
}

impl IdentityMap {
    /// Creates an empty identity map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a tracked object by identity.
    #[must_use]
    pub fn lookup(&self, identity: &Identity) -> Option<&TrackedObject> {
        self.entries.get(identity)
    }

    /// Looks up a tracked object mutably.
    pub fn lookup_mut(&mut self, identity: &Identity) -> Option<&mut TrackedObject> {
        self.entries.get_mut(identity)
    }

    /// Registers an object instance under an identity.
    ///
    /// If the identity is already mapped to the same instance, this is a
    /// no-op returning the existing handle.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IdentityConflict`] if a different instance is
    /// already registered for the identity.
    pub fn register(&mut self, identity: Identity, handle: ObjectHandle) -> CoreResult<ObjectHandle> {
        if let Some(existing) = self.entries.get(&identity) {
            if Arc::ptr_eq(existing.handle(), &handle) {
                return Ok(handle);
            }
            return Err(CoreError::identity_conflict(identity));
        }
        self.order.push(identity.clone());
        self.entries
            .insert(identity.clone(), TrackedObject::new(identity, handle.clone()));
        Ok(handle)
    }

    /// Removes an identity from the map.
    pub fn evict(&mut self, identity: &Identity) -> Option<TrackedObject> {
        self.order.retain(|id| id != identity);
        self.entries.remove(identity)
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Returns true if the identity is tracked.
    #[must_use]
    pub fn contains(&self, identity: &Identity) -> bool {
        self.entries.contains_key(identity)
    }

    /// Iterates over tracked objects in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &TrackedObject> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    /// Returns the tracked identities in registration order.
    #[must_use]
    pub fn identities(&self) -> Vec<Identity> {
        self.order.clone()
    }

    /// Returns the number of tracked objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::new_handle;
    use relmap_store::{RowImage, RowKey, TableId};

    fn identity(n: i64) -> Identity {
        Identity::new(TableId::new(1), RowKey::from_i64(n))
    }

    #[test]
    fn register_then_lookup_returns_same_instance() {
        let mut map = IdentityMap::new();
        let handle = new_handle(RowImage::new());
        map.register(identity(1), handle.clone()).unwrap();

        let found = map.lookup(&identity(1)).unwrap();
        assert!(Arc::ptr_eq(found.handle(), &handle));
    }

    #[test]
    fn register_same_instance_twice_is_noop() {
        let mut map = IdentityMap::new();
        let handle = new_handle(RowImage::new());
        map.register(identity(1), handle.clone()).unwrap();
        map.register(identity(1), handle).unwrap();
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn register_different_instance_is_a_conflict() {
        let mut map = IdentityMap::new();
        map.register(identity(1), new_handle(RowImage::new())).unwrap();

        let result = map.register(identity(1), new_handle(RowImage::new()));
        assert!(matches!(result, Err(CoreError::IdentityConflict { .. })));
    }

    #[test]
    fn evict_removes_entry() {
        let mut map = IdentityMap::new();
        map.register(identity(1), new_handle(RowImage::new())).unwrap();
        assert!(map.evict(&identity(1)).is_some());
        assert!(!map.contains(&identity(1)));
        assert!(map.identities().is_empty());
    }

    #[test]
    fn clear_empties_the_map() {
        let mut map = IdentityMap::new();
        map.register(identity(1), new_handle(RowImage::new())).unwrap();
        map.register(identity(2), new_handle(RowImage::new())).unwrap();
        map.clear();
        assert!(map.is_empty());
    }

    #[test]
    fn iteration_follows_registration_order() {
        let mut map = IdentityMap::new();
        for n in [3, 1, 2] {
            map.register(identity(n), new_handle(RowImage::new())).unwrap();
        }
        let order: Vec<Identity> = map.iter().map(|t| t.identity().clone()).collect();
        assert_eq!(order, vec![identity(3), identity(1), identity(2)]);
    }
}
