//! Tracked objects.

use crate::identity::Identity;
use crate::reference::ObjectRef;
use crate::types::VersionStamp;
use parking_lot::RwLock;
use relmap_store::{RowImage, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Shared handle to the in-memory image of one row.
///
/// The handle is what "same identity, same instance" means: two lookups
/// of one identity inside a transaction scope return pointer-equal
/// handles.
pub type ObjectHandle = Arc<RwLock<RowImage>>;

/// Creates a fresh object handle from a row image.
#[must_use]
pub fn new_handle(image: RowImage) -> ObjectHandle {
    Arc::new(RwLock::new(image))
}

/// Per-transaction bookkeeping for one tracked object.
///
/// Holds the identity, the shared image handle, the declared reference
/// links by name, and the image/version snapshot captured at write-lock
/// time. The snapshot decides at flush time whether anything actually
/// changed; the version stamp feeds the optimistic conflict check.
#[derive(Debug)]
pub struct TrackedObject {
    identity: Identity,
    handle: ObjectHandle,
    /// Outgoing reference links, keyed by declared reference name.
    /// Kept as explicit identity links, never as cyclic object pointers.
    links: HashMap<String, Vec<ObjectRef>>,
    /// Image captured when the write lock was taken.
    image_at_lock: Option<RowImage>,
    /// Version stamp read from the image when the write lock was taken.
    version_at_lock: Option<VersionStamp>,
}

impl TrackedObject {
    /// Creates a tracked object for an identity and handle.
    #[must_use]
    pub fn new(identity: Identity, handle: ObjectHandle) -> Self {
        Self {
            identity,
            handle,
            links: HashMap::new(),
            image_at_lock: None,
            version_at_lock: None,
        }
    }

    /// Returns the object's identity.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns the shared image handle.
    #[must_use]
    pub fn handle(&self) -> &ObjectHandle {
        &self.handle
    }

    /// Returns a clone of the current image.
    #[must_use]
    pub fn current_image(&self) -> RowImage {
        self.handle.read().clone()
    }

    /// Adds an outgoing link under a declared reference name.
    ///
    /// Linking the same target twice under one name is a no-op.
    pub fn link(&mut self, reference: impl Into<String>, target: ObjectRef) {
        let targets = self.links.entry(reference.into()).or_default();
        if !targets.iter().any(|r| r.identity() == target.identity()) {
            targets.push(target);
        }
    }

    /// Removes an outgoing link. Returns true if a link was removed.
    pub fn unlink(&mut self, reference: &str, target: &Identity) -> bool {
        let Some(targets) = self.links.get_mut(reference) else {
            return false;
        };
        let before = targets.len();
        targets.retain(|r| r.identity() != target);
        before != targets.len()
    }

    /// Returns the links of one reference, in link order.
    #[must_use]
    pub fn links_of(&self, reference: &str) -> &[ObjectRef] {
        self.links.get(reference).map_or(&[], Vec::as_slice)
    }

    /// Captures the lock-time snapshot of the image and version stamp.
    ///
    /// Idempotent: a second write lock inside the same transaction keeps
    /// the first snapshot, so duplicate `lock()` calls never create
    /// duplicate bookkeeping.
    pub fn capture_lock_snapshot(&mut self, version_field: Option<&str>) {
        if self.image_at_lock.is_some() {
            return;
        }
        let image = self.handle.read().clone();
        self.version_at_lock = version_field
            .and_then(|field| image.get(field))
            .and_then(Value::as_i64)
            .map(|v| VersionStamp::new(v.unsigned_abs()));
        self.image_at_lock = Some(image);
    }

    /// Replaces the lock snapshot with the current image after a flush.
    pub fn refresh_lock_snapshot(&mut self, version_field: Option<&str>) {
        self.image_at_lock = None;
        self.version_at_lock = None;
        self.capture_lock_snapshot(version_field);
    }

    /// Returns the image captured at lock time, if a snapshot was taken.
    #[must_use]
    pub fn image_at_lock(&self) -> Option<&RowImage> {
        self.image_at_lock.as_ref()
    }

    /// Returns the version stamp recorded at lock time.
    #[must_use]
    pub fn version_at_lock(&self) -> Option<VersionStamp> {
        self.version_at_lock
    }

    /// Returns true if the current image differs from the lock snapshot.
    ///
    /// Without a snapshot the object is conservatively considered
    /// changed.
    #[must_use]
    pub fn changed_since_lock(&self) -> bool {
        match &self.image_at_lock {
            Some(snapshot) => *snapshot != *self.handle.read(),
            None => true,
        }
    }

    /// Restores the in-memory image to the lock snapshot.
    pub fn revert_image(&self) {
        if let Some(snapshot) = &self.image_at_lock {
            *self.handle.write() = snapshot.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmap_store::{RowKey, TableId};

    fn identity(n: i64) -> Identity {
        Identity::new(TableId::new(1), RowKey::from_i64(n))
    }

    fn tracked(n: i64) -> TrackedObject {
        let mut image = RowImage::new();
        image.set("version", Value::Int(5));
        TrackedObject::new(identity(n), new_handle(image))
    }

    #[test]
    fn link_is_deduplicated_by_identity() {
        let mut object = tracked(1);
        object.link("children", ObjectRef::lazy(identity(2)));
        object.link("children", ObjectRef::lazy(identity(2)));
        assert_eq!(object.links_of("children").len(), 1);
    }

    #[test]
    fn unlink_removes_only_named_target() {
        let mut object = tracked(1);
        object.link("children", ObjectRef::lazy(identity(2)));
        object.link("children", ObjectRef::lazy(identity(3)));

        assert!(object.unlink("children", &identity(2)));
        assert!(!object.unlink("children", &identity(2)));
        assert_eq!(object.links_of("children").len(), 1);
    }

    #[test]
    fn lock_snapshot_records_version() {
        let mut object = tracked(1);
        object.capture_lock_snapshot(Some("version"));
        assert_eq!(object.version_at_lock(), Some(VersionStamp::new(5)));
    }

    #[test]
    fn second_snapshot_is_a_noop() {
        let mut object = tracked(1);
        object.capture_lock_snapshot(Some("version"));
        object.handle().write().set("version", Value::Int(9));
        object.capture_lock_snapshot(Some("version"));
        assert_eq!(object.version_at_lock(), Some(VersionStamp::new(5)));
    }

    #[test]
    fn changed_since_lock_detects_field_edits() {
        let mut object = tracked(1);
        object.capture_lock_snapshot(None);
        assert!(!object.changed_since_lock());

        object.handle().write().set("name", Value::text("edited"));
        assert!(object.changed_since_lock());
    }

    #[test]
    fn revert_image_restores_snapshot() {
        let mut object = tracked(1);
        object.capture_lock_snapshot(None);
        object.handle().write().set("name", Value::text("edited"));
        object.revert_image();
        assert!(!object.changed_since_lock());
    }
}
