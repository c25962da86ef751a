//! Lazy and materialized object references.

use crate::identity::Identity;
use crate::object::ObjectHandle;
use std::fmt;

/// A reference to another tracked or persisted object.
///
/// References carry the target identity in both variants, so graph
/// expansion and dependency ordering operate on identities alone and
/// never force a lazy reference to materialize. Triggering a load
/// mid-ordering could create new graph nodes and invalidate the
/// in-progress computation.
#[derive(Clone)]
pub enum ObjectRef {
    /// The target object is materialized in memory.
    Materialized {
        /// Identity of the target row.
        identity: Identity,
        /// Handle to the in-memory image.
        handle: ObjectHandle,
    },
    /// The target is known by identity only; its row is loaded through
    /// the store when a field is actually needed.
    Lazy {
        /// Identity of the target row.
        identity: Identity,
    },
}

impl ObjectRef {
    /// Creates a materialized reference.
    #[must_use]
    pub fn materialized(identity: Identity, handle: ObjectHandle) -> Self {
        Self::Materialized { identity, handle }
    }

    /// Creates a lazy reference.
    #[must_use]
    pub fn lazy(identity: Identity) -> Self {
        Self::Lazy { identity }
    }

    /// Returns the identity of the referenced row.
    ///
    /// Never materializes a lazy reference.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        match self {
            Self::Materialized { identity, .. } | Self::Lazy { identity } => identity,
        }
    }

    /// Returns the in-memory handle if the reference is materialized.
    #[must_use]
    pub fn handle(&self) -> Option<&ObjectHandle> {
        match self {
            Self::Materialized { handle, .. } => Some(handle),
            Self::Lazy { .. } => None,
        }
    }

    /// Returns true if the reference is a lazy proxy.
    #[must_use]
    pub fn is_lazy(&self) -> bool {
        matches!(self, Self::Lazy { .. })
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Materialized { identity, .. } => write!(f, "ObjectRef::Materialized({identity})"),
            Self::Lazy { identity } => write!(f, "ObjectRef::Lazy({identity})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::new_handle;
    use relmap_store::{RowImage, RowKey, TableId};

    fn identity() -> Identity {
        Identity::new(TableId::new(1), RowKey::from_i64(1))
    }

    #[test]
    fn identity_is_available_without_materialization() {
        let lazy = ObjectRef::lazy(identity());
        assert_eq!(lazy.identity(), &identity());
        assert!(lazy.is_lazy());
        assert!(lazy.handle().is_none());
    }

    #[test]
    fn materialized_reference_exposes_handle() {
        let handle = new_handle(RowImage::new());
        let reference = ObjectRef::materialized(identity(), handle);
        assert!(!reference.is_lazy());
        assert!(reference.handle().is_some());
    }
}
