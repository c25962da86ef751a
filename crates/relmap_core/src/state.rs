//! Modification-state machine.
//!
//! Pure state-transition logic for tracked objects, plus a side-table of
//! current states keyed by identity. No I/O happens here; the transaction
//! coordinator drives the table and interprets the states when flushing.

use crate::error::{CoreError, CoreResult};
use crate::identity::Identity;
use crate::lock::LockKind;
use std::collections::HashMap;
use std::fmt;

/// Modification state of one tracked object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModificationState {
    /// New object, not yet registered for insert.
    TransientClean,
    /// New object, registered for insert.
    TransientDirty,
    /// Persisted object with no pending changes.
    PersistentClean,
    /// Persisted object registered for update.
    PersistentDirty,
    /// Persisted object registered for delete. Terminal for the scope.
    PersistentDeleted,
}

impl ModificationState {
    /// Returns a short static name, used in error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TransientClean => "transient-clean",
            Self::TransientDirty => "transient-dirty",
            Self::PersistentClean => "persistent-clean",
            Self::PersistentDirty => "persistent-dirty",
            Self::PersistentDeleted => "persistent-deleted",
        }
    }

    /// Returns true if the object needs an insert at flush time.
    #[must_use]
    pub const fn needs_insert(self) -> bool {
        matches!(self, Self::TransientDirty)
    }

    /// Returns true if the object needs an update at flush time.
    #[must_use]
    pub const fn needs_update(self) -> bool {
        matches!(self, Self::PersistentDirty)
    }

    /// Returns true if the object needs a delete at flush time.
    #[must_use]
    pub const fn needs_delete(self) -> bool {
        matches!(self, Self::PersistentDeleted)
    }
}

impl fmt::Display for ModificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Events driving the modification-state machine.
///
/// Reverting is deliberately not an event: abort restores the whole
/// scope to its last checkpoint image through [`StateTable::revert`],
/// never one object at a time, so it bypasses per-object transitions
/// (a revert must succeed even from the terminal deleted state).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    /// A lock of the given kind was taken. Idempotent re-lock is a no-op.
    Lock(LockKind),
    /// The object's fields were modified.
    MarkDirty,
    /// The object was successfully written to the store.
    MarkPersisted,
    /// The object was registered for delete.
    MarkDeleted,
}

impl fmt::Display for StateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lock(kind) => write!(f, "lock({kind})"),
            Self::MarkDirty => f.write_str("mark-dirty"),
            Self::MarkPersisted => f.write_str("mark-persisted"),
            Self::MarkDeleted => f.write_str("mark-deleted"),
        }
    }
}

/// Applies one event to one state.
///
/// Rules:
/// - `PersistentDeleted` is terminal - every further event is an error
/// - `Lock(_)` never changes the state (locking does not dirty an object)
/// - `MarkDirty` is idempotent: Dirty stays Dirty
/// - `MarkPersisted` lands in `PersistentClean` from every live state
/// - `MarkDeleted` requires a persistent state; deleting a transient
///   object is a caller bug
pub fn transition(state: ModificationState, event: StateEvent) -> CoreResult<ModificationState> {
    use ModificationState as S;

    if state == S::PersistentDeleted {
        return Err(CoreError::InvalidTransition {
            state: state.name(),
            event: event.to_string(),
        });
    }

    let next = match event {
        StateEvent::Lock(_) => state,
        StateEvent::MarkDirty => match state {
            S::TransientClean | S::TransientDirty => S::TransientDirty,
            S::PersistentClean | S::PersistentDirty => S::PersistentDirty,
            S::PersistentDeleted => unreachable!(),
        },
        StateEvent::MarkPersisted => S::PersistentClean,
        StateEvent::MarkDeleted => match state {
            S::PersistentClean | S::PersistentDirty => S::PersistentDeleted,
            S::TransientClean | S::TransientDirty => {
                return Err(CoreError::InvalidTransition {
                    state: state.name(),
                    event: event.to_string(),
                })
            }
            S::PersistentDeleted => unreachable!(),
        },
    };

    Ok(next)
}

/// Side-table of modification states, keyed by identity.
///
/// The table also keeps the state image captured at the last checkpoint,
/// so `revert` (used by abort) can restore it.
#[derive(Debug, Default)]
pub struct StateTable {
    states: HashMap<Identity, ModificationState>,
    checkpointed: HashMap<Identity, ModificationState>,
}

impl StateTable {
    /// Creates an empty state table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking an identity in the given state.
    pub fn track(&mut self, identity: Identity, state: ModificationState) {
        self.states.insert(identity, state);
    }

    /// Returns the current state of an identity, if tracked.
    #[must_use]
    pub fn state_of(&self, identity: &Identity) -> Option<ModificationState> {
        self.states.get(identity).copied()
    }

    /// Applies an event to a tracked identity.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the identity is untracked, or the
    /// transition error if the event is not legal in the current state.
    pub fn apply(&mut self, identity: &Identity, event: StateEvent) -> CoreResult<ModificationState> {
        let current = self
            .state_of(identity)
            .ok_or_else(|| CoreError::invalid_operation(format!("untracked identity {identity}")))?;
        let next = transition(current, event)?;
        self.states.insert(identity.clone(), next);
        Ok(next)
    }

    /// Captures the current states as the checkpoint image.
    pub fn checkpoint(&mut self) {
        self.checkpointed = self.states.clone();
    }

    /// Restores every state to the last checkpoint image.
    ///
    /// Identities tracked after the checkpoint are dropped entirely.
    pub fn revert(&mut self) {
        self.states = self.checkpointed.clone();
    }

    /// Removes an identity from the table.
    pub fn evict(&mut self, identity: &Identity) {
        self.states.remove(identity);
        self.checkpointed.remove(identity);
    }

    /// Iterates over all tracked identities and their states.
    pub fn iter(&self) -> impl Iterator<Item = (&Identity, ModificationState)> {
        self.states.iter().map(|(id, state)| (id, *state))
    }

    /// Returns the number of tracked identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns true if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
