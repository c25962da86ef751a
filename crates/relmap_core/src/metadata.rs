//! Reference metadata repository.
//!
//! Holds per-table class descriptors and reference templates: cardinality,
//! cascade policies for the write and delete directions, the constrained
//! flag, and the foreign-key column used for unlinking. Policies are
//! mutable at runtime through narrow setters and are read fresh on every
//! graph expansion, never cached on tracked objects.

use crate::error::{CoreError, CoreResult};
use crate::graph::Direction;
use parking_lot::RwLock;
use relmap_store::TableId;
use std::collections::HashMap;
use std::fmt;

/// Per-reference rule controlling whether an operation on the owner
/// propagates to what it references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CascadePolicy {
    /// Ignore the reference entirely for this operation.
    #[default]
    None,
    /// Keep the reference (maintain the foreign key) but do not cascade
    /// the operation to the referenced object.
    Link,
    /// Cascade the operation to the referenced object.
    Object,
}

impl fmt::Display for CascadePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Link => f.write_str("link"),
            Self::Object => f.write_str("object"),
        }
    }
}

/// Cardinality of a declared reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Single reference to one row of another table.
    OneToOne,
    /// Collection reference to rows of another table.
    OneToMany,
    /// Collection reference through an indirection table.
    ManyToMany,
    /// Reference back into the owning table.
    SelfReferencing,
}

/// Declared reference from rows of one table to rows of another.
///
/// Templates are metadata, not per-object state: the graph builder reads
/// them fresh for every expansion, so runtime policy overrides take
/// effect immediately.
#[derive(Debug, Clone)]
pub struct ReferenceTemplate {
    /// Reference name, unique per source table.
    pub name: String,
    /// Table the owning rows live in.
    pub source: TableId,
    /// Table the referenced rows live in.
    pub target: TableId,
    /// Declared cardinality.
    pub cardinality: Cardinality,
    /// Cascade policy for the write direction.
    pub on_insert: CascadePolicy,
    /// Cascade policy for the delete direction.
    pub on_delete: CascadePolicy,
    /// True if the backing store enforces a foreign-key constraint along
    /// this edge, forcing a write/delete order. Defaults to false, which
    /// is why circular graphs order successfully by default.
    pub constrained: bool,
    /// Foreign-key column on the child side, nulled when unlinking.
    pub foreign_key: Option<String>,
    /// If true, removing an element from the tracked collection deletes
    /// it instead of unlinking it.
    pub auto_delete: bool,
}

impl ReferenceTemplate {
    /// Creates a template with default policies (NONE) and no constraint.
    pub fn new(
        name: impl Into<String>,
        source: TableId,
        target: TableId,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            target,
            cardinality,
            on_insert: CascadePolicy::None,
            on_delete: CascadePolicy::None,
            constrained: false,
            foreign_key: None,
            auto_delete: false,
        }
    }

    /// Sets the write-direction cascade policy.
    #[must_use]
    pub fn on_insert(mut self, policy: CascadePolicy) -> Self {
        self.on_insert = policy;
        self
    }

    /// Sets the delete-direction cascade policy.
    #[must_use]
    pub fn on_delete(mut self, policy: CascadePolicy) -> Self {
        self.on_delete = policy;
        self
    }

    /// Marks the edge as backed by an enforced foreign-key constraint.
    #[must_use]
    pub fn constrained(mut self, value: bool) -> Self {
        self.constrained = value;
        self
    }

    /// Names the foreign-key column on the child side.
    #[must_use]
    pub fn foreign_key(mut self, column: impl Into<String>) -> Self {
        self.foreign_key = Some(column.into());
        self
    }

    /// Enables collection auto-delete for this reference.
    #[must_use]
    pub fn auto_delete(mut self, value: bool) -> Self {
        self.auto_delete = value;
        self
    }

    /// Returns the cascade policy for the given operation direction.
    #[must_use]
    pub fn policy_for(&self, direction: Direction) -> CascadePolicy {
        match direction {
            Direction::Insert => self.on_insert,
            Direction::Delete => self.on_delete,
        }
    }
}

/// Per-table class descriptor.
#[derive(Debug, Clone)]
pub struct TableDescriptor {
    /// The table ID.
    pub table: TableId,
    /// Human-readable class/table name, used in diagnostics.
    pub name: String,
    /// Column holding the optimistic-locking version stamp, if declared.
    pub version_field: Option<String>,
}

impl TableDescriptor {
    /// Creates a descriptor without a version field.
    pub fn new(table: TableId, name: impl Into<String>) -> Self {
        Self {
            table,
            name: name.into(),
            version_field: None,
        }
    }

    /// Declares the optimistic-locking version column.
    #[must_use]
    pub fn version_field(mut self, column: impl Into<String>) -> Self {
        self.version_field = Some(column.into());
        self
    }
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<TableId, TableDescriptor>,
    references: HashMap<TableId, Vec<ReferenceTemplate>>,
}

/// Repository of class descriptors and reference templates.
///
/// Shared across transactions; protected by a read/write lock since
/// policy overrides are rare and expansions are read-heavy.
#[derive(Debug, Default)]
pub struct MetadataRepository {
    inner: RwLock<Inner>,
}

impl MetadataRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table descriptor, replacing any previous one.
    pub fn register_table(&self, descriptor: TableDescriptor) {
        self.inner.write().tables.insert(descriptor.table, descriptor);
    }

    /// Registers a reference template on its source table.
    pub fn register_reference(&self, template: ReferenceTemplate) {
        self.inner
            .write()
            .references
            .entry(template.source)
            .or_default()
            .push(template);
    }

    /// Returns the descriptor of a table, if registered.
    #[must_use]
    pub fn table(&self, table: TableId) -> Option<TableDescriptor> {
        self.inner.read().tables.get(&table).cloned()
    }

    /// Returns the version-stamp column of a table, if declared.
    #[must_use]
    pub fn version_field(&self, table: TableId) -> Option<String> {
        self.inner
            .read()
            .tables
            .get(&table)
            .and_then(|descriptor| descriptor.version_field.clone())
    }

    /// Returns the declared references of a table.
    ///
    /// The result is a fresh clone; callers must not cache it across
    /// operations, since policies can be overridden at any time.
    #[must_use]
    pub fn references_of(&self, table: TableId) -> Vec<ReferenceTemplate> {
        self.inner.read().references.get(&table).cloned().unwrap_or_default()
    }

    /// Overrides the cascade policies of one reference at runtime.
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
        self.with_reference(table, reference, |template| {
            template.on_insert = on_insert;
            template.on_delete = on_delete;
        })
    }

    /// Overrides the constrained flag of one reference at runtime.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the reference is not declared.
    pub fn set_constrained(&self, table: TableId, reference: &str, value: bool) -> CoreResult<()> {
        self.with_reference(table, reference, |template| template.constrained = value)
    }

    /// Overrides the auto-delete flag of one reference at runtime.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the reference is not declared.
    pub fn set_auto_delete(&self, table: TableId, reference: &str, value: bool) -> CoreResult<()> {
        self.with_reference(table, reference, |template| template.auto_delete = value)
    }

    fn with_reference(
        &self,
        table: TableId,
        reference: &str,
        mutate: impl FnOnce(&mut ReferenceTemplate),
    ) -> CoreResult<()> {
        let mut inner = self.inner.write();
        let template = inner
            .references
            .get_mut(&table)
            .and_then(|templates| templates.iter_mut().find(|t| t.name == reference))
            .ok_or_else(|| {
                CoreError::invalid_operation(format!(
                    "reference '{reference}' not declared on {table}"
                ))
            })?;
        mutate(template);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repository() -> MetadataRepository {
        let repo = MetadataRepository::new();
        repo.register_table(TableDescriptor::new(TableId::new(1), "parent").version_field("version"));
        repo.register_table(TableDescriptor::new(TableId::new(2), "child"));
        repo.register_reference(
            ReferenceTemplate::new("children", TableId::new(1), TableId::new(2), Cardinality::OneToMany)
                .foreign_key("parent_id"),
        );
        repo
    }

    #[test]
    fn references_of_unknown_table_is_empty() {
        let repo = repository();
        assert!(repo.references_of(TableId::new(9)).is_empty());
    }

    #[test]
    fn version_field_comes_from_descriptor() {
        let repo = repository();
        assert_eq!(repo.version_field(TableId::new(1)), Some("version".to_owned()));
        assert_eq!(repo.version_field(TableId::new(2)), None);
    }

    #[test]
    fn set_cascade_policy_takes_effect_on_next_read() {
        let repo = repository();
        let before = repo.references_of(TableId::new(1));
        assert_eq!(before[0].on_delete, CascadePolicy::None);

        repo.set_cascade_policy(
            TableId::new(1),
            "children",
            CascadePolicy::None,
            CascadePolicy::Object,
        )
        .unwrap();

        let after = repo.references_of(TableId::new(1));
        assert_eq!(after[0].on_delete, CascadePolicy::Object);
        // The earlier clone is unaffected; policies are read fresh.
        assert_eq!(before[0].on_delete, CascadePolicy::None);
    }

    #[test]
    fn set_cascade_policy_on_unknown_reference_fails() {
        let repo = repository();
        let result = repo.set_cascade_policy(
            TableId::new(1),
            "missing",
            CascadePolicy::None,
            CascadePolicy::None,
        );
        assert!(matches!(result, Err(CoreError::InvalidOperation { .. })));
    }

    #[test]
    fn set_constrained_overrides_flag() {
        let repo = repository();
        repo.set_constrained(TableId::new(1), "children", true).unwrap();
        assert!(repo.references_of(TableId::new(1))[0].constrained);
    }

    #[test]
    fn policy_for_selects_direction() {
        let template = ReferenceTemplate::new(
            "r",
            TableId::new(1),
            TableId::new(2),
            Cardinality::OneToOne,
        )
        .on_insert(CascadePolicy::Object)
        .on_delete(CascadePolicy::Link);

        assert_eq!(template.policy_for(Direction::Insert), CascadePolicy::Object);
        assert_eq!(template.policy_for(Direction::Delete), CascadePolicy::Link);
    }
}
