//! Row addressing and row images.

use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Identifier for a mapped table.
///
/// Table IDs are stable and assigned when class descriptors are registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableId(pub u32);

impl TableId {
    /// Creates a new table ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table:{}", self.0)
    }
}

/// Typed primary-key value for one row.
///
/// Keys are immutable once assigned. Composite keys are supported for
/// legacy schemas; new tables usually carry a surrogate [`RowKey::Uuid`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RowKey {
    /// Single integer key column.
    Int(i64),
    /// Single text key column.
    Text(String),
    /// Surrogate UUID key column.
    Uuid(Uuid),
    /// Multi-column key, in declared column order.
    Composite(Vec<RowKey>),
}

impl RowKey {
    /// Creates an integer key.
    #[must_use]
    pub const fn from_i64(v: i64) -> Self {
        Self::Int(v)
    }

    /// Creates a text key.
    pub fn from_text(v: impl Into<String>) -> Self {
        Self::Text(v.into())
    }

    /// Creates a fresh random surrogate key.
    #[must_use]
    pub fn random() -> Self {
        Self::Uuid(Uuid::new_v4())
    }

    /// Converts the key to a field value for foreign-key columns.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(v) => Value::Int(*v),
            Self::Text(s) => Value::Text(s.clone()),
            Self::Uuid(u) => Value::Uuid(*u),
            // Composite foreign keys are stored column-by-column by the
            // store implementation; the single-value form is textual.
            Self::Composite(_) => Value::Text(self.to_string()),
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Uuid(u) => write!(f, "{u}"),
            Self::Composite(parts) => {
                write!(f, "(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{part}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<i64> for RowKey {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for RowKey {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

/// A materialized image of one row: column name to field value.
///
/// Row images are what the unit-of-work core snapshots at lock time and
/// hands back to the store at flush time. Columns are kept sorted so two
/// images of the same row compare deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowImage {
    fields: BTreeMap<String, Value>,
}

impl RowImage {
    /// Creates an empty row image.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field value, replacing any previous value.
    pub fn set(&mut self, field: impl Into<String>, value: Value) -> &mut Self {
        self.fields.insert(field.into(), value);
        self
    }

    /// Gets a field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Removes a field, returning its previous value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Returns true if the image has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Iterates over fields in column-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<S: Into<String>> FromIterator<(S, Value)> for RowImage {
    fn from_iter<I: IntoIterator<Item = (S, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
