//! Dynamic field value type.

use std::fmt;
use uuid::Uuid;

/// A dynamic field value inside a [`crate::RowImage`].
///
/// Values are deliberately flat - nested structures belong to the object
/// layer, not to a row image. Floats are excluded so that values stay
/// `Eq + Hash` and usable inside primary keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Boolean column.
    Bool(bool),
    /// Signed integer column (full i64 range).
    Int(i64),
    /// UTF-8 text column.
    Text(String),
    /// Raw byte column.
    Bytes(Vec<u8>),
    /// UUID column (surrogate keys).
    Uuid(Uuid),
}

impl Value {
    /// Creates a text value.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Returns true if the value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the integer content, if any.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the text content, if any.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "'{s}'"),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Self::Uuid(u) => write!(f, "{u}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_null() {
        assert!(Value::Null.is_null());
        assert!(!Value::Int(0).is_null());
    }

    #[test]
    fn accessors_match_variant() {
        assert_eq!(Value::Int(42).as_i64(), Some(42));
        assert_eq!(Value::text("x").as_text(), Some("x"));
        assert_eq!(Value::Int(42).as_text(), None);
    }

    #[test]
    fn display_quotes_text() {
        assert_eq!(format!("{}", Value::text("a")), "'a'");
        assert_eq!(format!("{}", Value::Null), "NULL");
    }
}
