//! Module: value
//! Responsibility: raw column values carried by rows and the normalized
//! identifier values derived from them.
//! Does not own: column extraction (row driver) or entity identity (context).
//! Boundary: everything above this module compares keys through `IdValue`.


use crate::error::RowError;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    hash::{Hash, Hasher},
};

///
/// Value
///
/// One raw column value as delivered by the row source.
/// Floats compare by bit pattern so that `Value` can act as a map key.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float64(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Stable lowercase label for diagnostics.
    #[must_use]
    pub const fn type_label(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Uint(_) => "uint",
            Self::Float64(_) => "float64",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
        }
    }

    /// Interpret this value as a non-negative position (list index).
    #[must_use]
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Int(v) => usize::try_from(*v).ok(),
            Self::Uint(v) => usize::try_from(*v).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Uint(a), Self::Uint(b)) => a == b,
            (Self::Float64(a), Self::Float64(b)) => a.to_bits() == b.to_bits(),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Blob(a), Self::Blob(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Bool(v) => v.hash(state),
            Self::Int(v) => v.hash(state),
            Self::Uint(v) => v.hash(state),
            Self::Float64(v) => v.to_bits().hash(state),
            Self::Text(v) => v.hash(state),
            Self::Blob(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Uint(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "'{v}'"),
            Self::Blob(v) => write!(f, "blob[{}]", v.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::Uint(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

///
/// IdValue
///
/// Normalized identifier value. Unsigned values that fit in `i64` collapse
/// to `Int` so that a foreign key read as `Uint` matches a primary key read
/// as `Int`.
///

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum IdValue {
    Int(i64),
    Uint(u64),
    Text(String),
    Blob(Vec<u8>),
    Composite(Vec<Self>),
}

impl IdValue {
    /// Build an identifier from the values of its key columns.
    ///
    /// Returns `Ok(None)` when every column is NULL (the key is absent on
    /// this row). A partially NULL composite key is malformed.
    pub fn from_columns(
        path: &str,
        columns: &[String],
        values: &[&Value],
    ) -> Result<Option<Self>, RowError> {
        if columns.len() != values.len() {
            return Err(RowError::MalformedKey {
                path: path.to_string(),
                reason: format!(
                    "expected {} key column(s), found {}",
                    columns.len(),
                    values.len()
                ),
            });
        }

        let nulls = values.iter().filter(|v| v.is_null()).count();
        if nulls == values.len() {
            return Ok(None);
        }
        if nulls > 0 {
            return Err(RowError::MalformedKey {
                path: path.to_string(),
                reason: format!("{nulls} of {} key column(s) are null", values.len()),
            });
        }

        let mut parts = Vec::with_capacity(values.len());
        for (column, value) in columns.iter().zip(values) {
            parts.push(Self::from_value(path, column, value)?);
        }

        if parts.len() == 1 {
            Ok(parts.pop())
        } else {
            Ok(Some(Self::Composite(parts)))
        }
    }

    fn from_value(path: &str, column: &str, value: &Value) -> Result<Self, RowError> {
        match value {
            Value::Int(v) => Ok(Self::Int(*v)),
            Value::Uint(v) => Ok(i64::try_from(*v).map_or(Self::Uint(*v), Self::Int)),
            Value::Text(v) => Ok(Self::Text(v.clone())),
            Value::Blob(v) => Ok(Self::Blob(v.clone())),
            Value::Null | Value::Bool(_) | Value::Float64(_) => Err(RowError::KeyTypeMismatch {
                path: path.to_string(),
                column: column.to_string(),
                found: value.type_label(),
            }),
        }
    }

    /// Number of key columns this identifier spans.
    #[must_use]
    pub const fn arity(&self) -> usize {
        match self {
            Self::Composite(parts) => parts.len(),
            _ => 1,
        }
    }
}

impl fmt::Display for IdValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Uint(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "'{v}'"),
            Self::Blob(v) => write!(f, "blob[{}]", v.len()),
            Self::Composite(parts) => {
                f.write_str("(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{part}")?;
                }
                f.write_str(")")
            }
        }
    }
}

impl From<i64> for IdValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for IdValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<&str> for IdValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}
