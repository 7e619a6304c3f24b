//! Cell values and column metadata exchanged with remote tables

use std::cmp::Ordering;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::constants::DATE_TIME_FORMAT;

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Char(char),
    String(String),
    DateTime(NaiveDateTime),
}

impl Value {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// String view of the value, if it is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Total order used for sorting: nulls first, then by type-specific order.
    ///
    /// Values of unrelated types compare equal so a mixed column keeps its
    /// original relative order under a stable sort.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Char(a), Value::Char(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            },
        }
    }

    /// Absolute value for numeric values, unchanged otherwise
    pub fn abs(&self) -> Value {
        match self {
            Value::Int(v) => Value::Int(v.saturating_abs()),
            Value::Double(v) => Value::Double(v.abs()),
            other => other.clone(),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Char(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
            Value::DateTime(v) => write!(f, "{}", v.format(DATE_TIME_FORMAT)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Value::Char(v)
    }
}

/// Column data type as reported by the remote table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnType {
    Boolean,
    Char,
    Int,
    Long,
    Double,
    String,
    DateTime,
    Other,
}

impl ColumnType {
    /// Map a remote type name (e.g. `java.lang.String`, `int`) to a column type
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "boolean" | "java.lang.Boolean" => ColumnType::Boolean,
            "char" | "java.lang.Character" => ColumnType::Char,
            "byte" | "short" | "int" | "java.lang.Byte" | "java.lang.Short"
            | "java.lang.Integer" => ColumnType::Int,
            "long" | "java.lang.Long" | "java.math.BigInteger" => ColumnType::Long,
            "float" | "double" | "java.lang.Float" | "java.lang.Double"
            | "java.math.BigDecimal" => ColumnType::Double,
            "java.lang.String" => ColumnType::String,
            "java.time.Instant" | "java.time.ZonedDateTime" | "java.time.LocalDateTime"
            | "io.deephaven.time.DateTime" => ColumnType::DateTime,
            _ => ColumnType::Other,
        }
    }

    /// Check if the column holds numbers
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Int | ColumnType::Long | ColumnType::Double)
    }
}

/// A column of a remote table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Column data type
    pub column_type: ColumnType,
}

impl Column {
    /// Create a new column
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}
