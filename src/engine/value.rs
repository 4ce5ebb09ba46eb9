//! Typed cell values produced by columns

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Semantic type of a column, fixed for the lifetime of its table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Int,
    Double,
    String,
    List,
    Time,
    Dict,
    Blob,
    Null,
}

impl ColumnType {
    /// True for the types stats functions can aggregate
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Int | ColumnType::Double | ColumnType::Time)
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::Int => write!(f, "int"),
            ColumnType::Double => write!(f, "float"),
            ColumnType::String => write!(f, "string"),
            ColumnType::List => write!(f, "list"),
            ColumnType::Time => write!(f, "time"),
            ColumnType::Dict => write!(f, "dict"),
            ColumnType::Blob => write!(f, "blob"),
            ColumnType::Null => write!(f, "null"),
        }
    }
}

/// One cell, borrowing from the row it was read from where possible
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Null,
    Int(i64),
    Double(f64),
    Str(Cow<'a, str>),
    /// Seconds since the epoch
    Time(i64),
    /// Elements are scalars or nested lists (e.g. `[host, service, state]`)
    List(Vec<Value<'a>>),
    Dict(Vec<(Cow<'a, str>, Cow<'a, str>)>),
    Blob(Cow<'a, [u8]>),
}

impl<'a> Value<'a> {
    /// The value a column of the given type yields for missing data
    pub fn default_for(column_type: ColumnType) -> Value<'static> {
        match column_type {
            ColumnType::Int => Value::Int(0),
            ColumnType::Double => Value::Double(0.0),
            ColumnType::String => Value::Str(Cow::Borrowed("")),
            ColumnType::List => Value::List(Vec::new()),
            ColumnType::Time => Value::Time(0),
            ColumnType::Dict => Value::Dict(Vec::new()),
            ColumnType::Blob => Value::Blob(Cow::Borrowed(&[])),
            ColumnType::Null => Value::Null,
        }
    }

    /// Numeric view used by stats aggregation
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) | Value::Time(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Shift time values by a timezone offset, leaving other values alone
    pub fn shifted(self, offset: i64) -> Value<'a> {
        match self {
            Value::Time(t) if offset != 0 => Value::Time(t.saturating_add(offset)),
            Value::List(items) if offset != 0 => {
                Value::List(items.into_iter().map(|v| v.shifted(offset)).collect())
            }
            other => other,
        }
    }

    /// Text used when a list element is compared against a filter literal
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Value::Null => Cow::Borrowed(""),
            Value::Int(i) | Value::Time(i) => Cow::Owned(i.to_string()),
            Value::Double(d) => Cow::Owned(d.to_string()),
            Value::Str(s) => Cow::Borrowed(s.as_ref()),
            Value::List(items) => Cow::Owned(
                items
                    .iter()
                    .map(|v| v.to_text().into_owned())
                    .collect::<Vec<_>>()
                    .join("|"),
            ),
            Value::Dict(entries) => Cow::Owned(
                entries
                    .iter()
                    .map(|(k, v)| format!("{} {}", k, v))
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            Value::Blob(bytes) => String::from_utf8_lossy(bytes),
        }
    }
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(s: &'a str) -> Self {
        Value::Str(Cow::Borrowed(s))
    }
}

impl<'a> From<&'a String> for Value<'a> {
    fn from(s: &'a String) -> Self {
        Value::Str(Cow::Borrowed(s.as_str()))
    }
}

impl From<String> for Value<'_> {
    fn from(s: String) -> Self {
        Value::Str(Cow::Owned(s))
    }
}

impl From<i64> for Value<'_> {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value<'_> {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<usize> for Value<'_> {
    fn from(n: usize) -> Self {
        Value::Int(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<bool> for Value<'_> {
    fn from(b: bool) -> Self {
        Value::Int(i64::from(b))
    }
}

impl From<f64> for Value<'_> {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}
