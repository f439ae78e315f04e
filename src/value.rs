//! Logical column values and their CQL literal rendering.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

use crate::schema::{ColumnDescriptor, RelationalType};
use crate::types::{CqlType, map_type};

/// A value read from (or about to be written to) a row buffer field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Any integer column.
    Int(i64),
    /// Float or double column. Float columns round through `f32`.
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    /// Date-time or timestamp, calendar fields in UTC.
    DateTime(NaiveDateTime),
    /// 1-based enum label index, 0 for the empty value.
    Enum(u16),
    /// Set label bitmask, bit `i` for label `i`.
    Set(u64),
    Bool(bool),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Render a value as a CQL literal for the given column.
///
/// NULL becomes the bare keyword `NULL`. Text is single-quoted with every
/// `'` doubled, binary data is `0x` followed by lowercase hex, timestamps
/// are epoch milliseconds.
pub fn to_literal(column: &ColumnDescriptor, value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Int(n) => match column.relational_type {
            RelationalType::Bit => (*n != 0).to_string(),
            _ => n.to_string(),
        },
        Value::Float(f) => match column.relational_type {
            RelationalType::Float => format_f32(*f as f32),
            _ => format_f64(*f),
        },
        Value::Decimal(d) => d.to_string(),
        Value::Text(s) => {
            if map_type(column) == CqlType::Blob {
                hex_literal(s.as_bytes())
            } else {
                quote(s)
            }
        }
        Value::Bytes(b) => {
            if map_type(column) == CqlType::Blob {
                hex_literal(b)
            } else {
                quote(&String::from_utf8_lossy(b))
            }
        }
        Value::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
        Value::Time(t) => format!("'{}'", t.format("%H:%M:%S")),
        Value::DateTime(dt) => dt.and_utc().timestamp_millis().to_string(),
        Value::Enum(idx) => quote(enum_label(column.relational_type.labels(), *idx)),
        Value::Set(mask) => quote(&set_labels(column.relational_type.labels(), *mask)),
        Value::Bool(b) => b.to_string(),
    }
}

/// Quote a string literal, doubling every single quote.
pub fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Reverse of [`quote`]. Returns `None` if `literal` is not a well-formed
/// single-quoted CQL string.
pub fn unquote(literal: &str) -> Option<String> {
    let inner = literal.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\'' {
            // A lone quote would have ended the literal early.
            if chars.next() != Some('\'') {
                return None;
            }
        }
        out.push(c);
    }
    Some(out)
}

fn hex_literal(bytes: &[u8]) -> String {
    format!("0x{}", crate::hex::encode(bytes))
}

/// Label for a 1-based enum index; out-of-range indices render empty.
pub(crate) fn enum_label(labels: &[String], idx: u16) -> &str {
    match idx {
        0 => "",
        n => labels.get(n as usize - 1).map(String::as_str).unwrap_or(""),
    }
}

/// Comma-joined labels for a set bitmask, in declaration order.
pub(crate) fn set_labels(labels: &[String], mask: u64) -> String {
    labels
        .iter()
        .enumerate()
        .filter(|(i, _)| mask & (1u64 << i) != 0)
        .map(|(_, l)| l.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// Shortest representation that parses back to the same `f64`.
pub(crate) fn format_f64(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        let s = if f > 0.0 { "Infinity" } else { "-Infinity" };
        s.to_string()
    } else {
        format!("{:?}", f)
    }
}

/// Shortest representation that parses back to the same `f32`.
pub(crate) fn format_f32(f: f32) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        let s = if f > 0.0 { "Infinity" } else { "-Infinity" };
        s.to_string()
    } else {
        format!("{:?}", f)
    }
}
