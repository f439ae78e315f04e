//! Relational type → CQL type mapping.
//!
//! | relational family | CQL type |
//! |---|---|
//! | tinyint / smallint / mediumint, int / bigint | `tinyint` / `smallint` / `int` / `bigint` |
//! | float / double / decimal | `float` / `double` / `decimal` |
//! | char, varchar | `text` |
//! | blob | `blob` (binary charset) or `text` |
//! | date / time / datetime, timestamp | `date` / `time` / `timestamp` |
//! | enum, set, json, anything else | `text` |
//! | bit | `boolean` |

use std::fmt;

use crate::schema::{ColumnDescriptor, RelationalType};

/// Column type in the target store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CqlType {
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Decimal,
    Text,
    Blob,
    Date,
    Time,
    Timestamp,
    Boolean,
}

impl CqlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CqlType::TinyInt => "tinyint",
            CqlType::SmallInt => "smallint",
            CqlType::Int => "int",
            CqlType::BigInt => "bigint",
            CqlType::Float => "float",
            CqlType::Double => "double",
            CqlType::Decimal => "decimal",
            CqlType::Text => "text",
            CqlType::Blob => "blob",
            CqlType::Date => "date",
            CqlType::Time => "time",
            CqlType::Timestamp => "timestamp",
            CqlType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for CqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a column to its CQL type. Total: unknown types become `text`.
pub fn map_type(column: &ColumnDescriptor) -> CqlType {
    match &column.relational_type {
        RelationalType::Tiny => CqlType::TinyInt,
        RelationalType::Short => CqlType::SmallInt,
        RelationalType::Medium | RelationalType::Long => CqlType::Int,
        RelationalType::LongLong => CqlType::BigInt,
        RelationalType::Float => CqlType::Float,
        RelationalType::Double => CqlType::Double,
        RelationalType::Decimal { .. } => CqlType::Decimal,
        RelationalType::Char { .. } | RelationalType::VarChar { .. } => CqlType::Text,
        RelationalType::Blob { .. } if column.binary_charset => CqlType::Blob,
        RelationalType::Blob { .. } => CqlType::Text,
        RelationalType::Date => CqlType::Date,
        RelationalType::Time { .. } => CqlType::Time,
        RelationalType::DateTime { .. } | RelationalType::Timestamp { .. } => CqlType::Timestamp,
        RelationalType::Enum(_) | RelationalType::Set(_) => CqlType::Text,
        RelationalType::Json { .. } => CqlType::Text,
        RelationalType::Bit => CqlType::Boolean,
        RelationalType::Other { .. } => CqlType::Text,
    }
}

/// Whether the type has a dedicated mapping (as opposed to the text fallback).
pub fn is_supported(ty: &RelationalType) -> bool {
    !matches!(ty, RelationalType::Other { .. })
}

/// Whether a column of this type may be part of a partition or clustering key.
///
/// Unbounded large objects are excluded.
pub fn can_be_key(ty: &RelationalType) -> bool {
    !matches!(ty, RelationalType::Blob { .. } | RelationalType::Json { .. })
}
