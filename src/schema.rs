//! Relational table schema.
//!
//! A [`TableSchema`] is built once when a table is opened or created and is
//! read-only afterwards. Construction validates everything the statement
//! builder and the row codec rely on, so later calls never fail on a
//! well-formed schema.

use std::fmt;

use crate::error::{CqlError, CqlResult};
use crate::row::{KeyLayout, RowLayout};
use crate::types::can_be_key;

/// Largest scale/precision a decimal column may declare.
pub const MAX_DECIMAL_DIGITS: u8 = 28;

/// Largest number of key parts a primary key may have.
pub const MAX_KEY_PARTS: usize = 64;

/// Largest number of labels a SET column may have.
pub const MAX_SET_LABELS: usize = 64;

/// Statically declared SQL type of a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationalType {
    /// 8-bit integer.
    Tiny,
    /// 16-bit integer.
    Short,
    /// 24-bit integer.
    Medium,
    /// 32-bit integer.
    Long,
    /// 64-bit integer.
    LongLong,
    /// Single precision float.
    Float,
    /// Double precision float.
    Double,
    /// Fixed-point decimal.
    Decimal { precision: u8, scale: u8 },
    /// Fixed-length character column.
    Char { length: u32 },
    /// Variable-length character column.
    VarChar { length: u32 },
    /// Large object. Binary or text depending on the column charset.
    Blob { length: u32 },
    /// Calendar date.
    Date,
    /// Time of day with `fsp` fractional second digits.
    Time { fsp: u8 },
    /// Date and time with `fsp` fractional second digits.
    DateTime { fsp: u8 },
    /// Timestamp with `fsp` fractional second digits.
    Timestamp { fsp: u8 },
    /// One label out of a fixed list.
    Enum(Vec<String>),
    /// Any subset of a fixed list of labels.
    Set(Vec<String>),
    /// Structured text.
    Json { length: u32 },
    /// Single-bit flag.
    Bit,
    /// Anything else. Stored and sent as text.
    Other { name: String, length: u32 },
}

impl RelationalType {
    /// SQL spelling of the type, used in messages.
    pub fn name(&self) -> &str {
        match self {
            Self::Tiny => "tinyint",
            Self::Short => "smallint",
            Self::Medium => "mediumint",
            Self::Long => "int",
            Self::LongLong => "bigint",
            Self::Float => "float",
            Self::Double => "double",
            Self::Decimal { .. } => "decimal",
            Self::Char { .. } => "char",
            Self::VarChar { .. } => "varchar",
            Self::Blob { .. } => "blob",
            Self::Date => "date",
            Self::Time { .. } => "time",
            Self::DateTime { .. } => "datetime",
            Self::Timestamp { .. } => "timestamp",
            Self::Enum(_) => "enum",
            Self::Set(_) => "set",
            Self::Json { .. } => "json",
            Self::Bit => "bit",
            Self::Other { name, .. } => name,
        }
    }

    /// Enum or set labels, empty for every other type.
    pub fn labels(&self) -> &[String] {
        match self {
            Self::Enum(labels) | Self::Set(labels) => labels,
            _ => &[],
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Tiny | Self::Short | Self::Medium | Self::Long | Self::LongLong
        )
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            Self::Date | Self::Time { .. } | Self::DateTime { .. } | Self::Timestamp { .. }
        )
    }
}

impl fmt::Display for RelationalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decimal { precision, scale } => write!(f, "decimal({}, {})", precision, scale),
            Self::Char { length } => write!(f, "char({})", length),
            Self::VarChar { length } => write!(f, "varchar({})", length),
            Self::Time { fsp } | Self::DateTime { fsp } | Self::Timestamp { fsp } if *fsp > 0 => {
                write!(f, "{}({})", self.name(), fsp)
            }
            other => f.write_str(other.name()),
        }
    }
}

/// One column of a relational table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub relational_type: RelationalType,
    pub binary_charset: bool,
    pub nullable: bool,
}

impl ColumnDescriptor {
    /// A nullable, non-binary column.
    pub fn new(name: impl Into<String>, relational_type: RelationalType) -> Self {
        Self {
            name: name.into(),
            relational_type,
            binary_charset: false,
            nullable: true,
        }
    }

    /// Mark the column as using the binary character set.
    pub fn binary(mut self) -> Self {
        self.binary_charset = true;
        self
    }

    /// Mark the column as `NOT NULL`.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// Ordered columns plus an optional primary key.
///
/// Without a declared key the first column acts as the key. That fallback
/// is applied consistently by DDL, key clauses and updates.
#[derive(Debug, Clone)]
pub struct TableSchema {
    columns: Vec<ColumnDescriptor>,
    primary_key: Option<Vec<String>>,
    key_columns: Vec<usize>,
    layout: RowLayout,
    key_layout: KeyLayout,
}

impl TableSchema {
    /// Build a schema whose key falls back to the first column.
    pub fn new(columns: Vec<ColumnDescriptor>) -> CqlResult<Self> {
        Self::build(columns, None)
    }

    /// Build a schema with a declared (possibly composite) primary key.
    pub fn with_primary_key<I, S>(columns: Vec<ColumnDescriptor>, key: I) -> CqlResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key: Vec<String> = key.into_iter().map(Into::into).collect();
        Self::build(columns, Some(key))
    }

    fn build(columns: Vec<ColumnDescriptor>, primary_key: Option<Vec<String>>) -> CqlResult<Self> {
        if columns.is_empty() {
            return Err(CqlError::schema("table has no columns"));
        }

        for (i, column) in columns.iter().enumerate() {
            validate_column(column)?;
            if columns[..i]
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(&column.name))
            {
                return Err(CqlError::schema(format!("duplicate column '{}'", column.name)));
            }
        }

        // The first-column fallback is taken whatever its type.
        let key_columns = match &primary_key {
            Some(names) => {
                let key_columns = resolve_key(&columns, names)?;
                for &idx in &key_columns {
                    let column = &columns[idx];
                    if !can_be_key(&column.relational_type) {
                        return Err(CqlError::schema(format!(
                            "column '{}' of type {} cannot be part of a key",
                            column.name, column.relational_type
                        )));
                    }
                }
                key_columns
            }
            None => vec![0],
        };

        let layout = RowLayout::new(&columns);
        let key_layout = KeyLayout::new(&columns, &key_columns);

        Ok(Self {
            columns,
            primary_key,
            key_columns,
            layout,
            key_layout,
        })
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn column(&self, idx: usize) -> &ColumnDescriptor {
        &self.columns[idx]
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Find a column by name, ignoring ASCII case.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// The declared primary key, if any.
    pub fn primary_key(&self) -> Option<&[String]> {
        self.primary_key.as_deref()
    }

    /// Column indices of the effective key, in key order.
    pub fn key_columns(&self) -> &[usize] {
        &self.key_columns
    }

    pub fn is_key_column(&self, idx: usize) -> bool {
        self.key_columns.contains(&idx)
    }

    /// Byte-offset table of the row buffer.
    pub fn layout(&self) -> &RowLayout {
        &self.layout
    }

    /// Layout of key buffers for the effective key.
    pub fn key_layout(&self) -> &KeyLayout {
        &self.key_layout
    }
}

fn validate_column(column: &ColumnDescriptor) -> CqlResult<()> {
    if column.name.is_empty() {
        return Err(CqlError::schema("column with empty name"));
    }

    match &column.relational_type {
        RelationalType::Decimal { precision, scale } => {
            if *precision == 0 || *precision > MAX_DECIMAL_DIGITS || scale > precision {
                return Err(CqlError::schema(format!(
                    "column '{}': decimal({}, {}) is outside decimal(1..={}, 0..=precision)",
                    column.name, precision, scale, MAX_DECIMAL_DIGITS
                )));
            }
        }
        RelationalType::Time { fsp }
        | RelationalType::DateTime { fsp }
        | RelationalType::Timestamp { fsp } => {
            if *fsp > 6 {
                return Err(CqlError::schema(format!(
                    "column '{}': fractional second precision {} exceeds 6",
                    column.name, fsp
                )));
            }
        }
        RelationalType::Enum(labels) => {
            if labels.is_empty() || labels.len() > u16::MAX as usize {
                return Err(CqlError::schema(format!(
                    "column '{}': enum needs 1..={} labels",
                    column.name,
                    u16::MAX
                )));
            }
        }
        RelationalType::Set(labels) => {
            if labels.is_empty() || labels.len() > MAX_SET_LABELS {
                return Err(CqlError::schema(format!(
                    "column '{}': set needs 1..={} labels",
                    column.name, MAX_SET_LABELS
                )));
            }
            if labels.iter().any(|l| l.contains(',')) {
                return Err(CqlError::schema(format!(
                    "column '{}': set labels cannot contain ','",
                    column.name
                )));
            }
        }
        _ => {}
    }

    Ok(())
}

fn resolve_key(columns: &[ColumnDescriptor], names: &[String]) -> CqlResult<Vec<usize>> {
    if names.is_empty() {
        return Err(CqlError::schema("primary key has no parts"));
    }
    if names.len() > MAX_KEY_PARTS {
        return Err(CqlError::schema(format!(
            "primary key has {} parts, at most {} are supported",
            names.len(),
            MAX_KEY_PARTS
        )));
    }

    let mut indices = Vec::with_capacity(names.len());
    for name in names {
        let idx = columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| CqlError::schema(format!("key references unknown column '{}'", name)))?;
        if indices.contains(&idx) {
            return Err(CqlError::schema(format!("key lists column '{}' twice", name)));
        }
        indices.push(idx);
    }
    Ok(indices)
}
