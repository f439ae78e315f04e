//! CQL statement construction.
//!
//! Identifiers are emitted unquoted and lower-cased, matching the case
//! folding the target store applies to unquoted names. Values come from
//! row buffers through [`to_literal`].

use crate::row::{read_field, read_key_part};
use crate::schema::TableSchema;
use crate::types::map_type;
use crate::value::to_literal;

/// Which key parts a partial-key lookup binds, bit `i` for part `i`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KeyPartMap(u64);

impl KeyPartMap {
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// The first `parts` key parts.
    pub fn prefix(parts: usize) -> Self {
        match parts {
            0 => Self(0),
            n if n >= 64 => Self(u64::MAX),
            n => Self((1u64 << n) - 1),
        }
    }

    pub fn bits(&self) -> u64 {
        self.0
    }

    pub fn contains(&self, part: usize) -> bool {
        part < 64 && self.0 & (1 << part) != 0
    }

    /// Number of parts bound before the first gap.
    pub fn leading_parts(&self) -> usize {
        self.0.trailing_ones() as usize
    }
}

/// Options for [`StatementBuilder::build_select`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectOptions {
    /// Predicate text inserted after `WHERE`; blank means no clause.
    pub where_clause: Option<String>,
    /// Append `ALLOW FILTERING`.
    pub allow_filtering: bool,
    pub limit: Option<u64>,
}

impl SelectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, where_clause: impl Into<String>) -> Self {
        self.where_clause = Some(where_clause.into());
        self
    }

    pub fn allow_filtering(mut self) -> Self {
        self.allow_filtering = true;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Builds statements for one table.
#[derive(Debug, Clone)]
pub struct StatementBuilder<'a> {
    schema: &'a TableSchema,
    keyspace: String,
    table: String,
}

impl<'a> StatementBuilder<'a> {
    pub fn new(schema: &'a TableSchema, keyspace: &str, table: &str) -> Self {
        Self {
            schema,
            keyspace: keyspace.to_lowercase(),
            table: table.to_lowercase(),
        }
    }

    /// `keyspace.table`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.keyspace, self.table)
    }

    fn column_name(&self, idx: usize) -> String {
        self.schema.column(idx).name.to_lowercase()
    }

    fn column_list(&self) -> String {
        (0..self.schema.column_count())
            .map(|idx| self.column_name(idx))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn literal(&self, idx: usize, row: &[u8]) -> String {
        let column = self.schema.column(idx);
        let value = read_field(column, self.schema.layout().slot(idx), row);
        to_literal(column, &value)
    }

    /// `CREATE TABLE IF NOT EXISTS ks.t (col type, ..., PRIMARY KEY (k, ...))`
    pub fn build_create(&self) -> String {
        let mut cql = format!("CREATE TABLE IF NOT EXISTS {} (", self.qualified_name());
        for (idx, column) in self.schema.columns().iter().enumerate() {
            if idx > 0 {
                cql.push_str(", ");
            }
            cql.push_str(&self.column_name(idx));
            cql.push(' ');
            cql.push_str(map_type(column).as_str());
        }

        let key = self
            .schema
            .key_columns()
            .iter()
            .map(|&idx| self.column_name(idx))
            .collect::<Vec<_>>()
            .join(", ");
        cql.push_str(", PRIMARY KEY (");
        cql.push_str(&key);
        cql.push_str("))");
        cql
    }

    /// `INSERT INTO ks.t (cols) VALUES (literals)` for every column of `row`.
    pub fn build_insert(&self, row: &[u8]) -> String {
        self.schema.layout().check(row);
        let values = (0..self.schema.column_count())
            .map(|idx| self.literal(idx, row))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.qualified_name(),
            self.column_list(),
            values
        )
    }

    /// `UPDATE ks.t SET ... WHERE ...`.
    ///
    /// Non-key columns are set from `new_row`; the key is taken from
    /// `old_row`. Returns `None` when every column is a key column.
    pub fn build_update(&self, old_row: &[u8], new_row: &[u8]) -> Option<String> {
        self.schema.layout().check(old_row);
        self.schema.layout().check(new_row);

        let assignments = (0..self.schema.column_count())
            .filter(|&idx| !self.schema.is_key_column(idx))
            .map(|idx| format!("{} = {}", self.column_name(idx), self.literal(idx, new_row)))
            .collect::<Vec<_>>();
        if assignments.is_empty() {
            return None;
        }

        Some(format!(
            "UPDATE {} SET {} WHERE {}",
            self.qualified_name(),
            assignments.join(", "),
            self.key_clause(old_row)
        ))
    }

    /// `DELETE FROM ks.t WHERE <key of row>`
    pub fn build_delete(&self, row: &[u8]) -> String {
        self.schema.layout().check(row);
        format!(
            "DELETE FROM {} WHERE {}",
            self.qualified_name(),
            self.key_clause(row)
        )
    }

    /// `SELECT cols FROM ks.t [WHERE ...] [LIMIT n] [ALLOW FILTERING]`
    pub fn build_select(&self, options: &SelectOptions) -> String {
        let mut cql = format!("SELECT {} FROM {}", self.column_list(), self.qualified_name());
        if let Some(clause) = options
            .where_clause
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
        {
            cql.push_str(" WHERE ");
            cql.push_str(clause);
        }
        if let Some(limit) = options.limit {
            cql.push_str(&format!(" LIMIT {}", limit));
        }
        if options.allow_filtering {
            cql.push_str(" ALLOW FILTERING");
        }
        cql
    }

    /// Equality clause over the bound leading parts of a key buffer.
    ///
    /// Parts are taken in key order up to the first part missing from
    /// `parts`; later bits are ignored. Empty when part 0 is not bound.
    ///
    /// # Panics
    ///
    /// If `parts` names a part the key does not have, or `key` is too short
    /// for the parts it binds.
    pub fn build_where_from_key(&self, key: &[u8], parts: KeyPartMap) -> String {
        let key_parts = self.schema.key_layout().parts();
        assert!(
            parts.bits().checked_shr(key_parts.len() as u32).unwrap_or(0) == 0,
            "key part map {:#b} exceeds the {}-part key",
            parts.bits(),
            key_parts.len()
        );

        key_parts
            .iter()
            .take(parts.leading_parts())
            .map(|part| {
                let column = self.schema.column(part.column);
                let value = read_key_part(column, part, key);
                format!("{} = {}", self.column_name(part.column), to_literal(column, &value))
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// `DROP TABLE IF EXISTS ks.t`
    pub fn build_drop(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.qualified_name())
    }

    /// `TRUNCATE ks.t`
    pub fn build_truncate(&self) -> String {
        format!("TRUNCATE {}", self.qualified_name())
    }

    fn key_clause(&self, row: &[u8]) -> String {
        self.schema
            .key_columns()
            .iter()
            .map(|&idx| format!("{} = {}", self.column_name(idx), self.literal(idx, row)))
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

/// `CREATE KEYSPACE IF NOT EXISTS ks WITH replication = {...}` using
/// `SimpleStrategy`.
pub fn build_create_keyspace(keyspace: &str, replication_factor: u32) -> String {
    format!(
        "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
        keyspace.to_lowercase(),
        replication_factor
    )
}

/// `USE ks`
pub fn build_use(keyspace: &str) -> String {
    format!("USE {}", keyspace.to_lowercase())
}
