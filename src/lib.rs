//! # cqlmap: relational rows over CQL tables
//!
//! Maps the columns of a relational table onto a wide-column store that
//! speaks CQL, and moves rows across in both directions.
//!
//! ## Quick Example
//!
//! ```rust
//! use cqlmap::prelude::*;
//!
//! let schema = TableSchema::new(vec![
//!     ColumnDescriptor::new("id", RelationalType::Long).not_null(),
//!     ColumnDescriptor::new("name", RelationalType::VarChar { length: 32 }),
//! ])?;
//!
//! // Write a row into a caller-owned buffer
//! let layout = schema.layout();
//! let mut row = layout.new_buffer();
//! write_field(schema.column(0), layout.slot(0), &mut row, &Value::Int(7))?;
//! write_field(schema.column(1), layout.slot(1), &mut row, &Value::text("O'Brien"))?;
//!
//! let builder = StatementBuilder::new(&schema, "ks", "people");
//! assert_eq!(
//!     builder.build_insert(&row),
//!     "INSERT INTO ks.people (id, name) VALUES (7, 'O''Brien')"
//! );
//!
//! // And read a result row back
//! let result = TabularResult::new(["NAME", "ID"], vec![vec!["Ann".into(), "8".into()]]);
//! materialize_row(&schema, &result, 0, &mut row)?;
//! assert_eq!(read_field(schema.column(0), layout.slot(0), &row), Value::Int(8));
//! # Ok::<(), cqlmap::CqlError>(())
//! ```
//!
//! ## Layers
//!
//! | Module | Role |
//! |--------|------|
//! | [`types`], [`value`], [`wire`] | type mapping, literals, cell parsing |
//! | [`row`] | row buffer layout and field codec |
//! | [`statement`] | CQL statement construction |
//! | [`materialize`] | result rows into row buffers |
//! | [`engine`] | table handle over an execution adapter |
//! | [`config`] | connection settings |

pub mod config;
pub mod diagnostic;
pub mod engine;
pub mod error;
mod hex;
pub mod materialize;
pub mod result;
pub mod row;
pub mod schema;
pub mod statement;
pub mod types;
pub mod value;
pub mod wire;

pub use error::{CqlError, CqlResult};

pub mod prelude {
    pub use crate::config::{ConnectionConfig, TableRef};
    pub use crate::diagnostic::{Diagnostic, DiagnosticKind, DiagnosticSink, TracingSink};
    pub use crate::engine::{CqlTable, ExecutionError, Executor, RowPosition};
    pub use crate::error::*;
    pub use crate::materialize::{EndOfRows, HeaderMatch, materialize_row, materialize_row_with};
    pub use crate::result::{NativeValue, TabularResult};
    pub use crate::row::{FieldSlot, KeyLayout, RowLayout, read_field, write_field};
    pub use crate::schema::{ColumnDescriptor, RelationalType, TableSchema};
    pub use crate::statement::{KeyPartMap, SelectOptions, StatementBuilder};
    pub use crate::types::{CqlType, can_be_key, is_supported, map_type};
    pub use crate::value::{Value, to_literal};
    pub use crate::wire::from_wire;
}
