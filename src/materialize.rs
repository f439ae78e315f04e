//! Result rows → caller-owned row buffers.

use thiserror::Error;

use crate::diagnostic::{Diagnostic, DiagnosticSink, TracingSink};
use crate::result::TabularResult;
use crate::row::set_null;
use crate::schema::TableSchema;
use crate::wire::from_wire;

/// The requested row is past the end of the result.
///
/// Not a failure: scans use it to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no more rows")]
pub struct EndOfRows;

/// Position of each schema column in a result header.
///
/// Names match ignoring ASCII case; when the header repeats a name the
/// first occurrence wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMatch {
    positions: Vec<Option<usize>>,
}

impl HeaderMatch {
    pub fn new(schema: &TableSchema, header: &[String]) -> Self {
        let mut positions = vec![None; schema.column_count()];
        for (pos, name) in header.iter().enumerate() {
            if let Some(idx) = schema.position(name) {
                positions[idx].get_or_insert(pos);
            }
        }
        Self { positions }
    }

    /// Result position of schema column `column`, if the header has it.
    pub fn position(&self, column: usize) -> Option<usize> {
        self.positions.get(column).copied().flatten()
    }

    /// Schema columns the header does not mention.
    pub fn missing(&self) -> impl Iterator<Item = usize> + '_ {
        self.positions
            .iter()
            .enumerate()
            .filter(|(_, pos)| pos.is_none())
            .map(|(idx, _)| idx)
    }
}

/// Store row `index` of `result` into `buf`, logging lenient conversions.
pub fn materialize_row(
    schema: &TableSchema,
    result: &TabularResult,
    index: usize,
    buf: &mut [u8],
) -> Result<(), EndOfRows> {
    materialize_row_with(schema, result, index, buf, &mut TracingSink)
}

/// Like [`materialize_row`], reporting lenient conversions to `sink`.
pub fn materialize_row_with(
    schema: &TableSchema,
    result: &TabularResult,
    index: usize,
    buf: &mut [u8],
    sink: &mut dyn DiagnosticSink,
) -> Result<(), EndOfRows> {
    let header = HeaderMatch::new(schema, &result.columns);
    materialize_matched(schema, &header, result, index, buf, sink)
}

/// Store one row using a header match computed once per result.
///
/// Every presence bit is cleared first, so columns the header omits read
/// as NULL. Only the bitmap and the fields of matched columns are written.
pub fn materialize_matched(
    schema: &TableSchema,
    header: &HeaderMatch,
    result: &TabularResult,
    index: usize,
    buf: &mut [u8],
    sink: &mut dyn DiagnosticSink,
) -> Result<(), EndOfRows> {
    let row = result.row(index).ok_or(EndOfRows)?;
    let layout = schema.layout();
    layout.reset_nulls(buf);

    for (idx, column) in schema.columns().iter().enumerate() {
        let slot = layout.slot(idx);
        let Some(cell) = header.position(idx).and_then(|pos| row.get(pos)) else {
            set_null(slot, buf);
            continue;
        };
        if let Some(kind) = from_wire(column, slot, buf, cell) {
            sink.report(Diagnostic {
                column: column.name.clone(),
                kind,
                raw: cell.clone(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::DiagnosticKind;
    use crate::row::read_field;
    use crate::schema::{ColumnDescriptor, RelationalType};
    use crate::value::Value;

    fn schema() -> TableSchema {
        TableSchema::new(vec![
            ColumnDescriptor::new("id", RelationalType::Long),
            ColumnDescriptor::new("email", RelationalType::VarChar { length: 64 }),
        ])
        .unwrap()
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_header_match_ignores_case_and_order() {
        let schema = schema();
        let header = row(&["Email", "ID", "email"]);
        let matched = HeaderMatch::new(&schema, &header);
        assert_eq!(matched.position(0), Some(1));
        assert_eq!(matched.position(1), Some(0));
        assert_eq!(matched.missing().count(), 0);
    }

    #[test]
    fn test_out_of_range_row_is_end_of_rows() {
        let schema = schema();
        let result = TabularResult::new(["id"], vec![row(&["1"])]);
        let mut buf = schema.layout().new_buffer();
        assert_eq!(materialize_row(&schema, &result, 1, &mut buf), Err(EndOfRows));
    }

    #[test]
    fn test_stale_values_are_cleared() {
        let schema = schema();
        let mut buf = schema.layout().new_buffer();
        let full = TabularResult::new(["id", "email"], vec![row(&["1", "a@b"])]);
        materialize_row(&schema, &full, 0, &mut buf).unwrap();

        let partial = TabularResult::new(["id"], vec![row(&["2"])]);
        materialize_row(&schema, &partial, 0, &mut buf).unwrap();
        let layout = schema.layout();
        assert_eq!(read_field(schema.column(0), layout.slot(0), &buf), Value::Int(2));
        assert_eq!(read_field(schema.column(1), layout.slot(1), &buf), Value::Null);
    }

    #[test]
    fn test_diagnostics_reach_sink() {
        let schema = schema();
        let result = TabularResult::new(["id", "email"], vec![row(&["x1", "a"])]);
        let mut buf = schema.layout().new_buffer();
        let mut sink: Vec<Diagnostic> = Vec::new();
        materialize_row_with(&schema, &result, 0, &mut buf, &mut sink).unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].column, "id");
        assert_eq!(sink[0].kind, DiagnosticKind::NotANumber);
        assert_eq!(sink[0].raw, "x1");
    }

    #[test]
    fn test_short_row_reads_as_null() {
        let schema = schema();
        let result = TabularResult::new(["id", "email"], vec![row(&["5"])]);
        let mut buf = schema.layout().new_buffer();
        materialize_row(&schema, &result, 0, &mut buf).unwrap();
        assert_eq!(
            read_field(schema.column(1), schema.layout().slot(1), &buf),
            Value::Null
        );
    }
}
