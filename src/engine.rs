//! Table handle driving statements through an execution adapter.
//!
//! The adapter is anything implementing [`Executor`]: it runs one CQL
//! statement and hands back a [`TabularResult`]. Connecting, pooling and
//! retrying are its business. [`CqlTable`] pairs an adapter with a schema
//! and implements the row-handler operations of a relational engine on top
//! of the statement builder and the row materializer.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;

use crate::config::{ConnectionConfig, TableRef};
use crate::diagnostic::{DiagnosticSink, TracingSink};
use crate::error::{CqlError, CqlResult};
use crate::materialize::{HeaderMatch, materialize_matched};
use crate::result::TabularResult;
use crate::schema::TableSchema;
use crate::statement::{KeyPartMap, SelectOptions, StatementBuilder, build_create_keyspace};

/// Planner estimate of rows in a table.
pub const ESTIMATED_ROWS: u64 = 10_000;

/// Planner estimate of rows in a key range.
pub const ESTIMATED_RANGE_ROWS: u64 = 10;

/// A statement failed in the execution adapter.
///
/// Opaque to this crate: it is logged and propagated, never inspected.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ExecutionError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Runs CQL statements against a namespace-scoped session.
pub trait Executor {
    fn execute(
        &self,
        cql: &str,
    ) -> impl Future<Output = Result<TabularResult, ExecutionError>> + Send;
}

impl<E: Executor + Send + Sync> Executor for Arc<E> {
    fn execute(
        &self,
        cql: &str,
    ) -> impl Future<Output = Result<TabularResult, ExecutionError>> + Send {
        (**self).execute(cql)
    }
}

impl<E: Executor + Send + Sync> Executor for &E {
    fn execute(
        &self,
        cql: &str,
    ) -> impl Future<Output = Result<TabularResult, ExecutionError>> + Send {
        (**self).execute(cql)
    }
}

/// Index of a row in the current result, as returned by
/// [`CqlTable::position`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowPosition(pub usize);

/// Result set of the last scan or key lookup and the read position in it.
#[derive(Debug, Default)]
struct Cursor {
    result: TabularResult,
    header: Option<HeaderMatch>,
    next: usize,
}

impl Cursor {
    fn load(schema: &TableSchema, result: TabularResult) -> Self {
        let header = HeaderMatch::new(schema, &result.columns);
        Self {
            result,
            header: Some(header),
            next: 0,
        }
    }
}

/// A relational table stored in a CQL table.
pub struct CqlTable<E> {
    executor: E,
    schema: TableSchema,
    table: TableRef,
    replication_factor: u32,
    cursor: Cursor,
    sink: Box<dyn DiagnosticSink + Send + Sync>,
}

impl<E: Executor> CqlTable<E> {
    pub fn new(executor: E, schema: TableSchema, table: TableRef) -> Self {
        Self {
            executor,
            schema,
            table,
            replication_factor: 1,
            cursor: Cursor::default(),
            sink: Box::new(TracingSink),
        }
    }

    /// Open the table at `path` (`db/table`) with connection settings.
    pub fn from_config(
        executor: E,
        schema: TableSchema,
        config: &ConnectionConfig,
        path: &str,
    ) -> Self {
        Self::new(executor, schema, config.table_ref(path))
            .with_replication_factor(config.replication_factor)
    }

    pub fn with_replication_factor(mut self, replication_factor: u32) -> Self {
        self.replication_factor = replication_factor;
        self
    }

    /// Send lenient-conversion reports to `sink` instead of the log.
    pub fn with_diagnostics(mut self, sink: impl DiagnosticSink + Send + Sync + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn table_ref(&self) -> &TableRef {
        &self.table
    }

    pub fn builder(&self) -> StatementBuilder<'_> {
        StatementBuilder::new(&self.schema, &self.table.keyspace, &self.table.table)
    }

    async fn run(&self, cql: &str) -> CqlResult<TabularResult> {
        tracing::debug!("Executing CQL: {}", cql);
        match self.executor.execute(cql).await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::warn!("CQL failed: {} ({})", e, cql);
                Err(e.into())
            }
        }
    }

    /// Create the keyspace (best effort) and then the table.
    pub async fn create(&self) -> CqlResult<()> {
        let keyspace = build_create_keyspace(&self.table.keyspace, self.replication_factor);
        if let Err(e) = self.run(&keyspace).await {
            tracing::warn!("Keyspace '{}' not created: {}", self.table.keyspace, e);
        }
        self.run(&self.builder().build_create()).await?;
        Ok(())
    }

    pub async fn drop_table(&self) -> CqlResult<()> {
        self.run(&self.builder().build_drop()).await?;
        Ok(())
    }

    pub async fn truncate(&self) -> CqlResult<()> {
        self.run(&self.builder().build_truncate()).await?;
        Ok(())
    }

    pub async fn rename(&self, _to: &TableRef) -> CqlResult<()> {
        Err(CqlError::Unsupported("rename table"))
    }

    pub async fn write_row(&self, row: &[u8]) -> CqlResult<()> {
        self.run(&self.builder().build_insert(row)).await?;
        Ok(())
    }

    /// Update non-key columns; a table whose columns are all key columns
    /// has nothing to update and issues no statement.
    pub async fn update_row(&self, old_row: &[u8], new_row: &[u8]) -> CqlResult<()> {
        match self.builder().build_update(old_row, new_row) {
            Some(cql) => {
                self.run(&cql).await?;
            }
            None => tracing::debug!("No non-key columns to update in {}", self.table),
        }
        Ok(())
    }

    pub async fn delete_row(&self, row: &[u8]) -> CqlResult<()> {
        self.run(&self.builder().build_delete(row)).await?;
        Ok(())
    }

    /// Fetch the whole table and rewind the cursor.
    pub async fn scan_init(&mut self) -> CqlResult<()> {
        let cql = self
            .builder()
            .build_select(&SelectOptions::new().allow_filtering());
        let result = self.run(&cql).await?;
        tracing::debug!("Scan of {} returned {} rows", self.table, result.len());
        self.cursor = Cursor::load(&self.schema, result);
        Ok(())
    }

    /// Read the next row of the current result into `buf`.
    ///
    /// Fails with [`CqlError::EndOfRows`] once the result is exhausted.
    pub fn scan_next(&mut self, buf: &mut [u8]) -> CqlResult<()> {
        let idx = self.cursor.next;
        self.read_row(idx, buf)?;
        self.cursor.next = idx + 1;
        Ok(())
    }

    pub fn scan_end(&mut self) {
        self.cursor = Cursor::default();
    }

    /// Position of the row last returned by a scan or lookup.
    pub fn position(&self) -> Option<RowPosition> {
        self.cursor.next.checked_sub(1).map(RowPosition)
    }

    /// Re-read a row remembered with [`position`](Self::position).
    pub fn read_at(&mut self, pos: RowPosition, buf: &mut [u8]) -> CqlResult<()> {
        self.read_row(pos.0, buf)
    }

    /// Look up rows by a (possibly partial) key and read the first.
    ///
    /// Fails with [`CqlError::KeyNotFound`] when no row matches.
    pub async fn index_read(
        &mut self,
        buf: &mut [u8],
        key: &[u8],
        parts: KeyPartMap,
    ) -> CqlResult<()> {
        let builder = self.builder();
        let where_clause = builder.build_where_from_key(key, parts);
        let cql =
            builder.build_select(&SelectOptions::new().filter(where_clause).allow_filtering());
        let result = self.run(&cql).await?;

        self.cursor = Cursor::load(&self.schema, result);
        if self.cursor.result.is_empty() {
            return Err(CqlError::KeyNotFound);
        }
        self.scan_next(buf)
    }

    pub fn index_next(&mut self, buf: &mut [u8]) -> CqlResult<()> {
        self.scan_next(buf)
    }

    /// Read the first row, fetching the table if nothing is loaded.
    pub async fn index_first(&mut self, buf: &mut [u8]) -> CqlResult<()> {
        if self.cursor.header.is_none() {
            self.scan_init().await?;
        }
        self.cursor.next = 0;
        self.scan_next(buf)
    }

    pub fn index_prev(&mut self, _buf: &mut [u8]) -> CqlResult<()> {
        Err(CqlError::Unsupported("reverse index read"))
    }

    pub fn index_last(&mut self, _buf: &mut [u8]) -> CqlResult<()> {
        Err(CqlError::Unsupported("reverse index read"))
    }

    pub fn estimate_rows(&self) -> u64 {
        ESTIMATED_ROWS
    }

    pub fn estimate_range_rows(&self) -> u64 {
        ESTIMATED_RANGE_ROWS
    }

    fn read_row(&mut self, idx: usize, buf: &mut [u8]) -> CqlResult<()> {
        let Some(header) = &self.cursor.header else {
            return Err(CqlError::EndOfRows);
        };
        materialize_matched(
            &self.schema,
            header,
            &self.cursor.result,
            idx,
            buf,
            self.sink.as_mut(),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::{read_field, write_field};
    use crate::schema::{ColumnDescriptor, RelationalType};
    use crate::value::Value;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Scripted {
        statements: Mutex<Vec<String>>,
        replies: Mutex<VecDeque<Result<TabularResult, ExecutionError>>>,
    }

    impl Scripted {
        fn reply(&self, reply: Result<TabularResult, ExecutionError>) {
            self.replies.lock().unwrap().push_back(reply);
        }

        fn statements(&self) -> Vec<String> {
            self.statements.lock().unwrap().clone()
        }
    }

    impl Executor for Scripted {
        async fn execute(&self, cql: &str) -> Result<TabularResult, ExecutionError> {
            self.statements.lock().unwrap().push(cql.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(TabularResult::empty()))
        }
    }

    fn schema() -> TableSchema {
        TableSchema::new(vec![
            ColumnDescriptor::new("id", RelationalType::Long).not_null(),
            ColumnDescriptor::new("name", RelationalType::VarChar { length: 16 }),
        ])
        .unwrap()
    }

    fn table(executor: Arc<Scripted>) -> CqlTable<Arc<Scripted>> {
        CqlTable::new(executor, schema(), TableRef::new("ks", "t"))
    }

    fn rows(cells: &[[&str; 2]]) -> TabularResult {
        TabularResult::new(
            ["ID", "Name"],
            cells
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_create_ignores_keyspace_failure() {
        let exec = Arc::new(Scripted::default());
        exec.reply(Err(ExecutionError::new("unauthorized")));
        table(exec.clone()).create().await.unwrap();

        let statements = exec.statements();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE KEYSPACE IF NOT EXISTS ks"));
        assert!(statements[1].starts_with("CREATE TABLE IF NOT EXISTS ks.t"));
    }

    #[tokio::test]
    async fn test_execution_error_propagates() {
        let exec = Arc::new(Scripted::default());
        exec.reply(Err(ExecutionError::new("timeout")));
        let err = table(exec).truncate().await.unwrap_err();
        assert!(matches!(err, CqlError::Execution(_)));
        assert_eq!(err.to_string(), "Execution error: timeout");
    }

    #[tokio::test]
    async fn test_scan_walks_rows_then_ends() {
        let exec = Arc::new(Scripted::default());
        exec.reply(Ok(rows(&[["1", "a"], ["2", "b"]])));
        let mut t = table(exec.clone());
        let mut buf = t.schema().layout().new_buffer();

        t.scan_init().await.unwrap();
        assert_eq!(exec.statements()[0], "SELECT id, name FROM ks.t ALLOW FILTERING");

        t.scan_next(&mut buf).unwrap();
        t.scan_next(&mut buf).unwrap();
        let pos = t.position().unwrap();
        assert_eq!(pos, RowPosition(1));
        assert!(t.scan_next(&mut buf).unwrap_err().is_end_of_data());

        t.read_at(RowPosition(0), &mut buf).unwrap();
        let s = t.schema();
        assert_eq!(read_field(s.column(1), s.layout().slot(1), &buf), Value::text("a"));
    }

    #[tokio::test]
    async fn test_index_read_not_found() {
        let exec = Arc::new(Scripted::default());
        let mut t = table(exec.clone());
        let mut row = t.schema().layout().new_buffer();
        write_field(t.schema().column(0), t.schema().layout().slot(0), &mut row, &Value::Int(5))
            .unwrap();
        let key = t.schema().key_layout().pack(t.schema().layout(), &row);

        let err = t
            .index_read(&mut row, &key, KeyPartMap::prefix(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CqlError::KeyNotFound));
        assert_eq!(
            exec.statements()[0],
            "SELECT id, name FROM ks.t WHERE id = 5 ALLOW FILTERING"
        );
    }

    #[tokio::test]
    async fn test_index_read_then_next() {
        let exec = Arc::new(Scripted::default());
        exec.reply(Ok(rows(&[["5", "x"], ["5", "y"]])));
        let mut t = table(exec);
        let mut buf = t.schema().layout().new_buffer();
        let key = vec![5, 0, 0, 0];

        t.index_read(&mut buf, &key, KeyPartMap::prefix(1)).await.unwrap();
        t.index_next(&mut buf).unwrap();
        let s = t.schema();
        assert_eq!(read_field(s.column(1), s.layout().slot(1), &buf), Value::text("y"));
    }

    #[tokio::test]
    async fn test_index_first_fetches_when_idle() {
        let exec = Arc::new(Scripted::default());
        exec.reply(Ok(rows(&[["9", "z"]])));
        let mut t = table(exec.clone());
        let mut buf = t.schema().layout().new_buffer();
        t.index_first(&mut buf).await.unwrap();
        assert_eq!(exec.statements().len(), 1);
        let s = t.schema();
        assert_eq!(read_field(s.column(0), s.layout().slot(0), &buf), Value::Int(9));
    }

    #[tokio::test]
    async fn test_update_of_key_only_table_runs_nothing() {
        let exec = Arc::new(Scripted::default());
        let schema =
            TableSchema::new(vec![ColumnDescriptor::new("id", RelationalType::Long)]).unwrap();
        let t = CqlTable::new(exec.clone(), schema, TableRef::new("ks", "t"));
        let row = t.schema().layout().new_buffer();
        t.update_row(&row, &row).await.unwrap();
        assert!(exec.statements().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_operations() {
        let exec = Arc::new(Scripted::default());
        let mut t = table(exec);
        let mut buf = t.schema().layout().new_buffer();
        assert!(matches!(t.index_prev(&mut buf), Err(CqlError::Unsupported(_))));
        assert!(matches!(t.index_last(&mut buf), Err(CqlError::Unsupported(_))));
        assert!(matches!(
            t.rename(&TableRef::new("ks", "u")).await,
            Err(CqlError::Unsupported(_))
        ));
        assert_eq!(t.estimate_rows(), 10_000);
        assert_eq!(t.estimate_range_rows(), 10);
    }
}
