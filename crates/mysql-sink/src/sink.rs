//! Target-side interface used by the sync orchestrator.

use async_trait::async_trait;
use sync_core::Row;

use crate::ddl::TableLayout;
use crate::error::SinkError;

/// How a batch is applied to the target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Plain `INSERT`; a duplicate key fails the batch.
    Insert,
    /// Insert, or update every non-key column of the existing row.
    Upsert,
}

/// One page of rows destined for a single table.
#[derive(Debug, Clone)]
pub struct WriteBatch<'a> {
    pub table: &'a str,
    /// Target column names, positionally aligned with every row.
    pub columns: &'a [String],
    /// Target primary-key column, excluded from the upsert update clause.
    /// Without one every column is refreshed on conflict.
    pub primary_key: Option<&'a str>,
    pub mode: WriteMode,
    pub rows: &'a [Row],
}

impl WriteBatch<'_> {
    /// Check that every row has exactly one cell per column.
    pub fn validate(&self) -> Result<(), SinkError> {
        match self.rows.iter().find(|r| r.len() != self.columns.len()) {
            Some(row) => Err(SinkError::RowWidth {
                table: self.table.to_string(),
                expected: self.columns.len(),
                actual: row.len(),
            }),
            None => Ok(()),
        }
    }
}

/// Trait for the target database.
///
/// Implementations are used by one table sync at a time; every call is
/// awaited before the next one is issued.
#[async_trait]
pub trait TableSink: Send {
    /// Whether `table` exists in the target database.
    async fn table_exists(&mut self, table: &str) -> Result<bool, SinkError>;

    /// Drop the table if present and create it from `layout`.
    async fn recreate_table(&mut self, layout: &TableLayout) -> Result<(), SinkError>;

    /// Create the table from `layout`. Returns `false` without touching the
    /// existing structure if it is already present.
    async fn ensure_table(&mut self, layout: &TableLayout) -> Result<bool, SinkError>;

    /// Write one page and commit it. Returns the number of rows sent.
    async fn write_batch(&mut self, batch: &WriteBatch<'_>) -> Result<u64, SinkError>;
}
