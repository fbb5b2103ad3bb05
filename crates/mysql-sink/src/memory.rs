//! In-process [`TableSink`] with primary-key semantics.
//!
//! Rows are kept in layout column order. A batch is applied to a copy of the
//! table and swapped in only when every row succeeds, mirroring the
//! one-transaction-per-page behaviour of [`crate::MySQLSink`].

use std::collections::HashMap;

use async_trait::async_trait;
use sync_core::Row;

use crate::ddl::TableLayout;
use crate::error::SinkError;
use crate::sink::{TableSink, WriteBatch, WriteMode};

#[derive(Debug, Clone)]
struct MemoryTable {
    layout: TableLayout,
    rows: Vec<Row>,
    next_id: u64,
}

impl MemoryTable {
    fn new(layout: TableLayout) -> Self {
        Self {
            layout,
            rows: Vec::new(),
            next_id: 1,
        }
    }

    fn key_index(&self) -> Option<usize> {
        let pk = self.layout.primary_key.as_ref()?;
        self.layout
            .columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(&pk.column))
    }

    fn auto_increment(&self) -> bool {
        self.layout
            .primary_key
            .as_ref()
            .is_some_and(|pk| pk.auto_increment)
    }
}

/// Target that keeps tables in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    tables: HashMap<String, MemoryTable>,
    creates: usize,
    drops: usize,
    commits: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a table that already exists before the sync starts.
    pub fn with_table(mut self, layout: TableLayout, rows: Vec<Row>) -> Self {
        let mut table = MemoryTable::new(layout);
        table.rows = rows;
        self.tables.insert(table.layout.table.clone(), table);
        self
    }

    pub fn rows(&self, table: &str) -> Option<&[Row]> {
        self.tables.get(table).map(|t| t.rows.as_slice())
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, |t| t.rows.len())
    }

    pub fn layout(&self, table: &str) -> Option<&TableLayout> {
        self.tables.get(table).map(|t| &t.layout)
    }

    /// Row whose primary-key cell equals `key`.
    pub fn find(&self, table: &str, key: &str) -> Option<&Row> {
        let table = self.tables.get(table)?;
        let idx = table.key_index()?;
        table
            .rows
            .iter()
            .find(|r| r[idx].as_deref() == Some(key))
    }

    /// Value of `column` in the row identified by `key`.
    pub fn value(&self, table: &str, key: &str, column: &str) -> Option<String> {
        let layout = self.layout(table)?;
        let idx = layout
            .columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(column))?;
        self.find(table, key)?[idx].clone()
    }

    /// Number of `CREATE TABLE` statements issued.
    pub fn creates(&self) -> usize {
        self.creates
    }

    /// Number of `DROP TABLE` statements issued for existing tables.
    pub fn drops(&self) -> usize {
        self.drops
    }

    /// Number of committed batches.
    pub fn commits(&self) -> usize {
        self.commits
    }

    fn create(&mut self, layout: &TableLayout) {
        self.tables
            .insert(layout.table.clone(), MemoryTable::new(layout.clone()));
        self.creates += 1;
    }
}

fn apply_batch(table: &mut MemoryTable, batch: &WriteBatch<'_>) -> Result<(), SinkError> {
    let positions = batch
        .columns
        .iter()
        .map(|name| {
            table
                .layout
                .columns
                .iter()
                .position(|c| c.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| SinkError::UnknownColumn {
                    table: batch.table.to_string(),
                    column: name.clone(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let width = table.layout.columns.len();
    let key_idx = table.key_index();
    let auto_increment = table.auto_increment();

    for source in batch.rows {
        let mut row: Row = vec![None; width];
        for (cell, &pos) in source.iter().zip(&positions) {
            row[pos] = cell.clone();
        }

        let Some(k) = key_idx else {
            table.rows.push(row);
            continue;
        };

        if row[k].is_none() && auto_increment {
            row[k] = Some(table.next_id.to_string());
        }
        if let Some(id) = row[k].as_deref().and_then(|v| v.parse::<u64>().ok()) {
            table.next_id = table.next_id.max(id + 1);
        }

        let existing = row[k]
            .as_deref()
            .and_then(|key| table.rows.iter().position(|r| r[k].as_deref() == Some(key)));

        match (existing, batch.mode) {
            (None, _) => table.rows.push(row),
            (Some(_), WriteMode::Insert) => {
                return Err(SinkError::DuplicateKey {
                    table: batch.table.to_string(),
                    key: row[k].clone().unwrap_or_default(),
                });
            }
            (Some(at), WriteMode::Upsert) => {
                let target = &mut table.rows[at];
                for &pos in positions.iter().filter(|&&p| p != k) {
                    target[pos] = row[pos].take();
                }
            }
        }
    }

    Ok(())
}

#[async_trait]
impl TableSink for MemorySink {
    async fn table_exists(&mut self, table: &str) -> Result<bool, SinkError> {
        Ok(self.tables.contains_key(table))
    }

    async fn recreate_table(&mut self, layout: &TableLayout) -> Result<(), SinkError> {
        if self.tables.remove(&layout.table).is_some() {
            self.drops += 1;
        }
        self.create(layout);
        Ok(())
    }

    async fn ensure_table(&mut self, layout: &TableLayout) -> Result<bool, SinkError> {
        if self.tables.contains_key(&layout.table) {
            return Ok(false);
        }
        self.create(layout);
        Ok(true)
    }

    async fn write_batch(&mut self, batch: &WriteBatch<'_>) -> Result<u64, SinkError> {
        if batch.rows.is_empty() {
            return Ok(0);
        }
        batch.validate()?;

        let current = self
            .tables
            .get(batch.table)
            .ok_or_else(|| SinkError::TableNotFound(batch.table.to_string()))?;

        let mut staged = current.clone();
        apply_batch(&mut staged, batch)?;

        self.tables.insert(batch.table.to_string(), staged);
        self.commits += 1;
        Ok(batch.rows.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::{ColumnDef, PrimaryKey};

    fn layout(auto_increment: bool) -> TableLayout {
        TableLayout::new(
            "orders",
            vec![
                ColumnDef::new("id", "INT"),
                ColumnDef::new("status", "VARCHAR(20)"),
                ColumnDef::new("qty", "INT"),
            ],
            Some(PrimaryKey {
                column: "id".to_string(),
                auto_increment,
            }),
        )
    }

    fn row(cells: &[Option<&str>]) -> Row {
        cells.iter().map(|c| c.map(str::to_string)).collect()
    }

    fn columns() -> Vec<String> {
        vec!["id".into(), "status".into(), "qty".into()]
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_key_and_rolls_back() {
        let mut sink = MemorySink::new();
        sink.recreate_table(&layout(true)).await.unwrap();
        let cols = columns();

        let first = vec![row(&[Some("1"), Some("new"), Some("2")])];
        let batch = WriteBatch {
            table: "orders",
            columns: &cols,
            primary_key: Some("id"),
            mode: WriteMode::Insert,
            rows: &first,
        };
        assert_eq!(sink.write_batch(&batch).await.unwrap(), 1);

        let second = vec![
            row(&[Some("2"), Some("new"), Some("1")]),
            row(&[Some("1"), Some("dup"), Some("9")]),
        ];
        let batch = WriteBatch {
            rows: &second,
            ..batch
        };
        let err = sink.write_batch(&batch).await.unwrap_err();

        assert!(matches!(err, SinkError::DuplicateKey { ref key, .. } if key == "1"));
        assert_eq!(sink.row_count("orders"), 1);
        assert_eq!(sink.commits(), 1);
    }

    #[tokio::test]
    async fn test_upsert_updates_non_key_columns() {
        let mut sink = MemorySink::new();
        sink.recreate_table(&layout(true)).await.unwrap();
        let cols = columns();

        let rows = vec![row(&[Some("7"), Some("open"), Some("1")])];
        let batch = WriteBatch {
            table: "orders",
            columns: &cols,
            primary_key: Some("id"),
            mode: WriteMode::Upsert,
            rows: &rows,
        };
        sink.write_batch(&batch).await.unwrap();

        let rows = vec![row(&[Some("7"), Some("closed"), None])];
        let batch = WriteBatch {
            rows: &rows,
            ..batch
        };
        sink.write_batch(&batch).await.unwrap();

        assert_eq!(sink.row_count("orders"), 1);
        assert_eq!(sink.value("orders", "7", "status").as_deref(), Some("closed"));
        assert_eq!(sink.value("orders", "7", "qty"), None);
    }

    #[tokio::test]
    async fn test_auto_increment_assigns_missing_keys() {
        let mut sink = MemorySink::new();
        sink.recreate_table(&layout(true)).await.unwrap();
        let cols = columns();

        let rows = vec![
            row(&[Some("5"), Some("a"), None]),
            row(&[None, Some("b"), None]),
        ];
        let batch = WriteBatch {
            table: "orders",
            columns: &cols,
            primary_key: Some("id"),
            mode: WriteMode::Insert,
            rows: &rows,
        };
        sink.write_batch(&batch).await.unwrap();

        assert_eq!(sink.value("orders", "6", "status").as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_recreate_discards_rows_and_ensure_keeps_them() {
        let seeded = vec![row(&[Some("1"), Some("old"), Some("3")])];
        let mut sink = MemorySink::new().with_table(layout(false), seeded);

        assert!(!sink.ensure_table(&layout(false)).await.unwrap());
        assert_eq!(sink.row_count("orders"), 1);

        sink.recreate_table(&layout(false)).await.unwrap();
        assert_eq!(sink.row_count("orders"), 0);
        assert_eq!(sink.drops(), 1);
        assert_eq!(sink.creates(), 1);
    }

    #[tokio::test]
    async fn test_write_to_missing_table_fails() {
        let mut sink = MemorySink::new();
        let cols = columns();
        let rows = vec![row(&[Some("1"), None, None])];
        let batch = WriteBatch {
            table: "orders",
            columns: &cols,
            primary_key: None,
            mode: WriteMode::Insert,
            rows: &rows,
        };

        let err = sink.write_batch(&batch).await.unwrap_err();
        assert!(matches!(err, SinkError::TableNotFound(_)));
    }

    #[tokio::test]
    async fn test_row_width_mismatch_is_rejected() {
        let mut sink = MemorySink::new();
        sink.recreate_table(&layout(false)).await.unwrap();
        let cols = columns();
        let rows = vec![row(&[Some("1"), None])];
        let batch = WriteBatch {
            table: "orders",
            columns: &cols,
            primary_key: Some("id"),
            mode: WriteMode::Insert,
            rows: &rows,
        };

        let err = sink.write_batch(&batch).await.unwrap_err();
        assert!(matches!(
            err,
            SinkError::RowWidth {
                expected: 3,
                actual: 2,
                ..
            }
        ));
    }
}
