//! Table synchronization.
//!
//! Each configured table goes through
//! `NotStarted -> StructureReady -> DataSynced | Failed`:
//!
//! 1. introspect the source columns and prepare the target table (recreated
//!    for full syncs, created only if missing for incremental ones)
//! 2. count the qualifying rows, then copy them page by page, one target
//!    transaction per page
//! 3. for incremental syncs, advance the stored watermark to the greatest
//!    value transferred
//!
//! A failing table is recorded and the run moves on to the next one.

use std::fmt;
use std::time::{Duration, Instant};

use checkpoint::WatermarkStore;
use mssql_types::{clean, clean_row};
use mysql_sink::{TableSink, WriteBatch, WriteMode};
use sync_core::{ColumnDescriptor, Row, SyncMode, SyncSettings, TableSyncSpec};
use tracing::{debug, error, info, warn};

use crate::client::QueryClient;
use crate::error::{Result, SyncError};
use crate::queries::{count_query, effective_condition, max_query, page_query};
use crate::schema::{order_column, table_layout, SchemaIntrospector};
use crate::watermark;

/// Lifecycle of one table within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    NotStarted,
    StructureReady,
    DataSynced,
    Failed,
}

impl fmt::Display for TableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TableState::NotStarted => "not started",
            TableState::StructureReady => "structure ready",
            TableState::DataSynced => "data synced",
            TableState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Final status of a table in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// What happened to one table.
#[derive(Debug, Clone)]
pub struct TableOutcome {
    pub table: String,
    pub status: TableStatus,
    /// Rows committed to the target, including pages committed before a
    /// failure.
    pub rows_transferred: u64,
    /// Rows dropped because their cell count did not match the columns.
    pub rows_discarded: u64,
    /// Watermark persisted by this run, if it advanced.
    pub watermark: Option<String>,
    pub error: Option<String>,
    pub duration: Duration,
}

impl TableOutcome {
    fn skipped(table: &str) -> Self {
        Self {
            table: table.to_string(),
            status: TableStatus::Skipped,
            rows_transferred: 0,
            rows_discarded: 0,
            watermark: None,
            error: None,
            duration: Duration::ZERO,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TableStatus::Succeeded
    }
}

/// Aggregate result of one run. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct SyncRunResult {
    pub tables: Vec<TableOutcome>,
    pub duration: Duration,
}

impl SyncRunResult {
    fn count(&self, status: TableStatus) -> usize {
        self.tables.iter().filter(|t| t.status == status).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(TableStatus::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(TableStatus::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(TableStatus::Skipped)
    }

    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|t| t.rows_transferred).sum()
    }

    pub fn outcome(&self, table: &str) -> Option<&TableOutcome> {
        self.tables.iter().find(|t| t.table == table)
    }

    /// A run succeeds when at least one table was synced and none failed.
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.succeeded() > 0
    }

    pub fn log_summary(&self) {
        info!("==================================================");
        info!("Sync completed in {:.1}s", self.duration.as_secs_f64());
        info!("Tables succeeded: {}", self.succeeded());
        info!("Tables failed: {}", self.failed());
        info!("Tables skipped: {}", self.skipped());
        info!("Rows transferred: {}", self.total_rows());
        for table in self.tables.iter().filter(|t| t.status == TableStatus::Failed) {
            error!(
                "  {}: {}",
                table.table,
                table.error.as_deref().unwrap_or("unknown error")
            );
        }
        info!("==================================================");
    }
}

/// Running totals for a table, kept outside the fallible sync path so that
/// a failed table still reports what was committed.
#[derive(Debug)]
struct TableProgress {
    state: TableState,
    transferred: u64,
    discarded: u64,
    watermark: Option<String>,
}

impl TableProgress {
    fn new() -> Self {
        Self {
            state: TableState::NotStarted,
            transferred: 0,
            discarded: 0,
            watermark: None,
        }
    }

    fn transition(&mut self, table: &str, next: TableState) {
        debug!("Table {}: {} -> {}", table, self.state, next);
        self.state = next;
    }
}

/// Drives table syncs from the source client into the target sink.
///
/// All work is sequential: one table at a time, one page at a time.
pub struct Synchronizer<'a, C, S, W>
where
    C: QueryClient + ?Sized,
    S: TableSink + ?Sized,
    W: WatermarkStore + ?Sized,
{
    settings: &'a SyncSettings,
    client: &'a C,
    sink: &'a mut S,
    state: &'a mut W,
}

impl<'a, C, S, W> Synchronizer<'a, C, S, W>
where
    C: QueryClient + ?Sized,
    S: TableSink + ?Sized,
    W: WatermarkStore + ?Sized,
{
    pub fn new(
        settings: &'a SyncSettings,
        client: &'a C,
        sink: &'a mut S,
        state: &'a mut W,
    ) -> Self {
        Self {
            settings,
            client,
            sink,
            state,
        }
    }

    /// Sync every configured table in configuration order.
    ///
    /// Disabled tables are reported as skipped. With `force_full` the stored
    /// watermarks of all configured tables are cleared first.
    pub async fn run(&mut self, force_full: bool) -> Result<SyncRunResult> {
        let started = Instant::now();
        let settings = self.settings;

        if force_full {
            for spec in &settings.tables {
                self.state.clear(&spec.name)?;
            }
            info!("Cleared stored watermarks, forcing a full transfer");
        }

        if settings.enabled_tables().next().is_none() {
            warn!("No tables are enabled for sync");
        }

        let mut tables = Vec::with_capacity(settings.tables.len());
        for spec in &settings.tables {
            if !spec.enabled {
                info!("Skipping table {} (disabled)", spec.name);
                tables.push(TableOutcome::skipped(&spec.name));
                continue;
            }
            tables.push(self.sync_table(spec).await);
        }

        let result = SyncRunResult {
            tables,
            duration: started.elapsed(),
        };
        result.log_summary();
        Ok(result)
    }

    /// Sync one configured table by name.
    pub async fn sync_one(&mut self, name: &str, force_full: bool) -> Result<TableOutcome> {
        let settings = self.settings;
        let spec = settings.table(name).ok_or_else(|| {
            SyncError::Configuration(format!("Table '{name}' is not configured"))
        })?;

        if !spec.enabled {
            info!("Skipping table {} (disabled)", spec.name);
            return Ok(TableOutcome::skipped(&spec.name));
        }

        if force_full {
            self.state.clear(&spec.name)?;
            info!("Cleared stored watermark for {}", spec.name);
        }

        Ok(self.sync_table(spec).await)
    }

    /// Sync one table; failures are captured in the outcome.
    pub async fn sync_table(&mut self, spec: &TableSyncSpec) -> TableOutcome {
        let started = Instant::now();
        let mut progress = TableProgress::new();

        info!("Starting sync for table: {} ({} mode)", spec.name, spec.mode);
        let result = self.try_sync_table(spec, &mut progress).await;

        let (status, error) = match result {
            Ok(()) => {
                progress.transition(&spec.name, TableState::DataSynced);
                info!(
                    "Table {} synced: {} rows in {:.1}s",
                    spec.name,
                    progress.transferred,
                    started.elapsed().as_secs_f64()
                );
                (TableStatus::Succeeded, None)
            }
            Err(e) => {
                progress.transition(&spec.name, TableState::Failed);
                error!("Table {} failed: {}", spec.name, e);
                (TableStatus::Failed, Some(e.to_string()))
            }
        };

        TableOutcome {
            table: spec.name.clone(),
            status,
            rows_transferred: progress.transferred,
            rows_discarded: progress.discarded,
            watermark: progress.watermark,
            error,
            duration: started.elapsed(),
        }
    }

    async fn try_sync_table(
        &mut self,
        spec: &TableSyncSpec,
        progress: &mut TableProgress,
    ) -> Result<()> {
        let columns = SchemaIntrospector::new(self.client).describe(spec).await?;
        if columns.is_empty() {
            return Err(SyncError::Introspection(spec.name.clone()));
        }

        let layout = table_layout(spec, &columns);
        match spec.mode {
            SyncMode::Full => {
                self.sink.recreate_table(&layout).await?;
                info!("Created table {}", spec.name);
            }
            SyncMode::Incremental { .. } => {
                if self.sink.ensure_table(&layout).await? {
                    info!("Created table {}", spec.name);
                } else {
                    info!("Table {} exists, reusing its structure", spec.name);
                }
            }
        }
        progress.transition(&spec.name, TableState::StructureReady);

        let stored = match spec.mode.watermark_column() {
            Some(_) => self.state.last_sync(&spec.name),
            None => None,
        };
        if let Some(value) = &stored {
            info!("Table {}: resuming after watermark {}", spec.name, value);
        }
        let condition = effective_condition(spec, stored.as_deref());
        let total = self.count_rows(spec, condition.as_deref()).await?;

        let source_columns: Vec<String> = columns.iter().map(|c| c.source_name.clone()).collect();
        let target_columns = layout.column_names();
        let primary_key = layout.primary_key.as_ref().map(|pk| pk.column.as_str());
        let order_by = order_column(&columns, &layout)
            .ok_or_else(|| SyncError::Introspection(spec.name.clone()))?;
        debug!("Table {}: paging ordered by {}", spec.name, order_by);
        let mode = match spec.mode {
            SyncMode::Full => WriteMode::Insert,
            SyncMode::Incremental { .. } => WriteMode::Upsert,
        };
        let watermark_index = spec
            .mode
            .watermark_column()
            .and_then(|column| watermark_position(&columns, column));

        let page_size = self.settings.page_size;
        let mut offset = 0;
        let mut max_seen: Option<String> = None;

        loop {
            let query = page_query(
                &spec.name,
                &source_columns,
                condition.as_deref(),
                order_by,
                offset,
                page_size,
            );
            let fetched = self.client.execute(&query).await?;
            let fetched_len = fetched.len();
            if fetched_len == 0 {
                break;
            }

            let (rows, discarded) = clean_page(fetched, columns.len());
            if discarded > 0 {
                warn!(
                    "Table {}: discarded {} rows whose cell count does not match {} columns",
                    spec.name,
                    discarded,
                    columns.len()
                );
                progress.discarded += discarded as u64;
            }

            if !rows.is_empty() {
                let batch = WriteBatch {
                    table: &spec.name,
                    columns: &target_columns,
                    primary_key,
                    mode,
                    rows: &rows,
                };
                progress.transferred += self.sink.write_batch(&batch).await?;

                if let Some(index) = watermark_index {
                    for row in &rows {
                        watermark::track_max(&mut max_seen, row[index].as_deref());
                    }
                }
            }

            offset += fetched_len;
            log_progress(&spec.name, progress.transferred, total);

            if fetched_len < page_size {
                break;
            }
            if !self.settings.page_delay.is_zero() {
                tokio::time::sleep(self.settings.page_delay).await;
            }
        }

        if let Some(column) = spec.mode.watermark_column() {
            if progress.transferred > 0 {
                let candidate = match (watermark_index, max_seen) {
                    (Some(_), seen) => seen,
                    (None, _) => {
                        self.source_max(spec, column, condition.as_deref())
                            .await?
                    }
                };
                self.advance_watermark(spec, candidate, stored.as_deref(), progress)?;
            } else {
                info!("Table {}: no new rows since last sync", spec.name);
            }
        }

        Ok(())
    }

    /// Row count for progress reporting; `None` when the result is not a
    /// number.
    async fn count_rows(&self, spec: &TableSyncSpec, condition: Option<&str>) -> Result<Option<u64>> {
        let query = count_query(&spec.name, condition);
        let rows = self.client.execute(&query).await?;
        let first = rows
            .first()
            .ok_or_else(|| SyncError::EmptyResult(query.clone()))?;

        let value = first.first().cloned().flatten();
        match value.as_deref().map(str::trim).map(str::parse::<u64>) {
            Some(Ok(count)) => {
                info!("Table {}: {} rows to sync", spec.name, count);
                Ok(Some(count))
            }
            _ => {
                warn!(
                    "Table {}: could not parse row count from {:?}",
                    spec.name, value
                );
                Ok(None)
            }
        }
    }

    /// `MAX(column)` on the source, used when the watermark column is not
    /// among the transferred columns. The result is a single value; the
    /// clients may split it into several cells, which are joined back.
    async fn source_max(
        &self,
        spec: &TableSyncSpec,
        column: &str,
        condition: Option<&str>,
    ) -> Result<Option<String>> {
        let query = max_query(&spec.name, column, condition);
        let rows = self.client.execute(&query).await?;
        let first = rows
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::EmptyResult(query))?;
        let parts: Vec<String> = first.into_iter().flatten().collect();
        if parts.is_empty() {
            return Ok(None);
        }
        Ok(clean(Some(parts.join(" "))))
    }

    fn advance_watermark(
        &mut self,
        spec: &TableSyncSpec,
        candidate: Option<String>,
        stored: Option<&str>,
        progress: &mut TableProgress,
    ) -> Result<()> {
        let Some(candidate) = candidate else {
            warn!(
                "Table {}: transferred rows carry no watermark value, keeping the stored one",
                spec.name
            );
            return Ok(());
        };

        if watermark::is_newer(&candidate, stored) {
            self.state.set(&spec.name, &candidate)?;
            info!(
                "Updated last sync watermark for {}: {}",
                spec.name, candidate
            );
            progress.watermark = Some(candidate);
        } else {
            debug!(
                "Table {}: watermark {} does not advance stored value {:?}",
                spec.name, candidate, stored
            );
        }
        Ok(())
    }
}

fn watermark_position(columns: &[ColumnDescriptor], column: &str) -> Option<usize> {
    columns.iter().position(|c| {
        c.source_name.eq_ignore_ascii_case(column) || c.name.eq_ignore_ascii_case(column)
    })
}

/// Normalize every cell and drop rows that do not line up with the columns.
/// Returns the kept rows and the number dropped.
fn clean_page(rows: Vec<Row>, column_count: usize) -> (Vec<Row>, usize) {
    let total = rows.len();
    let kept: Vec<Row> = rows
        .into_iter()
        .map(clean_row)
        .filter(|row| row.len() == column_count)
        .collect();
    let discarded = total - kept.len();
    (kept, discarded)
}

fn log_progress(table: &str, synced: u64, total: Option<u64>) {
    match total {
        Some(total) if total > 0 => {
            let percent = synced as f64 / total as f64 * 100.0;
            info!("Table {}: {}/{} rows ({:.1}%)", table, synced, total, percent);
        }
        _ => info!("Table {}: {} rows synced", table, synced),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[Option<&str>]) -> Row {
        cells.iter().map(|c| c.map(str::to_string)).collect()
    }

    #[test]
    fn test_clean_page_drops_misaligned_rows() {
        let rows = vec![
            row(&[Some("1"), Some(" a\r\n")]),
            row(&[Some("2")]),
            row(&[Some("3"), Some("Apr  1 2025 10:05AM")]),
        ];

        let (kept, discarded) = clean_page(rows, 2);
        assert_eq!(discarded, 1);
        assert_eq!(
            kept,
            vec![
                row(&[Some("1"), Some("a")]),
                row(&[Some("3"), Some("2025-04-01 10:05:00")]),
            ]
        );
    }

    #[test]
    fn test_watermark_position_matches_source_or_target_name() {
        let columns = vec![
            ColumnDescriptor::new("id", "ID", "int"),
            ColumnDescriptor::new("inspection_date", "X02", "datetime"),
        ];
        assert_eq!(watermark_position(&columns, "x02"), Some(1));
        assert_eq!(watermark_position(&columns, "inspection_date"), Some(1));
        assert_eq!(watermark_position(&columns, "X03"), None);
    }

    #[test]
    fn test_run_result_counts() {
        let outcome = |table: &str, status, rows| TableOutcome {
            table: table.to_string(),
            status,
            rows_transferred: rows,
            rows_discarded: 0,
            watermark: None,
            error: None,
            duration: Duration::ZERO,
        };
        let result = SyncRunResult {
            tables: vec![
                outcome("a", TableStatus::Succeeded, 10),
                outcome("b", TableStatus::Failed, 3),
                outcome("c", TableStatus::Skipped, 0),
            ],
            duration: Duration::ZERO,
        };

        assert_eq!(result.succeeded(), 1);
        assert_eq!(result.failed(), 1);
        assert_eq!(result.skipped(), 1);
        assert_eq!(result.total_rows(), 13);
        assert!(!result.is_success());
        assert!(SyncRunResult::default().tables.is_empty());
        assert!(!SyncRunResult::default().is_success());
    }
}
