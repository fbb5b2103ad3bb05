//! In-memory source for exercising the synchronizer without SQL Server.
//!
//! [`FakeSource`] understands exactly the statements this crate generates
//! (catalog lookup, `COUNT(*)`, `MAX()` and keyset pages) and evaluates the
//! `[column] > 'value'` parts of their filters, comparing datetimes in
//! either rendering by the instant they denote. Other filter text is
//! accepted and ignored; assert on [`FakeSource::queries`] instead.
//!
//! When built with [`FakeSource::rendering`] the result sets are printed the
//! way the chosen client prints them and parsed back, so the text adapter is
//! part of the round trip.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use sync_core::Row;

pub use mysql_sink::MemorySink;

use crate::client::QueryClient;
use crate::dialect::ClientDialect;
use crate::error::{Result, SyncError};
use crate::parse::{parse_output, NULL_TOKEN};
use crate::watermark;

static CATALOG_TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"TABLE_NAME = '((?:[^']|'')*)'").expect("valid regex"));

static COUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^SELECT COUNT\(\*\) FROM \[([^\]]+)\](?: WHERE (.*))?$").expect("valid regex")
});

static MAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^SELECT MAX\(\[([^\]]+)\]\) FROM \[([^\]]+)\](?: WHERE (.*))?$")
        .expect("valid regex")
});

static PAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^SELECT (.+?) FROM \[([^\]]+)\](?: WHERE (.*?))? ORDER BY \[([^\]]+)\] OFFSET (\d+) ROWS FETCH NEXT (\d+) ROWS ONLY$",
    )
    .expect("valid regex")
});

static GREATER_THAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\] > '((?:[^']|'')*)'").expect("valid regex"));

#[derive(Debug, Clone)]
struct FakeTable {
    /// `(name, full type)` as the catalog reports them.
    columns: Vec<(String, String)>,
    rows: Vec<Row>,
}

impl FakeTable {
    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|(c, _)| c.eq_ignore_ascii_case(name))
    }

    fn matching_rows(&self, condition: Option<&str>) -> Result<Vec<&Row>> {
        let mut filters = Vec::new();
        for caps in condition.into_iter().flat_map(|c| GREATER_THAN.captures_iter(c)) {
            let index = self.column_index(&caps[1]).ok_or_else(|| invalid_column(&caps[1]))?;
            filters.push((index, caps[2].replace("''", "'")));
        }

        Ok(self
            .rows
            .iter()
            .filter(|row| {
                filters.iter().all(|(index, bound)| match &row[*index] {
                    Some(value) => watermark::is_newer(value, Some(bound)),
                    None => false,
                })
            })
            .collect())
    }
}

#[derive(Debug, Default)]
struct FakeState {
    tables: HashMap<String, FakeTable>,
    failing: HashSet<String>,
    queries: Vec<String>,
}

/// Scriptable [`QueryClient`].
#[derive(Debug, Default)]
pub struct FakeSource {
    state: Mutex<FakeState>,
    dialect: Option<ClientDialect>,
}

fn invalid_column(name: &str) -> SyncError {
    SyncError::ClientExit {
        status: "exit status: 1".to_string(),
        stderr: format!("Invalid column name '{name}'."),
    }
}

fn to_row(cells: Vec<Option<&str>>) -> Row {
    cells.into_iter().map(|c| c.map(str::to_string)).collect()
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Print results in `dialect`'s text format and parse them back.
    pub fn rendering(mut self, dialect: ClientDialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    /// Add a table with `(column, type)` pairs and its rows.
    pub fn with_table(
        self,
        name: &str,
        columns: &[(&str, &str)],
        rows: Vec<Vec<Option<&str>>>,
    ) -> Self {
        let table = FakeTable {
            columns: columns
                .iter()
                .map(|(n, t)| (n.to_string(), t.to_string()))
                .collect(),
            rows: rows.into_iter().map(to_row).collect(),
        };
        self.lock().tables.insert(name.to_string(), table);
        self
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert_row(&self, table: &str, cells: Vec<Option<&str>>) {
        if let Some(t) = self.lock().tables.get_mut(table) {
            t.rows.push(to_row(cells));
        }
    }

    /// Set `column` of the row whose first column equals `key`.
    pub fn update_row(&self, table: &str, key: &str, column: &str, value: Option<&str>) {
        let mut state = self.lock();
        let Some(t) = state.tables.get_mut(table) else {
            return;
        };
        let Some(index) = t.column_index(column) else {
            return;
        };
        for row in t.rows.iter_mut().filter(|r| r[0].as_deref() == Some(key)) {
            row[index] = value.map(str::to_string);
        }
    }

    /// Make every query touching `table` fail like a client error would.
    pub fn fail_table(&self, table: &str) {
        self.lock().failing.insert(table.to_string());
    }

    pub fn restore_table(&self, table: &str) {
        self.lock().failing.remove(table);
    }

    /// Every query received, in order.
    pub fn queries(&self) -> Vec<String> {
        self.lock().queries.clone()
    }

    /// Received queries that fetch data pages.
    pub fn page_queries(&self) -> Vec<String> {
        self.queries()
            .into_iter()
            .filter(|q| PAGE.is_match(q))
            .collect()
    }

    fn answer(&self, query: &str) -> Result<(Vec<String>, Vec<Row>)> {
        let mut state = self.lock();
        state.queries.push(query.to_string());

        if query.contains("INFORMATION_SCHEMA.COLUMNS") {
            let name = CATALOG_TABLE
                .captures(query)
                .map(|c| c[1].replace("''", "'"))
                .unwrap_or_default();
            check_failing(&state, &name)?;
            let rows = state
                .tables
                .get(&name)
                .map(|t| {
                    t.columns
                        .iter()
                        .map(|(n, ty)| vec![Some(n.clone()), Some(ty.clone())])
                        .collect()
                })
                .unwrap_or_default();
            return Ok((vec!["COLUMN_NAME".into(), "FULL_TYPE".into()], rows));
        }

        if let Some(caps) = COUNT.captures(query) {
            let table = lookup(&state, &caps[1])?;
            let count = table.matching_rows(caps.get(2).map(|m| m.as_str()))?.len();
            return Ok((vec![String::new()], vec![vec![Some(count.to_string())]]));
        }

        if let Some(caps) = MAX.captures(query) {
            let table = lookup(&state, &caps[2])?;
            let index = table
                .column_index(&caps[1])
                .ok_or_else(|| invalid_column(&caps[1]))?;
            let mut max = None;
            for row in table.matching_rows(caps.get(3).map(|m| m.as_str()))? {
                watermark::track_max(&mut max, row[index].as_deref());
            }
            return Ok((vec![String::new()], vec![vec![max]]));
        }

        if let Some(caps) = PAGE.captures(query) {
            let table = lookup(&state, &caps[2])?;
            let selected: Vec<&str> = caps[1]
                .split(", ")
                .map(|c| c.trim_start_matches('[').trim_end_matches(']'))
                .collect();
            let indexes = selected
                .iter()
                .map(|c| table.column_index(c).ok_or_else(|| invalid_column(c)))
                .collect::<Result<Vec<_>>>()?;
            let order = table
                .column_index(&caps[4])
                .ok_or_else(|| invalid_column(&caps[4]))?;
            let offset: usize = caps[5].parse().unwrap_or(0);
            let limit: usize = caps[6].parse().unwrap_or(0);

            let mut rows = table.matching_rows(caps.get(3).map(|m| m.as_str()))?;
            rows.sort_by(|a, b| match (&a[order], &b[order]) {
                (Some(x), Some(y)) => watermark::compare(x, y),
                (x, y) => x.cmp(y),
            });

            let page = rows
                .into_iter()
                .skip(offset)
                .take(limit)
                .map(|row| indexes.iter().map(|&i| row[i].clone()).collect())
                .collect();
            let header = selected.iter().map(|c| c.to_string()).collect();
            return Ok((header, page));
        }

        Err(SyncError::ClientExit {
            status: "exit status: 1".to_string(),
            stderr: format!("Unsupported statement: {query}"),
        })
    }
}

fn check_failing(state: &FakeState, table: &str) -> Result<()> {
    if state.failing.contains(table) {
        return Err(SyncError::ClientExit {
            status: "exit status: 1".to_string(),
            stderr: format!("Cannot open table '{table}'"),
        });
    }
    Ok(())
}

fn lookup<'s>(state: &'s FakeState, table: &str) -> Result<&'s FakeTable> {
    check_failing(state, table)?;
    state.tables.get(table).ok_or_else(|| SyncError::ClientExit {
        status: "exit status: 1".to_string(),
        stderr: format!("Invalid object name '{table}'."),
    })
}

/// Print a result set the way `dialect` does.
fn render(dialect: ClientDialect, header: &[String], rows: &[Row]) -> String {
    let separator = match dialect {
        ClientDialect::Sqlcmd => " ",
        ClientDialect::Tsql => "\t",
    };
    let join = |cells: Vec<&str>| cells.join(separator);

    let mut out = String::new();
    if dialect == ClientDialect::Tsql {
        out.push_str("locale is \"C.UTF-8\"\nlocale charset is \"UTF-8\"\nusing default charset \"UTF-8\"\n");
        out.push_str("1> 2> ");
        out.push_str(&join(header.iter().map(String::as_str).collect()));
        out.push('\n');
    }
    for row in rows {
        let cells = row
            .iter()
            .map(|c| c.as_deref().unwrap_or(NULL_TOKEN))
            .collect();
        out.push_str(&join(cells));
        out.push('\n');
    }
    out.push_str(&format!("\n({} rows affected)\n", rows.len()));
    out
}

#[async_trait]
impl QueryClient for FakeSource {
    async fn execute(&self, query: &str) -> Result<Vec<Row>> {
        let (header, rows) = self.answer(query)?;
        match self.dialect {
            Some(dialect) => Ok(parse_output(&render(dialect, &header, &rows), dialect)),
            None => Ok(rows),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> FakeSource {
        FakeSource::new().with_table(
            "T",
            &[("ID", "int"), ("Name", "varchar(20)")],
            vec![
                vec![Some("2"), Some("Globex")],
                vec![Some("10"), None],
                vec![Some("1"), Some("Acme Corp")],
            ],
        )
    }

    #[tokio::test]
    async fn test_pages_are_ordered_numerically() {
        let rows = source()
            .execute("SELECT [ID] FROM [T] ORDER BY [ID] OFFSET 1 ROWS FETCH NEXT 5 ROWS ONLY")
            .await
            .unwrap();
        assert_eq!(rows, vec![vec![Some("2".to_string())], vec![Some("10".to_string())]]);
    }

    #[tokio::test]
    async fn test_greater_than_filter() {
        let rows = source()
            .execute("SELECT COUNT(*) FROM [T] WHERE (Name IS NOT NULL) AND [ID] > '1'")
            .await
            .unwrap();
        assert_eq!(rows, vec![vec![Some("2".to_string())]]);
    }

    #[tokio::test]
    async fn test_tsql_rendering_round_trips() {
        let source = source().rendering(ClientDialect::Tsql);
        let rows = source
            .execute("SELECT [ID], [Name] FROM [T] ORDER BY [ID] OFFSET 0 ROWS FETCH NEXT 5 ROWS ONLY")
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec![Some("1".to_string()), Some("Acme Corp".to_string())]);
        assert_eq!(rows[2], vec![Some("10".to_string()), None]);
    }

    #[tokio::test]
    async fn test_sqlcmd_rendering_splits_spaces() {
        let source = source().rendering(ClientDialect::Sqlcmd);
        let rows = source
            .execute("SELECT [ID], [Name] FROM [T] ORDER BY [ID] OFFSET 0 ROWS FETCH NEXT 1 ROWS ONLY")
            .await
            .unwrap();
        assert_eq!(rows[0].len(), 3);
    }

    #[tokio::test]
    async fn test_failing_table() {
        let source = source();
        source.fail_table("T");
        let err = source.execute("SELECT COUNT(*) FROM [T]").await.unwrap_err();
        assert!(err.is_source_failure());

        source.restore_table("T");
        assert!(source.execute("SELECT COUNT(*) FROM [T]").await.is_ok());
        assert_eq!(source.queries().len(), 2);
    }
}
