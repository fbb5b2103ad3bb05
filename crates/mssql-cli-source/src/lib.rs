//! SQL Server to MariaDB table sync for mssql-sync
//!
//! SQL Server is only reachable through its command-line clients (`sqlcmd`
//! or FreeTDS `tsql`): every query runs one client process and its text
//! output is parsed back into rows. Rows are cleaned and written to MariaDB
//! through a [`mysql_sink::TableSink`], one transaction per page.
//!
//! # Structure
//!
//! - `client` / `dialect` / `parse`: the text-protocol adapter
//! - `queries`: T-SQL statement builders
//! - `schema`: catalog introspection and target layout derivation
//! - `sync`: the per-table lifecycle and run aggregation
//! - `testing`: in-memory source for tests

pub mod client;
pub mod dialect;
pub mod error;
pub mod parse;
pub mod queries;
pub mod schema;
pub mod sync;
pub mod testing;
pub mod watermark;

pub use client::{CommandLineClient, QueryClient, SourceOpts};
pub use dialect::ClientDialect;
pub use error::SyncError;
pub use schema::{table_layout, SchemaIntrospector};
pub use sync::{SyncRunResult, Synchronizer, TableOutcome, TableState, TableStatus};
