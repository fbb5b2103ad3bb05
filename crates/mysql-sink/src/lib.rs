//! MariaDB/MySQL target for mssql-sync.
//!
//! # Structure
//!
//! - `ddl`: statement generation (`CREATE DATABASE`, `DROP TABLE`, `CREATE TABLE`,
//!   multi-row `INSERT` and `INSERT ... ON DUPLICATE KEY UPDATE`)
//! - `sink`: the [`TableSink`] trait the orchestrator writes through
//! - `mysql`: [`MySQLSink`], the `mysql_async` implementation
//! - `memory`: [`MemorySink`], an in-process implementation used by tests
//!
//! Every page of rows is written with parameterized statements inside one
//! transaction, so a page is either fully committed or not at all.

pub mod ddl;
pub mod error;
pub mod memory;
pub mod mysql;
pub mod sink;

pub use ddl::{ColumnDef, PrimaryKey, TableLayout, MAX_PLACEHOLDERS};
pub use error::SinkError;
pub use memory::MemorySink;
pub use mysql::{MySQLSink, TargetOpts};
pub use sink::{TableSink, WriteBatch, WriteMode};
