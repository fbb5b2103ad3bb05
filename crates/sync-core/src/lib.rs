//! Core types for the mssql-sync framework.
//!
//! This crate provides the foundational types shared by the source adapter,
//! the target sink and the sync orchestrator:
//!
//! - [`Row`] / [`Cell`] - Positional rows of nullable text cells
//! - [`ColumnDescriptor`] - A column resolved by schema introspection
//! - [`TableSyncSpec`] / [`SyncMode`] - Validated per-table sync configuration
//! - [`ColumnMapping`] - Bidirectional source/target column rename index
//! - [`SyncSettings`] - The immutable configuration for one run, loaded from YAML
//!
//! # Architecture
//!
//! ```text
//! sync-core (this crate)
//!    │
//!    ├─── mssql-types        (type translation, value normalization)
//!    ├─── mysql-sink         (target DDL/DML and writer)
//!    ├─── checkpoint         (per-table watermark store)
//!    └─── mssql-cli-source   (text-protocol adapter, introspection, orchestration)
//! ```
//!
//! # Example
//!
//! ```rust
//! use sync_core::{SyncMode, SyncSettings};
//!
//! let settings = SyncSettings::from_yaml(
//!     r#"
//! tables:
//!   - name: T50_InspectionData
//!     sync_mode: incremental
//!     watermark_column: X02
//!     column_mapping:
//!       X02: inspection_date
//! "#,
//! )
//! .unwrap();
//!
//! let table = settings.table("T50_InspectionData").unwrap();
//! assert_eq!(table.mode.watermark_column(), Some("X02"));
//! assert_eq!(table.mapping.target_name("X02"), Some("inspection_date"));
//! # let _ = SyncMode::Full;
//! ```

pub mod config;
pub mod mapping;
pub mod row;
pub mod table;

pub use config::{ConfigError, SyncSettings, TableConfig};
pub use mapping::ColumnMapping;
pub use row::{Cell, ColumnDescriptor, Row};
pub use table::{SyncMode, TableSyncSpec};
