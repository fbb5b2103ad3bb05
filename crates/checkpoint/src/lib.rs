//! Watermark management for mssql-sync
//!
//! Incremental table syncs only transfer rows whose watermark column exceeds
//! the last value seen by a previous run. This crate persists that value per
//! table.
//!
//! # Architecture
//!
//! - [`WatermarkStore`] - storage-agnostic `get` / `set` / `clear` interface
//! - [`FileWatermarkStore`] - a single JSON document, read fully at open and
//!   atomically replaced after every mutation
//! - [`MemoryWatermarkStore`] - process-local store for tests and dry runs
//!
//! # Document format
//!
//! ```json
//! {
//!   "T50_InspectionData": {
//!     "last_sync": "2025-04-01 00:00:00",
//!     "updated_at": "2025-04-01T06:00:12.123456Z"
//!   }
//! }
//! ```
//!
//! A missing file, or a missing entry for a table, means "no prior
//! watermark": the next incremental run starts from the beginning.
//!
//! The stores do not coordinate concurrent processes; running at most one
//! writer against a document is up to the operator.

mod filesystem;
mod memory;
pub mod store;


pub use filesystem::{FileWatermarkStore, DEFAULT_STATE_FILE};
pub use memory::MemoryWatermarkStore;
pub use store::{StateError, SyncWatermark, WatermarkStore};
