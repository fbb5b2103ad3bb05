//! SQL Server type conversions for mssql-sync.
//!
//! This crate converts what the SQL Server command-line clients hand us into
//! what MariaDB expects.
//!
//! # Structure
//!
//! - `translate`: SQL Server column type descriptor → MariaDB column type
//! - `normalize`: clean a single text cell before it is written to MariaDB
//!
//! # Example
//!
//! ```rust
//! use mssql_types::{clean, translate};
//!
//! assert_eq!(translate("nvarchar(50)"), "VARCHAR(50)");
//! assert_eq!(translate("varchar(max)"), "TEXT");
//! assert_eq!(translate("geography"), "TEXT");
//!
//! assert_eq!(
//!     clean(Some("Apr  1 2025 12:00AM".to_string())),
//!     Some("2025-04-01 00:00:00".to_string())
//! );
//! assert_eq!(clean(Some(" \r\n ".to_string())), None);
//! ```

pub mod normalize;
pub mod translate;

pub use normalize::{
    clean, clean_row, is_canonical_datetime, is_verbose_datetime, CANONICAL_DATETIME_FORMAT,
};
pub use translate::{base_type, is_integer_type, translate};
