//! Error types for the MariaDB sink.

use thiserror::Error;

/// Errors that can occur while writing to the target.
#[derive(Error, Debug)]
pub enum SinkError {
    /// MySQL connection or query error.
    #[error("MySQL error: {0}")]
    MySQL(#[from] mysql_async::Error),

    /// The target table does not exist.
    #[error("Table '{0}' not found in target database")]
    TableNotFound(String),

    /// A row was rejected by a table constraint.
    #[error("Duplicate entry '{key}' for primary key of table '{table}'")]
    DuplicateKey { table: String, key: String },

    /// A batch names a column the table does not have.
    #[error("Unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },

    /// A batch does not line up with its column list.
    #[error("Batch for table '{table}' has a row with {actual} cells, expected {expected}")]
    RowWidth {
        table: String,
        expected: usize,
        actual: usize,
    },
}
