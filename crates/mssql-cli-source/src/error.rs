//! Error types for SQL Server source access and table synchronization.

use checkpoint::StateError;
use mysql_sink::SinkError;
use thiserror::Error;

/// Errors raised while synchronizing tables.
///
/// Only [`SyncError::Configuration`] halts a run; every other variant fails
/// the table it occurred in and the run moves on.
#[derive(Error, Debug)]
pub enum SyncError {
    /// No usable query client, or a table that is not configured.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The query client could not be started.
    #[error("Failed to run query client '{program}': {source}")]
    ClientSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The query client exited with a non-zero status.
    #[error("Source query failed ({status}): {stderr}")]
    ClientExit { status: String, stderr: String },

    /// A query that must return a row returned none.
    #[error("Source query returned no rows: {0}")]
    EmptyResult(String),

    /// Introspection resolved no columns for the table.
    #[error("No columns found for table '{0}'")]
    Introspection(String),

    #[error("Target write failed: {0}")]
    TargetWrite(#[from] SinkError),

    #[error("Sync state error: {0}")]
    State(#[from] StateError),
}

impl SyncError {
    /// Whether the error came from the source side (client process or its
    /// output).
    pub fn is_source_failure(&self) -> bool {
        matches!(
            self,
            SyncError::ClientSpawn { .. } | SyncError::ClientExit { .. } | SyncError::EmptyResult(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
