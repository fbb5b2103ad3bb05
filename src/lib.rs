//! mssql-sync library
//!
//! Keeps MariaDB copies of SQL Server tables up to date. SQL Server is read
//! through its command-line clients (`sqlcmd` or FreeTDS `tsql`), MariaDB is
//! written through `mysql_async`.
//!
//! # Features
//!
//! - Full sync: drop, recreate and reload a table
//! - Incremental sync: upsert rows whose watermark column moved past the
//!   value stored by the previous run
//! - Column renaming and allow-lists per table
//! - SQL Server to MariaDB type translation and value clean-up
//!
//! # Crates
//!
//! - `sync_core` - table specs and YAML configuration
//! - `mssql_types` - type translation and value normalization
//! - `checkpoint` - per-table watermark storage
//! - `mysql_sink` - MariaDB DDL/DML and writer
//! - `mssql_cli_source` - command-line client adapter and the synchronizer
//!
//! # CLI Usage
//!
//! ```bash
//! # Sync every enabled table
//! mssql-sync run --config sync_tables.yaml
//!
//! # Re-transfer one table from scratch
//! mssql-sync table T50_InspectionData --force-full
//! ```

use std::fmt::Display;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use mssql_cli_source::{ClientDialect, SourceOpts};
use mysql_sink::TargetOpts;
use sync_core::SyncSettings;
use tracing::warn;

pub use checkpoint::DEFAULT_STATE_FILE;

/// Which SQL Server command-line client to use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ClientChoice {
    /// First of sqlcmd, tsql found on PATH
    Auto,
    Sqlcmd,
    Tsql,
}

impl ClientChoice {
    pub fn dialect(&self) -> Option<ClientDialect> {
        match self {
            ClientChoice::Auto => None,
            ClientChoice::Sqlcmd => Some(ClientDialect::Sqlcmd),
            ClientChoice::Tsql => Some(ClientDialect::Tsql),
        }
    }
}

#[derive(Parser, Clone, Debug)]
pub struct MssqlOpts {
    /// SQL Server host or FreeTDS server name
    #[arg(long, env = "MSSQL_SERVER")]
    pub mssql_server: String,

    /// SQL Server database
    #[arg(long, env = "MSSQL_DATABASE")]
    pub mssql_database: String,

    /// SQL Server login
    #[arg(long, env = "MSSQL_USERNAME")]
    pub mssql_username: String,

    /// SQL Server password
    #[arg(long, env = "MSSQL_PASSWORD", hide_env_values = true)]
    pub mssql_password: String,

    /// SQL Server TCP port (client default when unset)
    #[arg(long, env = "MSSQL_PORT")]
    pub mssql_port: Option<u16>,

    /// Command-line client to run queries with
    #[arg(long, env = "MSSQL_CLIENT", value_enum, default_value = "auto")]
    pub mssql_client: ClientChoice,

    /// Explicit path to the client executable
    #[arg(long, env = "MSSQL_CLIENT_PATH")]
    pub mssql_client_path: Option<PathBuf>,
}

impl From<&MssqlOpts> for SourceOpts {
    fn from(opts: &MssqlOpts) -> Self {
        Self {
            server: opts.mssql_server.clone(),
            database: opts.mssql_database.clone(),
            username: opts.mssql_username.clone(),
            password: opts.mssql_password.clone(),
            port: opts.mssql_port,
        }
    }
}

#[derive(Parser, Clone, Debug)]
pub struct MariadbOpts {
    /// MariaDB host
    #[arg(long, default_value = "localhost", env = "MARIADB_HOST")]
    pub mariadb_host: String,

    /// MariaDB port
    #[arg(long, default_value = "3306", env = "MARIADB_PORT")]
    pub mariadb_port: u16,

    /// MariaDB user
    #[arg(long, default_value = "root", env = "MARIADB_USER")]
    pub mariadb_user: String,

    /// MariaDB password
    #[arg(long, default_value = "", env = "MARIADB_PASSWORD", hide_env_values = true)]
    pub mariadb_password: String,

    /// Target database, created if missing
    #[arg(long, env = "MARIADB_DATABASE")]
    pub mariadb_database: String,
}

impl From<&MariadbOpts> for TargetOpts {
    fn from(opts: &MariadbOpts) -> Self {
        Self {
            host: opts.mariadb_host.clone(),
            port: opts.mariadb_port,
            user: opts.mariadb_user.clone(),
            password: opts.mariadb_password.clone(),
            database: opts.mariadb_database.clone(),
        }
    }
}

/// Sync options (non-connection related)
#[derive(Parser, Clone, Debug)]
pub struct SyncOpts {
    /// Table configuration file
    #[arg(long, default_value = "sync_tables.yaml", env = "SYNC_CONFIG")]
    pub config: PathBuf,

    /// Rows per page, overrides `page_size` from the configuration file
    #[arg(long, env = "SYNC_BATCH_SIZE")]
    pub batch_size: Option<usize>,

    /// Overrides `max_retries` from the configuration file
    #[arg(long, env = "SYNC_MAX_RETRIES")]
    pub max_retries: Option<u32>,

    /// Pause between pages in milliseconds, overrides `page_delay_ms`
    #[arg(long, env = "SYNC_PAGE_DELAY_MS")]
    pub page_delay_ms: Option<u64>,

    /// Watermark state file
    #[arg(long, default_value = DEFAULT_STATE_FILE, env = "SYNC_STATE_FILE")]
    pub state_file: PathBuf,
}

impl SyncOpts {
    /// Load the table configuration and apply command-line overrides.
    pub fn load_settings(&self) -> anyhow::Result<SyncSettings> {
        let mut settings = SyncSettings::from_file(&self.config).with_context(|| {
            format!("Failed to load sync configuration from {:?}", self.config)
        })?;

        settings = settings
            .with_page_size(self.batch_size)
            .context("Invalid batch size")?;
        if let Some(delay) = self.page_delay_ms {
            settings = settings.with_page_delay(Duration::from_millis(delay));
        }
        if let Some(retries) = self.max_retries {
            settings.max_retries = retries;
        }
        Ok(settings)
    }
}

/// Result of a sync command once the target connection has been closed.
///
/// The sync outcome is what gets reported; a failure to close afterwards is
/// only logged.
pub fn finish_sync<E: Display>(
    outcome: anyhow::Result<()>,
    closed: Result<(), E>,
) -> anyhow::Result<()> {
    if let Err(e) = closed {
        warn!("Failed to close MariaDB connection: {}", e);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_sync_reports_outcome_over_close_failure() {
        let failed = finish_sync(
            Err(anyhow::anyhow!("1 of 2 tables failed")),
            Err("connection reset"),
        );
        assert_eq!(failed.unwrap_err().to_string(), "1 of 2 tables failed");

        assert!(finish_sync(Ok(()), Err("connection reset")).is_ok());
        assert!(finish_sync::<String>(Ok(()), Ok(())).is_ok());
    }
}
