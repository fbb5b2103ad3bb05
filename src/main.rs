//! Command-line interface for mssql-sync
//!
//! # Usage Examples
//!
//! ## Sync all enabled tables
//! ```bash
//! export MSSQL_SERVER=erp-db MSSQL_DATABASE=Production \
//!        MSSQL_USERNAME=sync MSSQL_PASSWORD=...
//! export MARIADB_HOST=localhost MARIADB_DATABASE=erp_mirror
//! mssql-sync run --config sync_tables.yaml
//! ```
//!
//! ## Sync one table, ignoring its stored watermark
//! ```bash
//! mssql-sync table T50_InspectionData --force-full
//! ```
//!
//! ## Inspect how a table will be created
//! ```bash
//! mssql-sync describe T50_InspectionData
//! ```
//!
//! ## Forget stored watermarks
//! ```bash
//! mssql-sync reset --table T50_InspectionData
//! mssql-sync reset
//! ```

use std::path::PathBuf;

use anyhow::Context;
use checkpoint::{FileWatermarkStore, WatermarkStore};
use clap::{Parser, Subcommand};
use mssql_cli_source::{
    table_layout, CommandLineClient, SchemaIntrospector, SourceOpts, Synchronizer, TableStatus,
};
use mssql_sync::{finish_sync, MariadbOpts, MssqlOpts, SyncOpts, DEFAULT_STATE_FILE};
use mssql_types::translate;
use mysql_sink::{MySQLSink, TargetOpts};
use sync_core::{SyncSettings, TableSyncSpec};
use tracing::info;

#[derive(Parser)]
#[command(name = "mssql-sync")]
#[command(about = "Synchronize SQL Server tables into MariaDB")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync every enabled table from the configuration file
    Run {
        #[command(flatten)]
        source: MssqlOpts,

        #[command(flatten)]
        target: MariadbOpts,

        #[command(flatten)]
        sync: SyncOpts,

        /// Clear stored watermarks before syncing
        #[arg(long)]
        force_full: bool,
    },

    /// Sync one configured table
    Table {
        /// Table name as configured
        name: String,

        #[command(flatten)]
        source: MssqlOpts,

        #[command(flatten)]
        target: MariadbOpts,

        #[command(flatten)]
        sync: SyncOpts,

        /// Clear the table's stored watermark before syncing
        #[arg(long)]
        force_full: bool,
    },

    /// Clear stored watermarks
    Reset {
        /// Only clear this table
        #[arg(long)]
        table: Option<String>,

        /// Watermark state file
        #[arg(long, default_value = DEFAULT_STATE_FILE, env = "SYNC_STATE_FILE")]
        state_file: PathBuf,
    },

    /// Show a table's columns and the MariaDB table they map to
    Describe {
        /// Source table name
        name: String,

        #[command(flatten)]
        source: MssqlOpts,

        /// Table configuration file; the table is described with its
        /// configured renames and column filter when listed there
        #[arg(long, env = "SYNC_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            source,
            target,
            sync,
            force_full,
        } => run_sync(&source, &target, &sync, None, force_full).await,
        Commands::Table {
            name,
            source,
            target,
            sync,
            force_full,
        } => run_sync(&source, &target, &sync, Some(&name), force_full).await,
        Commands::Reset { table, state_file } => run_reset(table.as_deref(), state_file),
        Commands::Describe {
            name,
            source,
            config,
        } => run_describe(&name, &source, config).await,
    }
}

fn source_client(opts: &MssqlOpts) -> anyhow::Result<CommandLineClient> {
    let source_opts = SourceOpts::from(opts);
    let client = CommandLineClient::detect(
        &source_opts,
        opts.mssql_client.dialect(),
        opts.mssql_client_path.clone(),
    )?;
    info!(
        "Using {} at {} for SQL Server {}/{}",
        client.dialect(),
        client.program().display(),
        source_opts.server,
        source_opts.database
    );
    Ok(client)
}

async fn run_sync(
    source: &MssqlOpts,
    target: &MariadbOpts,
    sync: &SyncOpts,
    table: Option<&str>,
    force_full: bool,
) -> anyhow::Result<()> {
    let settings = sync.load_settings()?;
    if let Some(name) = table {
        if settings.table(name).is_none() {
            anyhow::bail!("Table '{name}' is not in {:?}", sync.config);
        }
    }

    let client = source_client(source)?;

    let target_opts = TargetOpts::from(target);
    let mut sink = MySQLSink::connect(&target_opts)
        .await
        .with_context(|| format!("Failed to connect to MariaDB at {}", target_opts.display_target()))?;

    let mut state = FileWatermarkStore::open(&sync.state_file);
    info!(
        "Sync state file: {} ({} tables tracked)",
        state.path().display(),
        state.tables().count()
    );

    let outcome = {
        let mut synchronizer = Synchronizer::new(&settings, &client, &mut sink, &mut state);
        match table {
            Some(name) => synchronizer
                .sync_one(name, force_full)
                .await
                .map_err(anyhow::Error::from)
                .and_then(|outcome| match outcome.status {
                    TableStatus::Succeeded => Ok(()),
                    TableStatus::Skipped => Err(anyhow::anyhow!("Table '{name}' is disabled")),
                    TableStatus::Failed => Err(anyhow::anyhow!(
                        "Table '{name}' failed: {}",
                        outcome.error.unwrap_or_default()
                    )),
                }),
            None => synchronizer
                .run(force_full)
                .await
                .map_err(anyhow::Error::from)
                .and_then(|result| {
                    if result.is_success() {
                        Ok(())
                    } else if result.failed() > 0 {
                        Err(anyhow::anyhow!(
                            "{} of {} tables failed",
                            result.failed(),
                            result.tables.len()
                        ))
                    } else {
                        Err(anyhow::anyhow!("No tables were synced"))
                    }
                }),
        }
    };

    finish_sync(outcome, sink.close().await)
}

fn run_reset(table: Option<&str>, state_file: PathBuf) -> anyhow::Result<()> {
    let mut state = FileWatermarkStore::open(state_file);
    match table {
        Some(name) => {
            state
                .clear(name)
                .with_context(|| format!("Failed to clear watermark for {name}"))?;
            info!("Cleared watermark for {}", name);
        }
        None => {
            state.clear_all().context("Failed to clear watermarks")?;
            info!("Cleared all watermarks in {}", state.path().display());
        }
    }
    Ok(())
}

async fn run_describe(
    name: &str,
    source: &MssqlOpts,
    config: Option<PathBuf>,
) -> anyhow::Result<()> {
    let spec = match config {
        Some(path) => {
            let settings = SyncSettings::from_file(&path)
                .with_context(|| format!("Failed to load sync configuration from {path:?}"))?;
            settings
                .table(name)
                .cloned()
                .unwrap_or_else(|| TableSyncSpec::full(name))
        }
        None => TableSyncSpec::full(name),
    };

    let client = source_client(source)?;
    let columns = SchemaIntrospector::new(&client)
        .describe(&spec)
        .await
        .with_context(|| format!("Failed to describe table {name}"))?;
    if columns.is_empty() {
        anyhow::bail!("No columns found for table '{name}'");
    }

    println!("Table {} ({} mode)", spec.name, spec.mode);
    for column in &columns {
        println!(
            "  {:<30} {:<20} -> {:<30} {}",
            column.source_name,
            column.source_type,
            column.name,
            translate(&column.source_type)
        );
    }
    println!();
    println!("{};", table_layout(&spec, &columns).create_table_sql());
    Ok(())
}
