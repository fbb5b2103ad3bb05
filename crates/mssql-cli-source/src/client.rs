//! Query execution through an external command-line client.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use sync_core::Row;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::dialect::ClientDialect;
use crate::error::{Result, SyncError};
use crate::parse::parse_output;

/// Batch terminator sent after every query.
pub const BATCH_TERMINATOR: &str = "GO";

/// SQL Server connection options
#[derive(Clone)]
pub struct SourceOpts {
    pub server: String,
    pub database: String,
    pub username: String,
    pub password: String,
    /// Explicit TCP port; the client's default when unset.
    pub port: Option<u16>,
}

impl fmt::Debug for SourceOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceOpts")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"***")
            .field("port", &self.port)
            .finish()
    }
}

/// Trait for executing queries against the source database.
///
/// Every result cell is text; `NULL` becomes `None`.
#[async_trait]
pub trait QueryClient: Send + Sync {
    async fn execute(&self, query: &str) -> Result<Vec<Row>>;
}

/// [`QueryClient`] that runs one `sqlcmd`/`tsql` process per query.
pub struct CommandLineClient {
    dialect: ClientDialect,
    program: PathBuf,
    args: Vec<String>,
}

impl CommandLineClient {
    pub fn new(dialect: ClientDialect, program: impl Into<PathBuf>, opts: &SourceOpts) -> Self {
        Self {
            dialect,
            program: program.into(),
            args: dialect.args(opts),
        }
    }

    /// Build a client for the configured dialect, or the first one found on
    /// `PATH` when `dialect` is `None`.
    ///
    /// `program` overrides the executable location.
    pub fn detect(
        opts: &SourceOpts,
        dialect: Option<ClientDialect>,
        program: Option<PathBuf>,
    ) -> Result<Self> {
        let (dialect, program) = match (dialect, program) {
            (Some(dialect), Some(program)) => (dialect, program),
            (Some(dialect), None) => {
                let program = std::env::var_os("PATH")
                    .and_then(|path| dialect.find_in(&path))
                    .ok_or_else(|| {
                        SyncError::Configuration(format!(
                            "SQL Server client '{}' not found on PATH",
                            dialect.program()
                        ))
                    })?;
                (dialect, program)
            }
            (None, Some(program)) => {
                let dialect = program
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(|s| s.parse::<ClientDialect>().ok())
                    .ok_or_else(|| {
                        SyncError::Configuration(format!(
                            "Cannot tell the dialect of client '{}'; set it explicitly",
                            program.display()
                        ))
                    })?;
                (dialect, program)
            }
            (None, None) => ClientDialect::detect().ok_or_else(|| {
                SyncError::Configuration(
                    "No SQL Server client found. Install one of: sqlcmd (Microsoft SQL Server tools), tsql (FreeTDS)"
                        .to_string(),
                )
            })?,
        };

        debug!(
            "Using {} client at {} for {}/{}",
            dialect,
            program.display(),
            opts.server,
            opts.database
        );
        Ok(Self::new(dialect, program, opts))
    }

    pub fn dialect(&self) -> ClientDialect {
        self.dialect
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }
}

#[async_trait]
impl QueryClient for CommandLineClient {
    async fn execute(&self, query: &str) -> Result<Vec<Row>> {
        debug!("Executing source query: {}", query);

        let program = self.program.display().to_string();
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SyncError::ClientSpawn {
                program: program.clone(),
                source,
            })?;

        let input = format!("{query}\n{BATCH_TERMINATOR}\n");
        let mut stdin = child.stdin.take().ok_or_else(|| SyncError::ClientSpawn {
            program: program.clone(),
            source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdin not captured"),
        })?;

        let feed = async move {
            stdin.write_all(input.as_bytes()).await?;
            stdin.shutdown().await
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());

        let output = output.map_err(|source| SyncError::ClientSpawn {
            program: program.clone(),
            source,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(SyncError::ClientExit {
                status: output.status.to_string(),
                stderr,
            });
        }

        if let Err(e) = fed {
            debug!("Query client closed stdin early: {}", e);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let rows = parse_output(&stdout, self.dialect);
        debug!("Source query returned {} rows", rows.len());
        Ok(rows)
    }
}
