//! Supported command-line query clients.

use std::env;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::client::SourceOpts;

/// Output dialect of a command-line client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientDialect {
    /// Microsoft `sqlcmd`; whitespace-separated cells.
    Sqlcmd,
    /// FreeTDS `tsql`; tab-separated cells.
    Tsql,
}

impl ClientDialect {
    /// Detection order when no dialect is configured.
    pub const PREFERENCE: [ClientDialect; 2] = [ClientDialect::Sqlcmd, ClientDialect::Tsql];

    /// Executable name looked up on `PATH`.
    pub fn program(&self) -> &'static str {
        match self {
            ClientDialect::Sqlcmd => "sqlcmd",
            ClientDialect::Tsql => "tsql",
        }
    }

    /// Find the first supported client on the current `PATH`.
    pub fn detect() -> Option<(ClientDialect, PathBuf)> {
        let path = env::var_os("PATH")?;
        Self::detect_in(&path)
    }

    /// Find the first supported client in a `PATH`-style directory list.
    pub fn detect_in(path: &OsStr) -> Option<(ClientDialect, PathBuf)> {
        Self::PREFERENCE
            .into_iter()
            .find_map(|dialect| dialect.find_in(path).map(|p| (dialect, p)))
    }

    /// Locate this client's executable in a `PATH`-style directory list.
    pub fn find_in(&self, path: &OsStr) -> Option<PathBuf> {
        env::split_paths(path)
            .map(|dir| dir.join(self.program()))
            .find(|candidate| is_executable(candidate))
    }

    /// Command-line arguments for a connection. The password is among them,
    /// so the result must never be logged.
    pub fn args(&self, opts: &SourceOpts) -> Vec<String> {
        match self {
            ClientDialect::Sqlcmd => {
                let server = match opts.port {
                    Some(port) => format!("{},{}", opts.server, port),
                    None => opts.server.clone(),
                };
                vec![
                    "-S".to_string(),
                    server,
                    "-U".to_string(),
                    opts.username.clone(),
                    "-P".to_string(),
                    opts.password.clone(),
                    "-d".to_string(),
                    opts.database.clone(),
                    "-h".to_string(),
                    "-1".to_string(),
                    "-W".to_string(),
                ]
            }
            ClientDialect::Tsql => {
                let mut args = match opts.port {
                    Some(port) => vec![
                        "-H".to_string(),
                        opts.server.clone(),
                        "-p".to_string(),
                        port.to_string(),
                    ],
                    None => vec!["-S".to_string(), opts.server.clone()],
                };
                args.extend([
                    "-U".to_string(),
                    opts.username.clone(),
                    "-P".to_string(),
                    opts.password.clone(),
                    "-D".to_string(),
                    opts.database.clone(),
                ]);
                args
            }
        }
    }

    /// Split one output line into raw, untrimmed cells.
    pub fn split_line<'a>(&self, line: &'a str) -> Vec<&'a str> {
        match self {
            ClientDialect::Tsql if line.contains('\t') => line.split('\t').collect(),
            _ => line.split_whitespace().collect(),
        }
    }
}

impl fmt::Display for ClientDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

impl FromStr for ClientDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlcmd" => Ok(ClientDialect::Sqlcmd),
            "tsql" => Ok(ClientDialect::Tsql),
            other => Err(format!("Unknown query client '{other}' (expected sqlcmd or tsql)")),
        }
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}
