//! Filesystem-based watermark storage implementation.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::store::{StateError, SyncWatermark, WatermarkStore};

/// Default location of the state document.
pub const DEFAULT_STATE_FILE: &str = "last_sync.json";

/// Filesystem implementation of the WatermarkStore trait.
///
/// The whole document is loaded when the store is opened and rewritten
/// (never appended to) after every mutation. Rewrites go through a
/// temporary file in the same directory that is then renamed over the
/// document, so readers never observe a half-written file.
pub struct FileWatermarkStore {
    path: PathBuf,
    entries: BTreeMap<String, SyncWatermark>,
}

impl FileWatermarkStore {
    /// Open the store at `path`.
    ///
    /// A missing file yields an empty store. An unreadable or corrupt file is
    /// logged and also yields an empty store, which makes the next run of
    /// every incremental table start from the beginning. A malformed entry
    /// only drops that table's watermark.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = load(&path);
        Self { path, entries }
    }

    /// Get the document path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Tables that currently have a stored watermark.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn save(&self) -> Result<(), StateError> {
        let content = serde_json::to_string_pretty(&self.entries)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let io_err = |source: std::io::Error| StateError::Io {
            path: self.path.display().to_string(),
            source,
        };

        std::fs::create_dir_all(&dir).map_err(io_err)?;
        let mut tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(content.as_bytes()).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        tracing::debug!("Stored sync state to {}", self.path.display());
        Ok(())
    }
}

fn load(path: &Path) -> BTreeMap<String, SyncWatermark> {
    if !path.exists() {
        return BTreeMap::new();
    }

    let parsed = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|content| {
            serde_json::from_str::<BTreeMap<String, serde_json::Value>>(&content)
                .map_err(|e| e.to_string())
        });

    let document = match parsed {
        Ok(document) => document,
        Err(e) => {
            tracing::warn!(
                "Ignoring unreadable sync state file {}: {}",
                path.display(),
                e
            );
            return BTreeMap::new();
        }
    };

    let mut entries = BTreeMap::new();
    for (table, value) in document {
        match serde_json::from_value::<SyncWatermark>(value) {
            Ok(watermark) => {
                entries.insert(table, watermark);
            }
            Err(e) => tracing::warn!(
                "Ignoring sync state entry for {} in {}: {}",
                table,
                path.display(),
                e
            ),
        }
    }
    entries
}

impl WatermarkStore for FileWatermarkStore {
    fn get(&self, table: &str) -> Option<SyncWatermark> {
        self.entries.get(table).cloned()
    }

    fn set(&mut self, table: &str, value: &str) -> Result<(), StateError> {
        self.entries
            .insert(table.to_string(), SyncWatermark::new(value));
        self.save()
    }

    fn clear(&mut self, table: &str) -> Result<(), StateError> {
        if self.entries.remove(table).is_some() {
            self.save()?;
        }
        Ok(())
    }

    fn clear_all(&mut self) -> Result<(), StateError> {
        if !self.entries.is_empty() {
            self.entries.clear();
            self.save()?;
        }
        Ok(())
    }
}
