//! In-memory watermark storage.

use std::collections::BTreeMap;

use crate::store::{StateError, SyncWatermark, WatermarkStore};

/// Watermark store that lives only as long as the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryWatermarkStore {
    entries: BTreeMap<String, SyncWatermark>,
}

impl MemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl WatermarkStore for MemoryWatermarkStore {
    fn get(&self, table: &str) -> Option<SyncWatermark> {
        self.entries.get(table).cloned()
    }

    fn set(&mut self, table: &str, value: &str) -> Result<(), StateError> {
        self.entries
            .insert(table.to_string(), SyncWatermark::new(value));
        Ok(())
    }

    fn clear(&mut self, table: &str) -> Result<(), StateError> {
        self.entries.remove(table);
        Ok(())
    }

    fn clear_all(&mut self) -> Result<(), StateError> {
        self.entries.clear();
        Ok(())
    }
}
