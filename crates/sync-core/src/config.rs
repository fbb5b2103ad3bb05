//! Sync configuration loaded from YAML.
//!
//! The file format mirrors [`TableConfig`]; everything is validated once in
//! [`SyncSettings::from_yaml`] and the resulting value is passed explicitly
//! to every component.
//!
//! ```yaml
//! page_size: 1000
//! max_retries: 3
//! page_delay_ms: 100
//! tables:
//!   - name: T50_InspectionData
//!     enabled: true
//!     sync_mode: incremental
//!     watermark_column: X02
//!     primary_key: ID
//!     column_mapping:
//!       "2nd": inspection_type
//!       X02: inspection_date
//! ```

use crate::mapping::ColumnMapping;
use crate::table::{SyncMode, TableSyncSpec};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Default number of rows fetched and written per page.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Default retry count. Declared for operators; the core does not retry.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default pause between pages.
pub const DEFAULT_PAGE_DELAY_MS: u64 = 100;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Error reading config file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Error parsing YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Table entry #{0} has an empty name")]
    EmptyTableName(usize),

    #[error("Table '{0}' is configured more than once")]
    DuplicateTable(String),

    #[error("Table '{table}' maps more than one column to '{target}'")]
    DuplicateTarget { table: String, target: String },

    #[error("page_size must be greater than zero")]
    ZeroPageSize,
}

/// Sync mode as written in the config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfiguredMode {
    #[default]
    Full,
    Incremental,
}

/// One table entry as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    pub name: String,

    #[serde(default = "default_enabled", alias = "sync")]
    pub enabled: bool,

    #[serde(default)]
    pub columns: Option<Vec<String>>,

    #[serde(default)]
    pub condition: Option<String>,

    #[serde(default)]
    pub sync_mode: ConfiguredMode,

    #[serde(default, alias = "timestamp_column")]
    pub watermark_column: Option<String>,

    #[serde(default = "default_primary_key")]
    pub primary_key: String,

    #[serde(default)]
    pub column_mapping: BTreeMap<String, String>,
}

fn default_enabled() -> bool {
    true
}

fn default_primary_key() -> String {
    "ID".to_string()
}

/// Root of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub page_size: Option<usize>,

    #[serde(default)]
    pub max_retries: Option<u32>,

    #[serde(default)]
    pub page_delay_ms: Option<u64>,

    #[serde(default)]
    pub tables: Vec<TableConfig>,
}

/// Validated, immutable configuration for one run.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub page_size: usize,
    pub max_retries: u32,
    pub page_delay: Duration,
    pub tables: Vec<TableSyncSpec>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            page_delay: Duration::from_millis(DEFAULT_PAGE_DELAY_MS),
            tables: Vec::new(),
        }
    }
}

impl SyncSettings {
    /// Load settings from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate settings from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_yaml::from_str(yaml)?;
        Self::from_config(file)
    }

    /// Validate a parsed config file.
    pub fn from_config(file: ConfigFile) -> Result<Self, ConfigError> {
        let page_size = file.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }

        let mut seen = HashSet::new();
        let mut tables = Vec::with_capacity(file.tables.len());
        for (index, table) in file.tables.into_iter().enumerate() {
            let name = table.name.trim().to_string();
            if name.is_empty() {
                return Err(ConfigError::EmptyTableName(index));
            }
            if !seen.insert(name.clone()) {
                return Err(ConfigError::DuplicateTable(name));
            }
            tables.push(table_spec(name, table)?);
        }

        Ok(Self {
            page_size,
            max_retries: file.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            page_delay: Duration::from_millis(file.page_delay_ms.unwrap_or(DEFAULT_PAGE_DELAY_MS)),
            tables,
        })
    }

    /// Override the page size, e.g. from a CLI flag.
    pub fn with_page_size(mut self, page_size: Option<usize>) -> Result<Self, ConfigError> {
        if let Some(size) = page_size {
            if size == 0 {
                return Err(ConfigError::ZeroPageSize);
            }
            self.page_size = size;
        }
        Ok(self)
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// Look up a configured table by name.
    pub fn table(&self, name: &str) -> Option<&TableSyncSpec> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Configured tables that are enabled, in configuration order.
    pub fn enabled_tables(&self) -> impl Iterator<Item = &TableSyncSpec> {
        self.tables.iter().filter(|t| t.enabled)
    }
}

fn table_spec(name: String, table: TableConfig) -> Result<TableSyncSpec, ConfigError> {
    let mapping = ColumnMapping::new(table.column_mapping).map_err(|target| {
        ConfigError::DuplicateTarget {
            table: name.clone(),
            target,
        }
    })?;

    let watermark_column = table
        .watermark_column
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    let mode = match (table.sync_mode, watermark_column) {
        (ConfiguredMode::Incremental, Some(watermark_column)) => {
            SyncMode::Incremental { watermark_column }
        }
        (ConfiguredMode::Incremental, None) => {
            warn!(
                "Table {} is configured for incremental sync without a watermark column, using full sync",
                name
            );
            SyncMode::Full
        }
        (ConfiguredMode::Full, _) => SyncMode::Full,
    };

    let columns = table.columns.filter(|c| !c.is_empty());

    let condition = table
        .condition
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    Ok(TableSyncSpec {
        name,
        enabled: table.enabled,
        columns,
        condition,
        mode,
        primary_key: table.primary_key,
        mapping,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
page_size: 500
page_delay_ms: 0
tables:
  - name: T50_InspectionData
    sync: true
    sync_mode: incremental
    timestamp_column: X02
    primary_key: ID
    column_mapping:
      "2nd": inspection_type
      X02: inspection_date
      XC: comments
  - name: T52_ProductItem
    sync_mode: incremental
    column_mapping:
      X14: style_no
  - name: T59_TransInLine
    enabled: false
    condition: "  "
    columns: []
"#;

    #[test]
    fn test_load_sample_config() {
        let settings = SyncSettings::from_yaml(SAMPLE).unwrap();

        assert_eq!(settings.page_size, 500);
        assert_eq!(settings.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(settings.page_delay, Duration::ZERO);
        assert_eq!(settings.tables.len(), 3);

        let t50 = settings.table("T50_InspectionData").unwrap();
        assert_eq!(t50.mode.watermark_column(), Some("X02"));
        assert_eq!(t50.mapping.target_name("2nd"), Some("inspection_type"));
        assert_eq!(t50.primary_key, "ID");
    }

    #[test]
    fn test_incremental_without_watermark_becomes_full() {
        let settings = SyncSettings::from_yaml(SAMPLE).unwrap();
        let t52 = settings.table("T52_ProductItem").unwrap();
        assert_eq!(t52.mode, SyncMode::Full);
    }

    #[test]
    fn test_blank_condition_and_empty_allow_list_are_unset() {
        let settings = SyncSettings::from_yaml(SAMPLE).unwrap();
        let t59 = settings.table("T59_TransInLine").unwrap();
        assert!(!t59.enabled);
        assert_eq!(t59.condition, None);
        assert_eq!(t59.columns, None);
    }

    #[test]
    fn test_enabled_tables_keep_config_order() {
        let settings = SyncSettings::from_yaml(SAMPLE).unwrap();
        let names: Vec<&str> = settings.enabled_tables().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["T50_InspectionData", "T52_ProductItem"]);
    }

    #[test]
    fn test_defaults_apply_to_minimal_config() {
        let settings = SyncSettings::from_yaml("tables:\n  - name: T1\n").unwrap();
        assert_eq!(settings.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(settings.page_delay, Duration::from_millis(DEFAULT_PAGE_DELAY_MS));

        let t1 = settings.table("T1").unwrap();
        assert!(t1.enabled);
        assert_eq!(t1.mode, SyncMode::Full);
        assert_eq!(t1.primary_key, "ID");
        assert!(t1.mapping.is_empty());
    }

    #[test]
    fn test_rejects_duplicate_tables() {
        let err = SyncSettings::from_yaml("tables:\n  - name: T1\n  - name: T1\n").unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTable(name) if name == "T1"));
    }

    #[test]
    fn test_rejects_empty_table_name() {
        let err = SyncSettings::from_yaml("tables:\n  - name: ' '\n").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyTableName(0)));
    }

    #[test]
    fn test_rejects_non_injective_mapping() {
        let yaml = r#"
tables:
  - name: T1
    column_mapping:
      X01: line
      X02: line
"#;
        let err = SyncSettings::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("'line'"));
    }

    #[test]
    fn test_page_size_validation() {
        assert!(matches!(
            SyncSettings::from_yaml("page_size: 0\ntables: []\n"),
            Err(ConfigError::ZeroPageSize)
        ));

        let settings = SyncSettings::default().with_page_size(Some(25)).unwrap();
        assert_eq!(settings.page_size, 25);
        assert!(SyncSettings::default().with_page_size(Some(0)).is_err());
    }
}
