//! Validated per-table sync specification.

use crate::mapping::ColumnMapping;

/// How a table is synchronized.
///
/// Incremental mode carries its watermark column, so an incremental table
/// without one cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMode {
    /// Drop and recreate the target table, then copy every qualifying row.
    Full,
    /// Reuse the target table and upsert rows whose watermark column exceeds
    /// the last persisted value.
    Incremental { watermark_column: String },
}

impl SyncMode {
    pub fn is_incremental(&self) -> bool {
        matches!(self, SyncMode::Incremental { .. })
    }

    pub fn watermark_column(&self) -> Option<&str> {
        match self {
            SyncMode::Full => None,
            SyncMode::Incremental { watermark_column } => Some(watermark_column),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Full => "full",
            SyncMode::Incremental { .. } => "incremental",
        }
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One synchronized table. Read-only for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSyncSpec {
    /// Source table identifier, also used as the target table name.
    pub name: String,
    pub enabled: bool,
    /// Optional allow-list matched case-insensitively against raw or renamed
    /// column names.
    pub columns: Option<Vec<String>>,
    /// Free-form source-side filter expression.
    pub condition: Option<String>,
    pub mode: SyncMode,
    /// Source-side primary-key column used for ordering and upserts.
    pub primary_key: String,
    pub mapping: ColumnMapping,
}

impl TableSyncSpec {
    /// A full-sync spec with default settings, mostly useful in tests.
    pub fn full(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            columns: None,
            condition: None,
            mode: SyncMode::Full,
            primary_key: "ID".to_string(),
            mapping: ColumnMapping::default(),
        }
    }

    /// An incremental-sync spec tracking `watermark_column`.
    pub fn incremental(name: impl Into<String>, watermark_column: impl Into<String>) -> Self {
        Self {
            mode: SyncMode::Incremental {
                watermark_column: watermark_column.into(),
            },
            ..Self::full(name)
        }
    }

    pub fn with_mapping(mut self, mapping: ColumnMapping) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    /// Whether a column passes the allow-list (always true without one).
    pub fn allows_column(&self, raw_name: &str, resolved_name: &str) -> bool {
        match &self.columns {
            None => true,
            Some(allowed) => allowed.iter().any(|entry| {
                entry.eq_ignore_ascii_case(raw_name) || entry.eq_ignore_ascii_case(resolved_name)
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list_matches_raw_or_renamed_case_insensitively() {
        let spec = TableSyncSpec::full("T").with_columns(vec!["id".into(), "Inspection_Date".into()]);

        assert!(spec.allows_column("ID", "id"));
        assert!(spec.allows_column("X02", "inspection_date"));
        assert!(!spec.allows_column("XC", "xc"));
    }

    #[test]
    fn test_no_allow_list_accepts_everything() {
        let spec = TableSyncSpec::full("T");
        assert!(spec.allows_column("anything", "anything"));
    }

    #[test]
    fn test_mode_accessors() {
        let spec = TableSyncSpec::incremental("T", "X02");
        assert!(spec.mode.is_incremental());
        assert_eq!(spec.mode.watermark_column(), Some("X02"));
        assert_eq!(spec.mode.to_string(), "incremental");
        assert_eq!(SyncMode::Full.watermark_column(), None);
    }
}
