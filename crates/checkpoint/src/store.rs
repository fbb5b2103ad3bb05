//! Watermark storage trait and types

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Errors raised when persisting watermarks.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Failed to write sync state to '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize sync state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Last watermark value observed for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncWatermark {
    /// Watermark column value, as rendered by the source
    pub last_sync: String,
    /// When this value was stored. Older documents carry a timestamp
    /// without an offset, read as UTC.
    #[serde(default = "Utc::now", deserialize_with = "deserialize_updated_at")]
    pub updated_at: DateTime<Utc>,
}

impl SyncWatermark {
    pub fn new(last_sync: impl Into<String>) -> Self {
        Self {
            last_sync: last_sync.into(),
            updated_at: Utc::now(),
        }
    }
}

/// Parse an RFC 3339 timestamp, or an ISO 8601 one without offset as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn deserialize_updated_at<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_timestamp(&text).ok_or_else(|| D::Error::custom(format!("invalid timestamp '{text}'")))
}

/// Trait for per-table watermark storage.
///
/// Implementations keep the whole state in memory; mutations are durable
/// once the call returns `Ok`.
pub trait WatermarkStore: Send {
    /// Watermark stored for `table`, if any.
    fn get(&self, table: &str) -> Option<SyncWatermark>;

    /// Store `value` as the watermark for `table`.
    fn set(&mut self, table: &str, value: &str) -> Result<(), StateError>;

    /// Forget the watermark for `table`. Clearing an absent entry is a no-op.
    fn clear(&mut self, table: &str) -> Result<(), StateError>;

    /// Forget every stored watermark.
    fn clear_all(&mut self) -> Result<(), StateError>;

    /// Convenience accessor for the stored value only.
    fn last_sync(&self, table: &str) -> Option<String> {
        self.get(table).map(|w| w.last_sync)
    }
}
