//! Row and column representations shared across the pipeline.

use serde::{Deserialize, Serialize};

/// A single nullable text cell as produced by the query client.
pub type Cell = Option<String>;

/// An ordered sequence of cells, positionally aligned to a column list.
pub type Row = Vec<Cell>;

/// A column resolved by schema introspection.
///
/// `name` is the target-visible name (after renaming), `source_name` is the
/// cleaned name used in source queries and `source_type` is the source type
/// descriptor including any length/precision suffix, e.g. `varchar(50)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub source_name: String,
    pub source_type: String,
}

impl ColumnDescriptor {
    pub fn new(
        name: impl Into<String>,
        source_name: impl Into<String>,
        source_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source_name: source_name.into(),
            source_type: source_type.into(),
        }
    }

    /// Whether this column is the conventional `ID` column.
    pub fn is_id(&self) -> bool {
        self.name.eq_ignore_ascii_case("id")
    }
}
