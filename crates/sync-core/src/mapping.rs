//! Bidirectional column rename index.

use std::collections::HashMap;

/// Source-to-target column rename mapping with a reverse index.
///
/// Built once per table from configuration. Forward lookups are exact (the
/// source catalog returns names verbatim); reverse lookups are used to turn
/// target-visible names back into source identifiers when building queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    forward: HashMap<String, String>,
    reverse: HashMap<String, String>,
}

impl ColumnMapping {
    /// Build a mapping from `(source, target)` pairs.
    ///
    /// Returns the offending target name if two source columns map onto it.
    pub fn new<I, S, T>(pairs: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        let mut mapping = Self::default();
        for (source, target) in pairs {
            let source = source.into();
            let target = target.into();
            if let Some(existing) = mapping.reverse.get(&target) {
                if existing != &source {
                    return Err(target);
                }
            }
            mapping.reverse.insert(target.clone(), source.clone());
            mapping.forward.insert(source, target);
        }
        Ok(mapping)
    }

    /// Target name configured for a source column, if any.
    pub fn target_name(&self, source: &str) -> Option<&str> {
        self.forward.get(source).map(String::as_str)
    }

    /// Source column that was renamed to `target`, if any.
    pub fn source_name(&self, target: &str) -> Option<&str> {
        self.reverse.get(target).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_and_reverse_lookup() {
        let mapping = ColumnMapping::new([("X02", "inspection_date"), ("XC", "comments")]).unwrap();

        assert_eq!(mapping.target_name("X02"), Some("inspection_date"));
        assert_eq!(mapping.source_name("comments"), Some("XC"));
        assert_eq!(mapping.target_name("X03"), None);
        assert_eq!(mapping.len(), 2);
    }

    #[test]
    fn test_rejects_non_injective_mapping() {
        let err = ColumnMapping::new([("X01", "line"), ("X09", "line")]).unwrap_err();
        assert_eq!(err, "line");
    }

    #[test]
    fn test_repeated_identical_pair_is_accepted() {
        let mapping = ColumnMapping::new([("X01", "line"), ("X01", "line")]).unwrap();
        assert_eq!(mapping.len(), 1);
    }
}
