//! Source schema introspection and target layout derivation.

use mssql_types::{is_integer_type, translate};
use mysql_sink::{ColumnDef, PrimaryKey, TableLayout};
use sync_core::{ColumnDescriptor, TableSyncSpec};
use tracing::{debug, info};

use crate::client::QueryClient;
use crate::error::Result;
use crate::queries::columns_query;

/// Strip bracket/quote decoration from a catalog column name.
pub fn clean_column_name(raw: &str) -> String {
    raw.replace(&['[', ']', '"'][..], "").trim().to_string()
}

/// Target name for a cleaned source column.
///
/// Mapped names are used verbatim. Unmapped names are lower-cased and get a
/// `col_` prefix when they start with a digit.
pub fn resolve_column_name(spec: &TableSyncSpec, source_name: &str) -> String {
    if let Some(target) = spec.mapping.target_name(source_name) {
        return target.to_string();
    }

    let name = source_name.to_lowercase();
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("col_{name}")
    } else {
        name
    }
}

/// Reads column metadata from `INFORMATION_SCHEMA.COLUMNS`.
pub struct SchemaIntrospector<'a, C: QueryClient + ?Sized> {
    client: &'a C,
}

impl<'a, C: QueryClient + ?Sized> SchemaIntrospector<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Columns of `spec.name` in ordinal order, renamed and filtered by the
    /// allow-list. Empty when the table has no (remaining) columns.
    pub async fn describe(&self, spec: &TableSyncSpec) -> Result<Vec<ColumnDescriptor>> {
        let rows = self.client.execute(&columns_query(&spec.name)).await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let (Some(Some(raw_name)), Some(raw_type)) = (row.first(), row.get(1)) else {
                debug!("Ignoring malformed catalog row for {}: {:?}", spec.name, row);
                continue;
            };

            let source_name = clean_column_name(raw_name);
            let name = resolve_column_name(spec, &source_name);
            if name.is_empty() || !spec.allows_column(&source_name, &name) {
                continue;
            }

            let source_type = raw_type.as_deref().unwrap_or_default().trim().to_string();
            columns.push(ColumnDescriptor::new(name, source_name, source_type));
        }

        match &spec.columns {
            Some(filter) => info!(
                "Found {} filtered columns for table {}: {:?}",
                columns.len(),
                spec.name,
                filter
            ),
            None => info!("Found {} columns for table {}", columns.len(), spec.name),
        }
        Ok(columns)
    }
}

/// Target layout for introspected columns.
///
/// The first column named `id` becomes the primary key, auto-incrementing
/// when its type is an integer. Otherwise the configured primary-key column,
/// named by its source or its renamed target name, becomes a plain primary
/// key when it is among the columns.
pub fn table_layout(spec: &TableSyncSpec, columns: &[ColumnDescriptor]) -> TableLayout {
    let defs: Vec<ColumnDef> = columns
        .iter()
        .map(|c| ColumnDef::new(c.name.clone(), translate(&c.source_type)))
        .collect();

    let id_key = columns.iter().zip(&defs).find(|(c, _)| c.is_id()).map(|(c, def)| PrimaryKey {
        column: c.name.clone(),
        auto_increment: is_integer_type(&def.sql_type),
    });

    let key_source = spec
        .mapping
        .source_name(&spec.primary_key)
        .unwrap_or(&spec.primary_key);
    let primary_key = id_key.or_else(|| {
        columns
            .iter()
            .find(|c| {
                c.source_name.eq_ignore_ascii_case(key_source)
                    || c.name.eq_ignore_ascii_case(&spec.primary_key)
            })
            .map(|c| PrimaryKey {
                column: c.name.clone(),
                auto_increment: false,
            })
    });

    TableLayout::new(spec.name.clone(), defs, primary_key)
}

/// Source column that pages are ordered by: the layout's primary key, or the
/// first column for tables without one.
pub fn order_column<'c>(columns: &'c [ColumnDescriptor], layout: &TableLayout) -> Option<&'c str> {
    layout
        .primary_key
        .as_ref()
        .and_then(|pk| columns.iter().find(|c| c.name == pk.column))
        .or_else(|| columns.first())
        .map(|c| c.source_name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSource;
    use sync_core::ColumnMapping;

    fn mapping(pairs: &[(&str, &str)]) -> ColumnMapping {
        ColumnMapping::new(pairs.iter().map(|(s, t)| (s.to_string(), t.to_string()))).unwrap()
    }

    #[test]
    fn test_clean_and_resolve_names() {
        let spec = TableSyncSpec::full("T").with_mapping(mapping(&[("2nd", "inspection_type")]));

        assert_eq!(clean_column_name(" [Order ID] "), "Order ID");
        assert_eq!(clean_column_name("\"X02\""), "X02");
        assert_eq!(resolve_column_name(&spec, "2nd"), "inspection_type");
        assert_eq!(resolve_column_name(&spec, "3rd"), "col_3rd");
        assert_eq!(resolve_column_name(&spec, "XC"), "xc");
    }

    #[tokio::test]
    async fn test_describe_renames_and_filters() {
        let source = FakeSource::new().with_table(
            "T",
            &[("ID", "int"), ("X02", "datetime"), ("XC", "varchar(50)"), ("1st", "bit")],
            vec![],
        );
        let spec = TableSyncSpec::full("T")
            .with_mapping(mapping(&[("X02", "inspection_date")]))
            .with_columns(vec!["id".into(), "INSPECTION_DATE".into(), "1st".into()]);

        let columns = SchemaIntrospector::new(&source).describe(&spec).await.unwrap();
        assert_eq!(
            columns,
            vec![
                ColumnDescriptor::new("id", "ID", "int"),
                ColumnDescriptor::new("inspection_date", "X02", "datetime"),
                ColumnDescriptor::new("col_1st", "1st", "bit"),
            ]
        );
    }

    #[tokio::test]
    async fn test_describe_unknown_table_is_empty() {
        let source = FakeSource::new();
        let columns = SchemaIntrospector::new(&source)
            .describe(&TableSyncSpec::full("Missing"))
            .await
            .unwrap();
        assert!(columns.is_empty());
    }

    #[test]
    fn test_layout_with_integer_id() {
        let spec = TableSyncSpec::full("T");
        let columns = vec![
            ColumnDescriptor::new("id", "ID", "int"),
            ColumnDescriptor::new("xc", "XC", "nvarchar(max)"),
        ];

        let layout = table_layout(&spec, &columns);
        assert_eq!(layout.columns[1], ColumnDef::new("xc", "TEXT"));
        assert_eq!(
            layout.primary_key,
            Some(PrimaryKey {
                column: "id".to_string(),
                auto_increment: true
            })
        );
    }

    #[test]
    fn test_layout_with_non_integer_id() {
        let spec = TableSyncSpec::full("T");
        let columns = vec![ColumnDescriptor::new("id", "ID", "uniqueidentifier")];

        let layout = table_layout(&spec, &columns);
        assert_eq!(layout.columns[0].sql_type, "VARCHAR(36)");
        assert_eq!(layout.primary_key.map(|pk| pk.auto_increment), Some(false));
    }

    #[test]
    fn test_layout_uses_configured_key_without_id() {
        let spec = TableSyncSpec::full("T")
            .with_primary_key("ItemCode")
            .with_mapping(mapping(&[("ItemCode", "item_code")]));
        let columns = vec![
            ColumnDescriptor::new("item_code", "ItemCode", "varchar(20)"),
            ColumnDescriptor::new("qty", "Qty", "int"),
        ];

        let layout = table_layout(&spec, &columns);
        assert_eq!(
            layout.primary_key,
            Some(PrimaryKey {
                column: "item_code".to_string(),
                auto_increment: false
            })
        );
    }

    #[test]
    fn test_layout_resolves_key_named_by_target() {
        let spec = TableSyncSpec::full("T")
            .with_primary_key("item_code")
            .with_mapping(mapping(&[("Artikel", "item_code")]));
        let columns = vec![
            ColumnDescriptor::new("qty", "Qty", "int"),
            ColumnDescriptor::new("item_code", "Artikel", "varchar(20)"),
        ];

        let layout = table_layout(&spec, &columns);
        assert_eq!(
            layout.primary_key.as_ref().map(|pk| pk.column.as_str()),
            Some("item_code")
        );
        assert_eq!(order_column(&columns, &layout), Some("Artikel"));
    }

    #[test]
    fn test_layout_without_any_key() {
        let spec = TableSyncSpec::full("T");
        let columns = vec![ColumnDescriptor::new("qty", "Qty", "int")];
        assert_eq!(table_layout(&spec, &columns).primary_key, None);
    }

    #[test]
    fn test_order_column() {
        let spec = TableSyncSpec::full("T");
        let columns = vec![
            ColumnDescriptor::new("code", "Code", "varchar(10)"),
            ColumnDescriptor::new("id", "ID", "int"),
        ];
        let layout = table_layout(&spec, &columns);
        assert_eq!(order_column(&columns, &layout), Some("ID"));

        let columns = vec![
            ColumnDescriptor::new("code", "Code", "varchar(10)"),
            ColumnDescriptor::new("qty", "Qty", "int"),
        ];
        let layout = table_layout(&spec, &columns);
        assert_eq!(layout.primary_key, None);
        assert_eq!(order_column(&columns, &layout), Some("Code"));
        assert_eq!(order_column(&[], &layout), None);
    }
}
