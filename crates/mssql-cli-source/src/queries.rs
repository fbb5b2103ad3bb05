//! T-SQL statements sent to the source.
//!
//! Statements are rendered on a single line so that client prompt echoes
//! stay on the first output line.

use sync_core::TableSyncSpec;

const BRACKETS: &[char] = &['[', ']'];

/// Quote a T-SQL identifier with brackets. Dotted names are quoted per part,
/// so `dbo.Orders` becomes `[dbo].[Orders]`.
pub fn quote_ident(name: &str) -> String {
    name.split('.')
        .map(|part| format!("[{}]", part.trim_matches(BRACKETS).replace(']', "]]")))
        .collect::<Vec<_>>()
        .join(".")
}

/// Render a string literal with embedded quotes doubled.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Catalog query returning `(column name, full type)` pairs in ordinal order.
///
/// The full type carries `(length)` for character/binary columns (`max` for
/// unbounded ones) and `(precision,scale)` for exact numerics.
pub fn columns_query(table: &str) -> String {
    let (schema, name) = match table.rsplit_once('.') {
        Some((schema, name)) => (Some(schema), name),
        None => (None, table),
    };
    let name = name.trim_matches(BRACKETS);

    let mut filter = format!("TABLE_NAME = {}", quote_literal(name));
    if let Some(schema) = schema {
        let schema = schema.trim_matches(BRACKETS);
        filter.push_str(&format!(" AND TABLE_SCHEMA = {}", quote_literal(schema)));
    }

    format!(
        "SELECT COLUMN_NAME, DATA_TYPE + CASE \
         WHEN CHARACTER_MAXIMUM_LENGTH = -1 THEN '(max)' \
         WHEN CHARACTER_MAXIMUM_LENGTH IS NOT NULL THEN '(' + CAST(CHARACTER_MAXIMUM_LENGTH AS VARCHAR) + ')' \
         WHEN NUMERIC_PRECISION IS NOT NULL AND NUMERIC_SCALE IS NOT NULL \
         THEN '(' + CAST(NUMERIC_PRECISION AS VARCHAR) + ',' + CAST(NUMERIC_SCALE AS VARCHAR) + ')' \
         ELSE '' END AS FULL_TYPE \
         FROM INFORMATION_SCHEMA.COLUMNS WHERE {filter} ORDER BY ORDINAL_POSITION"
    )
}

/// Row filter for one table sync.
///
/// Combines the configured static filter with `watermark > 'last_seen'` in
/// incremental mode. `None` when neither applies.
pub fn effective_condition(spec: &TableSyncSpec, last_seen: Option<&str>) -> Option<String> {
    let watermark = match (spec.mode.watermark_column(), last_seen) {
        (Some(column), Some(value)) => Some(format!(
            "{} > {}",
            quote_ident(column),
            quote_literal(value)
        )),
        _ => None,
    };

    match (spec.condition.as_deref(), watermark) {
        (Some(filter), Some(watermark)) => Some(format!("({filter}) AND {watermark}")),
        (Some(filter), None) => Some(filter.to_string()),
        (None, watermark) => watermark,
    }
}

fn where_clause(condition: Option<&str>) -> String {
    condition
        .map(|c| format!(" WHERE {c}"))
        .unwrap_or_default()
}

pub fn count_query(table: &str, condition: Option<&str>) -> String {
    format!(
        "SELECT COUNT(*) FROM {}{}",
        quote_ident(table),
        where_clause(condition)
    )
}

pub fn max_query(table: &str, column: &str, condition: Option<&str>) -> String {
    format!(
        "SELECT MAX({}) FROM {}{}",
        quote_ident(column),
        quote_ident(table),
        where_clause(condition)
    )
}

/// One page of rows, ordered by the primary key.
pub fn page_query(
    table: &str,
    columns: &[String],
    condition: Option<&str>,
    order_by: &str,
    offset: usize,
    limit: usize,
) -> String {
    let select = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "SELECT {} FROM {}{} ORDER BY {} OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
        select,
        quote_ident(table),
        where_clause(condition),
        quote_ident(order_by),
        offset,
        limit
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("2nd"), "[2nd]");
        assert_eq!(quote_ident("dbo.Orders"), "[dbo].[Orders]");
        assert_eq!(quote_ident("[ID]"), "[ID]");
        assert_eq!(quote_ident("odd]name"), "[odd]]name]");
    }

    #[test]
    fn test_quote_literal_escapes_quotes() {
        assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
    }

    #[test]
    fn test_columns_query_filters_by_table_and_schema() {
        let sql = columns_query("T50_InspectionData");
        assert!(sql.contains("WHERE TABLE_NAME = 'T50_InspectionData' ORDER BY ORDINAL_POSITION"));
        assert!(!sql.contains('\n'));

        let sql = columns_query("sales.Orders");
        assert!(sql.contains("TABLE_NAME = 'Orders' AND TABLE_SCHEMA = 'sales'"));
    }

    #[test]
    fn test_effective_condition_full_mode() {
        let spec = TableSyncSpec::full("T").with_condition("Status = 1");
        assert_eq!(
            effective_condition(&spec, Some("ignored")).as_deref(),
            Some("Status = 1")
        );
        assert_eq!(effective_condition(&TableSyncSpec::full("T"), None), None);
    }

    #[test]
    fn test_effective_condition_incremental_mode() {
        let spec = TableSyncSpec::incremental("T", "X02");
        assert_eq!(effective_condition(&spec, None), None);
        assert_eq!(
            effective_condition(&spec, Some("2025-04-01 10:00:00")).as_deref(),
            Some("[X02] > '2025-04-01 10:00:00'")
        );

        let spec = spec.with_condition("Status = 1 OR Status = 2");
        assert_eq!(
            effective_condition(&spec, Some("it's")).as_deref(),
            Some("(Status = 1 OR Status = 2) AND [X02] > 'it''s'")
        );
    }

    #[test]
    fn test_count_and_max_queries() {
        assert_eq!(count_query("T", None), "SELECT COUNT(*) FROM [T]");
        assert_eq!(
            max_query("T", "X02", Some("[X02] > '5'")),
            "SELECT MAX([X02]) FROM [T] WHERE [X02] > '5'"
        );
    }

    #[test]
    fn test_page_query() {
        let columns = vec!["ID".to_string(), "X02".to_string()];
        assert_eq!(
            page_query("T", &columns, None, "ID", 2000, 1000),
            "SELECT [ID], [X02] FROM [T] ORDER BY [ID] OFFSET 2000 ROWS FETCH NEXT 1000 ROWS ONLY"
        );
    }
}
