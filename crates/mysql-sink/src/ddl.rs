//! MariaDB statement generation.
//!
//! All identifiers are backtick-quoted; all values go through `?`
//! placeholders.

/// Upper bound on placeholders in one prepared statement.
pub const MAX_PLACEHOLDERS: usize = 65_535;

const TABLE_OPTIONS: &str = "ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci";

/// One target column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: String,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
        }
    }
}

/// Single-column primary key of a target table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKey {
    pub column: String,
    pub auto_increment: bool,
}

/// Target table structure derived from the source columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    pub table: String,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Option<PrimaryKey>,
}

impl TableLayout {
    pub fn new(
        table: impl Into<String>,
        columns: Vec<ColumnDef>,
        primary_key: Option<PrimaryKey>,
    ) -> Self {
        Self {
            table: table.into(),
            columns,
            primary_key,
        }
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Generate the `CREATE TABLE` statement for this layout.
    pub fn create_table_sql(&self) -> String {
        let mut defs: Vec<String> = self
            .columns
            .iter()
            .map(|column| {
                let auto_increment = matches!(
                    &self.primary_key,
                    Some(pk) if pk.auto_increment && pk.column.eq_ignore_ascii_case(&column.name)
                );
                if auto_increment {
                    format!(
                        "  {} {} AUTO_INCREMENT",
                        quote_ident(&column.name),
                        column.sql_type
                    )
                } else {
                    format!("  {} {}", quote_ident(&column.name), column.sql_type)
                }
            })
            .collect();

        if let Some(pk) = &self.primary_key {
            defs.push(format!("  PRIMARY KEY ({})", quote_ident(&pk.column)));
        }

        format!(
            "CREATE TABLE {} (\n{}\n) {}",
            quote_ident(&self.table),
            defs.join(",\n"),
            TABLE_OPTIONS
        )
    }
}

/// Quote an identifier with backticks.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn values_list(column_count: usize, row_count: usize) -> String {
    let row_template = format!("({})", vec!["?"; column_count].join(", "));
    vec![row_template.as_str(); row_count].join(", ")
}

/// Generate `CREATE DATABASE IF NOT EXISTS` statement.
pub fn create_database_sql(database: &str) -> String {
    format!(
        "CREATE DATABASE IF NOT EXISTS {} CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci",
        quote_ident(database)
    )
}

/// Generate DROP TABLE statement.
pub fn drop_table_sql(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_ident(table))
}

/// Probe for a table in the current database; takes the table name as its
/// only parameter.
pub const TABLE_EXISTS_SQL: &str = "SELECT COUNT(*) FROM information_schema.TABLES \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?";

/// Generate a multi-row INSERT with one placeholder per column per row.
pub fn insert_sql(table: &str, columns: &[String], row_count: usize) -> String {
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_ident(table),
        column_list(columns),
        values_list(columns.len(), row_count)
    )
}

/// Generate a multi-row `INSERT ... ON DUPLICATE KEY UPDATE` that refreshes
/// every column except `primary_key`.
///
/// When every column is the key there is nothing to update and the rows are
/// inserted with `INSERT IGNORE` instead.
pub fn upsert_sql(table: &str, columns: &[String], primary_key: &str, row_count: usize) -> String {
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| !c.eq_ignore_ascii_case(primary_key))
        .map(|c| format!("{0} = VALUES({0})", quote_ident(c)))
        .collect();

    if updates.is_empty() {
        return format!(
            "INSERT IGNORE INTO {} ({}) VALUES {}",
            quote_ident(table),
            column_list(columns),
            values_list(columns.len(), row_count)
        );
    }

    format!(
        "{} ON DUPLICATE KEY UPDATE {}",
        insert_sql(table, columns, row_count),
        updates.join(", ")
    )
}

/// How many rows fit in one statement without exceeding [`MAX_PLACEHOLDERS`].
pub fn rows_per_statement(column_count: usize) -> usize {
    (MAX_PLACEHOLDERS / column_count.max(1)).max(1)
}
