//! Turns command-line client output into rows.
//!
//! Both clients print informational banners, prompt echoes and row-count
//! footers around the actual result set. Those lines are dropped, every
//! remaining non-blank line is one row.

use sync_core::{Cell, Row};

use crate::dialect::ClientDialect;

/// Token the clients print for SQL `NULL`.
pub const NULL_TOKEN: &str = "NULL";

/// Fragments of informational lines that never carry data.
const BANNER_FRAGMENTS: &[&str] = &[
    "locale is",
    "charset is",
    "using default charset",
    "as default database in login packet",
    "Changed database context to",
    "Changed language setting to",
];

/// Parse the complete standard output of one query.
pub fn parse_output(stdout: &str, dialect: ClientDialect) -> Vec<Row> {
    stdout
        .lines()
        .filter(|line| !is_noise(line))
        .map(|line| parse_line(line.trim_end_matches('\r'), dialect))
        .filter(|row| !row.is_empty())
        .collect()
}

/// Split a data line into cells, mapping the `NULL` token to `None`.
pub fn parse_line(line: &str, dialect: ClientDialect) -> Row {
    dialect.split_line(line).into_iter().map(parse_cell).collect()
}

fn parse_cell(raw: &str) -> Cell {
    match raw.trim() {
        NULL_TOKEN => None,
        value => Some(value.to_string()),
    }
}

/// Whether a line is client chatter rather than a result row.
pub fn is_noise(line: &str) -> bool {
    let line = line.trim();
    line.is_empty()
        || BANNER_FRAGMENTS.iter().any(|f| line.contains(f))
        || is_separator(line)
        || is_row_count(line)
        || is_prompt_echo(line)
}

/// `----- -----` rules printed under column headers.
fn is_separator(line: &str) -> bool {
    line.contains("---") && line.chars().all(|c| c == '-' || c.is_whitespace())
}

/// `(3 rows affected)`, `(1 row affected)`.
fn is_row_count(line: &str) -> bool {
    line.starts_with('(') && (line.contains("rows affected") || line.contains("row affected"))
}

/// `1> 2> ...`: the prompt echo, followed by whatever header text the client
/// printed on the same line.
fn is_prompt_echo(line: &str) -> bool {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && line[digits..].starts_with('>')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[Option<&str>]) -> Row {
        values.iter().map(|v| v.map(str::to_string)).collect()
    }

    #[test]
    fn test_tsql_output_with_banners_and_null() {
        let stdout = "locale is \"en_US.UTF-8\"\n\
                      locale charset is \"UTF-8\"\n\
                      using default charset \"UTF-8\"\n\
                      Setting Production as default database in login packet\n\
                      1> 2> 3> ID\tName\tNote\n\
                      1\tAcme Corp\tfirst\n\
                      2\tGlobex\tNULL\n\
                      3\tInitech\tthird\n\
                      (3 rows affected)\n";

        let rows = parse_output(stdout, ClientDialect::Tsql);
        assert_eq!(
            rows,
            vec![
                cells(&[Some("1"), Some("Acme Corp"), Some("first")]),
                cells(&[Some("2"), Some("Globex"), None]),
                cells(&[Some("3"), Some("Initech"), Some("third")]),
            ]
        );
    }

    #[test]
    fn test_sqlcmd_output_splits_on_whitespace() {
        let stdout = "Changed database context to 'Production'.\n\
                      10 2025-04-01 NULL\n\
                      \n\
                      (1 row affected)\n";

        let rows = parse_output(stdout, ClientDialect::Sqlcmd);
        assert_eq!(rows, vec![cells(&[Some("10"), Some("2025-04-01"), None])]);
    }

    #[test]
    fn test_single_cell_rows_are_kept() {
        let rows = parse_output("1> 2> \n5000\n(1 row affected)\n", ClientDialect::Tsql);
        assert_eq!(rows, vec![cells(&[Some("5000")])]);
    }

    #[test]
    fn test_tab_split_keeps_empty_cells() {
        let rows = parse_output("7\t\tx\r\n", ClientDialect::Tsql);
        assert_eq!(rows, vec![cells(&[Some("7"), Some(""), Some("x")])]);
    }

    #[test]
    fn test_noise_detection() {
        assert!(is_noise("   "));
        assert!(is_noise("----------- -----"));
        assert!(is_noise("(72 rows affected)"));
        assert!(is_noise("12> "));
        assert!(!is_noise("-5"));
        assert!(!is_noise("10 > 5"));
        assert!(!is_noise("(pending)"));
    }
}
