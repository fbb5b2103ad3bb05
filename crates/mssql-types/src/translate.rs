//! SQL Server to MariaDB column type translation.
//!
//! Translation is total: unknown types degrade to `TEXT` instead of failing,
//! so a table with an exotic column still syncs (lossily) rather than not at
//! all.

/// Target type used when nothing better is known.
const FALLBACK_TYPE: &str = "TEXT";

/// Extract the lower-cased base type name (text before any parenthesis).
///
/// ```
/// use mssql_types::base_type;
///
/// assert_eq!(base_type("NVarChar(50)"), "nvarchar");
/// assert_eq!(base_type("int"), "int");
/// ```
pub fn base_type(source_type: &str) -> String {
    source_type
        .split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

/// Parameter list inside the parentheses, if any (`"18,2"` for `decimal(18,2)`).
fn type_params(source_type: &str) -> Option<&str> {
    let open = source_type.find('(')?;
    let rest = &source_type[open + 1..];
    let inner = match rest.rfind(')') {
        Some(close) => &rest[..close],
        None => rest,
    };
    let inner = inner.trim();
    if inner.is_empty() {
        None
    } else {
        Some(inner)
    }
}

/// Whether a length parameter denotes SQL Server's "maximum length".
fn is_max_length(param: &str) -> bool {
    param.eq_ignore_ascii_case("max") || param == "-1"
}

/// Fixed base type table. `None` for base types outside the table.
fn base_target(base: &str) -> Option<&'static str> {
    let target = match base {
        // Integer types
        "int" => "INT",
        "bigint" => "BIGINT",
        "smallint" => "SMALLINT",
        "tinyint" => "TINYINT",

        // Boolean
        "bit" => "BOOLEAN",

        // Exact and approximate numerics
        "decimal" | "numeric" => "DECIMAL",
        "money" => "DECIMAL(19,4)",
        "smallmoney" => "DECIMAL(10,4)",
        "float" => "FLOAT",
        "real" => "REAL",

        // Date/time types
        "datetime" | "datetime2" | "smalldatetime" => "DATETIME",
        "date" => "DATE",
        "time" => "TIME",
        "timestamp" => "TIMESTAMP",

        // Character types
        "char" | "nchar" => "CHAR",
        "varchar" | "nvarchar" => "VARCHAR",
        "text" | "ntext" => "TEXT",

        // Binary types
        "binary" => "BINARY",
        "varbinary" => "VARBINARY",
        "image" => "LONGBLOB",

        // Special types
        "uniqueidentifier" => "VARCHAR(36)",
        "xml" => "TEXT",

        _ => return None,
    };
    Some(target)
}

/// Translate a SQL Server type descriptor (e.g. `varchar(50)`) to a MariaDB
/// column type.
///
/// - character and binary types keep their declared length; a `max` / `-1`
///   length becomes `TEXT` (character) or `LONGBLOB` (binary)
/// - `decimal` / `numeric` keep precision and scale verbatim
/// - parameters on any other type are dropped
/// - unknown base types become `TEXT`
pub fn translate(source_type: &str) -> String {
    let base = base_type(source_type);
    let Some(target) = base_target(&base) else {
        return FALLBACK_TYPE.to_string();
    };

    let Some(params) = type_params(source_type) else {
        return target.to_string();
    };

    match base.as_str() {
        "char" | "nchar" | "varchar" | "nvarchar" => {
            if is_max_length(params) {
                "TEXT".to_string()
            } else {
                format!("{target}({params})")
            }
        }
        "binary" | "varbinary" => {
            if is_max_length(params) {
                "LONGBLOB".to_string()
            } else {
                format!("{target}({params})")
            }
        }
        "decimal" | "numeric" => format!("DECIMAL({params})"),
        _ => target.to_string(),
    }
}

/// Whether a translated MariaDB type is an integer type, i.e. one that can
/// carry `AUTO_INCREMENT`.
pub fn is_integer_type(target_type: &str) -> bool {
    matches!(
        base_type(target_type).as_str(),
        "int" | "bigint" | "smallint" | "tinyint" | "mediumint" | "integer"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unparameterized_types() {
        let cases = [
            ("int", "INT"),
            ("bigint", "BIGINT"),
            ("smallint", "SMALLINT"),
            ("tinyint", "TINYINT"),
            ("bit", "BOOLEAN"),
            ("decimal", "DECIMAL"),
            ("numeric", "DECIMAL"),
            ("money", "DECIMAL(19,4)"),
            ("smallmoney", "DECIMAL(10,4)"),
            ("float", "FLOAT"),
            ("real", "REAL"),
            ("datetime", "DATETIME"),
            ("datetime2", "DATETIME"),
            ("smalldatetime", "DATETIME"),
            ("date", "DATE"),
            ("time", "TIME"),
            ("timestamp", "TIMESTAMP"),
            ("char", "CHAR"),
            ("nchar", "CHAR"),
            ("varchar", "VARCHAR"),
            ("nvarchar", "VARCHAR"),
            ("text", "TEXT"),
            ("ntext", "TEXT"),
            ("image", "LONGBLOB"),
            ("binary", "BINARY"),
            ("varbinary", "VARBINARY"),
            ("uniqueidentifier", "VARCHAR(36)"),
            ("xml", "TEXT"),
        ];

        for (source, expected) in cases {
            assert_eq!(translate(source), expected, "translating {source}");
            // Deterministic on repeated calls
            assert_eq!(translate(source), translate(source));
        }
    }

    #[test]
    fn test_base_type_is_case_insensitive() {
        assert_eq!(translate("INT"), "INT");
        assert_eq!(translate("NVarChar(20)"), "VARCHAR(20)");
        assert_eq!(translate("DateTime"), "DATETIME");
    }

    #[test]
    fn test_character_and_binary_lengths_are_preserved() {
        assert_eq!(translate("varchar(50)"), "VARCHAR(50)");
        assert_eq!(translate("nvarchar(255)"), "VARCHAR(255)");
        assert_eq!(translate("char(10)"), "CHAR(10)");
        assert_eq!(translate("nchar(2)"), "CHAR(2)");
        assert_eq!(translate("binary(16)"), "BINARY(16)");
        assert_eq!(translate("varbinary(128)"), "VARBINARY(128)");
    }

    #[test]
    fn test_max_length_becomes_unbounded() {
        for source in ["varchar(max)", "nvarchar(MAX)", "varchar(-1)", "nvarchar(-1)"] {
            assert_eq!(translate(source), "TEXT", "translating {source}");
        }
        for source in ["varbinary(max)", "varbinary(-1)", "binary(max)"] {
            assert_eq!(translate(source), "LONGBLOB", "translating {source}");
        }
        for source in ["char(max)", "nchar(-1)"] {
            assert!(!translate(source).contains("max"));
            assert!(!translate(source).contains("-1"));
        }
    }

    #[test]
    fn test_decimal_precision_and_scale_are_preserved() {
        assert_eq!(translate("decimal(18,2)"), "DECIMAL(18,2)");
        assert_eq!(translate("numeric(10,0)"), "DECIMAL(10,0)");
        assert_eq!(translate("decimal(5, 3)"), "DECIMAL(5, 3)");
    }

    #[test]
    fn test_parameters_on_other_types_are_dropped() {
        assert_eq!(translate("datetime2(7)"), "DATETIME");
        assert_eq!(translate("int(10,0)"), "INT");
        assert_eq!(translate("money(19,4)"), "DECIMAL(19,4)");
        assert_eq!(translate("varchar()"), "VARCHAR");
    }

    #[test]
    fn test_unknown_types_fall_back_to_text() {
        assert_eq!(translate("geography"), "TEXT");
        assert_eq!(translate("hierarchyid"), "TEXT");
        assert_eq!(translate("sql_variant(8016)"), "TEXT");
        assert_eq!(translate(""), "TEXT");
        assert_eq!(translate("("), "TEXT");
    }

    #[test]
    fn test_is_integer_type() {
        assert!(is_integer_type("INT"));
        assert!(is_integer_type("BIGINT"));
        assert!(is_integer_type(&translate("tinyint")));
        assert!(!is_integer_type("VARCHAR(36)"));
        assert!(!is_integer_type("DECIMAL(18,2)"));
    }
}
