//! SQL dialect differences: placeholders, quoting and portable column types

use serde_json::Value;

use crate::backends::AdapterKind;
use crate::schema::ColumnType;
use crate::security::escape_identifier;

/// SQL dialect differences between relational engines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl SqlDialect {
    pub fn from_kind(kind: AdapterKind) -> Option<Self> {
        match kind {
            AdapterKind::Postgres => Some(SqlDialect::PostgreSQL),
            AdapterKind::MySql => Some(SqlDialect::MySQL),
            AdapterKind::Sqlite => Some(SqlDialect::SQLite),
            AdapterKind::MongoDb | AdapterKind::Memory => None,
        }
    }

    /// Get the parameter placeholder style for this dialect (0-based index)
    pub fn parameter_placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::PostgreSQL => format!("${}", index + 1),
            SqlDialect::MySQL | SqlDialect::SQLite => "?".to_string(),
        }
    }

    /// Get the quote character for identifiers in this dialect
    pub fn identifier_quote(&self) -> char {
        match self {
            SqlDialect::PostgreSQL | SqlDialect::SQLite => '"',
            SqlDialect::MySQL => '`',
        }
    }

    pub fn quote(&self, identifier: &str) -> String {
        escape_identifier(identifier, self.identifier_quote())
    }

    /// `LIMIT` value meaning "no limit", for dialects that cannot express an
    /// `OFFSET` on its own
    pub fn unbounded_limit(&self) -> Option<&'static str> {
        match self {
            SqlDialect::PostgreSQL => None,
            SqlDialect::MySQL => Some("18446744073709551615"),
            SqlDialect::SQLite => Some("-1"),
        }
    }

    pub fn supports_index_if_not_exists(&self) -> bool {
        !matches!(self, SqlDialect::MySQL)
    }

    /// Portable column type. Dates and JSON are stored as text so every
    /// engine round-trips them through the same decoder.
    pub fn column_type(&self, column_type: ColumnType, length: Option<u32>) -> String {
        match column_type {
            ColumnType::String => format!("VARCHAR({})", length.unwrap_or(255)),
            ColumnType::Text | ColumnType::Json => "TEXT".to_string(),
            ColumnType::Integer | ColumnType::BigInteger => match self {
                SqlDialect::SQLite => "INTEGER".to_string(),
                _ => "BIGINT".to_string(),
            },
            ColumnType::Float => match self {
                SqlDialect::PostgreSQL => "DOUBLE PRECISION".to_string(),
                SqlDialect::MySQL => "DOUBLE".to_string(),
                SqlDialect::SQLite => "REAL".to_string(),
            },
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Timestamp | ColumnType::Date => "VARCHAR(64)".to_string(),
            ColumnType::Uuid => "VARCHAR(36)".to_string(),
        }
    }

    /// Literal for a column default
    pub fn literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => match self {
                SqlDialect::PostgreSQL => if *b { "TRUE" } else { "FALSE" }.to_string(),
                _ => if *b { "1" } else { "0" }.to_string(),
            },
            Value::Number(n) => n.to_string(),
            Value::String(s) => format!("'{}'", s.replace('\'', "''")),
            other => format!("'{}'", other.to_string().replace('\'', "''")),
        }
    }

    /// Query listing user tables, one `table_name` text column per row
    pub fn list_tables_sql(&self) -> &'static str {
        match self {
            SqlDialect::PostgreSQL => {
                "SELECT CAST(table_name AS TEXT) AS table_name FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_type = 'BASE TABLE'"
            }
            SqlDialect::MySQL => {
                "SELECT CAST(table_name AS CHAR) AS table_name FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE'"
            }
            SqlDialect::SQLite => {
                "SELECT name AS table_name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%'"
            }
        }
    }

    /// Query counting tables named by the single bound parameter
    pub fn has_table_sql(&self) -> &'static str {
        match self {
            SqlDialect::PostgreSQL => {
                "SELECT COUNT(*) AS aggregate FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = $1"
            }
            SqlDialect::MySQL => {
                "SELECT COUNT(*) AS aggregate FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_name = ?"
            }
            SqlDialect::SQLite => {
                "SELECT COUNT(*) AS aggregate FROM sqlite_master WHERE type = 'table' AND name = ?"
            }
        }
    }

    /// Query counting columns; binds table then column
    pub fn has_column_sql(&self) -> &'static str {
        match self {
            SqlDialect::PostgreSQL => {
                "SELECT COUNT(*) AS aggregate FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name = $1 AND column_name = $2"
            }
            SqlDialect::MySQL => {
                "SELECT COUNT(*) AS aggregate FROM information_schema.columns \
                 WHERE table_schema = DATABASE() AND table_name = ? AND column_name = ?"
            }
            SqlDialect::SQLite => {
                "SELECT COUNT(*) AS aggregate FROM pragma_table_info(?) WHERE name = ?"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_placeholders() {
        assert_eq!(SqlDialect::PostgreSQL.parameter_placeholder(0), "$1");
        assert_eq!(SqlDialect::PostgreSQL.parameter_placeholder(2), "$3");
        assert_eq!(SqlDialect::SQLite.parameter_placeholder(2), "?");
    }

    #[test]
    fn test_quoting() {
        assert_eq!(SqlDialect::PostgreSQL.quote("users"), "\"users\"");
        assert_eq!(SqlDialect::MySQL.quote("users"), "`users`");
    }

    #[test]
    fn test_literals() {
        assert_eq!(SqlDialect::SQLite.literal(&json!("O'Brien")), "'O''Brien'");
        assert_eq!(SqlDialect::PostgreSQL.literal(&json!(true)), "TRUE");
        assert_eq!(SqlDialect::MySQL.literal(&json!(false)), "0");
        assert_eq!(SqlDialect::SQLite.literal(&json!(42)), "42");
    }

    #[test]
    fn test_column_types() {
        assert_eq!(
            SqlDialect::MySQL.column_type(ColumnType::String, Some(100)),
            "VARCHAR(100)"
        );
        assert_eq!(SqlDialect::SQLite.column_type(ColumnType::Integer, None), "INTEGER");
        assert_eq!(SqlDialect::PostgreSQL.column_type(ColumnType::Json, None), "TEXT");
    }
}
