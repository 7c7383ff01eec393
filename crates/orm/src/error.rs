//! Error types for the data-access core
//!
//! Every layer reports failures through [`OrmError`]. Query-level problems and
//! migration problems carry their own enums so callers can match on them
//! without string inspection.

use std::fmt;

use crate::event_error::EventError;

/// Result type alias for ORM operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for ORM operations
#[derive(Debug)]
pub enum OrmError {
    /// Unknown driver, malformed URL, missing default or missing directory
    Configuration(String),
    /// The backend could not be reached
    Connection(String),
    /// Malformed query, invalid operator or a rejection from the backend
    Query(QueryError),
    /// No record matched a `*_or_fail` lookup
    NotFound { table: String, key: Option<String> },
    /// A persisted document arrived without its primary key
    UnidentifiableDocument { table: String, reason: String },
    /// A value could not be converted by its declared cast
    Cast { field: String, message: String },
    /// Serialization or deserialization failure
    Serialization(String),
    /// Relationship declaration or loading failure
    Relationship(String),
    /// Migration or seeder failure
    Migration(MigrationError),
    /// An observer hook rejected the operation
    Event(EventError),
}

impl OrmError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    pub fn not_found(table: &str, key: Option<String>) -> Self {
        Self::NotFound {
            table: table.to_string(),
            key,
        }
    }

    pub fn cast(field: &str, message: impl Into<String>) -> Self {
        Self::Cast {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, OrmError::NotFound { .. })
    }
}

impl fmt::Display for OrmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrmError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            OrmError::Connection(msg) => write!(f, "Connection error: {}", msg),
            OrmError::Query(err) => write!(f, "Query error: {}", err),
            OrmError::NotFound { table, key: Some(key) } => {
                write!(f, "Record '{}' not found in '{}'", key, table)
            }
            OrmError::NotFound { table, key: None } => {
                write!(f, "Record not found in '{}'", table)
            }
            OrmError::UnidentifiableDocument { table, reason } => {
                write!(f, "Unidentifiable document in '{}': {}", table, reason)
            }
            OrmError::Cast { field, message } => {
                write!(f, "Cast error on '{}': {}", field, message)
            }
            OrmError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            OrmError::Relationship(msg) => write!(f, "Relationship error: {}", msg),
            OrmError::Migration(err) => write!(f, "Migration error: {}", err),
            OrmError::Event(err) => write!(f, "Event error: {}", err),
        }
    }
}

impl std::error::Error for OrmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OrmError::Query(err) => Some(err),
            OrmError::Migration(err) => Some(err),
            OrmError::Event(err) => Some(err),
            _ => None,
        }
    }
}

/// Query-level failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("invalid operator '{0}'")]
    InvalidOperator(String),

    #[error("invalid predicate on '{column}': {reason}")]
    InvalidPredicate { column: String, reason: String },

    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("refusing to {operation} every row of '{table}' without a filter; call unfiltered() to confirm")]
    UnfilteredMutation { operation: String, table: String },

    #[error("connection '{0}' is closed")]
    ConnectionClosed(String),

    #[error("operation not supported by the {adapter} adapter: {operation}")]
    Unsupported { adapter: String, operation: String },

    #[error("{0}")]
    Backend(String),
}

/// Migration and seeder failures
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("directory '{0}' does not exist")]
    DirectoryNotFound(String),

    #[error("invalid change file '{file}': {reason}")]
    InvalidFile { file: String, reason: String },

    #[error("'{name}' was modified after it was applied (recorded checksum {recorded}, current {current})")]
    ChecksumDrift {
        name: String,
        recorded: String,
        current: String,
    },

    #[error("'{0}' is recorded as applied but its file is missing")]
    MissingFile(String),

    #[error("'{name}' failed: {reason}")]
    Failed { name: String, reason: String },
}

impl From<QueryError> for OrmError {
    fn from(err: QueryError) -> Self {
        OrmError::Query(err)
    }
}

impl From<MigrationError> for OrmError {
    fn from(err: MigrationError) -> Self {
        OrmError::Migration(err)
    }
}

impl From<EventError> for OrmError {
    fn from(err: EventError) -> Self {
        OrmError::Event(err)
    }
}

// Convert from sqlx errors
impl From<sqlx::Error> for OrmError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(e) => OrmError::Configuration(e.to_string()),
            sqlx::Error::Io(e) => OrmError::Connection(e.to_string()),
            sqlx::Error::Tls(e) => OrmError::Connection(e.to_string()),
            sqlx::Error::PoolTimedOut => OrmError::Connection("pool timed out".to_string()),
            sqlx::Error::PoolClosed => OrmError::Connection("pool is closed".to_string()),
            other => OrmError::Query(QueryError::Backend(other.to_string())),
        }
    }
}

impl From<mongodb::error::Error> for OrmError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;
        match *err.kind {
            ErrorKind::InvalidArgument { .. } => OrmError::Configuration(err.to_string()),
            ErrorKind::ServerSelection { .. } | ErrorKind::Io(_) | ErrorKind::DnsResolve { .. } => {
                OrmError::Connection(err.to_string())
            }
            _ => OrmError::Query(QueryError::Backend(err.to_string())),
        }
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        OrmError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for OrmError {
    fn from(err: serde_yaml::Error) -> Self {
        OrmError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for OrmError {
    fn from(err: std::io::Error) -> Self {
        OrmError::Configuration(format!("I/O error: {}", err))
    }
}

impl From<mongodb::bson::ser::Error> for OrmError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        OrmError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display_includes_key() {
        let err = OrmError::not_found("users", Some("42".to_string()));
        assert_eq!(err.to_string(), "Record '42' not found in 'users'");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_query_error_converts() {
        let err: OrmError = QueryError::InvalidOperator("~~".to_string()).into();
        assert!(matches!(err, OrmError::Query(QueryError::InvalidOperator(_))));
        assert_eq!(err.to_string(), "Query error: invalid operator '~~'");
    }

    #[test]
    fn test_migration_error_display() {
        let err: OrmError = MigrationError::ChecksumDrift {
            name: "2024_01_01_create_users".to_string(),
            recorded: "abc".to_string(),
            current: "def".to_string(),
        }
        .into();
        assert!(err.to_string().contains("2024_01_01_create_users"));
    }
}
