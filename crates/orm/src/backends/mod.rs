//! Storage adapters
//!
//! One [`Adapter`] per backend family: relational engines through sqlx's
//! `Any` driver, MongoDB through the official driver, and an in-process
//! document store used by tests and embedded deployments.

pub mod core;
pub mod memory;
pub mod mongo;
pub mod sql;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::ConnectionConfig;
use crate::error::{OrmError, OrmResult};

pub use self::core::*;
pub use memory::MemoryAdapter;
pub use mongo::MongoAdapter;
pub use sql::{SqlAdapter, SqlDialect};

/// Backend kind bound to a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdapterKind {
    #[serde(rename = "postgres", alias = "postgresql", alias = "pgsql")]
    Postgres,
    #[serde(rename = "mysql", alias = "mariadb")]
    MySql,
    #[serde(rename = "sqlite")]
    Sqlite,
    #[serde(rename = "mongodb", alias = "mongo")]
    MongoDb,
    #[serde(rename = "memory")]
    Memory,
}

/// Relational engines and document stores behave differently enough that
/// migrations may target a whole family rather than one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterFamily {
    Relational,
    Document,
}

impl AdapterKind {
    pub fn family(&self) -> AdapterFamily {
        match self {
            AdapterKind::Postgres | AdapterKind::MySql | AdapterKind::Sqlite => {
                AdapterFamily::Relational
            }
            AdapterKind::MongoDb | AdapterKind::Memory => AdapterFamily::Document,
        }
    }

    pub fn is_relational(&self) -> bool {
        self.family() == AdapterFamily::Relational
    }
}

impl std::fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterKind::Postgres => write!(f, "postgres"),
            AdapterKind::MySql => write!(f, "mysql"),
            AdapterKind::Sqlite => write!(f, "sqlite"),
            AdapterKind::MongoDb => write!(f, "mongodb"),
            AdapterKind::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for AdapterKind {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pgsql" => Ok(AdapterKind::Postgres),
            "mysql" | "mariadb" => Ok(AdapterKind::MySql),
            "sqlite" => Ok(AdapterKind::Sqlite),
            "mongodb" | "mongodb+srv" | "mongo" => Ok(AdapterKind::MongoDb),
            "memory" => Ok(AdapterKind::Memory),
            _ => Err(OrmError::configuration(format!(
                "Unsupported database driver: {}",
                s
            ))),
        }
    }
}

impl std::fmt::Display for AdapterFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterFamily::Relational => write!(f, "relational"),
            AdapterFamily::Document => write!(f, "document"),
        }
    }
}

/// Matches a connection by exact kind or by family. Written in change files
/// and passed to [`crate::DatabaseService::is_registered_adapter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AdapterSelector {
    Kind(AdapterKind),
    Family(AdapterFamily),
}

impl AdapterSelector {
    pub fn matches(&self, kind: AdapterKind) -> bool {
        match self {
            AdapterSelector::Kind(expected) => *expected == kind,
            AdapterSelector::Family(family) => kind.family() == *family,
        }
    }
}

impl From<AdapterKind> for AdapterSelector {
    fn from(kind: AdapterKind) -> Self {
        AdapterSelector::Kind(kind)
    }
}

impl From<AdapterFamily> for AdapterSelector {
    fn from(family: AdapterFamily) -> Self {
        AdapterSelector::Family(family)
    }
}

impl std::str::FromStr for AdapterSelector {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "relational" | "sql" => Ok(AdapterSelector::Family(AdapterFamily::Relational)),
            "document" | "nosql" => Ok(AdapterSelector::Family(AdapterFamily::Document)),
            other => other.parse().map(AdapterSelector::Kind),
        }
    }
}

impl TryFrom<String> for AdapterSelector {
    type Error = OrmError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AdapterSelector> for String {
    fn from(selector: AdapterSelector) -> Self {
        match selector {
            AdapterSelector::Kind(kind) => kind.to_string(),
            AdapterSelector::Family(family) => family.to_string(),
        }
    }
}

/// Instantiate the adapter for a configured connection without connecting it
pub fn create_adapter(name: &str, config: &ConnectionConfig) -> OrmResult<Arc<dyn Adapter>> {
    let adapter: Arc<dyn Adapter> = match config.driver {
        AdapterKind::Postgres | AdapterKind::MySql | AdapterKind::Sqlite => {
            Arc::new(SqlAdapter::new(name, config.clone())?)
        }
        AdapterKind::MongoDb => Arc::new(MongoAdapter::new(name, config.clone())?),
        AdapterKind::Memory => Arc::new(MemoryAdapter::new(name, config.clone())),
    };
    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing_and_family() {
        assert_eq!("postgresql".parse::<AdapterKind>().unwrap(), AdapterKind::Postgres);
        assert_eq!("mongodb+srv".parse::<AdapterKind>().unwrap(), AdapterKind::MongoDb);
        assert!("oracle".parse::<AdapterKind>().is_err());
        assert_eq!(AdapterKind::Sqlite.family(), AdapterFamily::Relational);
        assert_eq!(AdapterKind::Memory.family(), AdapterFamily::Document);
    }

    #[test]
    fn test_selector_matching() {
        let relational: AdapterSelector = "relational".parse().unwrap();
        assert!(relational.matches(AdapterKind::Postgres));
        assert!(relational.matches(AdapterKind::Sqlite));
        assert!(!relational.matches(AdapterKind::MongoDb));

        let postgres: AdapterSelector = "postgres".parse().unwrap();
        assert!(postgres.matches(AdapterKind::Postgres));
        assert!(!postgres.matches(AdapterKind::Sqlite));
    }

    #[test]
    fn test_selector_deserializes_from_yaml() {
        let selector: AdapterSelector = serde_yaml::from_str("document").unwrap();
        assert_eq!(selector, AdapterSelector::Family(AdapterFamily::Document));
        assert!(serde_yaml::from_str::<AdapterSelector>("cassandra").is_err());
    }
}
