//! Connection configuration
//!
//! A [`DatabaseConfig`] names every connection the registry will own, picks
//! the default one and points the migration engine at its directories. It is
//! usually loaded from YAML:
//!
//! ```yaml
//! default: primary
//! connections:
//!   primary:
//!     driver: postgres
//!     url: postgres://localhost/app
//!     keep_alive: true
//!   documents:
//!     driver: mongodb
//!     url: mongodb://localhost:27017
//!     database: app
//! migrations:
//!   directory: database/migrations
//!   seeders: database/seeders
//! ```

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::backends::AdapterKind;
use crate::error::{OrmError, OrmResult};

/// Name used for the single connection built from `DATABASE_URL`
pub const ENV_CONNECTION_NAME: &str = "default";

/// Connection pool configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    /// Seconds to wait for a free connection
    pub acquire_timeout: u64,
    pub idle_timeout: Option<u64>,
    pub max_lifetime: Option<u64>,
    pub test_before_acquire: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout: 30,
            idle_timeout: Some(600),
            max_lifetime: Some(1800),
            test_before_acquire: true,
        }
    }
}

/// Settings for one named connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub driver: AdapterKind,
    #[serde(default)]
    pub url: String,
    /// Database name; required by document stores, informational for SQL
    #[serde(default)]
    pub database: Option<String>,
    /// Connect eagerly at boot instead of on first use
    #[serde(default)]
    pub keep_alive: bool,
    #[serde(default)]
    pub pool: PoolConfig,
}

impl ConnectionConfig {
    pub fn new(driver: AdapterKind, url: impl Into<String>) -> Self {
        Self {
            driver,
            url: url.into(),
            database: None,
            keep_alive: false,
            pool: PoolConfig::default(),
        }
    }

    /// An in-process document store
    pub fn memory() -> Self {
        Self::new(AdapterKind::Memory, "memory://")
    }

    /// Build a connection from a URL, inferring the driver from its scheme
    pub fn from_url(url: &str) -> OrmResult<Self> {
        let scheme = url
            .split(':')
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| OrmError::configuration(format!("URL '{}' has no scheme", url)))?;
        let driver: AdapterKind = scheme.parse()?;
        let mut config = Self::new(driver, url);
        if driver == AdapterKind::MongoDb {
            config.database = database_from_url(url);
        }
        Ok(config)
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Whether this is an in-memory SQLite database, which lives and dies
    /// with its single connection
    pub fn is_sqlite_memory(&self) -> bool {
        self.driver == AdapterKind::Sqlite && self.url.contains(":memory:")
    }

    fn validate(&self, name: &str) -> OrmResult<()> {
        match self.driver {
            AdapterKind::Memory => Ok(()),
            AdapterKind::Sqlite => {
                if !self.url.starts_with("sqlite:") {
                    return Err(OrmError::configuration(format!(
                        "connection '{}': sqlite URLs must start with 'sqlite:'",
                        name
                    )));
                }
                Ok(())
            }
            driver => {
                let parsed = url::Url::parse(&self.url).map_err(|e| {
                    OrmError::configuration(format!(
                        "connection '{}': malformed URL '{}': {}",
                        name,
                        redact_url(&self.url),
                        e
                    ))
                })?;
                let scheme: AdapterKind = parsed.scheme().parse()?;
                if scheme != driver {
                    return Err(OrmError::configuration(format!(
                        "connection '{}': URL scheme '{}' does not match driver '{}'",
                        name,
                        parsed.scheme(),
                        driver
                    )));
                }
                if driver == AdapterKind::MongoDb && self.database.is_none() {
                    return Err(OrmError::configuration(format!(
                        "connection '{}': mongodb connections require a database name",
                        name
                    )));
                }
                Ok(())
            }
        }
    }
}

/// Where the migration engine finds its change files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationSettings {
    pub directory: PathBuf,
    /// Seeder directory; seeding is unavailable when unset
    pub seeders: Option<PathBuf>,
    /// Bookkeeping table or collection
    pub table: String,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("database/migrations"),
            seeders: None,
            table: "migrations".to_string(),
        }
    }
}

/// Complete registry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub default: String,
    pub connections: HashMap<String, ConnectionConfig>,
    #[serde(default)]
    pub migrations: MigrationSettings,
}

impl DatabaseConfig {
    /// Start a configuration with a single default connection
    pub fn new(default: &str, connection: ConnectionConfig) -> Self {
        let mut connections = HashMap::new();
        connections.insert(default.to_string(), connection);
        Self {
            default: default.to_string(),
            connections,
            migrations: MigrationSettings::default(),
        }
    }

    pub fn with_connection(mut self, name: &str, connection: ConnectionConfig) -> Self {
        self.connections.insert(name.to_string(), connection);
        self
    }

    pub fn with_migrations(mut self, migrations: MigrationSettings) -> Self {
        self.migrations = migrations;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// `DATABASE_URL` is required; `DATABASE_NAME` supplies the database of a
    /// document store; `DB_KEEP_ALIVE`, `MIGRATIONS_DIR`, `SEEDERS_DIR` and
    /// `MIGRATIONS_TABLE` are optional.
    pub fn from_env() -> OrmResult<Self> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| OrmError::configuration("DATABASE_URL is not set"))?;
        let mut connection = ConnectionConfig::from_url(&url)?;
        if let Ok(database) = env::var("DATABASE_NAME") {
            connection.database = Some(database);
        }
        if let Ok(keep_alive) = env::var("DB_KEEP_ALIVE") {
            connection.keep_alive = parse_bool("DB_KEEP_ALIVE", &keep_alive)?;
        }

        let mut config = Self::new(ENV_CONNECTION_NAME, connection);
        config.apply_migration_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, then apply environment overrides
    pub fn from_yaml_file(path: impl AsRef<Path>) -> OrmResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            OrmError::configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_yaml_str(&content)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> OrmResult<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| OrmError::configuration(format!("invalid database configuration: {}", e)))
    }

    /// `DB_CONNECTION` switches the default connection; `DATABASE_URL`
    /// replaces the URL of whichever connection is the default.
    pub fn apply_env_overrides(&mut self) -> OrmResult<()> {
        if let Ok(default) = env::var("DB_CONNECTION") {
            self.default = default;
        }
        if let Ok(url) = env::var("DATABASE_URL") {
            let default = self.default.clone();
            match self.connections.get_mut(&default) {
                Some(connection) => connection.url = url,
                None => {
                    self.connections
                        .insert(default, ConnectionConfig::from_url(&url)?);
                }
            }
        }
        self.apply_migration_env();
        Ok(())
    }

    fn apply_migration_env(&mut self) {
        if let Ok(dir) = env::var("MIGRATIONS_DIR") {
            self.migrations.directory = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("SEEDERS_DIR") {
            self.migrations.seeders = Some(PathBuf::from(dir));
        }
        if let Ok(table) = env::var("MIGRATIONS_TABLE") {
            self.migrations.table = table;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> OrmResult<()> {
        if self.connections.is_empty() {
            return Err(OrmError::configuration("no connections configured"));
        }
        if !self.connections.contains_key(&self.default) {
            return Err(OrmError::configuration(format!(
                "default connection '{}' is not configured",
                self.default
            )));
        }
        for (name, connection) in &self.connections {
            connection.validate(name)?;
        }
        if self.migrations.table.trim().is_empty() {
            return Err(OrmError::configuration("migrations table name cannot be empty"));
        }
        Ok(())
    }

    pub fn connection(&self, name: &str) -> Option<&ConnectionConfig> {
        self.connections.get(name)
    }
}

/// Hide credentials before a URL reaches a log line or an error message
pub fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("****"));
            parsed.to_string()
        }
        _ => raw.to_string(),
    }
}

fn database_from_url(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw).ok()?;
    let path = parsed.path().trim_start_matches('/');
    if path.is_empty() {
        None
    } else {
        Some(path.to_string())
    }
}

fn parse_bool(field: &str, value: &str) -> OrmResult<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(OrmError::configuration(format!(
            "{} must be a boolean, got '{}'",
            field, value
        ))),
    }
}
