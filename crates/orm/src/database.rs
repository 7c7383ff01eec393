//! Connection registry
//!
//! [`DatabaseService`] owns every named connection, each bound to one
//! adapter. It is shared as an `Arc` and handed to builders, models and the
//! migration engine; several registries can coexist in one process.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backends::{create_adapter, Adapter, AdapterKind, AdapterSelector, ConnectionState};
use crate::config::DatabaseConfig;
use crate::error::{OrmError, OrmResult, QueryError};
use crate::events::ModelObserver;
use crate::model::{Encrypter, Model, ModelDefinition};
use crate::observers::ObserverManager;
use crate::query::{QueryBuilder, RawStatement};
use crate::schema::SchemaPort;

/// A named connection bound to its adapter
pub struct Connection {
    name: String,
    adapter: Arc<dyn Adapter>,
    keep_alive: bool,
}

impl Connection {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }
}

pub struct DatabaseService {
    config: DatabaseConfig,
    connections: HashMap<String, Connection>,
    observers: ObserverManager,
    encrypter: Option<Arc<dyn Encrypter>>,
}

impl DatabaseService {
    /// Validate the configuration and instantiate one adapter per connection.
    /// Nothing connects until [`DatabaseService::boot`] or first use.
    pub fn register(config: DatabaseConfig) -> OrmResult<Self> {
        config.validate()?;

        let mut connections = HashMap::new();
        for (name, connection_config) in &config.connections {
            let adapter = create_adapter(name, connection_config)?;
            debug!(connection = %name, driver = %connection_config.driver, "connection registered");
            connections.insert(
                name.clone(),
                Connection {
                    name: name.clone(),
                    adapter,
                    keep_alive: connection_config.keep_alive,
                },
            );
        }

        Ok(Self {
            config,
            connections,
            observers: ObserverManager::new(),
            encrypter: None,
        })
    }

    /// Inject the collaborator used by `encrypted` casts
    pub fn with_encrypter(mut self, encrypter: Arc<dyn Encrypter>) -> Self {
        self.encrypter = Some(encrypter);
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn default_connection(&self) -> &str {
        &self.config.default
    }

    pub fn connection_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.connections.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn connection(&self, name: Option<&str>) -> OrmResult<&Connection> {
        let name = name.unwrap_or(&self.config.default);
        self.connections.get(name).ok_or_else(|| {
            OrmError::configuration(format!("connection '{}' is not configured", name))
        })
    }

    /// Connect the default connection and every keep-alive connection
    pub async fn boot(&self) -> OrmResult<()> {
        self.connect_default().await?;
        for connection in self.connections.values() {
            if connection.keep_alive && connection.name != self.config.default {
                connection.adapter.connect().await?;
                info!(connection = %connection.name, "keep-alive connection established");
            }
        }
        Ok(())
    }

    pub async fn connect_default(&self) -> OrmResult<()> {
        let connection = self.connection(None)?;
        connection.adapter.connect().await?;
        info!(connection = %connection.name, "default connection established");
        Ok(())
    }

    /// Open (or reopen after `close`) one connection
    pub async fn connect(&self, name: &str) -> OrmResult<()> {
        self.connection(Some(name))?.adapter.connect().await
    }

    /// Adapter bound to a connection name, or to the default
    pub fn adapter(&self, name: Option<&str>) -> OrmResult<Arc<dyn Adapter>> {
        Ok(Arc::clone(&self.connection(name)?.adapter))
    }

    /// First registered adapter of a kind
    pub fn adapter_of_kind(&self, kind: AdapterKind) -> Option<Arc<dyn Adapter>> {
        let mut names = self.connection_names();
        names.retain(|name| {
            self.connections
                .get(*name)
                .map(|c| c.adapter.kind() == kind)
                .unwrap_or(false)
        });
        names
            .first()
            .and_then(|name| self.connections.get(*name))
            .map(|c| Arc::clone(&c.adapter))
    }

    /// Adapter ready for use: idle connections connect lazily, closed ones
    /// stay closed
    pub async fn resolve(&self, name: Option<&str>) -> OrmResult<Arc<dyn Adapter>> {
        let connection = self.connection(name)?;
        match connection.adapter.state().await {
            ConnectionState::Connected => {}
            ConnectionState::Idle => {
                debug!(connection = %connection.name, "connecting on first use");
                connection.adapter.connect().await?;
            }
            ConnectionState::Closed => {
                return Err(QueryError::ConnectionClosed(connection.name.clone()).into());
            }
        }
        Ok(Arc::clone(&connection.adapter))
    }

    /// Schema Port of a connection. The connection must be open.
    pub fn schema(&self, name: Option<&str>) -> OrmResult<&dyn SchemaPort> {
        Ok(self.connection(name)?.adapter.schema())
    }

    /// Whether a connection is backed by the given adapter kind or family
    pub fn is_registered_adapter(
        &self,
        selector: impl Into<AdapterSelector>,
        name: Option<&str>,
    ) -> bool {
        let selector = selector.into();
        self.connection(name)
            .map(|c| selector.matches(c.adapter.kind()))
            .unwrap_or(false)
    }

    /// Idempotently create the migration bookkeeping store on a connection
    pub async fn create_migration_schema(&self, table: &str, name: Option<&str>) -> OrmResult<()> {
        let adapter = self.resolve(name).await?;
        adapter.create_migration_store(table).await
    }

    pub async fn health_check(&self, name: Option<&str>) -> OrmResult<Duration> {
        self.resolve(name).await?.health_check().await
    }

    pub async fn close(&self, name: &str) -> OrmResult<()> {
        let connection = self.connection(Some(name))?;
        connection.adapter.close().await?;
        info!(connection = %name, "connection closed");
        Ok(())
    }

    /// Close every connection, reporting the first failure after trying all
    pub async fn close_all(&self) -> OrmResult<()> {
        let mut first_error = None;
        for connection in self.connections.values() {
            if let Err(e) = connection.adapter.close().await {
                warn!(connection = %connection.name, error = %e, "failed to close connection");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Query builder on the default connection
    pub fn table(self: &Arc<Self>, table: &str) -> QueryBuilder {
        QueryBuilder::new(Arc::clone(self), None, table)
    }

    /// Query builder on a named connection
    pub fn table_on(self: &Arc<Self>, connection: &str, table: &str) -> QueryBuilder {
        QueryBuilder::new(Arc::clone(self), Some(connection.to_string()), table)
    }

    /// Run a backend-native statement on a connection
    pub async fn raw(
        &self,
        name: Option<&str>,
        statement: &str,
        bindings: Vec<Value>,
    ) -> OrmResult<Value> {
        let adapter = self.resolve(name).await?;
        adapter.raw(&RawStatement::new(statement, bindings)).await
    }

    /// Bind an observer to a model type
    pub fn observe<D: ModelDefinition>(&self, observer: impl ModelObserver<Model<D>> + 'static) {
        self.observers.register_for_model::<Model<D>>(Arc::new(observer));
    }

    pub fn observers(&self) -> &ObserverManager {
        &self.observers
    }

    pub fn encrypter(&self) -> Option<&Arc<dyn Encrypter>> {
        self.encrypter.as_ref()
    }
}

impl std::fmt::Debug for DatabaseService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseService")
            .field("default", &self.config.default)
            .field("connections", &self.connection_names())
            .finish()
    }
}
