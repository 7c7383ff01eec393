//! Core adapter abstraction
//!
//! An [`Adapter`] owns one backend connection and executes compiled
//! [`QueryExpression`]s against it. Everything above this layer speaks
//! [`Document`]s and never sees a driver type.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::AdapterKind;
use crate::config::ConnectionConfig;
use crate::error::{OrmResult, QueryError};
use crate::query::{QueryExpression, RawStatement};
use crate::relationships::RelationshipResolver;
use crate::schema::{ColumnDefinition, ColumnType, SchemaPort, TableBlueprint};

/// The loosely-typed record shape shared by every layer
pub type Document = serde_json::Map<String, Value>;

/// Lifecycle of an adapter's driver handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never connected; connects lazily on first use
    Idle,
    Connected,
    /// Explicitly closed; stays closed until `connect` is called again
    Closed,
}

#[async_trait]
pub trait Adapter: Send + Sync {
    fn kind(&self) -> AdapterKind;

    /// Name of the connection this adapter is bound to
    fn name(&self) -> &str;

    fn config(&self) -> &ConnectionConfig;

    /// Open the driver handle. Calling it on a connected adapter is a no-op.
    async fn connect(&self) -> OrmResult<()>;

    /// Release the driver handle. Safe to call repeatedly.
    async fn close(&self) -> OrmResult<()>;

    async fn state(&self) -> ConnectionState;

    /// Round-trip to the backend
    async fn health_check(&self) -> OrmResult<Duration>;

    /// Whether the backend is reachable right now
    async fn is_connected(&self) -> bool {
        self.state().await == ConnectionState::Connected && self.health_check().await.is_ok()
    }

    fn schema(&self) -> &dyn SchemaPort;

    fn resolver(&self) -> Arc<dyn RelationshipResolver>;

    /// Map a native record onto the common document shape
    fn normalize_document(&self, raw: Document) -> Document {
        raw
    }

    /// Identifier for a new record
    fn generate_id(&self) -> Value {
        Value::String(uuid::Uuid::new_v4().to_string())
    }

    async fn select(&self, expr: &QueryExpression) -> OrmResult<Vec<Document>>;

    /// Count the records matching the expression's filters
    async fn count(&self, expr: &QueryExpression) -> OrmResult<u64>;

    /// Store rows that already carry their identifiers, returning them as
    /// stored and in input order
    async fn insert(&self, table: &str, rows: Vec<Document>) -> OrmResult<Vec<Document>>;

    async fn update(&self, expr: &QueryExpression, changes: &Document) -> OrmResult<u64>;

    async fn delete(&self, expr: &QueryExpression) -> OrmResult<u64>;

    /// Escape hatch returning the backend's native result shape as JSON
    async fn raw(&self, statement: &RawStatement) -> OrmResult<Value>;

    /// Ensure the migration bookkeeping store exists
    async fn create_migration_store(&self, table: &str) -> OrmResult<()> {
        let schema = self.schema();
        if schema.has_table(table).await? {
            return Ok(());
        }
        schema.create_table(&migration_store_blueprint(table)).await
    }
}

/// Columns of the migration bookkeeping store
pub fn migration_store_blueprint(table: &str) -> TableBlueprint {
    let mut blueprint = TableBlueprint::new(table);
    blueprint
        .id()
        .string("name", Some(255))
        .column(ColumnDefinition::new("batch", ColumnType::BigInteger))
        .string("checksum", Some(64))
        .string("type", Some(16))
        .string("applied_at", Some(64))
        .unique(&["name", "type"])
        .if_not_exists();
    blueprint
}

/// Error for operations issued after `close`
pub fn closed_connection(name: &str) -> QueryError {
    QueryError::ConnectionClosed(name.to_string())
}
