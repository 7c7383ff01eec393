//! In-process document adapter
//!
//! Collections live in a [`DashMap`] keyed by name. Data survives `close`
//! and reconnects; it is dropped with the adapter.

pub mod matcher;
pub mod resolver;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::debug;

use crate::backends::{closed_connection, Adapter, AdapterKind, ConnectionState, Document};
use crate::config::ConnectionConfig;
use crate::error::{OrmError, OrmResult, QueryError};
use crate::query::{QueryExpression, RawStatement};
use crate::relationships::RelationshipResolver;
use crate::schema::{ColumnDefinition, IndexDefinition, SchemaPort, TableBlueprint};
use crate::security::validate_identifier;

pub use resolver::MemoryResolver;

#[derive(Debug, Default, Clone)]
struct Collection {
    columns: Vec<String>,
    indexes: Vec<IndexDefinition>,
    documents: Vec<Document>,
}

impl Collection {
    /// Reject a document that collides with an existing one on a unique index
    fn check_unique(&self, candidate: &Document, skip: Option<usize>) -> Result<(), QueryError> {
        for index in self.indexes.iter().filter(|i| i.unique) {
            let key: Vec<Option<&Value>> = index
                .columns
                .iter()
                .map(|c| matcher::field(candidate, c))
                .collect();
            if key.iter().any(|v| v.map_or(true, Value::is_null)) {
                continue;
            }
            let duplicate = self.documents.iter().enumerate().any(|(position, existing)| {
                Some(position) != skip
                    && index.columns.iter().zip(&key).all(|(column, value)| {
                        match (matcher::field(existing, column), value) {
                            (Some(a), Some(b)) => matcher::values_equal(a, b),
                            _ => false,
                        }
                    })
            });
            if duplicate {
                return Err(QueryError::Backend(format!(
                    "duplicate key for unique index on ({})",
                    index.columns.join(", ")
                )));
            }
        }
        Ok(())
    }
}

pub struct MemoryAdapter {
    name: String,
    config: ConnectionConfig,
    state: RwLock<ConnectionState>,
    collections: DashMap<String, Collection>,
    resolver: Arc<MemoryResolver>,
}

impl MemoryAdapter {
    pub fn new(name: &str, config: ConnectionConfig) -> Self {
        Self {
            name: name.to_string(),
            config,
            state: RwLock::new(ConnectionState::Idle),
            collections: DashMap::new(),
            resolver: Arc::new(MemoryResolver::new(name)),
        }
    }

    async fn ensure_open(&self) -> OrmResult<()> {
        match *self.state.read().await {
            ConnectionState::Connected => Ok(()),
            ConnectionState::Closed => Err(closed_connection(&self.name).into()),
            ConnectionState::Idle => Err(OrmError::connection(format!(
                "connection '{}' has not been opened",
                self.name
            ))),
        }
    }

    fn filtered(&self, expr: &QueryExpression) -> OrmResult<Vec<Document>> {
        let Some(collection) = self.collections.get(&expr.table) else {
            return Ok(Vec::new());
        };
        let mut found = Vec::new();
        for document in &collection.documents {
            if matcher::matches(document, &expr.conditions)? {
                found.push(document.clone());
            }
        }
        Ok(found)
    }

    /// `{"count": "users"}`, `{"find": "users", "filter": {...}}`,
    /// `{"drop": "users"}`, `{"listCollections": 1}` and `{"ping": 1}`
    async fn run_command(&self, command: &Document) -> OrmResult<Value> {
        let target = |key: &str| -> OrmResult<String> {
            let table = command
                .get(key)
                .and_then(Value::as_str)
                .ok_or_else(|| QueryError::Backend(format!("'{}' expects a collection name", key)))?;
            validate_identifier(table)?;
            Ok(table.to_string())
        };

        if command.contains_key("ping") {
            return Ok(json!({ "ok": 1 }));
        }
        if command.contains_key("listCollections") {
            return Ok(json!(self.list_tables().await?));
        }
        if command.contains_key("drop") {
            let table = target("drop")?;
            self.drop_table(&table).await?;
            return Ok(json!({ "ok": 1 }));
        }
        if command.contains_key("count") {
            let expr = QueryExpression::new(&target("count")?);
            return Ok(json!({ "n": self.filtered(&expr)?.len() }));
        }
        if command.contains_key("find") {
            let table = target("find")?;
            let filter = command.get("filter").and_then(Value::as_object);
            let found = self
                .collections
                .get(&table)
                .map(|collection| {
                    collection
                        .documents
                        .iter()
                        .filter(|document| {
                            filter.map_or(true, |filter| {
                                filter.iter().all(|(key, expected)| {
                                    matcher::field(document, key)
                                        .map_or(expected.is_null(), |v| matcher::values_equal(v, expected))
                                })
                            })
                        })
                        .cloned()
                        .map(Value::Object)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            return Ok(Value::Array(found));
        }

        Err(QueryError::Unsupported {
            adapter: AdapterKind::Memory.to_string(),
            operation: format!(
                "command '{}'",
                command.keys().next().map(String::as_str).unwrap_or("")
            ),
        }
        .into())
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Memory
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    async fn connect(&self) -> OrmResult<()> {
        let mut state = self.state.write().await;
        if *state != ConnectionState::Connected {
            debug!(connection = %self.name, "memory store opened");
            *state = ConnectionState::Connected;
        }
        Ok(())
    }

    async fn close(&self) -> OrmResult<()> {
        *self.state.write().await = ConnectionState::Closed;
        Ok(())
    }

    async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    async fn health_check(&self) -> OrmResult<Duration> {
        let start = Instant::now();
        self.ensure_open().await?;
        Ok(start.elapsed())
    }

    fn schema(&self) -> &dyn SchemaPort {
        self
    }

    fn resolver(&self) -> Arc<dyn RelationshipResolver> {
        self.resolver.clone()
    }

    async fn select(&self, expr: &QueryExpression) -> OrmResult<Vec<Document>> {
        self.ensure_open().await?;
        Ok(matcher::arrange(self.filtered(expr)?, expr))
    }

    async fn count(&self, expr: &QueryExpression) -> OrmResult<u64> {
        self.ensure_open().await?;
        Ok(self.filtered(expr)?.len() as u64)
    }

    async fn insert(&self, table: &str, rows: Vec<Document>) -> OrmResult<Vec<Document>> {
        self.ensure_open().await?;
        let mut collection = self.collections.entry(table.to_string()).or_default();
        // Validate the whole batch before storing any of it
        let mut staged = collection.clone();
        for row in &rows {
            staged.check_unique(row, None)?;
            staged.documents.push(row.clone());
        }
        *collection = staged;
        Ok(rows)
    }

    async fn update(&self, expr: &QueryExpression, changes: &Document) -> OrmResult<u64> {
        self.ensure_open().await?;
        let Some(mut collection) = self.collections.get_mut(&expr.table) else {
            return Ok(0);
        };
        let mut staged = collection.clone();
        let mut affected = 0;
        for position in 0..staged.documents.len() {
            if !matcher::matches(&staged.documents[position], &expr.conditions)? {
                continue;
            }
            let mut updated = staged.documents[position].clone();
            for (key, value) in changes {
                updated.insert(key.clone(), value.clone());
            }
            staged.check_unique(&updated, Some(position))?;
            staged.documents[position] = updated;
            affected += 1;
        }
        *collection = staged;
        Ok(affected)
    }

    async fn delete(&self, expr: &QueryExpression) -> OrmResult<u64> {
        self.ensure_open().await?;
        let Some(mut collection) = self.collections.get_mut(&expr.table) else {
            return Ok(0);
        };
        let mut doomed = Vec::with_capacity(collection.documents.len());
        for document in &collection.documents {
            doomed.push(matcher::matches(document, &expr.conditions)?);
        }
        let removed = doomed.iter().filter(|d| **d).count();
        let mut flags = doomed.into_iter();
        collection
            .documents
            .retain(|_| !flags.next().unwrap_or(false));
        Ok(removed as u64)
    }

    async fn raw(&self, statement: &RawStatement) -> OrmResult<Value> {
        self.ensure_open().await?;
        if !statement.bindings.is_empty() {
            return Err(QueryError::Unsupported {
                adapter: AdapterKind::Memory.to_string(),
                operation: "positional bindings in raw commands".to_string(),
            }
            .into());
        }
        let command: Value = serde_json::from_str(&statement.statement)?;
        match command {
            Value::Object(command) => self.run_command(&command).await,
            _ => Err(QueryError::Backend("raw command must be a JSON object".to_string()).into()),
        }
    }
}

#[async_trait]
impl SchemaPort for MemoryAdapter {
    async fn create_table(&self, blueprint: &TableBlueprint) -> OrmResult<()> {
        self.ensure_open().await?;
        validate_identifier(&blueprint.table)?;
        if self.collections.contains_key(&blueprint.table) {
            if blueprint.if_not_exists {
                return Ok(());
            }
            return Err(QueryError::Backend(format!(
                "collection '{}' already exists",
                blueprint.table
            ))
            .into());
        }
        self.collections.insert(
            blueprint.table.clone(),
            Collection {
                columns: blueprint.columns.iter().map(|c| c.name.clone()).collect(),
                indexes: blueprint.all_indexes(),
                documents: Vec::new(),
            },
        );
        Ok(())
    }

    async fn drop_table(&self, table: &str) -> OrmResult<()> {
        self.ensure_open().await?;
        self.collections.remove(table);
        Ok(())
    }

    async fn rename_table(&self, from: &str, to: &str) -> OrmResult<()> {
        self.ensure_open().await?;
        validate_identifier(to)?;
        if self.collections.contains_key(to) {
            return Err(QueryError::Backend(format!("collection '{}' already exists", to)).into());
        }
        let (_, collection) = self
            .collections
            .remove(from)
            .ok_or_else(|| QueryError::Backend(format!("collection '{}' does not exist", from)))?;
        self.collections.insert(to.to_string(), collection);
        Ok(())
    }

    async fn has_table(&self, table: &str) -> OrmResult<bool> {
        self.ensure_open().await?;
        Ok(self.collections.contains_key(table))
    }

    async fn has_column(&self, table: &str, column: &str) -> OrmResult<bool> {
        self.ensure_open().await?;
        Ok(self.collections.get(table).map_or(false, |collection| {
            collection.columns.iter().any(|c| c == column)
                || collection
                    .documents
                    .iter()
                    .any(|d| matcher::field(d, column).is_some())
        }))
    }

    async fn add_column(&self, table: &str, column: &ColumnDefinition) -> OrmResult<()> {
        self.ensure_open().await?;
        validate_identifier(&column.name)?;
        let mut collection = self.collections.entry(table.to_string()).or_default();
        if !collection.columns.contains(&column.name) {
            collection.columns.push(column.name.clone());
        }
        if let Some(default) = &column.default {
            for document in collection.documents.iter_mut() {
                document
                    .entry(column.name.clone())
                    .or_insert_with(|| default.clone());
            }
        }
        if column.unique {
            collection
                .indexes
                .push(IndexDefinition::new(&[column.name.as_str()]).unique());
        }
        Ok(())
    }

    async fn drop_column(&self, table: &str, column: &str) -> OrmResult<()> {
        self.ensure_open().await?;
        if let Some(mut collection) = self.collections.get_mut(table) {
            collection.columns.retain(|c| c != column);
            collection
                .indexes
                .retain(|index| !index.columns.iter().any(|c| c == column));
            for document in collection.documents.iter_mut() {
                document.remove(column);
            }
        }
        Ok(())
    }

    async fn create_index(&self, table: &str, index: &IndexDefinition) -> OrmResult<()> {
        self.ensure_open().await?;
        let mut collection = self.collections.entry(table.to_string()).or_default();
        let name = index.resolved_name(table);
        if !collection
            .indexes
            .iter()
            .any(|existing| existing.resolved_name(table) == name)
        {
            collection.indexes.push(index.clone());
        }
        Ok(())
    }

    async fn list_tables(&self) -> OrmResult<Vec<String>> {
        self.ensure_open().await?;
        let mut tables: Vec<String> = self.collections.iter().map(|e| e.key().clone()).collect();
        tables.sort();
        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{QueryOperator, WhereCondition};

    fn row(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    async fn open_adapter() -> MemoryAdapter {
        let adapter = MemoryAdapter::new("memory", ConnectionConfig::memory());
        adapter.connect().await.unwrap();
        adapter
    }

    #[tokio::test]
    async fn test_operations_require_open_connection() {
        let adapter = MemoryAdapter::new("memory", ConnectionConfig::memory());
        assert!(adapter.select(&QueryExpression::new("users")).await.is_err());

        adapter.connect().await.unwrap();
        adapter.close().await.unwrap();
        adapter.close().await.unwrap();
        let error = adapter.select(&QueryExpression::new("users")).await.unwrap_err();
        assert!(matches!(error, OrmError::Query(QueryError::ConnectionClosed(_))));
    }

    #[tokio::test]
    async fn test_update_and_delete_match_conditions() {
        let adapter = open_adapter().await;
        adapter
            .insert(
                "users",
                vec![
                    row(json!({"id": "1", "name": "John", "age": 30})),
                    row(json!({"id": "2", "name": "Jane", "age": 25})),
                ],
            )
            .await
            .unwrap();

        let mut expr = QueryExpression::new("users");
        expr.conditions
            .push(WhereCondition::new("age", QueryOperator::GreaterThan, json!(26)));

        let changes = row(json!({"age": 31}));
        assert_eq!(adapter.update(&expr, &changes).await.unwrap(), 1);
        assert_eq!(adapter.delete(&expr).await.unwrap(), 1);
        assert_eq!(adapter.count(&QueryExpression::new("users")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unique_index_rejects_whole_batch() {
        let adapter = open_adapter().await;
        let mut blueprint = TableBlueprint::new("accounts");
        blueprint.id().string("email", None).unique(&["email"]);
        adapter.create_table(&blueprint).await.unwrap();

        let result = adapter
            .insert(
                "accounts",
                vec![
                    row(json!({"id": "1", "email": "a@example.com"})),
                    row(json!({"id": "2", "email": "a@example.com"})),
                ],
            )
            .await;
        assert!(result.is_err());
        assert_eq!(adapter.count(&QueryExpression::new("accounts")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_raw_commands() {
        let adapter = open_adapter().await;
        adapter
            .insert("tests", vec![row(json!({"id": "1", "group": "a"}))])
            .await
            .unwrap();

        let count = adapter
            .raw(&RawStatement::new(r#"{"count": "tests"}"#, vec![]))
            .await
            .unwrap();
        assert_eq!(count, json!({"n": 1}));

        let found = adapter
            .raw(&RawStatement::new(r#"{"find": "tests", "filter": {"group": "a"}}"#, vec![]))
            .await
            .unwrap();
        assert_eq!(found.as_array().map(Vec::len), Some(1));

        let unsupported = adapter
            .raw(&RawStatement::new(r#"{"aggregate": "tests"}"#, vec![]))
            .await;
        assert!(matches!(
            unsupported,
            Err(OrmError::Query(QueryError::Unsupported { .. }))
        ));
    }
}
