//! MongoDB adapter
//!
//! Records keep the common `id` key in memory and `_id` on the wire. Eager
//! loads within the same database are embedded with a `$lookup` stage.

pub mod filter;
pub mod resolver;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document as BsonDocument};
use mongodb::options::{ClientOptions, FindOptions};
use mongodb::{Client, Database};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::backends::{closed_connection, Adapter, AdapterKind, ConnectionState, Document};
use crate::config::{redact_url, ConnectionConfig};
use crate::error::{OrmError, OrmResult, QueryError};
use crate::query::{QueryExpression, RawStatement};
use crate::relationships::eager_loading::shape;
use crate::relationships::{EagerLoad, EagerStrategy, RelationshipResolver};
use crate::schema::{ColumnDefinition, IndexDefinition, SchemaPort, TableBlueprint};
use crate::security::validate_identifier;

use filter::{bounded, compile_filter, sort_document, storage_field, to_bson};
pub use resolver::MongoResolver;

enum ClientHandle {
    Idle,
    Open { client: Client, database: Database },
    Closed,
}

pub struct MongoAdapter {
    name: String,
    config: ConnectionConfig,
    database_name: String,
    handle: RwLock<ClientHandle>,
    resolver: Arc<MongoResolver>,
}

/// JSON document to its stored form
fn to_storage(document: &Document) -> OrmResult<BsonDocument> {
    let mut stored = BsonDocument::new();
    for (key, value) in document {
        stored.insert(storage_field(key), to_bson(value)?);
    }
    Ok(stored)
}

fn from_storage(document: BsonDocument) -> Document {
    match Bson::Document(document).into_relaxed_extjson() {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

/// `{"$oid": "..."}` collapses to its hex string
fn plain_id(id: Value) -> Value {
    match id {
        Value::Object(ref map) if map.len() == 1 => match map.get("$oid") {
            Some(Value::String(hex)) => Value::String(hex.clone()),
            _ => id,
        },
        other => other,
    }
}

impl MongoAdapter {
    pub fn new(name: &str, config: ConnectionConfig) -> OrmResult<Self> {
        let database_name = config.database.clone().ok_or_else(|| {
            OrmError::configuration(format!(
                "connection '{}': a database name is required for MongoDB",
                name
            ))
        })?;
        Ok(Self {
            name: name.to_string(),
            config,
            database_name,
            handle: RwLock::new(ClientHandle::Idle),
            resolver: Arc::new(MongoResolver::new(name)),
        })
    }

    async fn client(&self) -> OrmResult<(Client, Database)> {
        match &*self.handle.read().await {
            ClientHandle::Open { client, database } => Ok((client.clone(), database.clone())),
            ClientHandle::Closed => Err(closed_connection(&self.name).into()),
            ClientHandle::Idle => Err(OrmError::connection(format!(
                "connection '{}' has not been opened",
                self.name
            ))),
        }
    }

    async fn database(&self) -> OrmResult<Database> {
        Ok(self.client().await?.1)
    }

    fn lookup_pipeline(
        &self,
        expr: &QueryExpression,
        filter: BsonDocument,
        lookups: &[&EagerLoad],
    ) -> Vec<BsonDocument> {
        let mut pipeline = vec![doc! { "$match": filter }];
        if !expr.order_by.is_empty() {
            pipeline.push(doc! { "$sort": sort_document(&expr.order_by) });
        }
        if let Some(offset) = expr.offset {
            pipeline.push(doc! { "$skip": bounded(offset) });
        }
        if let Some(limit) = expr.limit {
            pipeline.push(doc! { "$limit": bounded(limit) });
        }
        for load in lookups {
            let relation = &load.relation;
            pipeline.push(doc! {
                "$lookup": {
                    "from": relation.related_table.as_str(),
                    "localField": storage_field(relation.source_key()),
                    "foreignField": storage_field(relation.related_key()),
                    "as": load.name.as_str(),
                }
            });
        }
        pipeline
    }

    /// Normalize `$lookup` output into the relationship's value shape
    fn embed(&self, document: &mut Document, load: &EagerLoad) {
        let matches = match document.remove(&load.name) {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(map) => Some(self.normalize_document(map)),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        document.insert(load.name.clone(), shape(&load.relation, matches));
    }
}

#[async_trait]
impl Adapter for MongoAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::MongoDb
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    async fn connect(&self) -> OrmResult<()> {
        let mut handle = self.handle.write().await;
        if matches!(*handle, ClientHandle::Open { .. }) {
            return Ok(());
        }

        let connection_error = |e: mongodb::error::Error| {
            OrmError::connection(format!(
                "failed to connect '{}' ({}): {}",
                self.name,
                redact_url(&self.config.url),
                e
            ))
        };

        let pool = &self.config.pool;
        let mut options = ClientOptions::parse(&self.config.url)
            .await
            .map_err(connection_error)?;
        options.max_pool_size = Some(pool.max_connections);
        options.min_pool_size = Some(pool.min_connections);
        options.connect_timeout = Some(Duration::from_secs(pool.acquire_timeout));
        options.server_selection_timeout = Some(Duration::from_secs(pool.acquire_timeout));
        options.max_idle_time = pool.idle_timeout.map(Duration::from_secs);

        let client = Client::with_options(options).map_err(connection_error)?;
        let database = client.database(&self.database_name);
        database
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(connection_error)?;

        info!(connection = %self.name, database = %self.database_name, "mongodb client connected");
        *handle = ClientHandle::Open { client, database };
        Ok(())
    }

    async fn close(&self) -> OrmResult<()> {
        *self.handle.write().await = ClientHandle::Closed;
        Ok(())
    }

    async fn state(&self) -> ConnectionState {
        match &*self.handle.read().await {
            ClientHandle::Idle => ConnectionState::Idle,
            ClientHandle::Open { .. } => ConnectionState::Connected,
            ClientHandle::Closed => ConnectionState::Closed,
        }
    }

    async fn health_check(&self) -> OrmResult<Duration> {
        let database = self.database().await?;
        let start = Instant::now();
        database
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                OrmError::connection(format!("health check failed for '{}': {}", self.name, e))
            })?;
        Ok(start.elapsed())
    }

    fn schema(&self) -> &dyn SchemaPort {
        self
    }

    fn resolver(&self) -> Arc<dyn RelationshipResolver> {
        self.resolver.clone()
    }

    fn normalize_document(&self, mut raw: Document) -> Document {
        if let Some(id) = raw.remove("_id") {
            raw.insert("id".to_string(), plain_id(id));
        }
        raw
    }

    async fn select(&self, expr: &QueryExpression) -> OrmResult<Vec<Document>> {
        let database = self.database().await?;
        // A zero limit means "no limit" to the server
        if expr.limit == Some(0) {
            return Ok(Vec::new());
        }

        let collection = database.collection::<BsonDocument>(&expr.table);
        let filter = compile_filter(&expr.conditions)?;
        let lookups: Vec<&EagerLoad> = expr
            .with
            .iter()
            .filter(|load| load.strategy == EagerStrategy::Lookup)
            .collect();

        let fetched: Vec<BsonDocument> = if lookups.is_empty() {
            let mut options = FindOptions::default();
            if !expr.order_by.is_empty() {
                options.sort = Some(sort_document(&expr.order_by));
            }
            options.limit = expr.limit.map(bounded);
            options.skip = expr.offset;
            debug!(connection = %self.name, collection = %expr.table, filter = %filter, "find");
            collection.find(filter, options).await?.try_collect().await?
        } else {
            let pipeline = self.lookup_pipeline(expr, filter, &lookups);
            debug!(connection = %self.name, collection = %expr.table, stages = pipeline.len(), "aggregate");
            collection.aggregate(pipeline, None).await?.try_collect().await?
        };

        let mut documents: Vec<Document> = fetched
            .into_iter()
            .map(|raw| self.normalize_document(from_storage(raw)))
            .collect();
        for load in lookups {
            for document in documents.iter_mut() {
                self.embed(document, load);
            }
        }
        Ok(documents)
    }

    async fn count(&self, expr: &QueryExpression) -> OrmResult<u64> {
        let database = self.database().await?;
        let filter = compile_filter(&expr.conditions)?;
        Ok(database
            .collection::<BsonDocument>(&expr.table)
            .count_documents(filter, None)
            .await?)
    }

    async fn insert(&self, table: &str, rows: Vec<Document>) -> OrmResult<Vec<Document>> {
        let database = self.database().await?;
        if rows.is_empty() {
            return Ok(rows);
        }
        let stored = rows.iter().map(to_storage).collect::<OrmResult<Vec<_>>>()?;
        database
            .collection::<BsonDocument>(table)
            .insert_many(stored, None)
            .await?;
        Ok(rows)
    }

    async fn update(&self, expr: &QueryExpression, changes: &Document) -> OrmResult<u64> {
        let database = self.database().await?;
        let mut set = to_storage(changes)?;
        // `_id` is immutable once written
        set.remove("_id");
        if set.is_empty() {
            return Ok(0);
        }
        let result = database
            .collection::<BsonDocument>(&expr.table)
            .update_many(compile_filter(&expr.conditions)?, doc! { "$set": set }, None)
            .await?;
        Ok(result.matched_count)
    }

    async fn delete(&self, expr: &QueryExpression) -> OrmResult<u64> {
        let database = self.database().await?;
        let result = database
            .collection::<BsonDocument>(&expr.table)
            .delete_many(compile_filter(&expr.conditions)?, None)
            .await?;
        Ok(result.deleted_count)
    }

    /// The statement is a JSON database command such as
    /// `{"count": "users", "query": {"active": true}}`
    async fn raw(&self, statement: &RawStatement) -> OrmResult<Value> {
        let database = self.database().await?;
        if !statement.bindings.is_empty() {
            return Err(QueryError::Unsupported {
                adapter: AdapterKind::MongoDb.to_string(),
                operation: "positional bindings in raw commands".to_string(),
            }
            .into());
        }
        let command: Value = serde_json::from_str(&statement.statement)?;
        let command = match to_bson(&command)? {
            Bson::Document(command) => command,
            _ => {
                return Err(
                    QueryError::Backend("raw command must be a JSON object".to_string()).into(),
                )
            }
        };
        let reply = database.run_command(command, None).await?;
        Ok(Bson::Document(reply).into_relaxed_extjson())
    }
}

#[async_trait]
impl SchemaPort for MongoAdapter {
    async fn create_table(&self, blueprint: &TableBlueprint) -> OrmResult<()> {
        let database = self.database().await?;
        validate_identifier(&blueprint.table)?;
        if self.has_table(&blueprint.table).await? {
            if blueprint.if_not_exists {
                return Ok(());
            }
            return Err(QueryError::Backend(format!(
                "collection '{}' already exists",
                blueprint.table
            ))
            .into());
        }
        database.create_collection(&blueprint.table, None).await?;
        for index in blueprint.all_indexes() {
            self.create_index(&blueprint.table, &index).await?;
        }
        info!(connection = %self.name, collection = %blueprint.table, "collection created");
        Ok(())
    }

    async fn drop_table(&self, table: &str) -> OrmResult<()> {
        let database = self.database().await?;
        if !self.has_table(table).await? {
            return Ok(());
        }
        database.collection::<BsonDocument>(table).drop(None).await?;
        Ok(())
    }

    async fn rename_table(&self, from: &str, to: &str) -> OrmResult<()> {
        validate_identifier(to)?;
        let (client, _) = self.client().await?;
        client
            .database("admin")
            .run_command(
                doc! {
                    "renameCollection": format!("{}.{}", self.database_name, from),
                    "to": format!("{}.{}", self.database_name, to),
                },
                None,
            )
            .await?;
        Ok(())
    }

    async fn has_table(&self, table: &str) -> OrmResult<bool> {
        let database = self.database().await?;
        let names = database
            .list_collection_names(doc! { "name": table })
            .await?;
        Ok(!names.is_empty())
    }

    async fn has_column(&self, table: &str, column: &str) -> OrmResult<bool> {
        let database = self.database().await?;
        let count = database
            .collection::<BsonDocument>(table)
            .count_documents(doc! { storage_field(column): { "$exists": true } }, None)
            .await?;
        Ok(count > 0)
    }

    /// Collections are schemaless; only defaults and uniqueness materialize
    async fn add_column(&self, table: &str, column: &ColumnDefinition) -> OrmResult<()> {
        let database = self.database().await?;
        validate_identifier(&column.name)?;
        if let Some(default) = &column.default {
            let field = storage_field(&column.name);
            database
                .collection::<BsonDocument>(table)
                .update_many(
                    doc! { field: { "$exists": false } },
                    doc! { "$set": { field: to_bson(default)? } },
                    None,
                )
                .await?;
        }
        if column.unique {
            self.create_index(table, &IndexDefinition::new(&[column.name.as_str()]).unique())
                .await?;
        }
        Ok(())
    }

    async fn drop_column(&self, table: &str, column: &str) -> OrmResult<()> {
        let database = self.database().await?;
        validate_identifier(column)?;
        database
            .collection::<BsonDocument>(table)
            .update_many(doc! {}, doc! { "$unset": { storage_field(column): "" } }, None)
            .await?;
        Ok(())
    }

    async fn create_index(&self, table: &str, index: &IndexDefinition) -> OrmResult<()> {
        let database = self.database().await?;
        // `_id` is always uniquely indexed
        if index.columns.len() == 1 && storage_field(&index.columns[0]) == "_id" {
            return Ok(());
        }
        let mut keys = BsonDocument::new();
        for column in &index.columns {
            validate_identifier(column)?;
            keys.insert(storage_field(column), 1);
        }
        database
            .run_command(
                doc! {
                    "createIndexes": table,
                    "indexes": [{
                        "key": keys,
                        "name": index.resolved_name(table),
                        "unique": index.unique,
                    }],
                },
                None,
            )
            .await?;
        Ok(())
    }

    async fn list_tables(&self) -> OrmResult<Vec<String>> {
        let database = self.database().await?;
        let mut names: Vec<String> = database
            .list_collection_names(None)
            .await?
            .into_iter()
            .filter(|name| !name.starts_with("system."))
            .collect();
        names.sort();
        Ok(names)
    }
}
