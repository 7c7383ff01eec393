//! Relational adapter
//!
//! PostgreSQL, MySQL and SQLite through sqlx's `Any` driver. Expressions are
//! compiled to parameterized SQL by [`SqlCompiler`]; rows decode into
//! documents column by column.

pub mod compiler;
pub mod dialect;
pub mod resolver;
pub mod rows;
pub mod schema;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::any::{install_default_drivers, AnyPoolOptions};
use sqlx::{AnyPool, Executor};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::backends::{closed_connection, Adapter, AdapterKind, ConnectionState, Document};
use crate::config::{redact_url, ConnectionConfig};
use crate::error::{OrmError, OrmResult, QueryError};
use crate::query::{QueryExpression, RawStatement};
use crate::relationships::RelationshipResolver;
use crate::schema::SchemaPort;

pub use compiler::{CompiledQuery, SqlCompiler};
pub use dialect::SqlDialect;
pub use resolver::SqlRelationshipResolver;

enum PoolHandle {
    Idle,
    Open(AnyPool),
    Closed,
}

pub struct SqlAdapter {
    name: String,
    config: ConnectionConfig,
    compiler: SqlCompiler,
    pool: RwLock<PoolHandle>,
    resolver: Arc<SqlRelationshipResolver>,
}

impl SqlAdapter {
    pub fn new(name: &str, config: ConnectionConfig) -> OrmResult<Self> {
        let dialect = SqlDialect::from_kind(config.driver).ok_or_else(|| {
            OrmError::configuration(format!("driver '{}' is not relational", config.driver))
        })?;
        Ok(Self {
            name: name.to_string(),
            config,
            compiler: SqlCompiler::new(dialect),
            pool: RwLock::new(PoolHandle::Idle),
            resolver: Arc::new(SqlRelationshipResolver::new(name)),
        })
    }

    pub fn dialect(&self) -> SqlDialect {
        self.compiler.dialect()
    }

    pub(crate) async fn pool(&self) -> OrmResult<AnyPool> {
        match &*self.pool.read().await {
            PoolHandle::Open(pool) => Ok(pool.clone()),
            PoolHandle::Closed => Err(closed_connection(&self.name).into()),
            PoolHandle::Idle => Err(OrmError::connection(format!(
                "connection '{}' has not been opened",
                self.name
            ))),
        }
    }

    fn pool_options(&self) -> AnyPoolOptions {
        let pool = &self.config.pool;
        // An in-memory SQLite database exists only inside its one connection
        if self.config.is_sqlite_memory() {
            return AnyPoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .acquire_timeout(Duration::from_secs(pool.acquire_timeout))
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let mut options = AnyPoolOptions::new()
            .max_connections(pool.max_connections)
            .min_connections(pool.min_connections)
            .acquire_timeout(Duration::from_secs(pool.acquire_timeout))
            .test_before_acquire(pool.test_before_acquire);
        if let Some(idle_timeout) = pool.idle_timeout {
            options = options.idle_timeout(Duration::from_secs(idle_timeout));
        }
        if let Some(max_lifetime) = pool.max_lifetime {
            options = options.max_lifetime(Duration::from_secs(max_lifetime));
        }
        options
    }

    pub(crate) async fn execute(&self, compiled: &CompiledQuery) -> OrmResult<u64> {
        let pool = self.pool().await?;
        debug!(connection = %self.name, sql = %compiled.sql, "execute");
        let result = rows::bind_params(sqlx::query(&compiled.sql), &compiled.params)
            .execute(&pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub(crate) async fn fetch(&self, compiled: &CompiledQuery) -> OrmResult<Vec<Document>> {
        let pool = self.pool().await?;
        debug!(connection = %self.name, sql = %compiled.sql, "fetch");
        let fetched = rows::bind_params(sqlx::query(&compiled.sql), &compiled.params)
            .fetch_all(&pool)
            .await?;
        fetched.iter().map(rows::decode_row).collect()
    }

    pub(crate) async fn fetch_count(&self, compiled: &CompiledQuery) -> OrmResult<u64> {
        let pool = self.pool().await?;
        let row = rows::bind_params(sqlx::query(&compiled.sql), &compiled.params)
            .fetch_one(&pool)
            .await?;
        rows::decode_count(&row)
    }
}

/// Statements that produce a result set
fn returns_rows(statement: &str) -> bool {
    let lowered = statement.trim_start().to_lowercase();
    ["select", "with", "pragma", "show", "explain", "values", "describe"]
        .iter()
        .any(|keyword| lowered.starts_with(keyword))
        || lowered.contains(" returning ")
}

#[async_trait]
impl Adapter for SqlAdapter {
    fn kind(&self) -> AdapterKind {
        self.config.driver
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    async fn connect(&self) -> OrmResult<()> {
        let mut handle = self.pool.write().await;
        if let PoolHandle::Open(pool) = &*handle {
            if !pool.is_closed() {
                return Ok(());
            }
        }

        install_default_drivers();
        let pool = self
            .pool_options()
            .connect(&self.config.url)
            .await
            .map_err(|e| {
                OrmError::connection(format!(
                    "failed to connect '{}' ({}): {}",
                    self.name,
                    redact_url(&self.config.url),
                    e
                ))
            })?;

        info!(connection = %self.name, driver = %self.config.driver, "database pool created");
        *handle = PoolHandle::Open(pool);
        Ok(())
    }

    async fn close(&self) -> OrmResult<()> {
        let mut handle = self.pool.write().await;
        if let PoolHandle::Open(pool) = &*handle {
            pool.close().await;
        }
        *handle = PoolHandle::Closed;
        Ok(())
    }

    async fn state(&self) -> ConnectionState {
        match &*self.pool.read().await {
            PoolHandle::Idle => ConnectionState::Idle,
            PoolHandle::Open(pool) if !pool.is_closed() => ConnectionState::Connected,
            PoolHandle::Open(_) | PoolHandle::Closed => ConnectionState::Closed,
        }
    }

    async fn health_check(&self) -> OrmResult<Duration> {
        let pool = self.pool().await?;
        let start = Instant::now();
        pool.execute("SELECT 1").await.map_err(|e| {
            OrmError::connection(format!("health check failed for '{}': {}", self.name, e))
        })?;
        let duration = start.elapsed();
        debug!(connection = %self.name, "health check passed in {:?}", duration);
        Ok(duration)
    }

    fn schema(&self) -> &dyn SchemaPort {
        self
    }

    fn resolver(&self) -> Arc<dyn RelationshipResolver> {
        self.resolver.clone()
    }

    async fn select(&self, expr: &QueryExpression) -> OrmResult<Vec<Document>> {
        self.fetch(&self.compiler.select(expr)).await
    }

    async fn count(&self, expr: &QueryExpression) -> OrmResult<u64> {
        self.fetch_count(&self.compiler.count(expr)).await
    }

    async fn insert(&self, table: &str, rows: Vec<Document>) -> OrmResult<Vec<Document>> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;
        for row in &rows {
            let compiled = self.compiler.insert(table, row);
            debug!(connection = %self.name, sql = %compiled.sql, "insert");
            rows::bind_params(sqlx::query(&compiled.sql), &compiled.params)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(rows)
    }

    async fn update(&self, expr: &QueryExpression, changes: &Document) -> OrmResult<u64> {
        self.execute(&self.compiler.update(expr, changes)).await
    }

    async fn delete(&self, expr: &QueryExpression) -> OrmResult<u64> {
        self.execute(&self.compiler.delete(expr)).await
    }

    async fn raw(&self, statement: &RawStatement) -> OrmResult<Value> {
        if statement.statement.trim().is_empty() {
            return Err(QueryError::Backend("empty raw statement".to_string()).into());
        }
        let compiled = CompiledQuery {
            sql: statement.statement.clone(),
            params: statement.bindings.clone(),
        };
        if returns_rows(&compiled.sql) {
            let records = self.fetch(&compiled).await?;
            Ok(Value::Array(records.into_iter().map(Value::Object).collect()))
        } else {
            let affected = self.execute(&compiled).await?;
            Ok(json!({ "rows_affected": affected }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_returns_rows_detection() {
        assert!(returns_rows("SELECT * FROM users"));
        assert!(returns_rows("  with t as (select 1) select * from t"));
        assert!(returns_rows("INSERT INTO users (id) VALUES ($1) RETURNING id"));
        assert!(!returns_rows("CREATE TABLE tests (id TEXT)"));
        assert!(!returns_rows("DELETE FROM users"));
    }

    #[test]
    fn test_non_relational_driver_rejected() {
        let result = SqlAdapter::new("docs", ConnectionConfig::memory());
        assert!(matches!(result, Err(OrmError::Configuration(_))));
    }
}
