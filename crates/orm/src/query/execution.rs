//! Query Builder execution

use std::time::Instant;

use serde_json::Value;
use tracing::debug;

use super::builder::QueryBuilder;
use super::expression::RawStatement;
use crate::backends::Document;
use crate::error::{OrmError, OrmResult};
use crate::security::validate_identifier;

impl QueryBuilder {
    /// Execute the query and return every matching record
    pub async fn get(self) -> OrmResult<Vec<Document>> {
        self.check()?;
        let adapter = self.db.resolve(self.connection.as_deref()).await?;

        let started = Instant::now();
        let mut records = adapter.select(&self.expr).await?;
        if !self.expr.with.is_empty() {
            adapter
                .resolver()
                .load_eager(&self.db, &mut records, &self.expr.with)
                .await?;
        }

        debug!(
            connection = %adapter.name(),
            table = %self.expr.table,
            rows = records.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "select"
        );
        Ok(records)
    }

    /// First matching record, if any
    pub async fn first(self) -> OrmResult<Option<Document>> {
        let mut records = self.limit(1).get().await?;
        Ok(if records.is_empty() {
            None
        } else {
            Some(records.swap_remove(0))
        })
    }

    /// First matching record or a not-found error
    pub async fn first_or_fail(self) -> OrmResult<Document> {
        let table = self.expr.table.clone();
        self.first()
            .await?
            .ok_or_else(|| OrmError::not_found(&table, None))
    }

    /// Record by primary key
    pub async fn find<T: Into<Value>>(self, id: T) -> OrmResult<Option<Document>> {
        let key = self.primary_key.clone();
        self.where_eq(&key, id).first().await
    }

    /// Record by primary key or a not-found error naming the key
    pub async fn find_or_fail<T: Into<Value>>(self, id: T) -> OrmResult<Document> {
        let id = id.into();
        let table = self.expr.table.clone();
        let label = match &id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        self.find(id)
            .await?
            .ok_or_else(|| OrmError::not_found(&table, Some(label)))
    }

    /// Count matching records; sorting and paging are ignored
    pub async fn count(self) -> OrmResult<u64> {
        self.check()?;
        let adapter = self.db.resolve(self.connection.as_deref()).await?;
        adapter.count(&self.expr.count_variant()).await
    }

    pub async fn exists(self) -> OrmResult<bool> {
        Ok(self.count().await? > 0)
    }

    /// Insert records, generating identifiers for rows without one.
    /// Returns the stored records in input order.
    pub async fn insert(self, rows: Vec<Document>) -> OrmResult<Vec<Document>> {
        validate_identifier(&self.expr.table)?;
        if let Some(error) = &self.deferred_error {
            return Err(error.clone().into());
        }
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let adapter = self.db.resolve(self.connection.as_deref()).await?;
        let mut prepared = Vec::with_capacity(rows.len());
        for mut row in rows {
            for column in row.keys() {
                validate_identifier(column)?;
            }
            let missing_key = row.get(&self.primary_key).map_or(true, Value::is_null);
            if missing_key {
                row.insert(self.primary_key.clone(), adapter.generate_id());
            }
            prepared.push(row);
        }

        let stored = adapter.insert(&self.expr.table, prepared).await?;
        debug!(
            connection = %adapter.name(),
            table = %self.expr.table,
            rows = stored.len(),
            "insert"
        );
        Ok(stored)
    }

    /// Insert a single record
    pub async fn insert_one(self, row: Document) -> OrmResult<Document> {
        let table = self.expr.table.clone();
        self.insert(vec![row])
            .await?
            .pop()
            .ok_or_else(|| OrmError::not_found(&table, None))
    }

    /// Update matching records, returning how many were affected
    pub async fn update(self, changes: Document) -> OrmResult<u64> {
        self.check_mutation("update")?;
        if changes.is_empty() {
            return Ok(0);
        }
        for column in changes.keys() {
            validate_identifier(column)?;
        }

        let adapter = self.db.resolve(self.connection.as_deref()).await?;
        let affected = adapter.update(&self.expr, &changes).await?;
        debug!(connection = %adapter.name(), table = %self.expr.table, affected, "update");
        Ok(affected)
    }

    /// Delete matching records, returning how many were removed
    pub async fn delete(self) -> OrmResult<u64> {
        self.check_mutation("delete")?;
        let adapter = self.db.resolve(self.connection.as_deref()).await?;
        let affected = adapter.delete(&self.expr).await?;
        debug!(connection = %adapter.name(), table = %self.expr.table, affected, "delete");
        Ok(affected)
    }

    /// Run a backend-native statement on this builder's connection and
    /// return the backend's result shape unmodified
    pub async fn raw(self, statement: &str, bindings: Vec<Value>) -> OrmResult<Value> {
        let adapter = self.db.resolve(self.connection.as_deref()).await?;
        adapter.raw(&RawStatement::new(statement, bindings)).await
    }

    /// Process matching records in fixed-size chunks
    pub async fn chunk<F>(self, chunk_size: u64, mut callback: F) -> OrmResult<()>
    where
        F: FnMut(Vec<Document>) -> OrmResult<()>,
    {
        let chunk_size = chunk_size.max(1);
        let mut offset = 0;
        loop {
            let chunk = self.clone().limit(chunk_size).offset(offset).get().await?;
            let fetched = chunk.len() as u64;
            if fetched == 0 {
                break;
            }

            callback(chunk)?;
            if fetched < chunk_size {
                break;
            }
            offset += chunk_size;
        }

        Ok(())
    }
}
