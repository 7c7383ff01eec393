//! Bookkeeping store access
//!
//! Records live in an ordinary table or collection on the target connection
//! and are read and written through the query builder, so every adapter
//! stores them the same way.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};

use super::definitions::{MigrationFile, MigrationKind, MigrationRecord};
use crate::database::DatabaseService;
use crate::error::{OrmError, OrmResult};
use crate::query::QueryBuilder;

pub struct MigrationRepository {
    db: Arc<DatabaseService>,
    connection: String,
    table: String,
}

impl MigrationRepository {
    pub fn new(db: Arc<DatabaseService>, connection: &str, table: &str) -> Self {
        Self {
            db,
            connection: connection.to_string(),
            table: table.to_string(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn query(&self) -> QueryBuilder {
        self.db.table_on(&self.connection, &self.table)
    }

    /// Create the store if it does not exist yet
    pub async fn ensure_store(&self) -> OrmResult<()> {
        self.db
            .create_migration_schema(&self.table, Some(self.connection.as_str()))
            .await
    }

    /// Applied records of one kind, ordered by name
    pub async fn records(&self, kind: MigrationKind) -> OrmResult<Vec<MigrationRecord>> {
        let rows = self
            .query()
            .where_eq("type", kind.as_str())
            .order_by("name")
            .get()
            .await?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(Value::Object(row)).map_err(|e| {
                    OrmError::Serialization(format!("malformed record in '{}': {}", self.table, e))
                })
            })
            .collect()
    }

    pub async fn next_batch(&self, kind: MigrationKind) -> OrmResult<i64> {
        let latest = self
            .records(kind)
            .await?
            .iter()
            .map(|record| record.batch)
            .max()
            .unwrap_or(0);
        Ok(latest + 1)
    }

    pub async fn record(&self, file: &MigrationFile, batch: i64) -> OrmResult<()> {
        let row = json!({
            "name": file.name,
            "batch": batch,
            "checksum": file.checksum,
            "type": file.kind.as_str(),
            "applied_at": Utc::now().to_rfc3339(),
        });
        if let Value::Object(row) = row {
            self.query().insert_one(row).await?;
        }
        Ok(())
    }

    pub async fn remove(&self, record: &MigrationRecord) -> OrmResult<()> {
        self.query()
            .where_eq("id", record.id.as_str())
            .delete()
            .await?;
        Ok(())
    }
}
