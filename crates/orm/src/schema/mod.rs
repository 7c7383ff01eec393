//! Schema Port
//!
//! Per-backend schema operations. Every adapter exposes one through
//! [`crate::backends::Adapter::schema`]; the migration engine drives it.

pub mod blueprint;

use async_trait::async_trait;

use crate::error::OrmResult;

pub use blueprint::{ColumnDefinition, ColumnType, IndexDefinition, TableBlueprint};

#[async_trait]
pub trait SchemaPort: Send + Sync {
    /// Create a table (or collection) from a blueprint
    async fn create_table(&self, blueprint: &TableBlueprint) -> OrmResult<()>;

    /// Drop a table; dropping a missing table is not an error
    async fn drop_table(&self, table: &str) -> OrmResult<()>;

    async fn rename_table(&self, from: &str, to: &str) -> OrmResult<()>;

    async fn has_table(&self, table: &str) -> OrmResult<bool>;

    async fn has_column(&self, table: &str, column: &str) -> OrmResult<bool>;

    async fn add_column(&self, table: &str, column: &ColumnDefinition) -> OrmResult<()>;

    async fn drop_column(&self, table: &str, column: &str) -> OrmResult<()>;

    async fn create_index(&self, table: &str, index: &IndexDefinition) -> OrmResult<()>;

    /// Every user table on the connection
    async fn list_tables(&self) -> OrmResult<Vec<String>>;

    /// Drop every table on the connection, returning their names
    async fn drop_all_tables(&self) -> OrmResult<Vec<String>> {
        let tables = self.list_tables().await?;
        for table in &tables {
            self.drop_table(table).await?;
        }
        Ok(tables)
    }
}
