//! Schema Port for relational connections

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use super::compiler::CompiledQuery;
use super::{SqlAdapter, SqlDialect};
use crate::backends::Adapter;
use crate::error::{OrmError, OrmResult};
use crate::schema::{ColumnDefinition, IndexDefinition, SchemaPort, TableBlueprint};
use crate::security::validate_identifier;

impl SqlAdapter {
    fn column_sql(&self, column: &ColumnDefinition, inline_primary: bool) -> String {
        let dialect = self.dialect();
        let mut sql = format!(
            "{} {}",
            dialect.quote(&column.name),
            dialect.column_type(column.column_type, column.length)
        );
        if inline_primary && column.primary {
            sql.push_str(" PRIMARY KEY");
        } else if !column.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&dialect.literal(default));
        }
        sql
    }

    fn create_table_sql(&self, blueprint: &TableBlueprint) -> OrmResult<String> {
        validate_identifier(&blueprint.table)?;
        if blueprint.columns.is_empty() {
            return Err(OrmError::configuration(format!(
                "table '{}' has no columns",
                blueprint.table
            )));
        }
        let primary_count = blueprint.columns.iter().filter(|c| c.primary).count();
        let mut definitions = Vec::with_capacity(blueprint.columns.len() + 1);
        for column in &blueprint.columns {
            validate_identifier(&column.name)?;
            definitions.push(self.column_sql(column, primary_count == 1));
        }
        if primary_count > 1 {
            let keys: Vec<String> = blueprint
                .columns
                .iter()
                .filter(|c| c.primary)
                .map(|c| self.dialect().quote(&c.name))
                .collect();
            definitions.push(format!("PRIMARY KEY ({})", keys.join(", ")));
        }

        Ok(format!(
            "CREATE TABLE {}{} ({})",
            if blueprint.if_not_exists { "IF NOT EXISTS " } else { "" },
            self.dialect().quote(&blueprint.table),
            definitions.join(", ")
        ))
    }

    fn create_index_sql(&self, table: &str, index: &IndexDefinition) -> OrmResult<String> {
        validate_identifier(table)?;
        for column in &index.columns {
            validate_identifier(column)?;
        }
        let dialect = self.dialect();
        let columns: Vec<String> = index.columns.iter().map(|c| dialect.quote(c)).collect();
        Ok(format!(
            "CREATE {}INDEX {}{} ON {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            if dialect.supports_index_if_not_exists() { "IF NOT EXISTS " } else { "" },
            dialect.quote(&index.resolved_name(table)),
            dialect.quote(table),
            columns.join(", ")
        ))
    }

    async fn run_ddl(&self, sql: String) -> OrmResult<()> {
        self.execute(&CompiledQuery { sql, params: Vec::new() }).await?;
        Ok(())
    }

    async fn count_matching(&self, sql: &str, params: Vec<Value>) -> OrmResult<u64> {
        self.fetch_count(&CompiledQuery { sql: sql.to_string(), params }).await
    }
}

#[async_trait]
impl SchemaPort for SqlAdapter {
    async fn create_table(&self, blueprint: &TableBlueprint) -> OrmResult<()> {
        if blueprint.if_not_exists && self.has_table(&blueprint.table).await? {
            return Ok(());
        }
        let sql = self.create_table_sql(blueprint)?;
        self.run_ddl(sql).await?;
        for index in blueprint.all_indexes() {
            self.create_index(&blueprint.table, &index).await?;
        }
        info!(connection = %self.name(), table = %blueprint.table, "table created");
        Ok(())
    }

    async fn drop_table(&self, table: &str) -> OrmResult<()> {
        validate_identifier(table)?;
        let cascade = match self.dialect() {
            SqlDialect::PostgreSQL => " CASCADE",
            SqlDialect::MySQL | SqlDialect::SQLite => "",
        };
        self.run_ddl(format!(
            "DROP TABLE IF EXISTS {}{}",
            self.dialect().quote(table),
            cascade
        ))
        .await
    }

    async fn rename_table(&self, from: &str, to: &str) -> OrmResult<()> {
        validate_identifier(from)?;
        validate_identifier(to)?;
        let dialect = self.dialect();
        self.run_ddl(format!(
            "ALTER TABLE {} RENAME TO {}",
            dialect.quote(from),
            dialect.quote(to)
        ))
        .await
    }

    async fn has_table(&self, table: &str) -> OrmResult<bool> {
        validate_identifier(table)?;
        let count = self
            .count_matching(
                self.dialect().has_table_sql(),
                vec![Value::String(table.to_string())],
            )
            .await?;
        Ok(count > 0)
    }

    async fn has_column(&self, table: &str, column: &str) -> OrmResult<bool> {
        validate_identifier(table)?;
        validate_identifier(column)?;
        let count = self
            .count_matching(
                self.dialect().has_column_sql(),
                vec![
                    Value::String(table.to_string()),
                    Value::String(column.to_string()),
                ],
            )
            .await?;
        Ok(count > 0)
    }

    async fn add_column(&self, table: &str, column: &ColumnDefinition) -> OrmResult<()> {
        validate_identifier(table)?;
        validate_identifier(&column.name)?;
        // Added columns cannot be NOT NULL without a default on existing rows
        let mut column = column.clone();
        if column.default.is_none() {
            column.nullable = true;
        }
        self.run_ddl(format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.dialect().quote(table),
            self.column_sql(&column, false)
        ))
        .await?;
        if column.unique {
            self.create_index(table, &IndexDefinition::new(&[column.name.as_str()]).unique())
                .await?;
        }
        Ok(())
    }

    async fn drop_column(&self, table: &str, column: &str) -> OrmResult<()> {
        validate_identifier(table)?;
        validate_identifier(column)?;
        let dialect = self.dialect();
        self.run_ddl(format!(
            "ALTER TABLE {} DROP COLUMN {}",
            dialect.quote(table),
            dialect.quote(column)
        ))
        .await
    }

    async fn create_index(&self, table: &str, index: &IndexDefinition) -> OrmResult<()> {
        let sql = self.create_index_sql(table, index)?;
        self.run_ddl(sql).await
    }

    async fn list_tables(&self) -> OrmResult<Vec<String>> {
        let rows = self
            .fetch(&CompiledQuery {
                sql: self.dialect().list_tables_sql().to_string(),
                params: Vec::new(),
            })
            .await?;
        let mut tables: Vec<String> = rows
            .into_iter()
            .filter_map(|row| row.get("table_name").and_then(Value::as_str).map(str::to_string))
            .collect();
        tables.sort();
        Ok(tables)
    }

    async fn drop_all_tables(&self) -> OrmResult<Vec<String>> {
        let tables = self.list_tables().await?;
        if self.dialect() == SqlDialect::MySQL {
            self.run_ddl("SET FOREIGN_KEY_CHECKS = 0".to_string()).await?;
        }
        for table in &tables {
            self.drop_table(table).await?;
        }
        if self.dialect() == SqlDialect::MySQL {
            self.run_ddl("SET FOREIGN_KEY_CHECKS = 1".to_string()).await?;
        }
        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;

    fn adapter(url: &str) -> SqlAdapter {
        SqlAdapter::new("test", ConnectionConfig::from_url(url).unwrap()).unwrap()
    }

    #[test]
    fn test_create_table_sql() {
        let mut blueprint = TableBlueprint::new("users");
        blueprint.id().string("name", None).if_not_exists();

        let sql = adapter("sqlite::memory:").create_table_sql(&blueprint).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"users\" (\"id\" VARCHAR(36) PRIMARY KEY, \"name\" VARCHAR(255) NOT NULL)"
        );
    }

    #[test]
    fn test_create_index_sql_per_dialect() {
        let index = IndexDefinition::new(&["email"]).unique();
        let sqlite = adapter("sqlite::memory:").create_index_sql("users", &index).unwrap();
        assert_eq!(
            sqlite,
            "CREATE UNIQUE INDEX IF NOT EXISTS \"idx_users_email\" ON \"users\" (\"email\")"
        );

        let mysql = adapter("mysql://root@localhost/app")
            .create_index_sql("users", &index)
            .unwrap();
        assert_eq!(mysql, "CREATE UNIQUE INDEX `idx_users_email` ON `users` (`email`)");
    }

    #[test]
    fn test_rejects_bad_identifiers() {
        let blueprint = TableBlueprint::new("users; DROP");
        assert!(adapter("sqlite::memory:").create_table_sql(&blueprint).is_err());
    }
}
