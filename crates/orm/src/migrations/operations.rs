//! Portable change operations
//!
//! Written in YAML change files as a list of maps tagged by `op`:
//!
//! ```yaml
//! up:
//!   - op: create_table
//!     table: tests
//!     columns:
//!       - { name: name, type: string }
//!       - { name: age, type: integer }
//! down:
//!   - op: drop_table
//!     table: tests
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backends::Document;
use crate::database::DatabaseService;
use crate::error::OrmResult;
use crate::query::{QueryBuilder, RawStatement};
use crate::schema::{ColumnDefinition, IndexDefinition, TableBlueprint};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Tables get a UUID `id` primary key unless one is declared
    CreateTable(TableBlueprint),
    DropTable {
        table: String,
    },
    RenameTable {
        from: String,
        to: String,
    },
    AddColumn {
        table: String,
        column: ColumnDefinition,
    },
    DropColumn {
        table: String,
        column: String,
    },
    CreateIndex {
        table: String,
        columns: Vec<String>,
        #[serde(default)]
        unique: bool,
        #[serde(default)]
        name: Option<String>,
    },
    Insert {
        table: String,
        rows: Vec<Document>,
    },
    /// `filter` holds equality predicates; an empty filter updates every row
    Update {
        table: String,
        #[serde(default)]
        filter: Document,
        set: Document,
    },
    Delete {
        table: String,
        #[serde(default)]
        filter: Document,
    },
    /// Backend-native statement: SQL for relational connections, a JSON
    /// command for document ones
    Raw {
        statement: String,
        #[serde(default)]
        bindings: Vec<Value>,
    },
}

fn filtered(mut builder: QueryBuilder, filter: &Document) -> QueryBuilder {
    if filter.is_empty() {
        return builder.unfiltered();
    }
    for (column, value) in filter {
        builder = builder.where_eq(column, value.clone());
    }
    builder
}

impl Operation {
    pub fn describe(&self) -> String {
        match self {
            Operation::CreateTable(blueprint) => format!("create table {}", blueprint.table),
            Operation::DropTable { table } => format!("drop table {}", table),
            Operation::RenameTable { from, to } => format!("rename table {} to {}", from, to),
            Operation::AddColumn { table, column } => format!("add column {}.{}", table, column.name),
            Operation::DropColumn { table, column } => format!("drop column {}.{}", table, column),
            Operation::CreateIndex { table, columns, .. } => {
                format!("create index on {} ({})", table, columns.join(", "))
            }
            Operation::Insert { table, rows } => format!("insert {} rows into {}", rows.len(), table),
            Operation::Update { table, .. } => format!("update {}", table),
            Operation::Delete { table, .. } => format!("delete from {}", table),
            Operation::Raw { .. } => "raw statement".to_string(),
        }
    }

    /// Run the operation against one connection
    pub async fn apply(&self, db: &Arc<DatabaseService>, connection: &str) -> OrmResult<()> {
        let adapter = db.resolve(Some(connection)).await?;
        let schema = adapter.schema();
        match self {
            Operation::CreateTable(blueprint) => {
                let mut blueprint = blueprint.clone();
                blueprint.ensure_primary_key();
                schema.create_table(&blueprint).await
            }
            Operation::DropTable { table } => schema.drop_table(table).await,
            Operation::RenameTable { from, to } => schema.rename_table(from, to).await,
            Operation::AddColumn { table, column } => schema.add_column(table, column).await,
            Operation::DropColumn { table, column } => schema.drop_column(table, column).await,
            Operation::CreateIndex {
                table,
                columns,
                unique,
                name,
            } => {
                let index = IndexDefinition {
                    name: name.clone(),
                    columns: columns.clone(),
                    unique: *unique,
                };
                schema.create_index(table, &index).await
            }
            Operation::Insert { table, rows } => {
                db.table_on(connection, table).insert(rows.clone()).await?;
                Ok(())
            }
            Operation::Update { table, filter, set } => {
                filtered(db.table_on(connection, table), filter)
                    .update(set.clone())
                    .await?;
                Ok(())
            }
            Operation::Delete { table, filter } => {
                filtered(db.table_on(connection, table), filter).delete().await?;
                Ok(())
            }
            Operation::Raw {
                statement,
                bindings,
            } => {
                adapter
                    .raw(&RawStatement::new(statement.clone(), bindings.clone()))
                    .await?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    #[test]
    fn test_parse_operations_from_yaml() {
        let yaml = r#"
- op: create_table
  table: tests
  columns:
    - { name: name, type: string }
    - { name: age, type: integer, nullable: true }
- op: insert
  table: tests
  rows:
    - { name: John, age: 30 }
- op: update
  table: tests
  filter: { name: John }
  set: { age: 31 }
- op: drop_table
  table: tests
"#;
        let operations: Vec<Operation> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(operations.len(), 4);
        match &operations[0] {
            Operation::CreateTable(blueprint) => {
                assert_eq!(blueprint.table, "tests");
                assert_eq!(blueprint.columns[1].column_type, ColumnType::Integer);
                assert!(blueprint.columns[1].nullable);
            }
            other => panic!("unexpected operation {:?}", other),
        }
        assert_eq!(operations[2].describe(), "update tests");
    }

    #[test]
    fn test_unknown_operation_is_rejected() {
        let yaml = "- op: truncate\n  table: tests\n";
        assert!(serde_yaml::from_str::<Vec<Operation>>(yaml).is_err());
    }
}
