//! Table blueprints
//!
//! A backend-neutral description of a table or collection. Relational
//! adapters compile it to DDL; document adapters use it for collection
//! creation and unique indexes, ignoring column types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Portable column types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    String,
    Text,
    Integer,
    BigInteger,
    Float,
    Boolean,
    Timestamp,
    Date,
    Json,
    Uuid,
}

/// A single column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub length: Option<u32>,
    #[serde(default)]
    pub default: Option<Value>,
}

impl ColumnDefinition {
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            nullable: false,
            unique: false,
            primary: false,
            length: None,
            default: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// An index over one or more columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    #[serde(default)]
    pub name: Option<String>,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

impl IndexDefinition {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            name: None,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Explicit name, or `idx_<table>_<columns>`
    pub fn resolved_name(&self, table: &str) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("idx_{}_{}", table, self.columns.join("_")),
        }
    }
}

/// Table builder for create-table operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableBlueprint {
    pub table: String,
    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,
    #[serde(default)]
    pub indexes: Vec<IndexDefinition>,
    #[serde(default)]
    pub if_not_exists: bool,
}

impl TableBlueprint {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            indexes: Vec::new(),
            if_not_exists: false,
        }
    }

    /// Add a column
    pub fn column(&mut self, column: ColumnDefinition) -> &mut Self {
        self.columns.push(column);
        self
    }

    /// Add a string primary key holding generated UUIDs
    pub fn id(&mut self) -> &mut Self {
        self.column(ColumnDefinition::new("id", ColumnType::Uuid).primary())
    }

    pub fn string(&mut self, name: &str, length: Option<u32>) -> &mut Self {
        let mut column = ColumnDefinition::new(name, ColumnType::String);
        column.length = length;
        self.column(column)
    }

    pub fn text(&mut self, name: &str) -> &mut Self {
        self.column(ColumnDefinition::new(name, ColumnType::Text))
    }

    pub fn integer(&mut self, name: &str) -> &mut Self {
        self.column(ColumnDefinition::new(name, ColumnType::Integer))
    }

    pub fn boolean(&mut self, name: &str) -> &mut Self {
        self.column(ColumnDefinition::new(name, ColumnType::Boolean))
    }

    pub fn json(&mut self, name: &str) -> &mut Self {
        self.column(ColumnDefinition::new(name, ColumnType::Json).nullable())
    }

    /// Add nullable `created_at` / `updated_at` columns
    pub fn timestamps(&mut self) -> &mut Self {
        self.column(ColumnDefinition::new("created_at", ColumnType::Timestamp).nullable());
        self.column(ColumnDefinition::new("updated_at", ColumnType::Timestamp).nullable())
    }

    pub fn index(&mut self, columns: &[&str]) -> &mut Self {
        self.indexes.push(IndexDefinition::new(columns));
        self
    }

    pub fn unique(&mut self, columns: &[&str]) -> &mut Self {
        self.indexes.push(IndexDefinition::new(columns).unique());
        self
    }

    pub fn if_not_exists(&mut self) -> &mut Self {
        self.if_not_exists = true;
        self
    }

    pub fn primary_key(&self) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.primary)
    }

    /// Prepend a UUID `id` primary key unless a primary column is declared.
    /// Every record carries a string id, so tables created from portable
    /// definitions get one by default.
    pub fn ensure_primary_key(&mut self) -> &mut Self {
        if self.primary_key().is_none() {
            if let Some(existing) = self.columns.iter_mut().find(|c| c.name == "id") {
                existing.primary = true;
            } else {
                self.columns
                    .insert(0, ColumnDefinition::new("id", ColumnType::Uuid).primary());
            }
        }
        self
    }

    /// Every index implied by the blueprint, column-level unique flags included
    pub fn all_indexes(&self) -> Vec<IndexDefinition> {
        let mut indexes: Vec<IndexDefinition> = self
            .columns
            .iter()
            .filter(|c| c.unique && !c.primary)
            .map(|c| IndexDefinition::new(&[c.name.as_str()]).unique())
            .collect();
        indexes.extend(self.indexes.iter().cloned());
        indexes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_primary_key_prepends_id() {
        let mut blueprint = TableBlueprint::new("tests");
        blueprint.string("name", None).ensure_primary_key();

        assert_eq!(blueprint.columns[0].name, "id");
        assert!(blueprint.columns[0].primary);
        assert_eq!(blueprint.columns.len(), 2);
    }

    #[test]
    fn test_ensure_primary_key_keeps_declared_key() {
        let mut blueprint = TableBlueprint::new("codes");
        blueprint
            .column(ColumnDefinition::new("code", ColumnType::String).primary())
            .ensure_primary_key();

        assert_eq!(blueprint.columns.len(), 1);
        assert_eq!(blueprint.primary_key().unwrap().name, "code");
    }

    #[test]
    fn test_all_indexes_includes_unique_columns() {
        let mut blueprint = TableBlueprint::new("users");
        blueprint
            .id()
            .column(ColumnDefinition::new("email", ColumnType::String).unique())
            .index(&["name"]);

        let indexes = blueprint.all_indexes();
        assert_eq!(indexes.len(), 2);
        assert!(indexes[0].unique);
        assert_eq!(indexes[0].resolved_name("users"), "idx_users_email");
        assert_eq!(indexes[1].resolved_name("users"), "idx_users_name");
    }

    #[test]
    fn test_blueprint_from_yaml() {
        let yaml = r#"
table: tests
columns:
  - name: name
    type: string
    length: 120
  - name: age
    type: integer
    nullable: true
"#;
        let blueprint: TableBlueprint = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(blueprint.columns[0].length, Some(120));
        assert_eq!(blueprint.columns[1].column_type, ColumnType::Integer);
        assert!(blueprint.columns[1].nullable);
    }
}
