//! Shared fixtures. Every scenario runs against SQLite in memory and the
//! in-process document store.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tempfile::TempDir;
use tessera_orm::{
    ColumnDefinition, ColumnType, ConnectionConfig, DatabaseConfig, DatabaseService, Document,
    MigrationSettings, TableBlueprint,
};

pub fn backends() -> Vec<(&'static str, ConnectionConfig)> {
    vec![
        ("sqlite", ConnectionConfig::from_url("sqlite::memory:").unwrap()),
        ("memory", ConnectionConfig::memory()),
    ]
}

pub fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {}", other),
    }
}

pub async fn connect(config: ConnectionConfig) -> Arc<DatabaseService> {
    let db = DatabaseService::register(DatabaseConfig::new("main", config))
        .unwrap()
        .into_shared();
    db.boot().await.unwrap();
    db
}

pub async fn create_table(db: &DatabaseService, connection: Option<&str>, blueprint: &TableBlueprint) {
    let adapter = db.resolve(connection).await.unwrap();
    adapter.schema().create_table(blueprint).await.unwrap();
}

pub fn users_blueprint() -> TableBlueprint {
    let mut blueprint = TableBlueprint::new("users");
    blueprint
        .id()
        .string("name", Some(255))
        .column(ColumnDefinition::new("email", ColumnType::String).nullable())
        .column(ColumnDefinition::new("age", ColumnType::Integer).nullable())
        .column(ColumnDefinition::new("role", ColumnType::String).nullable())
        .column(ColumnDefinition::new("password", ColumnType::String).nullable())
        .column(ColumnDefinition::new("created_at", ColumnType::Timestamp).nullable())
        .column(ColumnDefinition::new("updated_at", ColumnType::Timestamp).nullable());
    blueprint
}

pub fn posts_blueprint() -> TableBlueprint {
    let mut blueprint = TableBlueprint::new("posts");
    blueprint
        .id()
        .string("user_id", Some(36))
        .string("title", Some(255));
    blueprint
}

/// A registry plus a users table, seeded with three people
pub async fn users_fixture(config: ConnectionConfig) -> Arc<DatabaseService> {
    let db = connect(config).await;
    create_table(&db, None, &users_blueprint()).await;
    db.table("users")
        .insert(vec![
            doc(serde_json::json!({"name": "John", "email": "john@example.com", "age": 30})),
            doc(serde_json::json!({"name": "Jane", "email": "jane@example.com", "age": 25})),
            doc(serde_json::json!({"name": "Tim", "age": 12})),
        ])
        .await
        .unwrap();
    db
}

/// Temporary migrations and seeders directories
pub struct MigrationDirs {
    pub root: TempDir,
}

impl MigrationDirs {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("migrations")).unwrap();
        std::fs::create_dir_all(root.path().join("seeders")).unwrap();
        Self { root }
    }

    pub fn migrations(&self) -> PathBuf {
        self.root.path().join("migrations")
    }

    pub fn seeders(&self) -> PathBuf {
        self.root.path().join("seeders")
    }

    pub fn settings(&self) -> MigrationSettings {
        MigrationSettings {
            directory: self.migrations(),
            seeders: Some(self.seeders()),
            table: "migrations".to_string(),
        }
    }

    pub fn write_migration(&self, name: &str, content: &str) {
        write(&self.migrations(), name, content);
    }

    pub fn write_seeder(&self, name: &str, content: &str) {
        write(&self.seeders(), name, content);
    }
}

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

pub const CREATE_TESTS_TABLE: &str = r#"group: testing
up:
  - op: create_table
    table: tests
    columns:
      - { name: name, type: string }
      - { name: age, type: integer, nullable: true }
down:
  - op: drop_table
    table: tests
"#;

pub const CREATE_PEOPLE_TABLE: &str = r#"up:
  - op: create_table
    table: people
    columns:
      - { name: name, type: string }
down:
  - op: drop_table
    table: people
"#;

pub const SEED_TESTS: &str = r#"up:
  - op: insert
    table: tests
    rows:
      - { name: John, age: 30 }
      - { name: Jane, age: 25 }
down:
  - op: delete
    table: tests
    filter: {}
"#;
