//! # tessera-orm: Polyglot data access
//!
//! One query builder and one model layer over relational engines (through
//! sqlx), MongoDB and an in-process document store, plus a migration and
//! seeder engine that tracks applied change files per connection.
//!
//! ```no_run
//! use tessera_orm::{ConnectionConfig, DatabaseConfig, DatabaseService};
//!
//! # async fn demo() -> tessera_orm::OrmResult<()> {
//! let config = DatabaseConfig::new("main", ConnectionConfig::from_url("sqlite::memory:")?);
//! let db = DatabaseService::register(config)?.into_shared();
//! db.boot().await?;
//!
//! let adults = db.table("users").where_gte("age", 18).order_by("name").get().await?;
//! # let _ = adults;
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod config;
pub mod database;
pub mod error;
pub mod event_error;
pub mod events;
pub mod migrations;
pub mod model;
pub mod observers;
pub mod query;
pub mod relationships;
pub mod schema;
pub mod security;

pub use backends::{
    Adapter, AdapterFamily, AdapterKind, AdapterSelector, ConnectionState, Document,
};
pub use config::{ConnectionConfig, DatabaseConfig, MigrationSettings, PoolConfig};
pub use database::{Connection, DatabaseService};
pub use error::{MigrationError, OrmError, OrmResult, QueryError};
pub use event_error::EventError;
pub use events::{LifecycleEvent, ModelObserver};
pub use migrations::{MigrationKind, MigrationOptions, Migrator};
pub use model::{Cast, Encrypter, Model, ModelDefinition, ModelQuery};
pub use query::{OrderDirection, Page, QueryBuilder, QueryExpression, QueryOperator};
pub use relationships::{Relation, RelationshipResolver, RelationshipType};
pub use schema::{ColumnDefinition, ColumnType, SchemaPort, TableBlueprint};
