//! Migration & seeder engine
//!
//! Change files are loaded by [`MigrationManager`], applied by
//! [`Migrator::up`] in batches and reverted by [`Migrator::down`]. Each
//! connection keeps its own bookkeeping store.

pub mod definitions;
pub mod manager;
pub mod operations;
pub mod repository;
pub mod rollback;
pub mod runner;

pub use definitions::{
    ChangeSet, FreshResult, MigrationFile, MigrationKind, MigrationOptions, MigrationRecord,
    MigrationRunResult, MigrationStatus, RollbackResult, StatusEntry,
};
pub use manager::MigrationManager;
pub use operations::Operation;
pub use repository::MigrationRepository;
pub use runner::Migrator;
