//! Migration Definitions - Core types shared by the loader, runner and
//! rollback

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::operations::Operation;
use crate::backends::AdapterSelector;

/// Schema migrations and data seeders are tracked separately
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationKind {
    Migration,
    Seeder,
}

impl MigrationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationKind::Migration => "migration",
            MigrationKind::Seeder => "seeder",
        }
    }
}

impl fmt::Display for MigrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statements of one direction of a change file
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeSet {
    /// Portable operations from a YAML file
    Operations(Vec<Operation>),
    /// Native statements from a `.sql` file
    Sql(Vec<String>),
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        match self {
            ChangeSet::Operations(operations) => operations.is_empty(),
            ChangeSet::Sql(statements) => statements.is_empty(),
        }
    }
}

/// A change file discovered on disk
#[derive(Debug, Clone)]
pub struct MigrationFile {
    /// File stem, starting with its date prefix
    pub name: String,
    pub path: PathBuf,
    pub kind: MigrationKind,
    pub group: Option<String>,
    /// Restricts the file to a backend kind or family
    pub adapter: Option<AdapterSelector>,
    /// SHA-256 of the file bytes, hex encoded
    pub checksum: String,
    pub up: ChangeSet,
    pub down: ChangeSet,
}

impl MigrationFile {
    /// Whether the file passes the group and file filters
    pub fn matches(&self, options: &MigrationOptions) -> bool {
        let group_matches = options
            .group
            .as_deref()
            .map_or(true, |group| self.group.as_deref() == Some(group));
        let file_matches = options.file.as_deref().map_or(true, |file| {
            let file = file.trim_end_matches(".yaml").trim_end_matches(".yml").trim_end_matches(".sql");
            self.name == file
        });
        group_matches && file_matches
    }
}

/// One row of the bookkeeping store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub id: String,
    pub name: String,
    pub batch: i64,
    pub checksum: String,
    #[serde(rename = "type")]
    pub kind: MigrationKind,
    /// RFC 3339
    pub applied_at: String,
}

/// Filters accepted by every migration command
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationOptions {
    pub group: Option<String>,
    pub file: Option<String>,
    /// Rollback target; defaults to the latest matching batch
    pub batch: Option<i64>,
    /// Run seeders after `fresh`
    pub seed: bool,
}

impl MigrationOptions {
    pub fn group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    pub fn file(mut self, file: &str) -> Self {
        self.file = Some(file.to_string());
        self
    }

    pub fn batch(mut self, batch: i64) -> Self {
        self.batch = Some(batch);
        self
    }

    pub fn with_seed(mut self) -> Self {
        self.seed = true;
        self
    }
}

/// Result of running pending files
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationRunResult {
    /// Batch the applied files were recorded under
    pub batch: Option<i64>,
    pub applied: Vec<String>,
    /// Files skipped because their adapter tag does not match the connection
    pub skipped: Vec<String>,
    pub execution_time_ms: u128,
}

/// Result of rolling back one batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RollbackResult {
    pub batch: Option<i64>,
    pub rolled_back: Vec<String>,
    pub execution_time_ms: u128,
}

/// Result of `fresh`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FreshResult {
    pub dropped: Vec<String>,
    pub migrations: MigrationRunResult,
    pub seeders: Option<MigrationRunResult>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationStatus {
    Pending,
    Applied { batch: i64 },
    /// Applied, but the file changed since
    Drifted { batch: i64 },
    /// Not applicable to this connection's adapter
    Skipped,
    /// Recorded as applied, but the file is gone
    Missing { batch: i64 },
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationStatus::Pending => write!(f, "pending"),
            MigrationStatus::Applied { batch } => write!(f, "applied (batch {})", batch),
            MigrationStatus::Drifted { batch } => write!(f, "drifted (batch {})", batch),
            MigrationStatus::Skipped => write!(f, "skipped"),
            MigrationStatus::Missing { batch } => write!(f, "missing file (batch {})", batch),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusEntry {
    pub name: String,
    pub kind: MigrationKind,
    pub group: Option<String>,
    pub status: MigrationStatus,
}
