//! Migration Runner - Applies pending change files
//!
//! A [`Migrator`] is bound to one connection. Every file applied by a single
//! `up` call shares one batch number, which is what `down` rolls back.
//! There is no transaction around a batch: a failing file stops the run and
//! the files applied before it stay recorded.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use super::definitions::{
    ChangeSet, MigrationFile, MigrationKind, MigrationOptions, MigrationRecord,
    MigrationRunResult, MigrationStatus, StatusEntry,
};
use super::manager::MigrationManager;
use super::repository::MigrationRepository;
use crate::config::MigrationSettings;
use crate::database::DatabaseService;
use crate::error::{MigrationError, OrmError, OrmResult};

pub struct Migrator {
    pub(crate) db: Arc<DatabaseService>,
    pub(crate) connection: String,
    pub(crate) migrations: MigrationManager,
    pub(crate) seeders: Option<MigrationManager>,
    pub(crate) repository: MigrationRepository,
}

impl Migrator {
    /// Migrator using the registry's migration settings
    pub fn new(db: Arc<DatabaseService>, connection: Option<&str>) -> OrmResult<Self> {
        let settings = db.config().migrations.clone();
        Self::with_settings(db, &settings, connection)
    }

    /// Fails when the migrations directory, or a configured seeders
    /// directory, does not exist
    pub fn with_settings(
        db: Arc<DatabaseService>,
        settings: &MigrationSettings,
        connection: Option<&str>,
    ) -> OrmResult<Self> {
        let connection = db.connection(connection)?.name().to_string();

        if !settings.directory.is_dir() {
            return Err(MigrationError::DirectoryNotFound(
                settings.directory.display().to_string(),
            )
            .into());
        }
        let seeders = match &settings.seeders {
            Some(directory) if !directory.is_dir() => {
                return Err(
                    MigrationError::DirectoryNotFound(directory.display().to_string()).into(),
                );
            }
            Some(directory) => Some(MigrationManager::new(directory, MigrationKind::Seeder)),
            None => None,
        };

        let repository = MigrationRepository::new(Arc::clone(&db), &connection, &settings.table);
        Ok(Self {
            migrations: MigrationManager::new(&settings.directory, MigrationKind::Migration),
            seeders,
            repository,
            connection,
            db,
        })
    }

    pub fn connection(&self) -> &str {
        &self.connection
    }

    pub fn has_seeders(&self) -> bool {
        self.seeders.is_some()
    }

    pub(crate) fn manager(&self, kind: MigrationKind) -> OrmResult<&MigrationManager> {
        match kind {
            MigrationKind::Migration => Ok(&self.migrations),
            MigrationKind::Seeder => self.seeders.as_ref().ok_or_else(|| {
                OrmError::configuration("no seeders directory is configured")
            }),
        }
    }

    /// Apply pending migrations
    pub async fn up(&self, options: &MigrationOptions) -> OrmResult<MigrationRunResult> {
        self.run_pending(MigrationKind::Migration, options).await
    }

    /// Apply pending seeders
    pub async fn seed_up(&self, options: &MigrationOptions) -> OrmResult<MigrationRunResult> {
        self.run_pending(MigrationKind::Seeder, options).await
    }

    /// A file tagged for another adapter kind or family is skipped
    pub fn should_up(&self, file: &MigrationFile) -> bool {
        match file.adapter {
            Some(selector) => self
                .db
                .is_registered_adapter(selector, Some(self.connection.as_str())),
            None => true,
        }
    }

    async fn run_pending(
        &self,
        kind: MigrationKind,
        options: &MigrationOptions,
    ) -> OrmResult<MigrationRunResult> {
        let start_time = Instant::now();
        let manager = self.manager(kind)?;

        self.repository.ensure_store().await?;
        let files = manager.load()?;
        let records = self.repository.records(kind).await?;
        check_drift(&files, &records)?;

        let applied: HashSet<&str> = records.iter().map(|r| r.name.as_str()).collect();
        let pending: Vec<&MigrationFile> = files
            .iter()
            .filter(|file| file.matches(options) && !applied.contains(file.name.as_str()))
            .collect();

        let mut result = MigrationRunResult::default();
        for file in pending {
            if !self.should_up(file) {
                info!(connection = %self.connection, file = %file.name, "skipping {} for another adapter", kind);
                result.skipped.push(file.name.clone());
                continue;
            }

            let batch = match result.batch {
                Some(batch) => batch,
                None => {
                    let batch = self.repository.next_batch(kind).await?;
                    result.batch = Some(batch);
                    batch
                }
            };

            info!(connection = %self.connection, batch, "Applying {}: {}", kind, file.name);
            self.apply(&file.name, &file.up).await?;
            self.repository.record(file, batch).await?;
            result.applied.push(file.name.clone());
        }

        result.execution_time_ms = start_time.elapsed().as_millis();
        if result.applied.is_empty() {
            info!(connection = %self.connection, "Nothing to {}", if kind == MigrationKind::Seeder { "seed" } else { "migrate" });
        }
        Ok(result)
    }

    /// Run one direction of a file. Any failure is reported against the file.
    pub(crate) async fn apply(&self, name: &str, changes: &ChangeSet) -> OrmResult<()> {
        let outcome = match changes {
            ChangeSet::Operations(operations) => {
                let mut outcome = Ok(());
                for operation in operations {
                    if let Err(e) = operation.apply(&self.db, &self.connection).await {
                        outcome = Err(format!("{}: {}", operation.describe(), e));
                        break;
                    }
                }
                outcome
            }
            ChangeSet::Sql(statements) => {
                let mut outcome = Ok(());
                for statement in statements {
                    if let Err(e) = self
                        .db
                        .raw(Some(self.connection.as_str()), statement, Vec::new())
                        .await
                    {
                        outcome = Err(e.to_string());
                        break;
                    }
                }
                outcome
            }
        };

        outcome.map_err(|reason| {
            MigrationError::Failed {
                name: name.to_string(),
                reason,
            }
            .into()
        })
    }

    /// Every known file and record with its state on this connection
    pub async fn status(&self) -> OrmResult<Vec<StatusEntry>> {
        self.repository.ensure_store().await?;

        let mut entries = Vec::new();
        let mut kinds = vec![MigrationKind::Migration];
        if self.seeders.is_some() {
            kinds.push(MigrationKind::Seeder);
        }

        for kind in kinds {
            let files = self.manager(kind)?.load()?;
            let records = self.repository.records(kind).await?;
            let by_name: HashMap<&str, &MigrationRecord> =
                records.iter().map(|r| (r.name.as_str(), r)).collect();

            for file in &files {
                let status = match by_name.get(file.name.as_str()) {
                    Some(record) if record.checksum == file.checksum => {
                        MigrationStatus::Applied { batch: record.batch }
                    }
                    Some(record) => MigrationStatus::Drifted { batch: record.batch },
                    None if self.should_up(file) => MigrationStatus::Pending,
                    None => MigrationStatus::Skipped,
                };
                entries.push(StatusEntry {
                    name: file.name.clone(),
                    kind,
                    group: file.group.clone(),
                    status,
                });
            }

            let on_disk: HashSet<&str> = files.iter().map(|f| f.name.as_str()).collect();
            for record in records.iter().filter(|r| !on_disk.contains(r.name.as_str())) {
                entries.push(StatusEntry {
                    name: record.name.clone(),
                    kind,
                    group: None,
                    status: MigrationStatus::Missing { batch: record.batch },
                });
            }
        }

        Ok(entries)
    }
}

/// Fail before anything runs when an applied file changed on disk
fn check_drift(files: &[MigrationFile], records: &[MigrationRecord]) -> OrmResult<()> {
    let by_name: HashMap<&str, &MigrationFile> =
        files.iter().map(|f| (f.name.as_str(), f)).collect();

    for record in records {
        match by_name.get(record.name.as_str()) {
            Some(file) if file.checksum != record.checksum => {
                return Err(MigrationError::ChecksumDrift {
                    name: record.name.clone(),
                    recorded: record.checksum.clone(),
                    current: file.checksum.clone(),
                }
                .into());
            }
            Some(_) => {}
            None => warn!(file = %record.name, "applied {} has no file on disk", record.kind),
        }
    }
    Ok(())
}
