//! Migration Rollback - Reverting batches and rebuilding from scratch

use std::collections::HashMap;
use std::time::Instant;

use tracing::{info, warn};

use super::definitions::{
    FreshResult, MigrationFile, MigrationKind, MigrationOptions, MigrationRecord, RollbackResult,
};
use super::runner::Migrator;
use crate::error::{MigrationError, OrmResult};

impl Migrator {
    /// Roll back the latest migration batch, or the one named in `options`
    pub async fn down(&self, options: &MigrationOptions) -> OrmResult<RollbackResult> {
        self.rollback(MigrationKind::Migration, options).await
    }

    /// Roll back the latest seeder batch. Seeders without a `down` section
    /// only lose their record.
    pub async fn seed_down(&self, options: &MigrationOptions) -> OrmResult<RollbackResult> {
        self.rollback(MigrationKind::Seeder, options).await
    }

    async fn rollback(
        &self,
        kind: MigrationKind,
        options: &MigrationOptions,
    ) -> OrmResult<RollbackResult> {
        let start_time = Instant::now();
        let manager = self.manager(kind)?;

        self.repository.ensure_store().await?;
        let files = manager.load()?;
        let by_name: HashMap<&str, &MigrationFile> =
            files.iter().map(|f| (f.name.as_str(), f)).collect();
        let records = self.repository.records(kind).await?;

        let matching: Vec<&MigrationRecord> = records
            .iter()
            .filter(|record| match by_name.get(record.name.as_str()) {
                Some(file) => file.matches(options),
                // Without its file a record can only be matched by name
                None => options.group.is_none() && record_matches_file(record, options),
            })
            .collect();

        let target = match options.batch {
            Some(batch) => Some(batch),
            None => matching.iter().map(|record| record.batch).max(),
        };
        let Some(batch) = target else {
            info!(connection = %self.connection, "Nothing to roll back");
            return Ok(RollbackResult {
                execution_time_ms: start_time.elapsed().as_millis(),
                ..RollbackResult::default()
            });
        };

        let mut selected: Vec<&MigrationRecord> = matching
            .into_iter()
            .filter(|record| record.batch == batch)
            .collect();
        selected.sort_by(|a, b| b.name.cmp(&a.name));

        // Every file must be present before any down section runs
        let mut plan = Vec::with_capacity(selected.len());
        for record in selected {
            let file = by_name
                .get(record.name.as_str())
                .ok_or_else(|| MigrationError::MissingFile(record.name.clone()))?;
            plan.push((record, *file));
        }

        let mut result = RollbackResult {
            batch: Some(batch),
            ..RollbackResult::default()
        };
        for (record, file) in plan {
            info!(connection = %self.connection, batch, "Rolling back {}: {}", kind, file.name);
            if file.down.is_empty() {
                if kind == MigrationKind::Migration {
                    warn!(file = %file.name, "migration has no down section");
                }
            } else {
                self.apply(&file.name, &file.down).await?;
            }
            self.repository.remove(record).await?;
            result.rolled_back.push(record.name.clone());
        }

        result.execution_time_ms = start_time.elapsed().as_millis();
        Ok(result)
    }

    /// Drop every table or collection on the connection and re-run all
    /// migrations, then the seeders when `options.seed` is set. Group and
    /// file filters do not apply.
    pub async fn fresh(&self, options: &MigrationOptions) -> OrmResult<FreshResult> {
        let adapter = self.db.resolve(Some(self.connection.as_str())).await?;
        let dropped = adapter.schema().drop_all_tables().await?;
        info!(connection = %self.connection, tables = dropped.len(), "Dropped all tables");

        self.repository.ensure_store().await?;

        let everything = MigrationOptions::default();
        let migrations = self.up(&everything).await?;
        let seeders = if options.seed {
            Some(self.seed_up(&everything).await?)
        } else {
            None
        };

        Ok(FreshResult {
            dropped,
            migrations,
            seeders,
        })
    }
}

fn record_matches_file(record: &MigrationRecord, options: &MigrationOptions) -> bool {
    match options.file.as_deref() {
        Some(file) => {
            let file = file
                .trim_end_matches(".yaml")
                .trim_end_matches(".yml")
                .trim_end_matches(".sql");
            record.name == file
        }
        None => true,
    }
}
