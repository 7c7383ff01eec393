pub mod migrate;
pub mod seed;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use console::style;
use tessera_orm::migrations::{MigrationRunResult, RollbackResult};
use tessera_orm::{
    DatabaseConfig, DatabaseService, MigrationError, MigrationOptions, Migrator, OrmError,
};
use tracing::debug;

/// Looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG: &str = "database.yaml";

/// Flags shared by every command that selects files
#[derive(Debug, Clone, Default, clap::Args)]
pub struct FilterArgs {
    /// Only files declaring this group
    #[arg(long)]
    pub group: Option<String>,

    /// Only this file (name with or without extension)
    #[arg(long)]
    pub file: Option<String>,
}

impl FilterArgs {
    pub fn options(&self) -> MigrationOptions {
        MigrationOptions {
            group: self.group.clone(),
            file: self.file.clone(),
            ..MigrationOptions::default()
        }
    }
}

/// Where the console finds its database configuration
#[derive(Debug, Clone, Default)]
pub struct Target {
    pub config: Option<PathBuf>,
    pub connection: Option<String>,
}

pub struct Session {
    pub db: Arc<DatabaseService>,
    pub migrator: Migrator,
}

impl Session {
    pub async fn close(self) -> anyhow::Result<()> {
        self.db.close_all().await?;
        Ok(())
    }
}

/// An explicit `--config` must exist; otherwise `database.yaml` is used when
/// present and the environment when it is not
pub fn load_config(path: Option<&Path>) -> anyhow::Result<DatabaseConfig> {
    let config = match path {
        Some(path) => DatabaseConfig::from_yaml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG).exists() => {
            DatabaseConfig::from_yaml_file(DEFAULT_CONFIG)
                .with_context(|| format!("loading {}", DEFAULT_CONFIG))?
        }
        None => DatabaseConfig::from_env().context(
            "no database.yaml found and the environment does not describe a connection",
        )?,
    };
    Ok(config)
}

pub async fn open(target: &Target) -> anyhow::Result<Session> {
    let config = load_config(target.config.as_deref())?;
    let db = DatabaseService::register(config)?.into_shared();
    let connection = target.connection.as_deref();
    let name = db.connection(connection)?.name().to_string();
    debug!(connection = %name, "opening console session");
    db.connect(&name).await?;
    let migrator = Migrator::new(Arc::clone(&db), connection)?;
    Ok(Session { db, migrator })
}

/// Print a per-file failure line before the error reaches `main`
pub fn report(err: OrmError) -> anyhow::Error {
    if let OrmError::Migration(MigrationError::Failed { name, reason }) = &err {
        eprintln!("{} {} {}", style("✗").red().bold(), style(name).bold(), reason);
    }
    anyhow::Error::new(err)
}

pub fn print_run(result: &MigrationRunResult, verb: &str) {
    for name in &result.applied {
        println!("{} {} {}", style("✓").green().bold(), verb, name);
    }
    for name in &result.skipped {
        println!("{} skipped {} (adapter)", style("-").dim(), style(name).dim());
    }
    match result.batch {
        Some(batch) if !result.applied.is_empty() => println!(
            "{} file(s) in batch {} ({} ms)",
            result.applied.len(),
            batch,
            result.execution_time_ms
        ),
        _ => println!("{}", style("Nothing to do").dim()),
    }
}

pub fn print_rollback(result: &RollbackResult) {
    for name in &result.rolled_back {
        println!("{} rolled back {}", style("✓").yellow().bold(), name);
    }
    match result.batch {
        Some(batch) => println!(
            "{} file(s) from batch {} ({} ms)",
            result.rolled_back.len(),
            batch,
            result.execution_time_ms
        ),
        None => println!("{}", style("Nothing to roll back").dim()),
    }
}
