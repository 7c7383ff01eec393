use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{open, print_rollback, print_run, report, FilterArgs, Target};
use tessera_orm::migrations::MigrationStatus;
use tessera_orm::MigrationOptions;

pub async fn up(target: &Target, filter: &FilterArgs) -> anyhow::Result<()> {
    let session = open(target).await?;
    let result = session.migrator.up(&filter.options()).await.map_err(report)?;
    print_run(&result, "migrated");
    session.close().await
}

pub async fn down(target: &Target, filter: &FilterArgs, batch: Option<i64>) -> anyhow::Result<()> {
    let session = open(target).await?;
    let options = MigrationOptions {
        batch,
        ..filter.options()
    };
    let result = session.migrator.down(&options).await.map_err(report)?;
    print_rollback(&result);
    session.close().await
}

pub async fn fresh(target: &Target, seed: bool, force: bool) -> anyhow::Result<()> {
    let session = open(target).await?;
    let connection = session.migrator.connection().to_string();

    if !force && !confirm(&connection).await? {
        println!("{}", style("Aborted").yellow());
        return session.close().await;
    }

    let options = MigrationOptions {
        seed,
        ..MigrationOptions::default()
    };
    let result = session.migrator.fresh(&options).await.map_err(report)?;
    println!(
        "{} dropped {} table(s) on '{}'",
        style("✓").green().bold(),
        result.dropped.len(),
        connection
    );
    print_run(&result.migrations, "migrated");
    if let Some(seeders) = &result.seeders {
        print_run(seeders, "seeded");
    }
    session.close().await
}

pub async fn status(target: &Target) -> anyhow::Result<()> {
    let session = open(target).await?;
    let entries = session.migrator.status().await?;

    println!("Migration Status ({}):", session.migrator.connection());
    println!("================");
    if entries.is_empty() {
        println!("No migrations found");
    }
    for entry in &entries {
        let marker = match entry.status {
            MigrationStatus::Applied { .. } => style("✓").green(),
            MigrationStatus::Pending => style("⏳").yellow(),
            MigrationStatus::Skipped => style("-").dim(),
            MigrationStatus::Drifted { .. } | MigrationStatus::Missing { .. } => style("✗").red(),
        };
        let group = entry
            .group
            .as_deref()
            .map(|group| format!(" [{}]", group))
            .unwrap_or_default();
        println!(
            "  {} {:<8} {}{} {}",
            marker,
            entry.kind.as_str(),
            entry.name,
            style(group).dim(),
            style(&entry.status).dim()
        );
    }
    session.close().await
}

async fn confirm(connection: &str) -> anyhow::Result<bool> {
    println!(
        "{} this drops every table on '{}'. Continue? [y/N]",
        style("Warning:").red().bold(),
        connection
    );
    let mut answer = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut answer)
        .await?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
