mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use commands::{migrate, seed, FilterArgs, Target};
use logging::{init_logging, LoggingConfig};

#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Migrations and seeders for tessera connections", version)]
struct Cli {
    /// Database configuration file (defaults to ./database.yaml, then the environment)
    #[arg(long, global = true, env = "TESSERA_CONFIG")]
    config: Option<PathBuf>,

    /// Connection to operate on (defaults to the configured default)
    #[arg(long, global = true)]
    connection: Option<String>,

    /// Debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database migration management
    Migrate {
        #[command(subcommand)]
        migrate_command: MigrateCommands,
    },

    /// Database seeding
    #[command(name = "db:seed")]
    DbSeed {
        #[command(subcommand)]
        seed_command: SeedCommands,
    },
}

#[derive(Subcommand)]
enum MigrateCommands {
    /// Run pending migrations
    Up {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Roll back the latest batch
    Down {
        #[command(flatten)]
        filter: FilterArgs,

        /// Batch to roll back instead of the latest
        #[arg(long)]
        batch: Option<i64>,
    },

    /// Drop everything and migrate from scratch
    Fresh {
        /// Run seeders afterwards
        #[arg(long)]
        seed: bool,

        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Show migration status
    Status,
}

#[derive(Subcommand)]
enum SeedCommands {
    /// Run pending seeders
    Up {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Roll back the latest seeder batch
    Down {
        #[command(flatten)]
        filter: FilterArgs,

        #[arg(long)]
        batch: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&LoggingConfig::default().verbose(cli.verbose).json(cli.log_json))?;

    let target = Target {
        config: cli.config,
        connection: cli.connection,
    };

    match cli.command {
        Commands::Migrate { migrate_command } => match migrate_command {
            MigrateCommands::Up { filter } => migrate::up(&target, &filter).await?,
            MigrateCommands::Down { filter, batch } => {
                migrate::down(&target, &filter, batch).await?
            }
            MigrateCommands::Fresh { seed, force } => migrate::fresh(&target, seed, force).await?,
            MigrateCommands::Status => migrate::status(&target).await?,
        },
        Commands::DbSeed { seed_command } => match seed_command {
            SeedCommands::Up { filter } => seed::up(&target, &filter).await?,
            SeedCommands::Down { filter, batch } => seed::down(&target, &filter, batch).await?,
        },
    }

    Ok(())
}
