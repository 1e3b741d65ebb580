//! oxide-automigrate CLI
//!
//! Command-line tool for generating and applying snapshot-diff migrations.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_automigrate::config::{self, ConfigFile, PathOverrides};
use oxide_automigrate::prelude::*;
use oxide_automigrate::writer::DEFAULT_NAME;

/// Generates reversible migrations by diffing schema snapshots.
#[derive(Parser)]
#[command(name = "oxide-automigrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// Directory holding snapshots and migrations.
    #[arg(long, env = "MIGRATIONS_PATH")]
    migrations_path: Option<PathBuf>,

    /// Model file, or directory containing schema.json.
    #[arg(long, env = "MODELS_PATH")]
    models_path: Option<PathBuf>,

    /// Project configuration file.
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a migration from model changes.
    Make {
        /// Show the operations without writing files.
        #[arg(short, long)]
        preview: bool,

        /// Migration name.
        #[arg(short, long, default_value = DEFAULT_NAME)]
        name: String,

        /// Comment stored in the migration.
        #[arg(short, long, default_value = "")]
        comment: String,

        /// Apply the migration right after writing it.
        #[arg(short = 'x', long)]
        execute: bool,
    },

    /// Apply an existing migration.
    Run {
        /// Migration file.
        file: PathBuf,

        /// Index of the first operation to apply.
        #[arg(long, default_value_t = 0)]
        from: usize,
    },

    /// Revert an existing migration.
    Revert {
        /// Migration file.
        file: PathBuf,

        /// Index of the first inverse operation to apply.
        #[arg(long, default_value_t = 0)]
        from: usize,
    },
}

async fn connect(
    database: &str,
) -> anyhow::Result<MigrationExecutor<SqliteQueryInterface, SqliteTypeMapping>> {
    let options = SqliteConnectOptions::from_str(database)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    Ok(MigrationExecutor::new(
        SqliteQueryInterface::new(pool),
        SqliteTypeMapping,
    ))
}

fn report(report: &ExecutionReport) {
    info!(
        revision = %report.revision,
        applied = report.applied,
        total = report.total,
        "Done"
    );
}

async fn run_file(database: &str, file: &Path, from: usize, revert: bool) -> anyhow::Result<()> {
    let executor = connect(database).await?;
    let result = if revert {
        executor.revert(file, from).await?
    } else {
        executor.execute(file, from).await?
    };
    report(&result);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Make {
            preview,
            name,
            comment,
            execute,
        } => {
            let cwd = std::env::current_dir()?;
            let file = ConfigFile::load(&cwd.join(&cli.config))?;
            let overrides = PathOverrides {
                migrations_path: cli.migrations_path,
                models_path: cli.models_path,
            };
            let paths = config::resolve(&overrides, file.as_ref(), &cwd);

            let migrator = Migrator::new(
                SnapshotStore::new(&paths.migrations_path),
                JsonModelReflector::new(&paths.models_path),
            );
            let options = GenerateOptions {
                name,
                comment,
                preview,
            };

            match migrator.generate(&options, Utc::now())? {
                GenerationOutcome::NoChanges => {
                    info!("No changes found. Nothing to do.");
                }
                GenerationOutcome::Preview(migration) => {
                    println!("{}", migration.preview()?);
                }
                GenerationOutcome::Written { written, .. } => {
                    info!("Created migration: {}", written.path.display());
                    if execute {
                        run_file(&cli.database, &written.path, 0, false).await?;
                    }
                }
            }
        }

        Commands::Run { file, from } => {
            run_file(&cli.database, &file, from, false).await?;
        }

        Commands::Revert { file, from } => {
            run_file(&cli.database, &file, from, true).await?;
        }
    }

    Ok(())
}
