//! Freezefork CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use config::Settings;

#[derive(Parser)]
#[command(name = "freezefork")]
#[command(about = "Version control for CAD assemblies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (defaults to ./freezefork.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the backend is reachable and healthy
    Health,
    /// List projects on the backend
    Projects,
    /// Create a project
    CreateProject {
        name: String,

        /// Optional project description
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List the commits of a project
    Commits {
        project_id: String,
    },
    /// Scan an assembly and print its manifest and issues
    Scan {
        /// Reference map describing the assembly
        map: PathBuf,
    },
    /// Scan and package an assembly without uploading it
    Package {
        map: PathBuf,

        #[command(flatten)]
        commit: CommitArgs,

        /// Write the package as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Scan, package and upload an assembly as a new commit
    Submit {
        map: PathBuf,

        #[command(flatten)]
        commit: CommitArgs,

        /// Upload even when required files are missing
        #[arg(long)]
        allow_unresolved: bool,
    },
    /// Show version
    Version,
}

#[derive(clap::Args)]
pub struct CommitArgs {
    /// Commit message
    #[arg(short, long)]
    pub message: String,

    /// Commit author (defaults to the configured author)
    #[arg(short, long)]
    pub author: Option<String>,

    /// Target project id
    #[arg(short, long)]
    pub project: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!(
                    "freezefork={log_level},freezefork_core={log_level},freezefork_sync={log_level}"
                ))
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::debug!("Freezefork v{}", env!("CARGO_PKG_VERSION"));
    let settings = Settings::load(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Health => commands::health(&settings).await,
        Commands::Projects => commands::projects(&settings).await,
        Commands::CreateProject { name, description } => {
            commands::create_project(&settings, name, description).await
        }
        Commands::Commits { project_id } => commands::commits(&settings, project_id).await,
        Commands::Scan { map } => commands::scan(&settings, map).await,
        Commands::Package { map, commit, output } => {
            commands::package(&settings, map, commit, output).await
        }
        Commands::Submit {
            map,
            commit,
            allow_unresolved,
        } => commands::submit(&settings, map, commit, allow_unresolved).await,
        Commands::Version => {
            println!("Freezefork v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!("{:#}", e);
    }
    result
}
