mod db;
mod pipeline;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "locscout-cli")]
#[command(about = "Location scouting command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Deduplicate extracted locations.
    Dedup {
        /// JSON array of locations; `-` reads stdin.
        #[arg(long, short)]
        input: PathBuf,
        /// Write the result here instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Turn locations into search requirements.
    Analyze {
        #[arg(long, short)]
        input: PathBuf,
        #[arg(long)]
        project: String,
        /// Defaults to `LOCSCOUT_DEFAULT_CITY`.
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        max_results: Option<usize>,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Ground requirements to real venues, printing one JSON event per line.
    Ground {
        #[arg(long, short)]
        input: PathBuf,
        #[arg(long)]
        max_concurrent: Option<usize>,
        /// Store candidates in `DATABASE_URL` as scenes complete.
        #[arg(long)]
        store: bool,
    },
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    Ping,
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("nothing to do; see --help");
        return Ok(());
    };

    let config = locscout_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    // stdout carries results, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match command {
        Commands::Dedup { input, output } => {
            pipeline::run_dedup(&config, &input, output.as_deref()).await
        }
        Commands::Analyze {
            input,
            project,
            city,
            max_results,
            output,
        } => {
            let options =
                pipeline::analysis_options(&config, &project, city.as_deref(), max_results)?;
            pipeline::run_analyze(&config, options, &input, output.as_deref()).await
        }
        Commands::Ground {
            input,
            max_concurrent,
            store,
        } => pipeline::run_ground(&config, &input, max_concurrent, store).await,
        Commands::Db { command } => match command {
            DbCommands::Ping => db::run_ping(&config).await,
            DbCommands::Migrate => db::run_migrate(&config).await,
        },
    }
}
