mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use linkmem::config::LinkmemConfig;

#[derive(Parser)]
#[command(name = "linkmem", version, about = "Topic memory for classified links")]
struct Cli {
    /// Config file (default: ~/.linkmem/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List topics and their document counts
    Topics {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Route classified links from a JSON-lines file into topics
    Ingest {
        /// JSON-lines file, one classified link per line
        file: PathBuf,
        /// Documents embedded concurrently
        #[arg(long, default_value_t = 4)]
        workers: usize,
        /// Update centroids and write entries without appending to topic documents
        #[arg(long)]
        no_append: bool,
        /// Override routing.similarity_threshold
        #[arg(long)]
        threshold: Option<f64>,
        /// Parse the file and list what would be routed, writing nothing
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => LinkmemConfig::load_from(path)?,
        None => LinkmemConfig::load()?,
    };

    // Log to stderr so stdout stays clean for tables and error markers.
    let filter = EnvFilter::try_new(&config.logging.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Topics { json } => {
            cli::topics::topics(&config, json).await?;
        }
        Command::Ingest {
            file,
            workers,
            no_append,
            threshold,
            dry_run,
        } => {
            let options = cli::ingest::IngestOptions {
                workers,
                append: !no_append,
                threshold,
                dry_run,
            };
            cli::ingest::ingest(config, &file, options).await?;
        }
    }

    Ok(())
}
