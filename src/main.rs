use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use cardscry::{logging, Config, LogLevel};

mod commands;

#[derive(Parser)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "Semantic flashcard search with LLM study guidance", long_about = None)]
struct Cli {
    /// Configuration file (default: ./cardscry.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the card store and ask the LLM for study guidance
    Search {
        /// Free-text query
        query: String,

        /// Output the result as JSON
        #[arg(short, long)]
        json: bool,

        /// Number of candidates kept by the similarity scan
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Interactive search loop over a store loaded once
    Repl,

    /// Show store statistics
    Info {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Write a default configuration file
    Init {
        /// Destination (default: ./cardscry.toml)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // init must work without a readable config
        Commands::Init { path, force } => {
            logging::init(cli.log_level.unwrap_or_default());
            commands::init::execute(path.as_deref(), force)?;
        }
        Commands::Search { query, json, top_k } => {
            let config = load_config(cli.config.as_deref(), cli.log_level)?;
            commands::search::execute(&config, &query, json, top_k)?;
        }
        Commands::Repl => {
            let config = load_config(cli.config.as_deref(), cli.log_level)?;
            commands::repl::execute(&config)?;
        }
        Commands::Info { json } => {
            let config = load_config(cli.config.as_deref(), cli.log_level)?;
            commands::info::execute(&config, json)?;
        }
    }

    Ok(())
}

/// Load the config and start logging at the effective level
fn load_config(path: Option<&Path>, log_level: Option<LogLevel>) -> Result<Config> {
    let config = Config::load(path)?;
    logging::init(log_level.unwrap_or(config.log_level));
    Ok(config)
}
