//! Vocabctl - answers vocabulary practice items from a cache of verified
//! answers, asking the oracle only for questions it has not seen.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vocabctl::commands::{self, CacheAction, ConfigAction};
use vocabctl::{logging, GlobalOpts};

#[derive(Parser)]
#[command(name = "vocabctl")]
#[command(about = "Vocabulary practice assistant", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/vocab-assistant/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for the answer cache and statistics
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer items from a page driver speaking JSON lines on stdin/stdout
    Run {
        /// Use the offline sequential oracle instead of the HTTP one
        #[arg(long)]
        offline: bool,
    },

    /// Practice against a scripted deck file
    Drill {
        /// Deck JSON file
        deck: PathBuf,

        /// Number of passes over the deck
        #[arg(long, default_value_t = 1)]
        passes: usize,

        /// Change choice order on every pass
        #[arg(long)]
        shuffle: bool,

        /// Use the offline sequential oracle instead of the HTTP one
        #[arg(long)]
        offline: bool,
    },

    /// Show answer statistics
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,

        /// Zero all counters
        #[arg(long)]
        reset: bool,
    },

    /// Inspect and maintain the answer cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Show or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let opts = GlobalOpts {
        config: cli.config,
        state_dir: cli.state_dir,
    };

    match cli.command {
        Commands::Run { offline } => commands::run::run(&opts, offline).await,
        Commands::Drill {
            deck,
            passes,
            shuffle,
            offline,
        } => commands::drill::run(&opts, deck, passes, shuffle, offline).await,
        Commands::Stats { json, reset } => commands::stats::run(&opts, json, reset),
        Commands::Cache { action } => commands::cache::run(&opts, action),
        Commands::Config { action } => commands::config::run(&opts, action),
    }
}
