//! Command modules for vocabctl
//!
//! - run: session over the JSON-lines bridge
//! - drill: session over a scripted deck
//! - stats: persisted counters
//! - cache: answer cache maintenance
//! - config: effective configuration

pub mod cache;
pub mod config;
pub mod drill;
pub mod run;
pub mod stats;

use anyhow::{Context, Result};
use clap::Subcommand;
use owo_colors::OwoColorize;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use vocab_common::{
    AnswerEngine, Environment, HttpOracle, Oracle, OracleConfig, SequentialOracle, Session,
    SessionEnd, SessionSummary, StopFlag, VocabConfig,
};
use vocab_shared::{FingerprintCache, StatsStore};

pub(crate) const THIN_SEP: &str = "------------------------------------------------------------";

/// Flags shared by every command
#[derive(Debug, Clone, Default)]
pub struct GlobalOpts {
    pub config: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
}

impl GlobalOpts {
    /// Effective configuration with `--state-dir` applied
    pub fn load_config(&self) -> Result<VocabConfig> {
        let mut config = VocabConfig::load(self.config.as_deref())?;
        if let Some(dir) = &self.state_dir {
            config.paths.state_dir = Some(dir.clone());
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum CacheAction {
    /// List cached answers, most recently used first
    Show {
        /// Maximum number of entries to list
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Drop expired entries and trim to the size limit
    Prune,
    /// Remove every entry
    Clear,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration (API key redacted)
    Show,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Answer cache and statistics, opened from the state directory
pub struct Stores {
    pub cache: Arc<FingerprintCache>,
    pub stats: Arc<StatsStore>,
}

impl Stores {
    pub fn open(config: &VocabConfig) -> Result<Self> {
        let dir = config.paths.state_dir();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create state directory {}", dir.display()))?;

        Ok(Self {
            cache: Arc::new(FingerprintCache::open(config.paths.cache_path(), config.cache.clone())),
            stats: Arc::new(StatsStore::load(config.paths.stats_path())),
        })
    }

    /// Retry any write that failed during the session
    pub fn sync(&self) {
        if self.cache.pending_sync() {
            if let Err(e) = self.cache.flush() {
                warn!("Answer cache not saved: {}", e);
            }
        }
        if self.stats.pending_sync() {
            if let Err(e) = self.stats.persist() {
                warn!("Statistics not saved: {}", e);
            }
        }
    }
}

fn build_oracle(config: OracleConfig, offline: bool) -> Result<Box<dyn Oracle>> {
    if offline {
        info!("Using offline sequential oracle");
        return Ok(Box::new(SequentialOracle));
    }
    Ok(Box::new(HttpOracle::new(config)?))
}

/// Exit status after a second Ctrl-C, as a shell reports SIGINT
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Run a session on a blocking thread. Ctrl-C requests a cooperative stop;
/// a second Ctrl-C exits immediately.
pub(crate) async fn run_session<E, F>(
    config: &VocabConfig,
    stores: &Stores,
    offline: bool,
    make_env: F,
) -> Result<SessionSummary>
where
    E: Environment + 'static,
    F: FnOnce() -> Result<E> + Send + 'static,
{
    let stop = StopFlag::new();
    let on_signal = stop.clone();
    let signal_task = tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if interrupt(&on_signal) {
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }
        }
    });

    let engine = AnswerEngine::new(
        stores.cache.clone(),
        stores.stats.clone(),
        config.engine.clone(),
        stop,
    );
    let oracle_config = config.oracle.clone();
    let session_config = config.session.clone();

    // The blocking HTTP client must be built off the async runtime
    let result = tokio::task::spawn_blocking(move || -> Result<SessionSummary> {
        let oracle = build_oracle(oracle_config, offline)?;
        let mut env = make_env()?;
        let summary = Session::new(&engine, &*oracle, session_config).run(&mut env)?;
        Ok(summary)
    })
    .await
    .context("Session task failed")?;

    signal_task.abort();
    stores.sync();
    result
}

/// Handle one Ctrl-C. Returns true when the process should exit now.
fn interrupt(stop: &StopFlag) -> bool {
    if stop.is_requested() {
        warn!("Interrupted again, exiting without waiting for the page");
        return true;
    }
    warn!("Interrupted, stopping after the current step (up to the reply timeout); press Ctrl-C again to quit now");
    stop.request();
    false
}

/// Human-readable session summary
pub(crate) fn summary_lines(summary: &SessionSummary) -> Vec<String> {
    let end = match summary.end {
        SessionEnd::Finished => "finished".green().to_string(),
        SessionEnd::Stopped => "stopped".yellow().to_string(),
        SessionEnd::Stalled => "stalled".red().to_string(),
    };

    vec![
        String::new(),
        format!("{}", "  Session Summary".bold()),
        THIN_SEP.to_string(),
        format!("  Session:        {}", summary.session_id),
        format!("  Ended:          {}", end),
        format!("  Questions:      {}", summary.questions),
        format!("  Correct:        {}", summary.correct),
        format!("  From cache:     {}", summary.from_cache),
        format!("  Exhausted:      {}", summary.exhausted),
        format!("  Skipped:        {}", summary.skipped),
        format!("  Bonus events:   {}", summary.bonus_events),
        format!("  Rounds:         {}", summary.rounds_completed),
        format!("  Pruned:         {}", summary.pruned),
        THIN_SEP.to_string(),
    ]
}
