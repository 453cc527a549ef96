//! Run command - answer items from an external page driver.
//!
//! The driver talks JSON lines on our stdin/stdout, so everything meant for
//! a human goes to stderr.

use anyhow::Result;
use std::io::{self, BufReader};
use std::sync::mpsc::Receiver;
use std::thread;
use vocab_common::BridgeEnvironment;
use vocab_shared::Statistics;

use super::{run_session, summary_lines, GlobalOpts, Stores};

pub async fn run(opts: &GlobalOpts, offline: bool) -> Result<()> {
    let config = opts.load_config()?;
    let stores = Stores::open(&config)?;
    let status = spawn_status_line(stores.stats.subscribe());

    let summary = run_session(&config, &stores, offline, || {
        Ok(BridgeEnvironment::new(BufReader::new(io::stdin()), io::stdout()))
    })
    .await;

    // Dropping the last store handle closes the status channel
    drop(stores);
    let _ = status.join();

    for line in summary_lines(&summary?) {
        eprintln!("{}", line);
    }
    Ok(())
}

/// Print a status line after every counter change
fn spawn_status_line(updates: Receiver<Statistics>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for stats in updates {
            eprintln!(
                "Correct: {} | Wrong: {} | Bonus: {} | Cache hits: {}",
                stats.correct_answers, stats.wrong_answers, stats.bonus_events, stats.cache_hits
            );
        }
    })
}
