//! Drill command - practice against a deck file.

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use vocab_common::{Deck, ScriptedEnvironment};

use super::{run_session, summary_lines, GlobalOpts, Stores};

pub async fn run(
    opts: &GlobalOpts,
    deck_path: PathBuf,
    passes: usize,
    shuffle: bool,
    offline: bool,
) -> Result<()> {
    let config = opts.load_config()?;
    let deck = Deck::load(&deck_path)
        .with_context(|| format!("Failed to load deck {}", deck_path.display()))?;
    let stores = Stores::open(&config)?;

    println!();
    println!(
        "  Drilling {} ({} questions, {} pass{})",
        deck_path.display().cyan(),
        deck.question_count(),
        passes.max(1),
        if passes > 1 { "es" } else { "" }
    );

    let summary = run_session(&config, &stores, offline, move || {
        Ok(ScriptedEnvironment::new(deck)
            .with_passes(passes)
            .with_rotated_choices(shuffle))
    })
    .await?;

    for line in summary_lines(&summary) {
        println!("{}", line);
    }

    let stats = stores.stats.snapshot();
    println!(
        "  Accuracy:       {:.1}%   Cache hit rate: {:.1}%",
        stats.accuracy() * 100.0,
        stats.hit_rate() * 100.0
    );
    println!();
    Ok(())
}
