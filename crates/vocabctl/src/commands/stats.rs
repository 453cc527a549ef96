//! Stats Command - persisted answer counters
//!
//! Sections:
//! - [ANSWERS] correct, wrong, exhausted, accuracy
//! - [CACHE] hits, misses, invalidations, pruned, hit rate
//! - [SESSION] bonus events

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use vocab_shared::Statistics;

use super::{GlobalOpts, Stores, THIN_SEP};

/// Run the stats command
pub fn run(opts: &GlobalOpts, json: bool, reset: bool) -> Result<()> {
    let config = opts.load_config()?;
    let store = Stores::open(&config)?.stats;

    if reset {
        store.reset();
        store.persist().context("Failed to save statistics")?;
        if !json {
            println!("Statistics reset.");
            return Ok(());
        }
    }

    let stats = store.snapshot();
    if json {
        println!("{}", to_json(&stats)?);
        return Ok(());
    }

    println!();
    println!("{}", "  Vocabulary Assistant Statistics".bold());
    println!("{}", THIN_SEP);
    println!();
    print_answers_section(&stats);
    print_cache_section(&stats);
    print_session_section(&stats);
    println!("{}", THIN_SEP);
    if let Some(path) = store.path() {
        println!("  Stored in {}", path.display());
    }
    println!();
    Ok(())
}

/// Counters plus derived rates
fn to_json(stats: &Statistics) -> Result<String> {
    let mut value = serde_json::to_value(stats)?;
    if let Some(map) = value.as_object_mut() {
        map.insert("accuracy".to_string(), serde_json::json!(stats.accuracy()));
        map.insert("hit_rate".to_string(), serde_json::json!(stats.hit_rate()));
    }
    Ok(serde_json::to_string_pretty(&value)?)
}

fn percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

fn print_answers_section(stats: &Statistics) {
    println!("{}", "[ANSWERS]".cyan());
    println!("  Correct:        {}", stats.correct_answers.to_string().green());
    println!("  Wrong:          {}", stats.wrong_answers.to_string().red());
    println!("  Exhausted:      {}", stats.exhausted_questions);

    let answered = stats.correct_answers + stats.wrong_answers;
    if answered > 0 {
        println!("  Accuracy:       {}", percent(stats.accuracy()));
    } else {
        println!("  Accuracy:       n/a");
    }
    println!();
}

fn print_cache_section(stats: &Statistics) {
    println!("{}", "[CACHE]".cyan());
    println!("  Hits:           {}", stats.cache_hits);
    println!("  Misses:         {}", stats.cache_misses);
    println!("  Invalidations:  {}", stats.cache_invalidations);
    println!("  Pruned:         {}", stats.cache_pruned);

    if stats.cache_hits + stats.cache_misses > 0 {
        println!("  Hit rate:       {}", percent(stats.hit_rate()));
    } else {
        println!("  Hit rate:       n/a");
    }
    println!();
}

fn print_session_section(stats: &Statistics) {
    println!("{}", "[SESSION]".cyan());
    println!("  Bonus events:   {}", stats.bonus_events);
    println!();
}
