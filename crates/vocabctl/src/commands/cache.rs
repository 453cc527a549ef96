//! Cache command - inspect and maintain the answer cache.

use anyhow::{Context, Result};
use chrono::Utc;
use owo_colors::OwoColorize;
use vocab_shared::{Counter, FingerprintCache};

use super::{CacheAction, GlobalOpts, Stores, THIN_SEP};

pub fn run(opts: &GlobalOpts, action: CacheAction) -> Result<()> {
    let config = opts.load_config()?;
    let stores = Stores::open(&config)?;
    let cache = &stores.cache;

    match action {
        CacheAction::Show { limit } => show(cache, limit),
        CacheAction::Prune => {
            let removed = cache.prune(Utc::now());
            cache.flush().context("Failed to save answer cache")?;
            stores.stats.add(Counter::CachePruned, removed as u64);
            println!("Pruned {} entries, {} remaining.", removed, cache.len());
            Ok(())
        }
        CacheAction::Clear => {
            let removed = cache.clear();
            cache.flush().context("Failed to save answer cache")?;
            println!("Removed {} entries.", removed);
            Ok(())
        }
    }
}

fn show(cache: &FingerprintCache, limit: usize) -> Result<()> {
    let summary = cache.summary();

    println!();
    println!("{}", "  Answer Cache".bold());
    println!("{}", THIN_SEP);
    println!("  Entries:        {} (limit {})", summary.entries, cache.config().max_entries);
    println!("  Total reuses:   {}", summary.total_uses);
    if let Some(path) = cache.path() {
        println!("  File:           {}", path.display());
    }
    if let (Some(oldest), Some(newest)) = (summary.oldest_last_used, summary.newest_last_used) {
        println!("  Last used:      {} .. {}", oldest.format("%Y-%m-%d"), newest.format("%Y-%m-%d"));
    }
    println!();

    if summary.entries == 0 {
        println!("  (empty)");
        println!();
        return Ok(());
    }

    println!("{}", "[ENTRIES]".cyan());
    for (fp, entry) in cache.entries().into_iter().take(limit) {
        println!(
            "  {}  {}  x{}  {}",
            fp.digest().dimmed(),
            entry.last_used.format("%Y-%m-%d %H:%M"),
            entry.times_used,
            entry.answer.green()
        );
        println!("      {}", truncate(&entry.question, 70));
    }
    if summary.entries > limit {
        println!("  ... {} more", summary.entries - limit);
    }
    println!();
    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= max_chars {
        return single_line;
    }
    let cut: String = single_line.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut)
}
