//! Fingerprint cache of verified answers.
//!
//! Maps a question fingerprint to the answer the environment confirmed as
//! correct. Entries are resolved against the live choice list on every
//! lookup, since on-screen choice order changes between occurrences.
//!
//! Persistence is a single JSON document rewritten after every mutation
//! (temp file + rename). Map mutation and the file write happen under the
//! same lock so readers never observe a half-applied change.

use crate::fingerprint::{normalize_choices, normalize_text, Fingerprint};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Cache file format version
const CACHE_FORMAT_VERSION: u32 = 1;

/// Default cache file name inside the state directory
pub const CACHE_FILE_NAME: &str = "answer_cache.json";

/// Expiry and capacity limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entries unused for longer than this are pruned
    pub expiry_days: u32,
    /// Maximum number of entries kept after pruning
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expiry_days: 30,
            max_entries: 1000,
        }
    }
}

/// A previously verified answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Question text at capture time (display only)
    #[serde(default)]
    pub question: String,
    /// Correct choice text exactly as it was shown
    pub answer: String,
    pub normalized_answer: String,
    /// Normalized, sorted choice set at capture time
    pub choices: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    #[serde(default)]
    pub times_used: u64,
}

impl CacheEntry {
    /// Valid if the choice set is unchanged, or at least still offers the answer
    fn is_valid_for(&self, live_normalized: &[String]) -> bool {
        self.choices.as_slice() == live_normalized
            || live_normalized.iter().any(|c| c == &self.normalized_answer)
    }

    /// Position of the stored answer in the live list: exact text first, then normalized
    fn position_in(&self, live: &[String]) -> Option<usize> {
        live.iter()
            .position(|c| c == &self.answer)
            .or_else(|| live.iter().position(|c| normalize_text(c) == self.normalized_answer))
    }
}

/// Overview for `cache show`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheSummary {
    pub entries: usize,
    pub total_uses: u64,
    pub oldest_last_used: Option<DateTime<Utc>>,
    pub newest_last_used: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct CacheFileRef<'a> {
    version: u32,
    entries: BTreeMap<&'a str, &'a CacheEntry>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<Fingerprint, CacheEntry>,
    /// In-memory state has changes the file does not
    pending_sync: bool,
}

pub struct FingerprintCache {
    path: Option<PathBuf>,
    config: CacheConfig,
    state: Mutex<CacheState>,
}

impl FingerprintCache {
    /// Open the cache file, or start empty if it does not exist
    pub fn open(path: impl AsRef<Path>, config: CacheConfig) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = load_entries(&path);
        info!("Loaded {} cached answers from {}", entries.len(), path.display());
        Self {
            path: Some(path),
            config,
            state: Mutex::new(CacheState {
                entries,
                pending_sync: false,
            }),
        }
    }

    /// Cache that never touches disk
    pub fn in_memory(config: CacheConfig) -> Self {
        Self {
            path: None,
            config,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True while a failed write has left the file behind memory
    pub fn pending_sync(&self) -> bool {
        self.lock().pending_sync
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        self.lock().entries.get(fingerprint).cloned()
    }

    /// Find the index of the cached answer in `live_choices`.
    pub fn lookup(&self, fingerprint: &Fingerprint, live_choices: &[String]) -> Option<usize> {
        self.lookup_at(fingerprint, live_choices, Utc::now())
    }

    pub fn lookup_at(
        &self,
        fingerprint: &Fingerprint,
        live_choices: &[String],
        now: DateTime<Utc>,
    ) -> Option<usize> {
        let mut state = self.lock();
        let entry = state.entries.get_mut(fingerprint)?;

        let live_normalized = match normalize_choices(live_choices) {
            Ok(n) => n,
            Err(e) => {
                warn!(fp = %fingerprint.digest(), "Cache validation failed: {}", e);
                return None;
            }
        };
        if !entry.is_valid_for(&live_normalized) {
            warn!(fp = %fingerprint.digest(), "Cache validation failed: answer not among live choices");
            return None;
        }
        let index = entry.position_in(live_choices)?;

        entry.times_used += 1;
        entry.last_used = now;
        debug!(
            fp = %fingerprint.digest(),
            index,
            times_used = entry.times_used,
            "Cache hit"
        );
        self.persist_locked(&mut state);
        Some(index)
    }

    /// Store `choices[correct_index]` as the verified answer. Returns false if
    /// the index or choices are unusable.
    pub fn record(
        &self,
        fingerprint: &Fingerprint,
        question: &str,
        choices: &[String],
        correct_index: usize,
    ) -> bool {
        self.record_at(fingerprint, question, choices, correct_index, Utc::now())
    }

    pub fn record_at(
        &self,
        fingerprint: &Fingerprint,
        question: &str,
        choices: &[String],
        correct_index: usize,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(answer) = choices.get(correct_index) else {
            warn!(
                fp = %fingerprint.digest(),
                "Refusing to cache index {} of {} choices",
                correct_index,
                choices.len()
            );
            return false;
        };
        let normalized = match normalize_choices(choices) {
            Ok(n) => n,
            Err(e) => {
                warn!(fp = %fingerprint.digest(), "Refusing to cache: {}", e);
                return false;
            }
        };
        let normalized_answer = normalize_text(answer);

        let mut state = self.lock();
        let previous = state.entries.get(fingerprint);
        let (created_at, times_used) = match previous {
            Some(prev) if prev.normalized_answer == normalized_answer => {
                (prev.created_at, prev.times_used)
            }
            _ => (now, 0),
        };
        state.entries.insert(
            fingerprint.clone(),
            CacheEntry {
                question: question.trim().to_string(),
                answer: answer.clone(),
                normalized_answer,
                choices: normalized,
                created_at,
                last_used: now,
                times_used,
            },
        );
        debug!(fp = %fingerprint.digest(), answer = %answer, "Cached verified answer");
        self.persist_locked(&mut state);
        true
    }

    /// Drop the entry for `fingerprint`. Returns whether one existed.
    pub fn invalidate(&self, fingerprint: &Fingerprint) -> bool {
        let mut state = self.lock();
        let removed = state.entries.remove(fingerprint).is_some();
        if removed {
            info!(fp = %fingerprint.digest(), "Invalidated cached answer");
            self.persist_locked(&mut state);
        }
        removed
    }

    /// Remove expired entries, then least-recently-used entries beyond
    /// capacity (fewer uses evicted first on equal `last_used`).
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.lock();
        let before = state.entries.len();
        let cutoff = now - Duration::days(i64::from(self.config.expiry_days));

        state.entries.retain(|_, e| e.last_used >= cutoff);
        let expired = before - state.entries.len();

        let mut evicted = 0;
        if state.entries.len() > self.config.max_entries {
            let excess = state.entries.len() - self.config.max_entries;
            let mut order: Vec<(DateTime<Utc>, u64, Fingerprint)> = state
                .entries
                .iter()
                .map(|(fp, e)| (e.last_used, e.times_used, fp.clone()))
                .collect();
            order.sort();
            for (_, _, fp) in order.into_iter().take(excess) {
                state.entries.remove(&fp);
                evicted += 1;
            }
        }

        let removed = expired + evicted;
        if removed > 0 {
            info!("Pruned {} cache entries ({} expired, {} over capacity)", removed, expired, evicted);
            self.persist_locked(&mut state);
        }
        removed
    }

    /// Remove everything. Returns the number of entries dropped.
    pub fn clear(&self) -> usize {
        let mut state = self.lock();
        let count = state.entries.len();
        state.entries.clear();
        self.persist_locked(&mut state);
        count
    }

    /// Entries ordered by most recent use
    pub fn entries(&self) -> Vec<(Fingerprint, CacheEntry)> {
        let state = self.lock();
        let mut all: Vec<_> = state
            .entries
            .iter()
            .map(|(fp, e)| (fp.clone(), e.clone()))
            .collect();
        all.sort_by(|a, b| b.1.last_used.cmp(&a.1.last_used));
        all
    }

    pub fn summary(&self) -> CacheSummary {
        let state = self.lock();
        CacheSummary {
            entries: state.entries.len(),
            total_uses: state.entries.values().map(|e| e.times_used).sum(),
            oldest_last_used: state.entries.values().map(|e| e.last_used).min(),
            newest_last_used: state.entries.values().map(|e| e.last_used).max(),
        }
    }

    /// Write the current state, surfacing any error
    pub fn flush(&self) -> Result<(), crate::VocabError> {
        let mut state = self.lock();
        self.write_file(&state.entries)?;
        state.pending_sync = false;
        Ok(())
    }

    fn persist_locked(&self, state: &mut CacheState) {
        match self.write_file(&state.entries) {
            Ok(()) => state.pending_sync = false,
            Err(e) => {
                warn!(kind = e.kind(), "Failed to persist answer cache, keeping in-memory state: {}", e);
                state.pending_sync = true;
            }
        }
    }

    fn write_file(&self, entries: &HashMap<Fingerprint, CacheEntry>) -> Result<(), crate::VocabError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let doc = CacheFileRef {
            version: CACHE_FORMAT_VERSION,
            entries: entries.iter().map(|(fp, e)| (fp.as_str(), e)).collect(),
        };
        let json = serde_json::to_string_pretty(&doc)?;
        crate::persist::replace_file(path, json.as_bytes())
    }
}

/// Read the cache file, skipping undecodable entries.
fn load_entries(path: &Path) -> HashMap<Fingerprint, CacheEntry> {
    let mut entries = HashMap::new();

    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return entries,
        Err(e) => {
            warn!("Cannot read answer cache {}: {}; starting empty", path.display(), e);
            return entries;
        }
    };
    let value: serde_json::Value = match serde_json::from_str(&contents) {
        Ok(v) => v,
        Err(e) => {
            warn!("Answer cache {} is not valid JSON: {}; starting empty", path.display(), e);
            return entries;
        }
    };
    let serde_json::Value::Object(mut top) = value else {
        warn!("Answer cache {} has unexpected shape; starting empty", path.display());
        return entries;
    };

    // Versioned document, or a flat legacy map of fingerprint -> entry
    let raw = match top.remove("entries") {
        Some(serde_json::Value::Object(map)) => map,
        _ => {
            top.remove("version");
            top
        }
    };

    for (key, raw_entry) in raw {
        if key.is_empty() {
            warn!("Skipping cache record with empty fingerprint");
            continue;
        }
        match serde_json::from_value::<CacheEntry>(raw_entry) {
            Ok(entry) => {
                entries.insert(Fingerprint::from_stored(key), entry);
            }
            Err(e) => warn!("Skipping malformed cache record: {}", e),
        }
    }
    entries
}
