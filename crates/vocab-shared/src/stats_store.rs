//! Write-through statistics store.
//!
//! Every increment rewrites the counter file so a crash loses at most the
//! question in flight. Observers get a snapshot after each mutation.

use crate::stats::{Counter, Statistics};
use crate::VocabError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Default statistics file name inside the state directory
pub const STATS_FILE_NAME: &str = "statistics.json";

#[derive(Default)]
struct StatsState {
    counters: Statistics,
    observers: Vec<Sender<Statistics>>,
    pending_sync: bool,
}

/// Stats store backed by a JSON file
pub struct StatsStore {
    path: Option<PathBuf>,
    state: Mutex<StatsState>,
}

impl StatsStore {
    /// Load counters from `path`; a missing file starts at zero
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let counters = read_counters(&path);
        Self {
            path: Some(path),
            state: Mutex::new(StatsState {
                counters,
                ..Default::default()
            }),
        }
    }

    /// Store that never touches disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(StatsState::default()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, StatsState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn increment(&self, counter: Counter) {
        self.add(counter, 1);
    }

    pub fn add(&self, counter: Counter, n: u64) {
        if n == 0 {
            return;
        }
        let mut state = self.lock();
        state.counters.add(counter, n);
        debug!(counter = %counter, value = state.counters.get(counter), "Statistics updated");
        self.persist_locked(&mut state);
        notify(&mut state);
    }

    /// Immutable copy of the counters
    pub fn snapshot(&self) -> Statistics {
        self.lock().counters
    }

    /// Zero every counter
    pub fn reset(&self) {
        let mut state = self.lock();
        state.counters = Statistics::default();
        self.persist_locked(&mut state);
        notify(&mut state);
    }

    /// Write the counters now, surfacing any error
    pub fn persist(&self) -> Result<(), VocabError> {
        let mut state = self.lock();
        self.write_file(&state.counters)?;
        state.pending_sync = false;
        Ok(())
    }

    pub fn pending_sync(&self) -> bool {
        self.lock().pending_sync
    }

    /// Receive a snapshot after every mutation
    pub fn subscribe(&self) -> Receiver<Statistics> {
        let (tx, rx) = mpsc::channel();
        let mut state = self.lock();
        // Initial value so observers can render immediately
        let _ = tx.send(state.counters);
        state.observers.push(tx);
        rx
    }

    fn persist_locked(&self, state: &mut StatsState) {
        match self.write_file(&state.counters) {
            Ok(()) => state.pending_sync = false,
            Err(e) => {
                warn!(kind = e.kind(), "Failed to persist statistics, keeping in-memory counters: {}", e);
                state.pending_sync = true;
            }
        }
    }

    fn write_file(&self, counters: &Statistics) -> Result<(), VocabError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(counters)?;
        crate::persist::replace_file(path, json.as_bytes())
    }
}

/// Push a snapshot to observers, dropping the ones that hung up
fn notify(state: &mut StatsState) {
    let snapshot = state.counters;
    state.observers.retain(|tx| tx.send(snapshot).is_ok());
}

fn read_counters(path: &Path) -> Statistics {
    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Statistics file {} is malformed: {}; starting at zero", path.display(), e);
                Statistics::default()
            }
        },
        Err(e) if e.kind() == ErrorKind::NotFound => Statistics::default(),
        Err(e) => {
            warn!("Cannot read statistics {}: {}; starting at zero", path.display(), e);
            Statistics::default()
        }
    }
}
