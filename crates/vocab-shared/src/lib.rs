//! Shared data model and persistent stores for the vocabulary assistant.
//!
//! - `fingerprint`: order-independent question keys
//! - `cache`: verified answers keyed by fingerprint, with expiry and LRU pruning
//! - `stats` / `stats_store`: outcome counters with write-through persistence

pub mod cache;
pub mod error;
pub mod fingerprint;
mod persist;
pub mod question;
pub mod stats;
pub mod stats_store;

pub use cache::{CacheConfig, CacheEntry, CacheSummary, FingerprintCache, CACHE_FILE_NAME};
pub use error::VocabError;
pub use fingerprint::{compute_fingerprint, normalize_text, Fingerprint};
pub use question::{ItemKind, Question};
pub use stats::{Counter, Statistics};
pub use stats_store::{StatsStore, STATS_FILE_NAME};
