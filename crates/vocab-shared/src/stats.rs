//! Outcome counters for the answer engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process-wide counter set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Statistics {
    pub correct_answers: u64,
    pub wrong_answers: u64,
    /// Achievement/bonus screens seen between items
    #[serde(alias = "achievements")]
    pub bonus_events: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_invalidations: u64,
    /// Entries removed by expiry or capacity pruning
    pub cache_pruned: u64,
    /// Questions that used up the retry budget
    pub exhausted_questions: u64,
}

/// Names of the individual counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    CorrectAnswers,
    WrongAnswers,
    BonusEvents,
    CacheHits,
    CacheMisses,
    CacheInvalidations,
    CachePruned,
    ExhaustedQuestions,
}

impl Counter {
    pub const ALL: [Counter; 8] = [
        Counter::CorrectAnswers,
        Counter::WrongAnswers,
        Counter::BonusEvents,
        Counter::CacheHits,
        Counter::CacheMisses,
        Counter::CacheInvalidations,
        Counter::CachePruned,
        Counter::ExhaustedQuestions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Counter::CorrectAnswers => "correct_answers",
            Counter::WrongAnswers => "wrong_answers",
            Counter::BonusEvents => "bonus_events",
            Counter::CacheHits => "cache_hits",
            Counter::CacheMisses => "cache_misses",
            Counter::CacheInvalidations => "cache_invalidations",
            Counter::CachePruned => "cache_pruned",
            Counter::ExhaustedQuestions => "exhausted_questions",
        }
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Statistics {
    pub fn get(&self, counter: Counter) -> u64 {
        match counter {
            Counter::CorrectAnswers => self.correct_answers,
            Counter::WrongAnswers => self.wrong_answers,
            Counter::BonusEvents => self.bonus_events,
            Counter::CacheHits => self.cache_hits,
            Counter::CacheMisses => self.cache_misses,
            Counter::CacheInvalidations => self.cache_invalidations,
            Counter::CachePruned => self.cache_pruned,
            Counter::ExhaustedQuestions => self.exhausted_questions,
        }
    }

    fn slot(&mut self, counter: Counter) -> &mut u64 {
        match counter {
            Counter::CorrectAnswers => &mut self.correct_answers,
            Counter::WrongAnswers => &mut self.wrong_answers,
            Counter::BonusEvents => &mut self.bonus_events,
            Counter::CacheHits => &mut self.cache_hits,
            Counter::CacheMisses => &mut self.cache_misses,
            Counter::CacheInvalidations => &mut self.cache_invalidations,
            Counter::CachePruned => &mut self.cache_pruned,
            Counter::ExhaustedQuestions => &mut self.exhausted_questions,
        }
    }

    pub fn add(&mut self, counter: Counter, n: u64) {
        let slot = self.slot(counter);
        *slot = slot.saturating_add(n);
    }

    /// Correct share of all submitted answers (0.0-1.0)
    pub fn accuracy(&self) -> f64 {
        let answered = self.correct_answers + self.wrong_answers;
        if answered == 0 {
            0.0
        } else {
            self.correct_answers as f64 / answered as f64
        }
    }

    /// Share of cacheable questions answered from the cache (0.0-1.0)
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            self.cache_hits as f64 / lookups as f64
        }
    }
}

// Tests in tests/stats_tests.rs
