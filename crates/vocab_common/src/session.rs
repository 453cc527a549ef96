//! Session driver: the outer loop around the engine.
//!
//! Polls the environment, hands questions to the engine one at a time,
//! counts bonus screens, advances past finished items and prunes the cache
//! periodically. Returns when the environment reports the practice is
//! finished, a stop is requested, or a fatal error occurs.

use crate::engine::{AnswerEngine, AnswerSource, EngineFatal};
use crate::environment::{Environment, ItemState};
use crate::oracle::Oracle;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;
use tracing::{info, info_span, warn};
use uuid::Uuid;
use vocab_shared::Counter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Wait between polls while the environment is pending
    pub poll_interval_ms: u64,
    /// Prune the cache after this many questions (0 = only at start)
    pub prune_every: u32,
    /// Give up after this many consecutive pending polls (0 = never)
    pub max_pending_polls: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            prune_every: 50,
            max_pending_polls: 0,
        }
    }
}

/// Why the session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEnd {
    #[default]
    Finished,
    Stopped,
    /// Environment stayed pending past `max_pending_polls`
    Stalled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub questions: u64,
    pub correct: u64,
    pub from_cache: u64,
    pub exhausted: u64,
    pub skipped: u64,
    pub bonus_events: u64,
    pub rounds_completed: u64,
    pub pruned: u64,
    pub end: SessionEnd,
}

pub struct Session<'a> {
    engine: &'a AnswerEngine,
    oracle: &'a dyn Oracle,
    config: SessionConfig,
}

impl<'a> Session<'a> {
    pub fn new(engine: &'a AnswerEngine, oracle: &'a dyn Oracle, config: SessionConfig) -> Self {
        Self {
            engine,
            oracle,
            config,
        }
    }

    pub fn run(&self, env: &mut dyn Environment) -> Result<SessionSummary, EngineFatal> {
        let session_id = Uuid::new_v4().to_string();
        let span = info_span!("session", id = %session_id);
        let _guard = span.enter();

        let mut summary = SessionSummary {
            session_id,
            ..Default::default()
        };
        summary.pruned += self.prune();

        let mut pending_polls = 0u32;
        loop {
            if self.engine.stop.is_requested() {
                summary.end = SessionEnd::Stopped;
                break;
            }

            match env.current_item()? {
                ItemState::Finished => {
                    info!("Practice session complete!");
                    summary.end = SessionEnd::Finished;
                    break;
                }
                ItemState::Bonus => {
                    info!("Achievement unlocked!");
                    self.engine.stats.increment(Counter::BonusEvents);
                    summary.bonus_events += 1;
                    env.advance()?;
                }
                ItemState::RoundComplete => {
                    info!("Round complete!");
                    summary.rounds_completed += 1;
                    env.advance()?;
                }
                ItemState::Pending => {
                    pending_polls += 1;
                    if self.config.max_pending_polls > 0 && pending_polls >= self.config.max_pending_polls {
                        warn!("Environment still pending after {} polls, giving up", pending_polls);
                        summary.end = SessionEnd::Stalled;
                        break;
                    }
                    thread::sleep(Duration::from_millis(self.config.poll_interval_ms));
                }
                ItemState::Question(question) => {
                    pending_polls = 0;
                    let outcome = self.engine.resolve(&question, env, self.oracle)?;
                    if outcome.stopped {
                        summary.end = SessionEnd::Stopped;
                        break;
                    }

                    summary.questions += 1;
                    if outcome.correct {
                        summary.correct += 1;
                    }
                    match outcome.source {
                        AnswerSource::Cache => summary.from_cache += 1,
                        AnswerSource::Skipped => summary.skipped += 1,
                        _ => {}
                    }
                    if outcome.exhausted {
                        summary.exhausted += 1;
                    }
                    env.advance()?;

                    if self.config.prune_every > 0
                        && summary.questions % u64::from(self.config.prune_every) == 0
                    {
                        summary.pruned += self.prune();
                    }
                }
            }
        }

        info!(
            questions = summary.questions,
            correct = summary.correct,
            from_cache = summary.from_cache,
            "Session ended: {:?}",
            summary.end
        );
        Ok(summary)
    }

    fn prune(&self) -> u64 {
        let removed = self.engine.cache.prune(Utc::now()) as u64;
        self.engine.stats.add(Counter::CachePruned, removed);
        removed
    }
}
