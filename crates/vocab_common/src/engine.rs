//! Answer resolution engine.
//!
//! Per question: try the fingerprint cache, otherwise ask the oracle in a
//! bounded loop that never resubmits a choice proven wrong. Only a
//! `Correct` verdict writes the cache; `Unknown` counts as wrong.
//!
//! Stages: START -> CACHE_LOOKUP -> (CACHE_VERIFY | ORACLE_QUERY) -> SUBMIT
//! -> VERIFY -> (DONE | ORACLE_QUERY) -> DONE. The stop flag is checked
//! before each stage and each oracle attempt.

use crate::environment::{Environment, EnvironmentError, Verdict};
use crate::oracle::{Oracle, OracleError, Suggestion};
use crate::stop::StopFlag;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use vocab_shared::{compute_fingerprint, Counter, Fingerprint, FingerprintCache, Question, StatsStore};

/// Retry and timeout limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Oracle attempts per question
    pub retry_budget: u32,
    /// How long to wait for a verdict after each submission
    pub verdict_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry_budget: 4,
            verdict_timeout_secs: 10,
        }
    }
}

impl EngineConfig {
    pub fn verdict_timeout(&self) -> Duration {
        Duration::from_secs(self.verdict_timeout_secs)
    }
}

/// Where the submitted answer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerSource {
    Cache,
    Oracle,
    /// Typed answer for a spelling item
    Spelling,
    /// Item the engine cannot answer; nothing submitted
    Skipped,
    /// No confirmed answer
    None,
}

/// Result of resolving one question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub correct: bool,
    /// Index of the confirmed choice
    pub choice_index: Option<usize>,
    /// Retry budget ran out
    pub exhausted: bool,
    /// Stop was requested mid-resolution
    pub stopped: bool,
    pub source: AnswerSource,
    /// Oracle calls made
    pub oracle_attempts: u32,
}

impl Outcome {
    pub(crate) fn correct(index: Option<usize>, source: AnswerSource, oracle_attempts: u32) -> Self {
        Self {
            correct: true,
            choice_index: index,
            exhausted: false,
            stopped: false,
            source,
            oracle_attempts,
        }
    }

    pub(crate) fn unanswered(source: AnswerSource, oracle_attempts: u32) -> Self {
        Self {
            correct: false,
            choice_index: None,
            exhausted: false,
            stopped: false,
            source,
            oracle_attempts,
        }
    }

    fn exhausted(oracle_attempts: u32) -> Self {
        Self {
            exhausted: true,
            ..Self::unanswered(AnswerSource::None, oracle_attempts)
        }
    }

    pub(crate) fn stopped(oracle_attempts: u32) -> Self {
        Self {
            stopped: true,
            ..Self::unanswered(AnswerSource::None, oracle_attempts)
        }
    }
}

/// Conditions that end a session rather than a single question
#[derive(Error, Debug)]
pub enum EngineFatal {
    #[error("Oracle permanently unavailable: {0}")]
    OracleUnavailable(#[source] OracleError),

    #[error(transparent)]
    Environment(#[from] EnvironmentError),
}

pub struct AnswerEngine {
    pub(crate) cache: Arc<FingerprintCache>,
    pub(crate) stats: Arc<StatsStore>,
    pub(crate) config: EngineConfig,
    pub(crate) stop: StopFlag,
}

impl AnswerEngine {
    pub fn new(
        cache: Arc<FingerprintCache>,
        stats: Arc<StatsStore>,
        config: EngineConfig,
        stop: StopFlag,
    ) -> Self {
        Self {
            cache,
            stats,
            config,
            stop,
        }
    }

    pub fn cache(&self) -> &Arc<FingerprintCache> {
        &self.cache
    }

    pub fn stats(&self) -> &Arc<StatsStore> {
        &self.stats
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolve one question against the environment.
    pub fn resolve(
        &self,
        question: &Question,
        env: &mut dyn Environment,
        oracle: &dyn Oracle,
    ) -> Result<Outcome, EngineFatal> {
        if self.stop.is_requested() {
            return Ok(Outcome::stopped(0));
        }
        if !question.has_text_choices() {
            return self.resolve_non_text(question, env);
        }
        info!("Processing question: {}", question.prompt_text());

        let fingerprint = match compute_fingerprint(&question.text, &question.choices) {
            Ok(fp) => Some(fp),
            Err(e) => {
                warn!("Question is not cacheable: {}", e);
                None
            }
        };
        let mut excluded = BTreeSet::new();

        if let Some(fp) = &fingerprint {
            if let Some(outcome) = self.try_cached(fp, question, env, &mut excluded)? {
                return Ok(outcome);
            }
        }

        self.query_oracle(question, fingerprint.as_ref(), env, oracle, excluded)
    }

    /// CACHE_LOOKUP and CACHE_VERIFY. A wrong cached answer is invalidated
    /// and its index goes into the exclusion set.
    fn try_cached(
        &self,
        fp: &Fingerprint,
        question: &Question,
        env: &mut dyn Environment,
        excluded: &mut BTreeSet<usize>,
    ) -> Result<Option<Outcome>, EngineFatal> {
        let Some(index) = self.cache.lookup(fp, &question.choices) else {
            debug!(fp = %fp.digest(), "Cache miss");
            self.stats.increment(Counter::CacheMisses);
            return Ok(None);
        };
        if self.stop.is_requested() {
            return Ok(Some(Outcome::stopped(0)));
        }

        info!(fp = %fp.digest(), "Using cached answer: {}", question.choices[index]);
        let verdict = self.submit_and_verify(env, index)?;
        if verdict.is_confirmed_correct() {
            self.stats.increment(Counter::CacheHits);
            self.stats.increment(Counter::CorrectAnswers);
            return Ok(Some(Outcome::correct(Some(index), AnswerSource::Cache, 0)));
        }

        warn!(fp = %fp.digest(), ?verdict, "Cached answer rejected, falling back to oracle");
        self.cache.invalidate(fp);
        self.stats.increment(Counter::CacheInvalidations);
        excluded.insert(index);
        Ok(None)
    }

    /// ORACLE_QUERY -> SUBMIT -> VERIFY, up to `retry_budget` attempts.
    fn query_oracle(
        &self,
        question: &Question,
        fingerprint: Option<&Fingerprint>,
        env: &mut dyn Environment,
        oracle: &dyn Oracle,
        mut excluded: BTreeSet<usize>,
    ) -> Result<Outcome, EngineFatal> {
        let mut attempts = 0;

        while attempts < self.config.retry_budget {
            if self.stop.is_requested() {
                return Ok(Outcome::stopped(attempts));
            }
            attempts += 1;

            let suggestion = match oracle.suggest(question, &excluded) {
                Ok(s) => s,
                Err(e) if e.is_fatal() => return Err(EngineFatal::OracleUnavailable(e)),
                Err(e) => {
                    warn!("Oracle attempt {} failed: {}", attempts, e);
                    Suggestion::NoAnswer
                }
            };

            let index = match suggestion {
                Suggestion::Choice(i) if i >= question.choices.len() => {
                    warn!("Invalid answer index {} for {} choices", i + 1, question.choices.len());
                    self.stats.increment(Counter::WrongAnswers);
                    continue;
                }
                Suggestion::Choice(i) if excluded.contains(&i) => {
                    warn!("Oracle repeated excluded choice {}", i + 1);
                    self.stats.increment(Counter::WrongAnswers);
                    continue;
                }
                Suggestion::Choice(i) => i,
                Suggestion::NoAnswer => {
                    warn!("Could not determine answer (attempt {})", attempts);
                    self.stats.increment(Counter::WrongAnswers);
                    continue;
                }
            };

            if self.stop.is_requested() {
                return Ok(Outcome::stopped(attempts));
            }
            info!("Selected answer: {}", question.choices[index]);
            let verdict = self.submit_and_verify(env, index)?;

            if verdict.is_confirmed_correct() {
                if let Some(fp) = fingerprint {
                    self.cache.record(fp, &question.text, &question.choices, index);
                }
                self.stats.increment(Counter::CorrectAnswers);
                return Ok(Outcome::correct(Some(index), AnswerSource::Oracle, attempts));
            }

            debug!(?verdict, "Choice {} rejected", index + 1);
            self.stats.increment(Counter::WrongAnswers);
            excluded.insert(index);
        }

        warn!("Retry budget of {} exhausted", self.config.retry_budget);
        self.stats.increment(Counter::ExhaustedQuestions);
        Ok(Outcome::exhausted(attempts))
    }

    fn submit_and_verify(
        &self,
        env: &mut dyn Environment,
        index: usize,
    ) -> Result<Verdict, EnvironmentError> {
        env.submit_choice(index)?;
        env.await_verdict(self.config.verdict_timeout())
    }
}
