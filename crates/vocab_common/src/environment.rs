//! Environment adapter contract.
//!
//! The environment owns the quiz page: it reports the current item, accepts
//! submissions and reports whether they were right. Markup, selectors and
//! real-time pacing are its concern, never the engine's.

use std::time::Duration;
use thiserror::Error;
use vocab_shared::Question;

/// What the environment is currently showing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemState {
    /// A new question to resolve
    Question(Question),
    /// Nothing answerable yet (loading, animation)
    Pending,
    /// Achievement/bonus screen between items
    Bonus,
    /// End of a round; more rounds follow
    RoundComplete,
    /// Practice session is over
    Finished,
}

/// Result of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Correct,
    Wrong,
    /// No signal before the timeout
    Unknown,
}

impl Verdict {
    /// Only an explicit `Correct` counts; `Unknown` is treated as wrong.
    pub fn is_confirmed_correct(self) -> bool {
        self == Verdict::Correct
    }
}

#[derive(Error, Debug)]
pub enum EnvironmentError {
    #[error("Environment disconnected: {0}")]
    Disconnected(String),

    #[error("Environment protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Collaborator that exposes quiz items and judges submissions
pub trait Environment {
    /// Current item. Must return a new `Question` value per item.
    fn current_item(&mut self) -> Result<ItemState, EnvironmentError>;

    /// Pick choice `index` (0-based) of the current question
    fn submit_choice(&mut self, index: usize) -> Result<(), EnvironmentError>;

    /// Type an answer (spelling items)
    fn submit_text(&mut self, text: &str) -> Result<(), EnvironmentError>;

    /// Wait up to `timeout` for the verdict on the last submission
    fn await_verdict(&mut self, timeout: Duration) -> Result<Verdict, EnvironmentError>;

    /// Move on to the next item
    fn advance(&mut self) -> Result<(), EnvironmentError>;
}
