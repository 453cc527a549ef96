//! Vocab Common - answer resolution engine and its collaborators.
//!
//! The engine reuses verified answers from the fingerprint cache and falls
//! back to the oracle with a retry budget. Environments (scripted decks or
//! the JSON-lines bridge) supply questions and verdicts.

pub mod bridge;
pub mod config;
pub mod deck;
pub mod engine;
pub mod environment;
mod non_text;
pub mod oracle;
pub mod session;
pub mod stop;

pub use bridge::BridgeEnvironment;
pub use config::VocabConfig;
pub use deck::{Deck, DeckError, DeckItem, ScriptedEnvironment};
pub use engine::{AnswerEngine, AnswerSource, EngineConfig, EngineFatal, Outcome};
pub use environment::{Environment, EnvironmentError, ItemState, Verdict};
pub use oracle::{FakeOracle, HttpOracle, Oracle, OracleConfig, OracleError, SequentialOracle, Suggestion};
pub use session::{Session, SessionConfig, SessionEnd, SessionSummary};
pub use stop::StopFlag;
