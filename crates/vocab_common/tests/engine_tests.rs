//! Answer resolution engine against scripted decks and fake oracles.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use vocab_common::{
    AnswerEngine, AnswerSource, Deck, DeckItem, EngineConfig, EngineFatal, Environment,
    EnvironmentError, FakeOracle, ItemState, OracleError, ScriptedEnvironment, StopFlag,
    Suggestion, Verdict,
};
use vocab_shared::{
    compute_fingerprint, CacheConfig, FingerprintCache, Question, Statistics, StatsStore,
};

const HAPPY: &str = "Pick the synonym of 'happy'";

fn strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

fn engine_with(budget: u32, stop: StopFlag) -> AnswerEngine {
    AnswerEngine::new(
        Arc::new(FingerprintCache::in_memory(CacheConfig::default())),
        Arc::new(StatsStore::in_memory()),
        EngineConfig {
            retry_budget: budget,
            verdict_timeout_secs: 1,
        },
        stop,
    )
}

fn engine() -> AnswerEngine {
    engine_with(4, StopFlag::new())
}

fn single(text: &str, choices: &[&str], answer: Option<usize>) -> ScriptedEnvironment {
    ScriptedEnvironment::new(Deck {
        items: vec![DeckItem::Question {
            text: text.to_string(),
            context: None,
            choices: strings(choices),
            answer,
        }],
    })
}

/// Put the deck's first item on screen and return it
fn present(env: &mut ScriptedEnvironment) -> Question {
    match env.current_item().unwrap() {
        ItemState::Question(q) => q,
        other => panic!("expected a question, got {:?}", other),
    }
}

fn stats(engine: &AnswerEngine) -> Statistics {
    engine.stats().snapshot()
}

fn submitted(env: &ScriptedEnvironment) -> Vec<usize> {
    env.submissions().iter().filter_map(|s| s.index).collect()
}

#[test]
fn test_oracle_answer_is_cached() {
    let engine = engine();
    let mut env = single(HAPPY, &["Sad", "Joyful", "Angry", "Tired"], Some(1));
    let q = present(&mut env);
    let oracle = FakeOracle::replies(&["2"]);

    let outcome = engine.resolve(&q, &mut env, &oracle).unwrap();
    assert!(outcome.correct);
    assert_eq!(outcome.choice_index, Some(1));
    assert_eq!(outcome.source, AnswerSource::Oracle);
    assert!(!outcome.exhausted);

    let fp = compute_fingerprint(&q.text, &q.choices).unwrap();
    let entry = engine.cache().get(&fp).unwrap();
    assert_eq!(entry.answer, "Joyful");
    assert_eq!(entry.normalized_answer, "joyful");

    let s = stats(&engine);
    assert_eq!(s.correct_answers, 1);
    assert_eq!(s.cache_misses, 1);
    assert_eq!(s.wrong_answers, 0);
}

#[test]
fn test_cache_hit_with_reordered_choices_skips_oracle() {
    let engine = engine();
    let mut first = single(HAPPY, &["Sad", "Joyful", "Angry", "Tired"], Some(1));
    let q = present(&mut first);
    engine.resolve(&q, &mut first, &FakeOracle::replies(&["2"])).unwrap();

    let mut again = single(HAPPY, &["Tired", "Joyful", "Sad", "Angry"], Some(1));
    let q = present(&mut again);
    // Any oracle call would be fatal
    let oracle = FakeOracle::always_error(OracleError::Disabled);

    let outcome = engine.resolve(&q, &mut again, &oracle).unwrap();
    assert!(outcome.correct);
    assert_eq!(outcome.choice_index, Some(1));
    assert_eq!(outcome.source, AnswerSource::Cache);
    assert_eq!(oracle.call_count(), 0);

    let s = stats(&engine);
    assert_eq!(s.cache_hits, 1);
    assert_eq!(s.correct_answers, 2);

    let fp = compute_fingerprint(&q.text, &q.choices).unwrap();
    assert_eq!(engine.cache().get(&fp).unwrap().times_used, 1);
}

#[test]
fn test_wrong_cached_answer_is_invalidated_and_excluded() {
    let engine = engine();
    let choices = strings(&["Sad", "Joyful", "Angry", "Tired"]);
    let fp = compute_fingerprint(HAPPY, &choices).unwrap();
    engine.cache().record(&fp, HAPPY, &choices, 1);

    // The item bank now says "Sad"
    let mut env = single(HAPPY, &["Sad", "Joyful", "Angry", "Tired"], Some(0));
    let q = present(&mut env);
    // First suggestion repeats the excluded choice, second is right
    let oracle = FakeOracle::choices(&[1, 0]);

    let outcome = engine.resolve(&q, &mut env, &oracle).unwrap();
    assert!(outcome.correct);
    assert_eq!(outcome.choice_index, Some(0));
    assert_eq!(outcome.oracle_attempts, 2);

    let seen = oracle.exclusions_seen();
    assert!(seen.iter().all(|ex| ex.contains(&1)));
    assert_eq!(submitted(&env), vec![1, 0]);

    let s = stats(&engine);
    assert_eq!(s.cache_invalidations, 1);
    assert_eq!(s.cache_hits, 0);
    assert_eq!(s.wrong_answers, 1); // the repeated suggestion
    assert_eq!(engine.cache().get(&fp).unwrap().answer, "Sad");
}

#[test]
fn test_exhausted_budget_writes_nothing() {
    let engine = engine();
    let mut env = single(HAPPY, &["Sad", "Joyful", "Angry", "Tired", "Calm"], Some(1));
    let q = present(&mut env);
    let oracle = FakeOracle::choices(&[0, 2, 3, 4]);

    let outcome = engine.resolve(&q, &mut env, &oracle).unwrap();
    assert!(!outcome.correct);
    assert!(outcome.exhausted);
    assert_eq!(outcome.choice_index, None);
    assert_eq!(outcome.oracle_attempts, 4);

    let s = stats(&engine);
    assert_eq!(s.wrong_answers, 4);
    assert_eq!(s.exhausted_questions, 1);
    assert!(engine.cache().is_empty());
}

#[test]
fn test_unknown_verdict_never_cached() {
    let engine = engine();
    let mut env = single(HAPPY, &["Sad", "Joyful", "Angry", "Tired"], None);
    let q = present(&mut env);
    let oracle = FakeOracle::choices(&[1, 0, 2, 3]);

    let outcome = engine.resolve(&q, &mut env, &oracle).unwrap();
    assert!(!outcome.correct);
    assert!(outcome.exhausted);
    assert!(engine.cache().is_empty());
    assert!(env.submissions().iter().all(|s| s.verdict == Verdict::Unknown));
    assert_eq!(stats(&engine).wrong_answers, 4);
}

#[test]
fn test_no_index_submitted_twice() {
    let engine = engine_with(6, StopFlag::new());
    let mut env = single(HAPPY, &["Sad", "Joyful", "Angry", "Tired"], Some(3));
    let q = present(&mut env);
    // Keeps suggesting rejected choices
    let oracle = FakeOracle::choices(&[0, 0, 1, 0, 1, 3]);

    let outcome = engine.resolve(&q, &mut env, &oracle).unwrap();
    assert!(outcome.correct);
    let indices = submitted(&env);
    let unique: HashSet<_> = indices.iter().collect();
    assert_eq!(indices.len(), unique.len());
    assert_eq!(indices, vec![0, 1, 3]);
}

#[test]
fn test_unparseable_and_out_of_range_replies_count_as_wrong() {
    let engine = engine();
    let mut env = single(HAPPY, &["Sad", "Joyful", "Angry", "Tired"], Some(1));
    let q = present(&mut env);
    let oracle = FakeOracle::replies(&["I think it is Joyful", "9", "2"]);

    let outcome = engine.resolve(&q, &mut env, &oracle).unwrap();
    assert!(outcome.correct);
    assert_eq!(outcome.oracle_attempts, 3);
    // Nothing was submitted for the two bad replies
    assert_eq!(submitted(&env), vec![1]);
    assert_eq!(stats(&engine).wrong_answers, 2);
}

#[test]
fn test_transient_oracle_error_is_a_non_answer() {
    let engine = engine();
    let mut env = single(HAPPY, &["Sad", "Joyful"], Some(1));
    let q = present(&mut env);
    let oracle = FakeOracle::new(vec![
        Err(OracleError::Timeout(30)),
        Ok(Suggestion::Choice(1)),
    ]);

    let outcome = engine.resolve(&q, &mut env, &oracle).unwrap();
    assert!(outcome.correct);
    assert_eq!(stats(&engine).wrong_answers, 1);
}

#[test]
fn test_fatal_oracle_error_propagates() {
    let engine = engine();
    let mut env = single(HAPPY, &["Sad", "Joyful"], Some(1));
    let q = present(&mut env);
    let oracle = FakeOracle::always_error(OracleError::Unauthorized(401));

    let err = engine.resolve(&q, &mut env, &oracle).unwrap_err();
    assert!(matches!(err, EngineFatal::OracleUnavailable(OracleError::Unauthorized(401))));
    assert!(env.submissions().is_empty());
}

#[test]
fn test_stop_requested_aborts_without_submitting() {
    let stop = StopFlag::new();
    let engine = engine_with(4, stop.clone());
    let mut env = single(HAPPY, &["Sad", "Joyful"], Some(1));
    let q = present(&mut env);
    stop.request();

    let outcome = engine.resolve(&q, &mut env, &FakeOracle::choices(&[1])).unwrap();
    assert!(outcome.stopped);
    assert!(!outcome.correct);
    assert!(env.submissions().is_empty());
    assert!(engine.cache().is_empty());
}

#[test]
fn test_spelling_item_is_typed_not_cached() {
    let engine = engine();
    let mut env = ScriptedEnvironment::new(Deck {
        items: vec![DeckItem::Spelling {
            text: "Spell the word you hear".to_string(),
            word: "elated".to_string(),
        }],
    });
    let q = present(&mut env);
    let oracle = FakeOracle::always_error(OracleError::Disabled);

    let outcome = engine.resolve(&q, &mut env, &oracle).unwrap();
    assert!(outcome.correct);
    assert_eq!(outcome.source, AnswerSource::Spelling);
    assert_eq!(env.submissions()[0].text.as_deref(), Some("elated"));
    assert_eq!(oracle.call_count(), 0);
    assert!(engine.cache().is_empty());
    assert_eq!(stats(&engine).cache_misses, 0);
}

#[test]
fn test_image_item_is_skipped() {
    let engine = engine();
    let mut env = ScriptedEnvironment::new(Deck {
        items: vec![DeckItem::Image {
            text: "Which picture shows a ladder?".to_string(),
        }],
    });
    let q = present(&mut env);

    let outcome = engine.resolve(&q, &mut env, &FakeOracle::choices(&[0])).unwrap();
    assert!(!outcome.correct);
    assert!(!outcome.exhausted);
    assert_eq!(outcome.source, AnswerSource::Skipped);
    assert!(env.submissions().is_empty());
}

/// Environment whose page driver went away
struct GoneEnvironment;

impl Environment for GoneEnvironment {
    fn current_item(&mut self) -> Result<ItemState, EnvironmentError> {
        Err(EnvironmentError::Disconnected("gone".to_string()))
    }
    fn submit_choice(&mut self, _index: usize) -> Result<(), EnvironmentError> {
        Err(EnvironmentError::Disconnected("gone".to_string()))
    }
    fn submit_text(&mut self, _text: &str) -> Result<(), EnvironmentError> {
        Err(EnvironmentError::Disconnected("gone".to_string()))
    }
    fn await_verdict(&mut self, _timeout: Duration) -> Result<Verdict, EnvironmentError> {
        Err(EnvironmentError::Disconnected("gone".to_string()))
    }
    fn advance(&mut self) -> Result<(), EnvironmentError> {
        Err(EnvironmentError::Disconnected("gone".to_string()))
    }
}

#[test]
fn test_disconnected_environment_is_fatal() {
    let engine = engine();
    let q = Question::new(HAPPY, strings(&["Sad", "Joyful"]));
    let err = engine
        .resolve(&q, &mut GoneEnvironment, &FakeOracle::choices(&[1]))
        .unwrap_err();
    assert!(matches!(err, EngineFatal::Environment(EnvironmentError::Disconnected(_))));
}

/// Scripted page that raises the stop flag as soon as a choice is rejected
struct InterruptOnRejection {
    inner: ScriptedEnvironment,
    stop: StopFlag,
}

impl Environment for InterruptOnRejection {
    fn current_item(&mut self) -> Result<ItemState, EnvironmentError> {
        self.inner.current_item()
    }
    fn submit_choice(&mut self, index: usize) -> Result<(), EnvironmentError> {
        self.inner.submit_choice(index)
    }
    fn submit_text(&mut self, text: &str) -> Result<(), EnvironmentError> {
        self.inner.submit_text(text)
    }
    fn await_verdict(&mut self, timeout: Duration) -> Result<Verdict, EnvironmentError> {
        let verdict = self.inner.await_verdict(timeout)?;
        if verdict == Verdict::Wrong {
            self.stop.request();
        }
        Ok(verdict)
    }
    fn advance(&mut self) -> Result<(), EnvironmentError> {
        self.inner.advance()
    }
}

#[test]
fn test_stop_between_oracle_retries() {
    let stop = StopFlag::new();
    let engine = engine_with(4, stop.clone());
    let mut inner = single(HAPPY, &["Sad", "Joyful", "Angry"], Some(1));
    let q = present(&mut inner);
    let mut env = InterruptOnRejection { inner, stop };
    let oracle = FakeOracle::choices(&[0, 1]);

    let outcome = engine.resolve(&q, &mut env, &oracle).unwrap();
    assert!(outcome.stopped);
    assert!(!outcome.correct);
    assert_eq!(outcome.oracle_attempts, 1);
    assert_eq!(oracle.call_count(), 1);
    assert_eq!(submitted(&env.inner), vec![0]);
    assert!(engine.cache().is_empty());
    assert_eq!(stats(&engine).correct_answers, 0);
}
