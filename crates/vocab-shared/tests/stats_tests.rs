//! Tests for the outcome counters.

use vocab_shared::{Counter, Statistics};

#[test]
fn test_statistics_default_is_zero() {
    let stats = Statistics::default();
    for counter in Counter::ALL {
        assert_eq!(stats.get(counter), 0, "{} should start at zero", counter);
    }
}

#[test]
fn test_add_targets_one_counter() {
    let mut stats = Statistics::default();
    stats.add(Counter::CacheInvalidations, 3);
    assert_eq!(stats.cache_invalidations, 3);
    assert_eq!(stats.cache_hits, 0);
}

#[test]
fn test_accuracy() {
    let mut stats = Statistics::default();
    assert_eq!(stats.accuracy(), 0.0);

    stats.add(Counter::CorrectAnswers, 3);
    stats.add(Counter::WrongAnswers, 1);
    assert!((stats.accuracy() - 0.75).abs() < 1e-9);
}

#[test]
fn test_hit_rate() {
    let mut stats = Statistics::default();
    stats.add(Counter::CacheHits, 1);
    stats.add(Counter::CacheMisses, 3);
    assert!((stats.hit_rate() - 0.25).abs() < 1e-9);
}

#[test]
fn test_legacy_achievements_field() {
    let parsed: Statistics =
        serde_json::from_str(r#"{"correct_answers": 5, "wrong_answers": 2, "achievements": 4}"#)
            .unwrap();
    assert_eq!(parsed.correct_answers, 5);
    assert_eq!(parsed.bonus_events, 4);
    assert_eq!(parsed.cache_hits, 0);
}

#[test]
fn test_counter_names() {
    assert_eq!(Counter::CacheHits.as_str(), "cache_hits");
    assert_eq!(Counter::ExhaustedQuestions.to_string(), "exhausted_questions");
}
