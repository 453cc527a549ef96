//! Scripted quiz decks.
//!
//! A deck is a JSON list of items with an answer key. `ScriptedEnvironment`
//! plays a deck as an `Environment`: it judges submissions against the key,
//! can rotate choice order on every pass to exercise cache reuse, and keeps
//! a log of every submission for inspection.

use crate::environment::{Environment, EnvironmentError, ItemState, Verdict};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use vocab_shared::{ItemKind, Question};

#[derive(Error, Debug)]
pub enum DeckError {
    #[error("Cannot read deck: {0}")]
    Io(#[from] std::io::Error),

    #[error("Deck is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Deck item {index}: {reason}")]
    Invalid { index: usize, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeckItem {
    Question {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<String>,
        choices: Vec<String>,
        /// 0-based correct choice; `None` never confirms
        #[serde(default)]
        answer: Option<usize>,
    },
    Spelling {
        text: String,
        word: String,
    },
    Image {
        text: String,
    },
    Bonus,
    RoundComplete,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    pub items: Vec<DeckItem>,
}

impl Deck {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DeckError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, DeckError> {
        let deck: Deck = serde_json::from_str(json)?;
        deck.validate()?;
        Ok(deck)
    }

    fn validate(&self) -> Result<(), DeckError> {
        for (index, item) in self.items.iter().enumerate() {
            if let DeckItem::Question { choices, answer, .. } = item {
                if choices.is_empty() {
                    return Err(DeckError::Invalid {
                        index,
                        reason: "question has no choices".to_string(),
                    });
                }
                if let Some(a) = answer {
                    if *a >= choices.len() {
                        return Err(DeckError::Invalid {
                            index,
                            reason: format!("answer {} out of range for {} choices", a, choices.len()),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Number of answerable items
    pub fn question_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i, DeckItem::Question { .. } | DeckItem::Spelling { .. }))
            .count()
    }
}

/// One submission made against the deck
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub pass: usize,
    /// Position of the item in the deck
    pub item: usize,
    /// Index in the order the choices were shown
    pub index: Option<usize>,
    pub text: Option<String>,
    pub verdict: Verdict,
}

/// Question as currently shown, with the key mapped into shown order
#[derive(Debug, Clone)]
struct Shown {
    question: Question,
    correct: Option<usize>,
}

/// Deck-backed environment
pub struct ScriptedEnvironment {
    deck: Deck,
    passes: usize,
    rotate_choices: bool,
    pass: usize,
    position: usize,
    shown: Option<Shown>,
    pending_verdict: Option<Verdict>,
    submissions: Vec<Submission>,
}

impl ScriptedEnvironment {
    pub fn new(deck: Deck) -> Self {
        Self {
            deck,
            passes: 1,
            rotate_choices: false,
            pass: 0,
            position: 0,
            shown: None,
            pending_verdict: None,
            submissions: Vec::new(),
        }
    }

    /// Play the deck `passes` times (at least once)
    pub fn with_passes(mut self, passes: usize) -> Self {
        self.passes = passes.max(1);
        self
    }

    /// Rotate each question's choices by the pass number
    pub fn with_rotated_choices(mut self, rotate: bool) -> Self {
        self.rotate_choices = rotate;
        self
    }

    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    pub fn pass(&self) -> usize {
        self.pass
    }

    fn show(&self, item: &DeckItem) -> Option<Shown> {
        match item {
            DeckItem::Question {
                text,
                context,
                choices,
                answer,
            } => {
                let n = choices.len();
                let shift = if self.rotate_choices && n > 0 { self.pass % n } else { 0 };
                let mut shown = choices.clone();
                shown.rotate_left(shift);
                let mut question = Question::new(text.clone(), shown);
                if let Some(ctx) = context {
                    question = question.with_context(ctx.clone());
                }
                Some(Shown {
                    question,
                    correct: answer.map(|a| (a + n - shift) % n),
                })
            }
            DeckItem::Spelling { text, word } => Some(Shown {
                question: Question::spelling(text.clone(), word.clone()),
                correct: None,
            }),
            DeckItem::Image { text } => Some(Shown {
                question: Question {
                    kind: ItemKind::Image,
                    ..Question::new(text.clone(), Vec::new())
                },
                correct: None,
            }),
            DeckItem::Bonus | DeckItem::RoundComplete => None,
        }
    }

    fn record(&mut self, index: Option<usize>, text: Option<String>, verdict: Verdict) {
        self.submissions.push(Submission {
            pass: self.pass,
            item: self.position,
            index,
            text,
            verdict,
        });
        self.pending_verdict = Some(verdict);
    }
}

impl Environment for ScriptedEnvironment {
    fn current_item(&mut self) -> Result<ItemState, EnvironmentError> {
        if self.position >= self.deck.items.len() {
            if self.pass + 1 >= self.passes {
                return Ok(ItemState::Finished);
            }
            self.pass += 1;
            self.position = 0;
            self.shown = None;
            if self.deck.items.is_empty() {
                return Ok(ItemState::Finished);
            }
        }

        let item = self.deck.items[self.position].clone();
        match item {
            DeckItem::Bonus => Ok(ItemState::Bonus),
            DeckItem::RoundComplete => Ok(ItemState::RoundComplete),
            _ => {
                if self.shown.is_none() {
                    self.shown = self.show(&item);
                }
                match &self.shown {
                    Some(shown) => Ok(ItemState::Question(shown.question.clone())),
                    None => Ok(ItemState::Pending),
                }
            }
        }
    }

    fn submit_choice(&mut self, index: usize) -> Result<(), EnvironmentError> {
        let shown = self
            .shown
            .as_ref()
            .ok_or_else(|| EnvironmentError::Protocol("no question on screen".to_string()))?;
        if index >= shown.question.choices.len() {
            return Err(EnvironmentError::Protocol(format!(
                "choice {} does not exist",
                index + 1
            )));
        }
        let verdict = match shown.correct {
            Some(correct) if correct == index => Verdict::Correct,
            Some(_) => Verdict::Wrong,
            None => Verdict::Unknown,
        };
        self.record(Some(index), None, verdict);
        Ok(())
    }

    fn submit_text(&mut self, text: &str) -> Result<(), EnvironmentError> {
        let shown = self
            .shown
            .as_ref()
            .ok_or_else(|| EnvironmentError::Protocol("no question on screen".to_string()))?;
        let verdict = match &shown.question.word {
            Some(word) if word.trim().eq_ignore_ascii_case(text.trim()) => Verdict::Correct,
            Some(_) => Verdict::Wrong,
            None => Verdict::Unknown,
        };
        self.record(None, Some(text.to_string()), verdict);
        Ok(())
    }

    fn await_verdict(&mut self, _timeout: Duration) -> Result<Verdict, EnvironmentError> {
        Ok(self.pending_verdict.take().unwrap_or(Verdict::Unknown))
    }

    fn advance(&mut self) -> Result<(), EnvironmentError> {
        if self.position < self.deck.items.len() {
            self.position += 1;
        }
        self.shown = None;
        self.pending_verdict = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DECK: &str = r#"{
        "items": [
            {"type": "question", "text": "Pick the synonym of 'happy'",
             "choices": ["Sad", "Joyful", "Angry", "Tired"], "answer": 1},
            {"type": "bonus"},
            {"type": "spelling", "text": "Spell the word you hear", "word": "elated"}
        ]
    }"#;

    #[test]
    fn test_deck_parses() {
        let deck = Deck::from_json(DECK).unwrap();
        assert_eq!(deck.items.len(), 3);
        assert_eq!(deck.question_count(), 2);
    }

    #[test]
    fn test_deck_rejects_bad_answer() {
        let err = Deck::from_json(
            r#"{"items":[{"type":"question","text":"q","choices":["a"],"answer":3}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, DeckError::Invalid { index: 0, .. }));
    }

    #[test]
    fn test_judges_against_key() {
        let mut env = ScriptedEnvironment::new(Deck::from_json(DECK).unwrap());
        assert!(matches!(env.current_item().unwrap(), ItemState::Question(_)));

        env.submit_choice(0).unwrap();
        assert_eq!(env.await_verdict(Duration::ZERO).unwrap(), Verdict::Wrong);
        env.submit_choice(1).unwrap();
        assert_eq!(env.await_verdict(Duration::ZERO).unwrap(), Verdict::Correct);
        // Nothing pending
        assert_eq!(env.await_verdict(Duration::ZERO).unwrap(), Verdict::Unknown);

        env.advance().unwrap();
        assert_eq!(env.current_item().unwrap(), ItemState::Bonus);
        env.advance().unwrap();
        match env.current_item().unwrap() {
            ItemState::Question(q) => assert_eq!(q.kind, ItemKind::Audio),
            other => panic!("expected spelling item, got {:?}", other),
        }
        env.submit_text("Elated").unwrap();
        assert_eq!(env.await_verdict(Duration::ZERO).unwrap(), Verdict::Correct);
        env.advance().unwrap();
        assert_eq!(env.current_item().unwrap(), ItemState::Finished);
        assert_eq!(env.submissions().len(), 3);
    }

    #[test]
    fn test_rotation_keeps_key_aligned() {
        let deck = Deck::from_json(DECK).unwrap();
        let mut env = ScriptedEnvironment::new(deck).with_passes(2).with_rotated_choices(true);
        for _ in 0..3 {
            env.current_item().unwrap();
            env.advance().unwrap();
        }
        let ItemState::Question(q) = env.current_item().unwrap() else {
            panic!("expected question on second pass");
        };
        assert_eq!(env.pass(), 1);
        assert_eq!(q.choices, vec!["Joyful", "Angry", "Tired", "Sad"]);
        env.submit_choice(0).unwrap();
        assert_eq!(env.await_verdict(Duration::ZERO).unwrap(), Verdict::Correct);
    }
}
