//! Items without text choices: spelling (audio) and picture items.
//!
//! These never touch the fingerprint cache. Spelling items are answered by
//! typing the highlighted word; picture items are skipped.

use crate::engine::{AnswerEngine, AnswerSource, EngineFatal, Outcome};
use crate::environment::Environment;
use tracing::{info, warn};
use vocab_shared::{Counter, ItemKind, Question};

impl AnswerEngine {
    pub(crate) fn resolve_non_text(
        &self,
        question: &Question,
        env: &mut dyn Environment,
    ) -> Result<Outcome, EngineFatal> {
        let word = question
            .word
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty());

        match (question.kind, word) {
            (ItemKind::Audio, Some(word)) => {
                info!("Solving audio question");
                env.submit_text(word)?;
                let verdict = env.await_verdict(self.config.verdict_timeout())?;
                if verdict.is_confirmed_correct() {
                    info!("Entered word: {}", word);
                    self.stats.increment(Counter::CorrectAnswers);
                    Ok(Outcome::correct(None, AnswerSource::Spelling, 0))
                } else {
                    warn!(?verdict, "Spelling answer not accepted: {}", word);
                    self.stats.increment(Counter::WrongAnswers);
                    Ok(Outcome::unanswered(AnswerSource::Spelling, 0))
                }
            }
            (ItemKind::Audio, None) => {
                warn!("Could not find word in audio question");
                Ok(Outcome::unanswered(AnswerSource::Skipped, 0))
            }
            (kind, _) => {
                warn!(?kind, "Item has no text choices, skipping");
                Ok(Outcome::unanswered(AnswerSource::Skipped, 0))
            }
        }
    }
}
