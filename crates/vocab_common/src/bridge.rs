//! JSON-lines bridge to an external page driver.
//!
//! Every command written gets exactly one reply event. A reader thread
//! feeds replies into a channel so waits are bounded with `recv_timeout`;
//! a verdict that does not arrive in time is `Unknown`.
//!
//! Commands: poll, submit, type, await_verdict, advance.
//! Events: question, pending, bonus, round_complete, finished, verdict, ack, error.

use crate::environment::{Environment, EnvironmentError, ItemState, Verdict};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use vocab_shared::{compute_fingerprint, ItemKind, Question};

/// Default wait for replies to poll/submit/advance
const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra wait on top of the verdict timeout for the reply to travel
const VERDICT_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum BridgeCommand {
    Poll,
    Submit { index: usize },
    Type { text: String },
    AwaitVerdict { timeout_ms: u64 },
    Advance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireVerdict {
    Correct,
    Wrong,
    Unknown,
}

impl From<WireVerdict> for Verdict {
    fn from(v: WireVerdict) -> Self {
        match v {
            WireVerdict::Correct => Verdict::Correct,
            WireVerdict::Wrong => Verdict::Wrong,
            WireVerdict::Unknown => Verdict::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BridgeEvent {
    Question {
        text: String,
        #[serde(default)]
        context: Option<String>,
        #[serde(default)]
        choices: Vec<String>,
        #[serde(default)]
        kind: ItemKind,
        #[serde(default)]
        word: Option<String>,
    },
    Pending,
    Bonus,
    RoundComplete,
    Finished,
    Verdict { verdict: WireVerdict },
    Ack,
    Error { message: String },
}

/// Line-oriented environment over any reader/writer pair
pub struct BridgeEnvironment<W: Write> {
    writer: W,
    events: Receiver<Result<BridgeEvent, String>>,
    reply_timeout: Duration,
    /// Key of the last question handed out, cleared by any other item state
    last_question: Option<String>,
}

impl<W: Write> BridgeEnvironment<W> {
    pub fn new<R>(reader: R, writer: W) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for line in reader.lines() {
                let line = match line {
                    Ok(l) => l,
                    Err(e) => {
                        let _ = tx.send(Err(format!("read failed: {}", e)));
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                let parsed = serde_json::from_str::<BridgeEvent>(&line)
                    .map_err(|e| format!("bad event {:?}: {}", line, e));
                if tx.send(parsed).is_err() {
                    break;
                }
            }
            // Sender drops here: the environment sees a disconnect
        });

        Self {
            writer,
            events: rx,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            last_question: None,
        }
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    fn send(&mut self, command: &BridgeCommand) -> Result<(), EnvironmentError> {
        let line = serde_json::to_string(command)
            .map_err(|e| EnvironmentError::Protocol(e.to_string()))?;
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Wait for the first event `accept` takes, skipping stale replies.
    fn wait_for<T>(
        &mut self,
        timeout: Duration,
        mut accept: impl FnMut(BridgeEvent) -> Option<T>,
    ) -> Result<Option<T>, EnvironmentError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(remaining) {
                Ok(Ok(BridgeEvent::Error { message })) => {
                    return Err(EnvironmentError::Protocol(message));
                }
                Ok(Ok(event)) => {
                    let shown = format!("{:?}", event);
                    if let Some(value) = accept(event) {
                        return Ok(Some(value));
                    }
                    debug!("Skipping stale bridge event: {}", shown);
                }
                Ok(Err(msg)) => warn!("Ignoring malformed bridge line: {}", msg),
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(EnvironmentError::Disconnected(
                        "page driver closed the connection".to_string(),
                    ));
                }
            }
        }
    }

    fn expect_ack(&mut self, what: &str) -> Result<(), EnvironmentError> {
        let timeout = self.reply_timeout;
        match self.wait_for(timeout, |e| matches!(e, BridgeEvent::Ack).then_some(()))? {
            Some(()) => Ok(()),
            None => Err(EnvironmentError::Protocol(format!("no ack for {}", what))),
        }
    }

    /// A question identical to the one handed out last means the page has
    /// not moved on yet, even after `advance()`.
    fn is_repeat(&mut self, question: &Question) -> bool {
        let key = compute_fingerprint(&question.text, &question.choices)
            .map(|fp| fp.to_string())
            .unwrap_or_else(|_| question.text.clone());
        if self.last_question.as_deref() == Some(key.as_str()) {
            return true;
        }
        self.last_question = Some(key);
        false
    }
}

impl<W: Write> Environment for BridgeEnvironment<W> {
    fn current_item(&mut self) -> Result<ItemState, EnvironmentError> {
        self.send(&BridgeCommand::Poll)?;
        let timeout = self.reply_timeout;
        let state = self.wait_for(timeout, |event| match event {
            BridgeEvent::Question {
                text,
                context,
                choices,
                kind,
                word,
            } => {
                let mut question = Question {
                    kind,
                    word,
                    ..Question::new(text, choices)
                };
                if let Some(ctx) = context {
                    question = question.with_context(ctx);
                }
                Some(ItemState::Question(question))
            }
            BridgeEvent::Pending => Some(ItemState::Pending),
            BridgeEvent::Bonus => Some(ItemState::Bonus),
            BridgeEvent::RoundComplete => Some(ItemState::RoundComplete),
            BridgeEvent::Finished => Some(ItemState::Finished),
            _ => None,
        })?;

        match state {
            Some(ItemState::Question(q)) if self.is_repeat(&q) => {
                debug!("Question has not advanced yet");
                Ok(ItemState::Pending)
            }
            Some(ItemState::Pending) => Ok(ItemState::Pending),
            Some(state) => {
                if !matches!(state, ItemState::Question(_)) {
                    self.last_question = None;
                }
                Ok(state)
            }
            None => {
                debug!("No reply to poll, treating as pending");
                Ok(ItemState::Pending)
            }
        }
    }

    fn submit_choice(&mut self, index: usize) -> Result<(), EnvironmentError> {
        self.send(&BridgeCommand::Submit { index })?;
        self.expect_ack("submit")
    }

    fn submit_text(&mut self, text: &str) -> Result<(), EnvironmentError> {
        self.send(&BridgeCommand::Type {
            text: text.to_string(),
        })?;
        self.expect_ack("type")
    }

    fn await_verdict(&mut self, timeout: Duration) -> Result<Verdict, EnvironmentError> {
        self.send(&BridgeCommand::AwaitVerdict {
            timeout_ms: timeout.as_millis() as u64,
        })?;
        let verdict = self.wait_for(timeout + VERDICT_GRACE, |event| match event {
            BridgeEvent::Verdict { verdict } => Some(Verdict::from(verdict)),
            _ => None,
        })?;
        Ok(verdict.unwrap_or_else(|| {
            debug!("No verdict before timeout");
            Verdict::Unknown
        }))
    }

    fn advance(&mut self) -> Result<(), EnvironmentError> {
        self.send(&BridgeCommand::Advance)?;
        self.expect_ack("advance")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn bridge(events: &[&str]) -> BridgeEnvironment<Vec<u8>> {
        let input = events.join("\n");
        BridgeEnvironment::new(Cursor::new(input.into_bytes()), Vec::new())
            .with_reply_timeout(Duration::from_millis(200))
    }

    fn commands(env: &BridgeEnvironment<Vec<u8>>) -> Vec<BridgeCommand> {
        String::from_utf8_lossy(env.writer())
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    const QUESTION: &str = r#"{"event":"question","text":"Pick the synonym of 'happy'","choices":["Sad","Joyful"]}"#;

    #[test]
    fn test_question_roundtrip() {
        let mut env = bridge(&[
            QUESTION,
            r#"{"event":"ack"}"#,
            r#"{"event":"verdict","verdict":"correct"}"#,
            r#"{"event":"ack"}"#,
        ]);

        let ItemState::Question(q) = env.current_item().unwrap() else {
            panic!("expected question");
        };
        assert_eq!(q.choices, vec!["Sad", "Joyful"]);
        env.submit_choice(1).unwrap();
        assert_eq!(env.await_verdict(Duration::from_millis(50)).unwrap(), Verdict::Correct);
        env.advance().unwrap();

        assert_eq!(
            commands(&env),
            vec![
                BridgeCommand::Poll,
                BridgeCommand::Submit { index: 1 },
                BridgeCommand::AwaitVerdict { timeout_ms: 50 },
                BridgeCommand::Advance,
            ]
        );
    }

    #[test]
    fn test_item_states() {
        let mut env = bridge(&[
            r#"{"event":"pending"}"#,
            r#"{"event":"bonus"}"#,
            r#"{"event":"round_complete"}"#,
            r#"{"event":"finished"}"#,
        ]);
        assert_eq!(env.current_item().unwrap(), ItemState::Pending);
        assert_eq!(env.current_item().unwrap(), ItemState::Bonus);
        assert_eq!(env.current_item().unwrap(), ItemState::RoundComplete);
        assert_eq!(env.current_item().unwrap(), ItemState::Finished);
    }

    #[test]
    fn test_repeated_question_is_pending_after_advance() {
        let mut env = bridge(&[QUESTION, QUESTION, r#"{"event":"ack"}"#, QUESTION]);
        assert!(matches!(env.current_item().unwrap(), ItemState::Question(_)));
        assert_eq!(env.current_item().unwrap(), ItemState::Pending);
        env.advance().unwrap();
        // Page still shows the old item
        assert_eq!(env.current_item().unwrap(), ItemState::Pending);
    }

    #[test]
    fn test_other_item_state_clears_repeat_guard() {
        let mut env = bridge(&[
            QUESTION,
            r#"{"event":"pending"}"#,
            QUESTION,
            r#"{"event":"bonus"}"#,
            QUESTION,
        ]);
        assert!(matches!(env.current_item().unwrap(), ItemState::Question(_)));
        assert_eq!(env.current_item().unwrap(), ItemState::Pending);
        // A loading screen does not count as a new item
        assert_eq!(env.current_item().unwrap(), ItemState::Pending);
        assert_eq!(env.current_item().unwrap(), ItemState::Bonus);
        assert!(matches!(env.current_item().unwrap(), ItemState::Question(_)));
    }

    #[test]
    fn test_different_question_is_handed_out() {
        let other = r#"{"event":"question","text":"Pick the antonym of 'ancient'","choices":["Old","Modern"]}"#;
        let mut env = bridge(&[QUESTION, r#"{"event":"ack"}"#, other]);
        assert!(matches!(env.current_item().unwrap(), ItemState::Question(_)));
        env.advance().unwrap();
        let ItemState::Question(q) = env.current_item().unwrap() else {
            panic!("expected the next question");
        };
        assert_eq!(q.choices, vec!["Old", "Modern"]);
    }

    #[test]
    fn test_eof_is_disconnect() {
        let mut env = bridge(&[]);
        let err = env.current_item().unwrap_err();
        assert!(matches!(err, EnvironmentError::Disconnected(_)));
    }

    #[test]
    fn test_driver_error_is_protocol_error() {
        let mut env = bridge(&[r#"{"event":"error","message":"no such choice"}"#]);
        let err = env.submit_choice(9).unwrap_err();
        assert!(matches!(err, EnvironmentError::Protocol(m) if m == "no such choice"));
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let mut env = bridge(&["garbage", r#"{"event":"bonus"}"#]);
        assert_eq!(env.current_item().unwrap(), ItemState::Bonus);
    }

    #[test]
    fn test_stale_verdict_skipped_on_poll() {
        let mut env = bridge(&[r#"{"event":"verdict","verdict":"wrong"}"#, r#"{"event":"finished"}"#]);
        assert_eq!(env.current_item().unwrap(), ItemState::Finished);
    }
}
