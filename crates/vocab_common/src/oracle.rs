//! Oracle client - suggests a choice for a question.
//!
//! The engine only deals in semantic values: a question, its choices and
//! the set of indices already known to be wrong. Prompt formatting and
//! reply parsing live here. `HttpOracle` talks to an OpenAI-compatible
//! chat-completions endpoint; `FakeOracle` and `SequentialOracle` need no
//! network and back the tests and offline drills.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;
use vocab_shared::Question;

/// Oracle configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://api.openai.com".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

/// Oracle errors. Only the fatal ones stop a session; the rest count as
/// "no answer" for the current attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("Oracle is disabled in configuration")]
    Disabled,

    #[error("No API key configured for the oracle")]
    MissingApiKey,

    #[error("Oracle rejected credentials (HTTP {0})")]
    Unauthorized(u16),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Oracle returned empty response")]
    EmptyResponse,
}

impl OracleError {
    /// Whether retrying can never succeed
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            OracleError::Disabled | OracleError::MissingApiKey | OracleError::Unauthorized(_)
        )
    }
}

/// What the oracle picked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suggestion {
    /// 0-based index into the question's choices; not range-checked
    Choice(usize),
    /// Reply carried no usable choice
    NoAnswer,
}

/// Suggests answers
pub trait Oracle: Send + Sync {
    fn suggest(
        &self,
        question: &Question,
        excluded: &BTreeSet<usize>,
    ) -> Result<Suggestion, OracleError>;
}

/// Render the prompt sent to the oracle. Choices are numbered from 1.
pub fn build_prompt(question: &Question, excluded: &BTreeSet<usize>) -> String {
    let mut prompt = format!("Question: {}\nChoices:\n", question.prompt_text());
    for (i, choice) in question.choices.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, choice));
    }
    if !excluded.is_empty() {
        let wrong: Vec<String> = excluded.iter().map(|i| (i + 1).to_string()).collect();
        prompt.push_str(&format!(
            "These choices are already known to be wrong, do not pick them: {}\n",
            wrong.join(", ")
        ));
    }
    prompt.push_str(&format!(
        "Which one is correct? Just respond with the number (1-{}).",
        question.choices.len()
    ));
    prompt
}

fn choice_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b(\d+)\b").expect("choice pattern is valid"))
}

/// Pull the 1-based choice number out of a free-text reply.
pub fn parse_reply(reply: &str) -> Suggestion {
    let number = choice_pattern()
        .captures(reply)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<usize>().ok());
    match number {
        Some(n) if n >= 1 => Suggestion::Choice(n - 1),
        _ => Suggestion::NoAnswer,
    }
}

/// OpenAI-compatible HTTP oracle
pub struct HttpOracle {
    config: OracleConfig,
    client: reqwest::blocking::Client,
}

impl HttpOracle {
    pub fn new(config: OracleConfig) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self { config, client })
    }

    fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        let api_key = self.config.api_key.as_deref().ok_or(OracleError::MissingApiKey)?;
        let url = format!("{}/v1/chat/completions", self.config.endpoint.trim_end_matches('/'));

        let request_body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "user", "content": prompt},
            ],
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request_body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout(self.config.timeout_secs)
                } else {
                    OracleError::HttpError(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(OracleError::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            return Err(OracleError::HttpError(format!("HTTP {} from oracle", status)));
        }

        let response_json: serde_json::Value = response
            .json()
            .map_err(|e| OracleError::HttpError(format!("Failed to parse response: {}", e)))?;

        // Extract content from OpenAI format
        response_json
            .get("choices")
            .and_then(|v| v.get(0))
            .and_then(|v| v.get("message"))
            .and_then(|v| v.get("content"))
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(OracleError::EmptyResponse)
    }
}

impl Oracle for HttpOracle {
    fn suggest(
        &self,
        question: &Question,
        excluded: &BTreeSet<usize>,
    ) -> Result<Suggestion, OracleError> {
        if !self.config.enabled {
            return Err(OracleError::Disabled);
        }
        let prompt = build_prompt(question, excluded);
        tracing::debug!("Getting oracle response ({} excluded)", excluded.len());
        let reply = self.complete(&prompt)?;
        tracing::info!("Oracle suggested answer: {}", reply);
        Ok(parse_reply(&reply))
    }
}

/// Picks the lowest choice not yet excluded. Deterministic, offline.
#[derive(Debug, Default)]
pub struct SequentialOracle;

impl Oracle for SequentialOracle {
    fn suggest(
        &self,
        question: &Question,
        excluded: &BTreeSet<usize>,
    ) -> Result<Suggestion, OracleError> {
        Ok((0..question.choices.len())
            .find(|i| !excluded.contains(i))
            .map(Suggestion::Choice)
            .unwrap_or(Suggestion::NoAnswer))
    }
}

/// Fake oracle for testing
pub struct FakeOracle {
    responses: Mutex<VecDeque<Result<Suggestion, OracleError>>>,
    calls: Mutex<Vec<BTreeSet<usize>>>,
}

impl FakeOracle {
    /// Responses are returned in order; the last one repeats
    pub fn new(responses: Vec<Result<Suggestion, OracleError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Build from raw text replies, parsed like real ones
    pub fn replies(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(parse_reply(r))).collect())
    }

    /// 0-based choices in order
    pub fn choices(indices: &[usize]) -> Self {
        Self::new(indices.iter().map(|&i| Ok(Suggestion::Choice(i))).collect())
    }

    pub fn always_error(error: OracleError) -> Self {
        Self::new(vec![Err(error)])
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Exclusion set passed on each call, in call order
    pub fn exclusions_seen(&self) -> Vec<BTreeSet<usize>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Oracle for FakeOracle {
    fn suggest(
        &self,
        _question: &Question,
        excluded: &BTreeSet<usize>,
    ) -> Result<Suggestion, OracleError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(excluded.clone());

        let mut responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        match responses.len() {
            0 => Err(OracleError::EmptyResponse),
            // Keep returning the same response
            1 => responses[0].clone(),
            _ => responses.pop_front().unwrap_or(Err(OracleError::EmptyResponse)),
        }
    }
}
