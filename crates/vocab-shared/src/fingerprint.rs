//! Order-independent question fingerprints.
//!
//! A fingerprint is the normalized instruction text followed by the
//! normalized, sorted choice set. Case, punctuation (apostrophes excepted),
//! whitespace and on-screen choice order do not affect it.

use crate::error::VocabError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Separates the question from the choice list. Cannot occur in normalized text.
const QUESTION_SEP: &str = "||";
/// Separates choices. Cannot occur in normalized text.
const CHOICE_SEP: &str = "|";
/// Marker that starts the context sentence appended to instruction text
const CONTEXT_MARKER: &str = "\ncontext:";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short stable digest for log lines
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        hex::encode(&hasher.finalize()[..6])
    }

    /// Rebuild from a stored key (cache file)
    pub(crate) fn from_stored(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lower-case, drop punctuation other than apostrophes, collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let kept: String = lowered
        .chars()
        .map(|c| if c == '\u{2019}' || c == '\u{2018}' { '\'' } else { c })
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '\'')
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Instruction text with any trailing "Context: ..." block removed, normalized.
pub fn normalize_question(text: &str) -> String {
    let lowered = text.to_lowercase();
    let head = match lowered.find(CONTEXT_MARKER) {
        Some(pos) => &lowered[..pos],
        None => lowered.as_str(),
    };
    normalize_text(head)
}

/// Normalized choices, sorted. Fails if any choice normalizes to nothing.
pub fn normalize_choices(choices: &[String]) -> Result<Vec<String>, VocabError> {
    let mut normalized = Vec::with_capacity(choices.len());
    for (i, choice) in choices.iter().enumerate() {
        let n = normalize_text(choice);
        if n.is_empty() {
            return Err(VocabError::MalformedInput(format!(
                "choice {} has no text after normalization",
                i + 1
            )));
        }
        normalized.push(n);
    }
    normalized.sort();
    Ok(normalized)
}

/// Compute the fingerprint for a question and its choice set.
pub fn compute_fingerprint(question: &str, choices: &[String]) -> Result<Fingerprint, VocabError> {
    let q = normalize_question(question);
    if q.is_empty() {
        return Err(VocabError::MalformedInput("question text is empty".to_string()));
    }
    let choices = normalize_choices(choices)?;
    Ok(Fingerprint(format!(
        "{}{}{}",
        q,
        QUESTION_SEP,
        choices.join(CHOICE_SEP)
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Don't   STOP, now! "), "don't stop now");
        assert_eq!(normalize_text("well-known"), "wellknown");
        assert_eq!(normalize_text("it\u{2019}s"), "it's");
    }

    #[test]
    fn test_context_is_stripped() {
        assert_eq!(
            normalize_question("Pick the synonym\nContext: She was happy."),
            "pick the synonym"
        );
    }

    #[test]
    fn test_empty_question_rejected() {
        let err = compute_fingerprint(" ?! ", &strings(&["a"])).unwrap_err();
        assert!(matches!(err, VocabError::MalformedInput(_)));
    }

    #[test]
    fn test_blank_choice_rejected() {
        assert!(compute_fingerprint("Pick one", &strings(&["a", "--"])).is_err());
    }

    #[test]
    fn test_digest_is_short_and_stable() {
        let fp = compute_fingerprint("Pick one", &strings(&["a", "b"])).unwrap();
        assert_eq!(fp.digest().len(), 12);
        assert_eq!(fp.digest(), fp.clone().digest());
    }
}
