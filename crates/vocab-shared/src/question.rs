//! Quiz items as observed from the environment.

use serde::{Deserialize, Serialize};

/// What kind of answer an item expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// Multiple choice with text choices
    #[default]
    Text,
    /// Picture choices with no readable text
    Image,
    /// Listen-and-spell item answered by typing a word
    Audio,
}

/// A single question, valid for the duration of one resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Instructional text ("Pick the synonym of 'happy'")
    pub text: String,
    /// Example sentence shown with the item, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Choice texts in on-screen order; empty for non-text items
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(default)]
    pub kind: ItemKind,
    /// Highlighted word for spelling items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
}

impl Question {
    pub fn new(text: impl Into<String>, choices: Vec<String>) -> Self {
        Self {
            text: text.into(),
            context: None,
            choices,
            kind: ItemKind::Text,
            word: None,
        }
    }

    /// Spelling item: the answer is typed, not picked
    pub fn spelling(text: impl Into<String>, word: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            context: None,
            choices: Vec::new(),
            kind: ItemKind::Audio,
            word: Some(word.into()),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        self.context = if context.trim().is_empty() { None } else { Some(context) };
        self
    }

    /// True when the item has choices that can be fingerprinted and cached
    pub fn has_text_choices(&self) -> bool {
        self.kind == ItemKind::Text && !self.choices.is_empty()
    }

    /// Question text with the context sentence appended, as shown to the oracle
    pub fn prompt_text(&self) -> String {
        let text = self.text.replace('\n', " ");
        match &self.context {
            Some(ctx) => format!("{}\nContext: {}", text.trim(), ctx.trim()),
            None => text.trim().to_string(),
        }
    }
}
