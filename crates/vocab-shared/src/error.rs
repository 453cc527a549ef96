//! Error types for the shared stores.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VocabError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VocabError {
    /// Short machine-readable kind, used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            VocabError::MalformedInput(_) => "malformed_input",
            VocabError::Persistence(_) => "persistence",
            VocabError::Io(_) => "io",
            VocabError::Json(_) => "json",
        }
    }
}
