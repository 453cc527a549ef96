//! Vocabctl - command line front end for the vocabulary assistant.

pub mod commands;
pub mod logging;

pub use commands::GlobalOpts;
