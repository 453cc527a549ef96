//! Configuration.
//!
//! Config file: ~/.config/vocab-assistant/config.toml or
//! /etc/vocab-assistant/config.toml. Every section is optional.

use crate::engine::EngineConfig;
use crate::oracle::OracleConfig;
use crate::session::SessionConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use vocab_shared::{CacheConfig, CACHE_FILE_NAME, STATS_FILE_NAME};

/// Directory name under the XDG config/data roots
pub const APP_DIR: &str = "vocab-assistant";

/// Environment variable that supplies the oracle API key
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Where persistent state lives
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Defaults to the XDG data directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
}

impl PathsConfig {
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
        })
    }

    pub fn cache_path(&self) -> PathBuf {
        self.state_dir().join(CACHE_FILE_NAME)
    }

    pub fn stats_path(&self) -> PathBuf {
        self.state_dir().join(STATS_FILE_NAME)
    }
}

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabConfig {
    pub oracle: OracleConfig,
    pub engine: EngineConfig,
    pub cache: CacheConfig,
    pub session: SessionConfig,
    pub paths: PathsConfig,
}

impl VocabConfig {
    /// ~/.config/vocab-assistant/config.toml
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
    }

    /// /etc/vocab-assistant/config.toml
    pub fn system_config_path() -> PathBuf {
        PathBuf::from("/etc").join(APP_DIR).join("config.toml")
    }

    /// Load configuration
    ///
    /// Priority:
    /// 1. Explicit path (must exist)
    /// 2. User config
    /// 3. System config
    /// 4. Defaults
    ///
    /// The API key from the environment fills an empty `oracle.api_key`.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load_from(path)?,
            None => {
                let candidates = Self::user_config_path()
                    .into_iter()
                    .chain(std::iter::once(Self::system_config_path()));
                let mut found = None;
                for path in candidates {
                    if path.exists() {
                        found = Some(Self::load_from(&path)?);
                        break;
                    }
                }
                found.unwrap_or_default()
            }
        };
        config.apply_env(std::env::var(API_KEY_ENV).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let toml_string =
            toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        fs::write(path, toml_string).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    fn apply_env(&mut self, api_key: Option<String>) {
        let key_missing = self.oracle.api_key.as_deref().map_or(true, |k| k.trim().is_empty());
        if key_missing {
            if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
                self.oracle.api_key = Some(key);
            }
        }
    }

    /// Copy safe to print
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.oracle.api_key.is_some() {
            copy.oracle.api_key = Some("***".to_string());
        }
        copy
    }
}
