//! Chain configuration.
//!
//! A `ChainConfig` is attached to a root node and inherited by every node
//! derived from it. It can be built in code or loaded from TOML:
//!
//! ```toml
//! label = "checkout"
//! contain_panics = true
//! repeat_settlement = "warn"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read chain config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid chain config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// What to do when a settled node is resolved or rejected again.
///
/// The second call is always ignored; this only selects how loudly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatSettlement {
    /// Log at debug level
    Ignore,
    /// Log at warn level
    #[default]
    Warn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Chain name attached to tracing events
    pub label: Option<String>,
    /// Convert panics in `map`/`flat_map`/`on_error` transforms into rejections
    pub contain_panics: bool,
    pub repeat_settlement: RepeatSettlement,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            label: None,
            contain_panics: true,
            repeat_settlement: RepeatSettlement::Warn,
        }
    }
}

impl ChainConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_contain_panics(mut self, contain: bool) -> Self {
        self.contain_panics = contain;
        self
    }

    pub fn with_repeat_settlement(mut self, policy: RepeatSettlement) -> Self {
        self.repeat_settlement = policy;
        self
    }

    /// Label for log fields; unnamed chains show as `-`.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or("-")
    }
}
