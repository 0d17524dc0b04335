//! Engine configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Namespace scanned when none is given.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Length of generated secret values.
pub const DEFAULT_GENERATED_LENGTH: usize = 32;

/// Punctuation added to letters and digits for generated values.
pub const DEFAULT_PUNCTUATION: &str = "!@#$%";

/// Tunables for scanning and rotation.
///
/// Every field has a default, so a config file only needs the fields it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Namespace used when a call does not name one.
    pub namespace: String,
    /// Length of generated secret values.
    pub generated_length: usize,
    /// Punctuation characters allowed in generated values.
    pub punctuation: String,
    /// Field-name fragments tried, in order, when picking the workload
    /// secret field to overwrite.
    pub key_hints: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            generated_length: DEFAULT_GENERATED_LENGTH,
            punctuation: DEFAULT_PUNCTUATION.to_string(),
            key_hints: vec!["password".to_string(), "secret".to_string()],
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading engine config");
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Overrides the default namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Checks the configuration for values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            return Err(Error::Config {
                reason: "namespace cannot be empty".to_string(),
            });
        }

        if self.generated_length == 0 {
            return Err(Error::Config {
                reason: "generated_length must be at least 1".to_string(),
            });
        }

        if let Some(c) = self
            .punctuation
            .chars()
            .find(|c| c.is_alphanumeric() || c.is_whitespace() || !c.is_ascii())
        {
            return Err(Error::Config {
                reason: format!("punctuation contains invalid character '{c}'"),
            });
        }

        if self.key_hints.iter().any(|hint| hint.trim().is_empty()) {
            return Err(Error::Config {
                reason: "key_hints cannot contain empty entries".to_string(),
            });
        }

        Ok(())
    }
}
