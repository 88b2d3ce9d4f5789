#![forbid(unsafe_code)]

//! Director configuration.
//!
//! [`DirectorConfig`] can be built in code or, with the `config` feature,
//! loaded from TOML or JSON at startup:
//!
//! ```toml
//! # act.toml
//! label = "document-42"
//! max_depth = 500
//! ```
//!
//! ```rust,ignore
//! let config = DirectorConfig::from_toml_file("act.toml")?;
//! let director = Director::new(config);
//! ```
//!
//! Missing fields fall back to [`DirectorConfig::default`], which keeps the
//! whole history and labels the director `"default"`.

#[cfg(feature = "config")]
use std::path::Path;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables for a [`Director`](crate::Director).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct DirectorConfig {
    /// Name attached to every log event of the director. Distinguishes
    /// histories when several are alive (one per document, say).
    pub label: String,
    /// Maximum number of applied actions kept for undo (`None` = unlimited).
    ///
    /// Only actions below the needle (already durable) are ever evicted, so
    /// the applied stack may exceed this while edits are unsaved.
    pub max_depth: Option<usize>,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            label: String::from("default"),
            max_depth: None,
        }
    }
}

impl DirectorConfig {
    /// Create a configuration with custom limits.
    #[must_use]
    pub fn new(label: impl Into<String>, max_depth: usize) -> Self {
        Self {
            label: label.into(),
            max_depth: Some(max_depth),
        }
    }

    /// Keep the whole history.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// Validate all parameters.
    ///
    /// Returns a list of validation errors. An empty list means the config
    /// is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.label.trim().is_empty() {
            errors.push("label must not be empty".into());
        }
        if self.max_depth == Some(0) {
            errors.push("max_depth must be > 0".into());
        }
        errors
    }

    /// Turn [`validate`](Self::validate) output into a result.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load from a TOML string.
    #[cfg(feature = "config")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validated()
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validated()
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "config")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Serialize to a TOML string.
    #[cfg(feature = "config")]
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
