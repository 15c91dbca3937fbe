//! Proxy factory options
//!
//! Options can be written in code or read from the `[proxy]` table of a
//! `veil.toml` file:
//!
//! ```toml
//! [proxy]
//! serializable = true
//! capture_call_site = false
//! type_name_suffix = "Proxy"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Options loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the options file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid config: {0}")]
    ValidationError(String),
}

/// Settings applied to every proxy type a factory synthesizes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryOptions {
    /// Implement `veil.Persistable` so instances can be persisted and
    /// reconstructed
    pub serializable: bool,

    /// Record the source position of each proxied call on its invocation
    /// record
    pub capture_call_site: bool,

    /// Appended to the base type's name to name the generated type
    pub type_name_suffix: String,
}

impl Default for FactoryOptions {
    fn default() -> Self {
        Self {
            serializable: true,
            capture_call_site: false,
            type_name_suffix: "Proxy".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    proxy: FactoryOptions,
}

impl FactoryOptions {
    /// Load options from a `veil.toml` file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse options from TOML text; a missing `[proxy]` table means
    /// defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        file.proxy.validate()?;
        Ok(file.proxy)
    }

    /// Validate the options
    pub fn validate(&self) -> Result<(), ConfigError> {
        let suffix = &self.type_name_suffix;
        if suffix.is_empty() {
            return Err(ConfigError::ValidationError(
                "type_name_suffix cannot be empty".to_string(),
            ));
        }
        if !suffix.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(ConfigError::ValidationError(format!(
                "type_name_suffix '{}' must be alphanumeric",
                suffix
            )));
        }
        Ok(())
    }

    pub fn with_serializable(mut self, serializable: bool) -> Self {
        self.serializable = serializable;
        self
    }

    pub fn with_call_site_capture(mut self, capture: bool) -> Self {
        self.capture_call_site = capture;
        self
    }

    pub fn with_type_name_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.type_name_suffix = suffix.into();
        self
    }
}
