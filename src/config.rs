//! Decorator configuration.

use serde::{Deserialize, Serialize};

use crate::error::DecorationError;

pub const DEFAULT_PREFIX: &str = "acl";
pub const DEFAULT_WILDCARD: &str = "_";
pub const DEFAULT_DIGEST: &str = "sha256";

/// Settings for policy resolution and grouping. Every field has a default,
/// so partial JSON documents are accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DecoratorConfig {
    /// Root component(s) of every policy identifier, e.g. `acl` or `jmx.acl`.
    pub prefix: String,
    /// Component value that matches any concrete segment.
    pub wildcard: String,
    /// Name of the digest used for chain keys (`sha256`, `sha512`, `blake3`).
    pub digest_algorithm: String,
    /// Compare full resolved chains before sharing a decorated description,
    /// instead of trusting the digest alone.
    pub verify_chains: bool,
}

impl Default for DecoratorConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            wildcard: DEFAULT_WILDCARD.to_string(),
            digest_algorithm: DEFAULT_DIGEST.to_string(),
            verify_chains: true,
        }
    }
}

impl DecoratorConfig {
    pub fn from_json(text: &str) -> Result<Self, DecorationError> {
        let config: DecoratorConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DecorationError> {
        if self.prefix.is_empty() || self.prefix.split('.').any(str::is_empty) {
            return Err(DecorationError::InvalidConfig(format!(
                "prefix '{}' must be a non-empty dot-separated identifier",
                self.prefix
            )));
        }
        if self.wildcard.is_empty() || self.wildcard.contains('.') {
            return Err(DecorationError::InvalidConfig(format!(
                "wildcard '{}' must be a single non-empty component",
                self.wildcard
            )));
        }
        Ok(())
    }

    /// Store filter selecting every policy under the prefix.
    pub fn store_filter(&self) -> String {
        format!("{}*", self.prefix)
    }
}
