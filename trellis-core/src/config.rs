//! Renderer configuration.
//!
//! Configuration is plain serde data so that hosts can load it from whatever
//! format they already use (JSON in the tests below).

use serde::{Deserialize, Serialize};

/// What the reconciler does when a children list repeats a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKeyPolicy {
    /// Fail the render with [`Error::DuplicateKey`](crate::Error::DuplicateKey).
    #[default]
    Reject,
    /// Log a warning and let the last occurrence win the key lookup.
    Warn,
    /// Silently let the last occurrence win.
    Allow,
}

/// Options for a [`Renderer`](crate::renderer::Renderer).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Handling of repeated keys within one children list.
    pub duplicate_keys: DuplicateKeyPolicy,
}

impl RendererConfig {
    /// Parse a configuration from a JSON document.
    pub fn from_json(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rejects_duplicates() {
        assert_eq!(
            RendererConfig::default().duplicate_keys,
            DuplicateKeyPolicy::Reject
        );
    }

    #[test]
    fn parses_from_json() {
        let config = RendererConfig::from_json(r#"{ "duplicate_keys": "warn" }"#).unwrap();
        assert_eq!(config.duplicate_keys, DuplicateKeyPolicy::Warn);

        let config = RendererConfig::from_json("{}").unwrap();
        assert_eq!(config, RendererConfig::default());
    }
}
