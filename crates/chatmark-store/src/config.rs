use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Engine configuration shared by the store, the registry and the CLI.
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// key_prefix = "notes:"
/// soft_limit_bytes = 1048576
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Namespace prepended to every collection key.
    pub key_prefix: String,
    /// Serialized collection size above which saves carry an advisory
    /// warning.
    pub soft_limit_bytes: u64,
    /// Hard quota for the built-in substrates. `None` means unbounded.
    pub capacity_bytes: Option<u64>,
    /// Regex locating the conversation id in a host path. The first capture
    /// group (or the whole match if there is none) becomes the id.
    pub id_pattern: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: "chatmark:".into(),
            soft_limit_bytes: 4 * 1024 * 1024,
            capacity_bytes: Some(5 * 1024 * 1024),
            id_pattern: r"/c/([A-Za-z0-9_-]{8,})".into(),
        }
    }
}

impl StoreConfig {
    /// Parse a TOML document, filling unspecified fields with defaults.
    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| StoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check field-level constraints.
    pub fn validate(&self) -> StoreResult<()> {
        if self.key_prefix.is_empty() {
            return Err(StoreError::Config("key_prefix must not be empty".into()));
        }
        if let Some(cap) = self.capacity_bytes {
            if cap < self.soft_limit_bytes {
                return Err(StoreError::Config(format!(
                    "capacity_bytes ({cap}) is below soft_limit_bytes ({})",
                    self.soft_limit_bytes
                )));
            }
        }
        regex::Regex::new(&self.id_pattern)
            .map_err(|e| StoreError::Config(format!("id_pattern: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = StoreConfig::default();
        assert_eq!(c.key_prefix, "chatmark:");
        assert_eq!(c.soft_limit_bytes, 4 * 1024 * 1024);
        assert_eq!(c.capacity_bytes, Some(5 * 1024 * 1024));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = StoreConfig::from_toml_str("key_prefix = \"notes:\"\n").unwrap();
        assert_eq!(c.key_prefix, "notes:");
        assert_eq!(c.id_pattern, StoreConfig::default().id_pattern);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(StoreConfig::from_toml_str("key_prefix = \"\"").is_err());
        assert!(StoreConfig::from_toml_str("id_pattern = \"([\"").is_err());
        assert!(StoreConfig::from_toml_str(
            "soft_limit_bytes = 100\ncapacity_bytes = 10"
        )
        .is_err());
        assert!(StoreConfig::from_toml_str("soft_limit_bytes = \"big\"").is_err());
    }
}
