//! Collection key derivation.
//!
//! A collection key is the namespace prefix followed by a conversation id
//! taken from the host's path. When the path carries no recognizable id the
//! whole path is used with `/` replaced by `_`, so every distinct page still
//! gets its own collection.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};

/// A fully namespaced storage key for one collection.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionKey(String);

impl CollectionKey {
    /// Wrap a key that is already namespaced (e.g. read from an export).
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CollectionKey({})", self.0)
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives and recognizes collection keys for one namespace.
#[derive(Clone, Debug)]
pub struct CollectionKeys {
    prefix: String,
    id_pattern: Regex,
}

impl CollectionKeys {
    pub fn new(prefix: impl Into<String>, id_pattern: &str) -> StoreResult<Self> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(StoreError::Config("key_prefix must not be empty".into()));
        }
        let id_pattern = Regex::new(id_pattern)
            .map_err(|e| StoreError::Config(format!("id_pattern: {e}")))?;
        Ok(Self { prefix, id_pattern })
    }

    pub fn from_config(config: &StoreConfig) -> StoreResult<Self> {
        Self::new(config.key_prefix.clone(), &config.id_pattern)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The conversation id found in `path`, if any.
    pub fn conversation_id<'a>(&self, path: &'a str) -> Option<&'a str> {
        let caps = self.id_pattern.captures(path)?;
        caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str())
    }

    /// Derive the collection key for a host path.
    pub fn derive(&self, path: &str) -> CollectionKey {
        let id = match self.conversation_id(path) {
            Some(id) => id.to_string(),
            None => path.replace('/', "_"),
        };
        CollectionKey(format!("{}{id}", self.prefix))
    }

    /// Returns `true` if `key` belongs to this namespace.
    pub fn owns(&self, key: &str) -> bool {
        key.starts_with(&self.prefix)
    }

    /// The part of `key` after the namespace prefix.
    pub fn local_part<'a>(&self, key: &'a CollectionKey) -> &'a str {
        key.as_str().strip_prefix(&self.prefix).unwrap_or(key.as_str())
    }
}
