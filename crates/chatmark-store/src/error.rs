/// Errors raised by a key-value substrate.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    /// The write would push the substrate past its byte quota.
    #[error("capacity exceeded: write needs {required} bytes, quota is {limit}")]
    CapacityExceeded { required: u64, limit: u64 },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result alias for substrate operations.
pub type KvResult<T> = Result<T, KvError>;

/// Errors from schema store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The substrate rejected a write for size. The caller should prompt the
    /// user to export or prune.
    #[error("storage full while saving {key}: {required} bytes needed, quota is {limit}")]
    CapacityExceeded {
        key: String,
        required: u64,
        limit: u64,
    },

    /// A stored value is neither a legacy array nor a versioned envelope.
    #[error("malformed collection {key}: {reason}")]
    Malformed { key: String, reason: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid engine configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Any other substrate failure.
    #[error("storage error: {0}")]
    Kv(#[from] KvError),
}

impl StoreError {
    /// Returns `true` for capacity rejections.
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            Self::CapacityExceeded { .. } | Self::Kv(KvError::CapacityExceeded { .. })
        )
    }
}

/// Result alias for schema store operations.
pub type StoreResult<T> = Result<T, StoreError>;
