//! Versioned persistence for chatmark collections.
//!
//! Annotations for one conversation live in a single [`Collection`] stored
//! under a namespaced [`CollectionKey`] in a key-value substrate supplied by
//! the host.
//!
//! # Substrates
//!
//! All backends implement the async [`KvStore`] trait:
//!
//! - [`InMemoryKvStore`] -- `BTreeMap`-based store for tests and embedding
//! - [`FileKvStore`] -- one JSON document on disk, replaced atomically
//!
//! Both can enforce a byte quota, rejecting oversized writes with the
//! distinguishable [`KvError::CapacityExceeded`].
//!
//! # Design Rules
//!
//! 1. A write either lands completely or not at all.
//! 2. Reads normalize legacy shapes; only writes change what is stored.
//! 3. Migration is monotonic and idempotent.
//! 4. Undecodable records are skipped with a warning, never fatal to a load.
//! 5. Capacity rejections are reported distinctly from other failures.
//!
//! [`Collection`]: chatmark_types::Collection

pub mod config;
pub mod error;
pub mod file;
pub mod key;
pub mod memory;
pub mod migrate;
pub mod schema;
pub mod traits;

pub use config::StoreConfig;
pub use error::{KvError, KvResult, StoreError, StoreResult};
pub use file::FileKvStore;
pub use key::{CollectionKey, CollectionKeys};
pub use memory::InMemoryKvStore;
pub use migrate::{migrate, normalize, Normalized};
pub use schema::{SaveReport, SchemaStore};
pub use traits::KvStore;
