//! Cache for rendered pages, keyed by hash-bang path.
//!
//! The core treats the cache as an external key/value store: a thin
//! `exists`/`get`/`put` surface with no TTL, eviction, or size bounding.
//! Invalidation policy belongs to whoever operates the store. Two backends
//! are provided:
//!
//! - [`SqliteStore`]: persistent, via tokio-rusqlite with WAL mode
//! - [`MemoryStore`]: in-process map, used by tests and small deployments

pub mod connection;
pub mod memory;
pub mod migrations;
pub mod pages;

pub use crate::Error;

pub use connection::SqliteStore;
pub use memory::MemoryStore;

/// External key/value store for rendered pages.
///
/// `exists` and `get` are two independent calls; under concurrent misses two
/// requests may both render the same page and race on the write. The store
/// contract accepts that race (last write wins, both writes carry fully
/// sanitized content).
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    /// Whether a rendered page is stored under `key`.
    async fn exists(&self, key: &str) -> Result<bool, Error>;

    /// Fetch the rendered page stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Store a rendered page under `key`, replacing any previous entry.
    async fn put(&self, key: &str, html: &str) -> Result<(), Error>;
}
