//! In-process map store.
//!
//! Backs tests and deployments that do not need persistence across restarts.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::{CacheStore, Error};

/// In-memory store for rendered pages.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pages: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored pages.
    pub async fn len(&self) -> usize {
        self.pages.read().await.len()
    }

    /// Whether the store holds no pages.
    pub async fn is_empty(&self) -> bool {
        self.pages.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl CacheStore for MemoryStore {
    async fn exists(&self, key: &str) -> Result<bool, Error> {
        Ok(self.pages.read().await.contains_key(key))
    }

    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.pages.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, html: &str) -> Result<(), Error> {
        self.pages
            .write()
            .await
            .insert(key.to_string(), html.to_string());
        Ok(())
    }
}
