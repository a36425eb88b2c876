//! Parse cache keyed by document identity.
//!
//! The key is the content hash of the document bytes (see
//! `ragparse_core::document_id`), so renames and copies of the same file hit
//! the same entry while any byte change misses.

use async_trait::async_trait;
use ragparse_core::{ContentList, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// One cached parse result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedParse {
    /// Normalized content blocks, in document order.
    pub content_list: ContentList,
    /// Content-derived document id (`doc-<sha256>`), equal to the cache key.
    pub doc_id: String,
}

/// Async key-value store for parse results.
///
/// Implementations must be safe for concurrent readers and writers; the
/// processor serializes parses per key itself, so `put` for a given key is
/// not racy in practice, but stores may still see concurrent `get`s.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch the entry for `key`, if present.
    async fn get(&self, key: &str) -> Result<Option<CachedParse>>;

    /// Insert or replace the entry for `key`.
    async fn put(&self, key: &str, value: CachedParse) -> Result<()>;
}

/// In-process cache store. Entries live for the lifetime of the store.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, CachedParse>>,
}

impl MemoryCacheStore {
    /// Empty store.
    #[must_use = "store is created but not used"]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// True when nothing has been cached yet.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<CachedParse>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: CachedParse) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }
}
