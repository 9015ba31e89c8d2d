//! Versioned cache stores: URL → captured HTTP response.
//!
//! A store is a named generation of the cache, keyed by request URL. At most
//! one store name is current at any time; the rest are garbage awaiting the
//! activation sweep.

use async_trait::async_trait;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::fetch::FetchResponse;
use crate::Result;

/// A cached request/response pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Request URL (the cache key).
    pub url: String,

    /// Request method.
    pub method: String,

    /// Response status.
    pub status: u16,

    /// Response headers.
    pub headers: HashMap<String, String>,

    /// Response body.
    pub body: Vec<u8>,

    /// Cached at timestamp (ms since epoch).
    pub cached_at: u64,
}

impl CacheEntry {
    /// Capture a response under the given request URL.
    pub fn from_response(url: &str, response: &FetchResponse) -> Self {
        Self {
            url: url.to_string(),
            method: "GET".to_string(),
            status: response.status.as_u16(),
            headers: crate::fetch::headers_to_map(&response.headers),
            body: response.body.to_vec(),
            cached_at: now_ms(),
        }
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// One named cache store.
#[derive(Debug, Default)]
pub struct Cache {
    /// Store name (the version tag that created it).
    pub name: String,

    entries: HashMap<String, CacheEntry>,
}

impl Cache {
    /// Create a new, empty store.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: HashMap::new(),
        }
    }

    /// Match a request by URL.
    pub fn match_request(&self, url: &str) -> Option<&CacheEntry> {
        self.entries.get(url)
    }

    /// Insert an entry, keyed by its request URL.
    pub fn put(&mut self, entry: CacheEntry) {
        self.entries.insert(entry.url.clone(), entry);
    }

    /// Get all entry keys (URLs).
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The host cache-store API: open-or-create, insert, lookup, delete, list.
///
/// Implementations must be safe to share across concurrently in-flight fetch
/// handlers. Fakes stand in for the host platform in tests.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Open a store by name, creating it if absent.
    async fn open(&self, name: &str) -> Result<()>;

    /// Insert a single entry into the named store.
    async fn put(&self, name: &str, entry: CacheEntry) -> Result<()>;

    /// Insert a batch of entries into the named store, all or nothing.
    async fn put_all(&self, name: &str, entries: Vec<CacheEntry>) -> Result<()>;

    /// Look up an entry by request URL.
    async fn get(&self, name: &str, url: &str) -> Result<Option<CacheEntry>>;

    /// Delete a whole store by name. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool>;

    /// List all store names.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Check whether a store exists.
    async fn has(&self, name: &str) -> Result<bool>;

    /// List the entry keys (URLs) of the named store.
    async fn entry_keys(&self, name: &str) -> Result<Vec<String>>;
}

/// In-memory cache store.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    stores: RwLock<HashMap<String, Cache>>,
}

impl MemoryCacheStore {
    /// Create new, empty storage.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn open(&self, name: &str) -> Result<()> {
        let mut stores = self.stores.write().await;
        stores
            .entry(name.to_string())
            .or_insert_with(|| Cache::new(name));
        Ok(())
    }

    async fn put(&self, name: &str, entry: CacheEntry) -> Result<()> {
        let mut stores = self.stores.write().await;
        let cache = stores
            .entry(name.to_string())
            .or_insert_with(|| Cache::new(name));
        cache.put(entry);
        Ok(())
    }

    async fn put_all(&self, name: &str, entries: Vec<CacheEntry>) -> Result<()> {
        // Single critical section: the batch lands as a whole.
        let mut stores = self.stores.write().await;
        let cache = stores
            .entry(name.to_string())
            .or_insert_with(|| Cache::new(name));
        for entry in entries {
            cache.put(entry);
        }
        Ok(())
    }

    async fn get(&self, name: &str, url: &str) -> Result<Option<CacheEntry>> {
        let stores = self.stores.read().await;
        Ok(stores
            .get(name)
            .and_then(|cache| cache.match_request(url))
            .cloned())
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let mut stores = self.stores.write().await;
        Ok(stores.remove(name).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let stores = self.stores.read().await;
        Ok(stores.keys().cloned().collect())
    }

    async fn has(&self, name: &str) -> Result<bool> {
        let stores = self.stores.read().await;
        Ok(stores.contains_key(name))
    }

    async fn entry_keys(&self, name: &str) -> Result<Vec<String>> {
        let stores = self.stores.read().await;
        Ok(stores.get(name).map(|cache| cache.keys()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: &str) -> CacheEntry {
        CacheEntry {
            url: url.to_string(),
            method: "GET".to_string(),
            status: 200,
            headers: HashMap::new(),
            body: b"body".to_vec(),
            cached_at: 0,
        }
    }

    #[test]
    fn test_cache_put_and_match() {
        let mut cache = Cache::new("v1");
        cache.put(entry("https://example.com/style.css"));

        assert!(cache.match_request("https://example.com/style.css").is_some());
        assert!(cache.match_request("https://example.com/other.css").is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_put_overwrites() {
        let mut cache = Cache::new("v1");
        cache.put(entry("https://example.com/app.js"));
        let mut updated = entry("https://example.com/app.js");
        updated.body = b"v2".to_vec();
        cache.put(updated);

        assert_eq!(cache.len(), 1);
        let got = cache.match_request("https://example.com/app.js").unwrap();
        assert_eq!(got.body, b"v2");
    }

    #[tokio::test]
    async fn test_memory_store_open_and_has() {
        let store = MemoryCacheStore::new();
        assert!(!store.has("v1").await.unwrap());

        store.open("v1").await.unwrap();
        assert!(store.has("v1").await.unwrap());
        assert!(store.entry_keys("v1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_put_all_and_get() {
        let store = MemoryCacheStore::new();
        store
            .put_all("v1", vec![entry("a.html"), entry("b.js")])
            .await
            .unwrap();

        assert!(store.get("v1", "a.html").await.unwrap().is_some());
        assert!(store.get("v1", "b.js").await.unwrap().is_some());
        assert!(store.get("v1", "c.css").await.unwrap().is_none());
        assert_eq!(store.entry_keys("v1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_memory_store_delete() {
        let store = MemoryCacheStore::new();
        store.open("v1").await.unwrap();
        store.open("v2").await.unwrap();

        assert!(store.delete("v1").await.unwrap());
        assert!(!store.delete("v1").await.unwrap());
        assert_eq!(store.keys().await.unwrap(), vec!["v2".to_string()]);
    }

    #[tokio::test]
    async fn test_memory_store_isolated_generations() {
        let store = MemoryCacheStore::new();
        store.put("v1", entry("index.html")).await.unwrap();

        assert!(store.get("v2", "index.html").await.unwrap().is_none());
    }
}
