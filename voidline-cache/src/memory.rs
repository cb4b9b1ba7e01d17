//! In-memory implementation of the cache storage traits. Buckets live for
//! the lifetime of the process; a deleted bucket handle keeps working but is
//! no longer reachable through the storage.
use crate::{CacheBucket, CacheEntry, CacheError, CacheStorage, CachedResponse, RequestKey};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tracing::debug;

pub struct InMemoryCacheBucket {
    name: String,
    entries: Mutex<HashMap<RequestKey, CacheEntry>>,
}

impl InMemoryCacheBucket {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock_entries(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<RequestKey, CacheEntry>>, CacheError>
    {
        self.entries
            .lock()
            .map_err(|e| CacheError::Storage(e.to_string()))
    }
}

#[async_trait]
impl CacheBucket for InMemoryCacheBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn match_request(
        &self,
        key: &RequestKey,
    ) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.lock_entries()?.get(key).cloned())
    }

    async fn put(
        &self,
        key: RequestKey,
        response: CachedResponse,
    ) -> Result<(), CacheError> {
        if !key.is_cacheable() {
            return Err(CacheError::UnsupportedMethod(key.method));
        }
        let entry = CacheEntry {
            key: key.clone(),
            response,
            stored_at: SystemTime::now(),
        };
        debug!(bucket = %self.name, key = %key, "stored cache entry");
        self.lock_entries()?.insert(key, entry);
        Ok(())
    }

    async fn delete(&self, key: &RequestKey) -> Result<bool, CacheError> {
        Ok(self.lock_entries()?.remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<RequestKey>, CacheError> {
        Ok(self.lock_entries()?.keys().cloned().collect())
    }
}

impl std::fmt::Debug for InMemoryCacheBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let size = self.entries.lock().map(|e| e.len()).unwrap_or_default();
        f.debug_struct("InMemoryCacheBucket")
            .field("name", &self.name)
            .field("entries", &size)
            .finish()
    }
}

/// Named buckets kept in creation order.
#[derive(Debug, Default)]
pub struct InMemoryCacheStorage {
    buckets: Mutex<Vec<Arc<InMemoryCacheBucket>>>,
}

impl InMemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_buckets(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, Vec<Arc<InMemoryCacheBucket>>>, CacheError>
    {
        self.buckets
            .lock()
            .map_err(|e| CacheError::Storage(e.to_string()))
    }
}

#[async_trait]
impl CacheStorage for InMemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn CacheBucket>, CacheError> {
        let mut buckets = self.lock_buckets()?;
        if let Some(bucket) = buckets.iter().find(|b| b.name == name) {
            let bucket: Arc<dyn CacheBucket> = bucket.clone();
            return Ok(bucket);
        }
        debug!(bucket = name, "created cache bucket");
        let bucket = Arc::new(InMemoryCacheBucket::new(name));
        buckets.push(bucket.clone());
        let bucket: Arc<dyn CacheBucket> = bucket;
        Ok(bucket)
    }

    async fn has(&self, name: &str) -> Result<bool, CacheError> {
        Ok(self.lock_buckets()?.iter().any(|b| b.name == name))
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self
            .lock_buckets()?
            .iter()
            .map(|b| b.name.clone())
            .collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        let mut buckets = self.lock_buckets()?;
        let before = buckets.len();
        buckets.retain(|b| b.name != name);
        Ok(buckets.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(url: &str) -> RequestKey {
        RequestKey::parse("GET", url).unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_once() {
        let storage = InMemoryCacheStorage::new();
        let first = storage.open("release-cache-v1").await.unwrap();
        first
            .put(
                key("https://void.example/a.js"),
                CachedResponse::new("https://void.example/a.js", 200, "a"),
            )
            .await
            .unwrap();

        let again = storage.open("release-cache-v1").await.unwrap();
        assert_eq!(again.keys().await.unwrap().len(), 1);
        assert_eq!(storage.keys().await.unwrap(), vec!["release-cache-v1"]);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let storage = InMemoryCacheStorage::new();
        let bucket = storage.open("b").await.unwrap();
        let k = key("https://void.example/");

        bucket
            .put(k.clone(), CachedResponse::new(k.url.clone(), 200, "old"))
            .await
            .unwrap();
        bucket
            .put(k.clone(), CachedResponse::new(k.url.clone(), 200, "new"))
            .await
            .unwrap();

        let entry = bucket.match_request(&k).await.unwrap().unwrap();
        assert_eq!(entry.response.body, b"new".to_vec());
        assert_eq!(bucket.keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_put_rejects_post() {
        let storage = InMemoryCacheStorage::new();
        let bucket = storage.open("b").await.unwrap();
        let k = RequestKey::parse("POST", "https://void.example/submit").unwrap();

        let result = bucket
            .put(k.clone(), CachedResponse::new(k.url.clone(), 200, ""))
            .await;
        assert_eq!(result, Err(CacheError::UnsupportedMethod("POST".into())));
        assert!(bucket.match_request(&k).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_bucket() {
        let storage = InMemoryCacheStorage::new();
        storage.open("release-cache-v1").await.unwrap();
        storage.open("release-cache-v2").await.unwrap();

        assert!(storage.delete("release-cache-v1").await.unwrap());
        assert!(!storage.delete("release-cache-v1").await.unwrap());
        assert!(!storage.has("release-cache-v1").await.unwrap());
        assert_eq!(storage.keys().await.unwrap(), vec!["release-cache-v2"]);
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let storage = InMemoryCacheStorage::new();
        let bucket = storage.open("b").await.unwrap();
        let k = key("https://void.example/b.css");
        bucket
            .put(k.clone(), CachedResponse::new(k.url.clone(), 200, "b"))
            .await
            .unwrap();

        assert!(bucket.delete(&k).await.unwrap());
        assert!(!bucket.delete(&k).await.unwrap());
        assert!(bucket.match_request(&k).await.unwrap().is_none());
    }
}
