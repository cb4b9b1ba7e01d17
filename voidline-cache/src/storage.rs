use crate::{CacheEntry, CacheError, CachedResponse, RequestKey};
use async_trait::async_trait;
use std::sync::Arc;

/// A single named bucket of request -> response snapshots.
#[async_trait]
pub trait CacheBucket: Send + Sync {
    /// Bucket name, including its version token
    fn name(&self) -> &str;

    /// Look up the stored response for a request
    async fn match_request(
        &self,
        key: &RequestKey,
    ) -> Result<Option<CacheEntry>, CacheError>;

    /// Store (or overwrite) the response for a request. Only GET-like
    /// requests are accepted.
    async fn put(
        &self,
        key: RequestKey,
        response: CachedResponse,
    ) -> Result<(), CacheError>;

    /// Remove a stored response, returns whether one existed
    async fn delete(&self, key: &RequestKey) -> Result<bool, CacheError>;

    /// Every request currently stored
    async fn keys(&self) -> Result<Vec<RequestKey>, CacheError>;
}

/// Registry of named buckets.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a bucket, creating it when absent
    async fn open(&self, name: &str) -> Result<Arc<dyn CacheBucket>, CacheError>;

    async fn has(&self, name: &str) -> Result<bool, CacheError>;

    /// Names of all buckets, in creation order
    async fn keys(&self) -> Result<Vec<String>, CacheError>;

    /// Drop a bucket with all its entries, returns whether it existed
    async fn delete(&self, name: &str) -> Result<bool, CacheError>;
}
