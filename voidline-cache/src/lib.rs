//! Versioned request/response cache buckets for the voidline worker.
//!
//! A [`CacheStorage`] holds named buckets; each [`CacheBucket`] maps a
//! [`RequestKey`] (method + URL) to a [`CachedResponse`] snapshot. Storage is
//! trait-based so backends can be swapped; an in-memory backend ships here.

mod cache;
mod error;
mod memory;
mod storage;

pub use cache::{CacheEntry, CachedResponse, RequestKey};
pub use error::CacheError;
pub use memory::{InMemoryCacheBucket, InMemoryCacheStorage};
pub use storage::{CacheBucket, CacheStorage};
