//! KV Cache Abstraction
//!
//! Every higher component reaches its storage through this interface only.
//! Implementations: `infra::memory::MemoryCache` (in-process, expiry on
//! access) and `infra::store_cache::StoreCache` (shared store, native TTL).

use std::collections::HashSet;

use crate::error::WardenResult;

/// Key/value cache contract
///
/// A missing key is `Ok(None)`, never an error; `Err` is reserved for
/// backend failures (`WardenError::CacheBackend`).
#[trait_variant::make(Cache: Send)]
pub trait LocalCache<V> {
    async fn get(&self, key: &str) -> WardenResult<Option<V>>;

    /// Store `value`, returning the previous value
    async fn put(&self, key: &str, value: V) -> WardenResult<Option<V>>;

    /// Remove `key`, returning the previous value
    async fn remove(&self, key: &str) -> WardenResult<Option<V>>;

    async fn clear(&self) -> WardenResult<()>;

    async fn size(&self) -> WardenResult<usize>;

    async fn keys(&self) -> WardenResult<HashSet<String>>;

    async fn values(&self) -> WardenResult<Vec<V>>;
}
