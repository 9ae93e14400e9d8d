//! Shared Store
//!
//! The primitives the distributed session store needs from a Redis-like
//! backend: strings with TTL, hashes and sorted sets.

use crate::error::WardenResult;

/// `ttl` result for a missing key
pub const TTL_MISSING: i64 = -2;
/// `ttl` result for a key without expiry
pub const TTL_PERSISTENT: i64 = -1;

#[trait_variant::make(SharedStore: Send)]
pub trait LocalSharedStore {
    async fn get(&self, key: &str) -> WardenResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> WardenResult<()>;

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> WardenResult<()>;

    /// `SET key value EX ttl XX`: write only over an existing key.
    /// Returns whether the key was written.
    async fn set_ex_existing(&self, key: &str, value: &str, ttl_secs: u64) -> WardenResult<bool>;

    /// Remaining seconds, [`TTL_MISSING`] or [`TTL_PERSISTENT`]
    async fn ttl(&self, key: &str) -> WardenResult<i64>;

    /// Returns whether the key existed
    async fn del(&self, key: &str) -> WardenResult<bool>;

    async fn keys_with_prefix(&self, prefix: &str) -> WardenResult<Vec<String>>;

    /// One slot per key, in order; `None` for missing keys
    async fn mget(&self, keys: &[String]) -> WardenResult<Vec<Option<String>>>;

    async fn hset(&self, key: &str, field: &str, value: &str) -> WardenResult<()>;

    async fn hget(&self, key: &str, field: &str) -> WardenResult<Option<String>>;

    /// Returns the number of fields removed
    async fn hdel(&self, key: &str, fields: &[String]) -> WardenResult<u64>;

    async fn hgetall(&self, key: &str) -> WardenResult<Vec<(String, String)>>;

    async fn zadd(&self, key: &str, member: &str, score: i64) -> WardenResult<()>;

    /// Members by ascending score, inclusive indices
    async fn zrange(&self, key: &str, start: i64, stop: i64) -> WardenResult<Vec<String>>;

    /// Returns the number of members removed
    async fn zrem(&self, key: &str, members: &[String]) -> WardenResult<u64>;

    async fn zcard(&self, key: &str) -> WardenResult<u64>;
}
