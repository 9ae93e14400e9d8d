//! Login Retry Limiter
//!
//! Counts failed login attempts per key (typically the principal). Every
//! write restarts the lockout window; once the count passes the limit each
//! further attempt fails with `ExcessiveAttempts` until the window lapses.

use std::sync::Arc;

use crate::application::config::RetryLimitConfig;
use crate::domain::cache::Cache;
use crate::domain::store::SharedStore;
use crate::error::{WardenError, WardenResult};
use crate::infra::memory::{Expiry, MemoryCache};
use crate::infra::store_cache::StoreCache;

#[derive(Clone)]
pub struct RetryLimiter<C> {
    cache: C,
    config: RetryLimitConfig,
}

impl RetryLimiter<MemoryCache<u32>> {
    /// Counters in process memory
    pub fn in_memory(config: RetryLimitConfig) -> Self {
        let cache = MemoryCache::new(Expiry::AfterWrite(config.locked_duration));
        Self::new(cache, config)
    }
}

impl<S> RetryLimiter<StoreCache<S, u32>>
where
    S: SharedStore + Send + Sync + 'static,
{
    /// Counters in the shared store, expiring natively
    pub fn shared(store: Arc<S>, config: RetryLimitConfig) -> Self {
        let cache = StoreCache::new(store, "").with_ttl(config.locked_duration);
        Self::new(cache, config)
    }
}

impl<C> RetryLimiter<C>
where
    C: Cache<u32> + Send + Sync + 'static,
{
    /// `cache` must expire entries `locked_duration` after each write
    pub fn new(cache: C, config: RetryLimitConfig) -> Self {
        Self { cache, config }
    }

    pub fn attempt_limit(&self) -> u32 {
        self.config.attempt_limit
    }

    fn cache_key(&self, key: &str) -> String {
        format!("{}{}", self.config.prefix, key)
    }

    fn locked_minutes(&self) -> u64 {
        self.config.locked_duration.as_secs().div_ceil(60)
    }

    /// Record a failed attempt
    pub async fn increase(&self, key: &str) -> WardenResult<()> {
        if !self.config.enabled {
            tracing::debug!("Retry limiter disabled");
            return Ok(());
        }

        let cache_key = self.cache_key(key);
        let count = match self.cache.get(&cache_key).await? {
            None => 1,
            Some(count) => count.saturating_add(1),
        };
        self.cache.put(&cache_key, count).await?;

        if count > self.config.attempt_limit {
            tracing::warn!(
                key = %key,
                count,
                limit = self.config.attempt_limit,
                "Retry limit exceeded, locked"
            );
            return Err(WardenError::ExcessiveAttempts {
                minutes: self.locked_minutes(),
            });
        }
        tracing::debug!(key = %key, count, "Failed attempt recorded");
        Ok(())
    }

    /// Fail with `ExcessiveAttempts` while `key` is locked, without counting
    pub async fn check(&self, key: &str) -> WardenResult<()> {
        if self.config.enabled && self.count(key).await? > self.config.attempt_limit {
            return Err(WardenError::ExcessiveAttempts {
                minutes: self.locked_minutes(),
            });
        }
        Ok(())
    }

    /// Forget the attempts for `key`, e.g. after a successful login
    pub async fn remove(&self, key: &str) -> WardenResult<()> {
        self.cache.remove(&self.cache_key(key)).await?;
        Ok(())
    }

    pub async fn count(&self, key: &str) -> WardenResult<u32> {
        Ok(self.cache.get(&self.cache_key(key)).await?.unwrap_or(0))
    }

    /// Attempts left before lockout; negative once locked
    pub async fn left_count(&self, key: &str) -> WardenResult<i64> {
        Ok(i64::from(self.config.attempt_limit) - i64::from(self.count(key).await?))
    }
}
