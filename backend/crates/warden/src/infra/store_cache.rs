//! Shared-store cache
//!
//! A namespaced `Cache` over any `SharedStore`. Values are stored as JSON
//! strings; expiry is native to the backend.

use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::cache::Cache;
use crate::domain::store::SharedStore;
use crate::error::WardenResult;

pub struct StoreCache<S, V> {
    store: Arc<S>,
    namespace: String,
    ttl: Option<Duration>,
    _value: PhantomData<fn() -> V>,
}

impl<S, V> Clone for StoreCache<S, V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            namespace: self.namespace.clone(),
            ttl: self.ttl,
            _value: PhantomData,
        }
    }
}

impl<S, V> StoreCache<S, V> {
    /// Every key is stored as `namespace + key`. `clear`, `keys` and `size`
    /// operate on the whole namespace, so it should be dedicated to this cache.
    pub fn new(store: Arc<S>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            ttl: None,
            _value: PhantomData,
        }
    }

    /// Expire every written entry after `ttl` (rounded up to whole seconds)
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    fn ttl_secs(&self) -> Option<u64> {
        self.ttl.map(|ttl| {
            let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
            secs.max(1)
        })
    }
}

impl<S, V> Cache<V> for StoreCache<S, V>
where
    S: SharedStore + Send + Sync + 'static,
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> WardenResult<Option<V>> {
        let raw = self.store.get(&self.full_key(key)).await?;
        tracing::trace!(namespace = %self.namespace, key = %key, hit = raw.is_some(), "Store cache lookup");
        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(Into::into)
    }

    async fn put(&self, key: &str, value: V) -> WardenResult<Option<V>> {
        let previous = self.get(key).await?;
        let json = serde_json::to_string(&value)?;
        let full_key = self.full_key(key);
        match self.ttl_secs() {
            Some(secs) => self.store.set_ex(&full_key, &json, secs).await?,
            None => self.store.set(&full_key, &json).await?,
        }
        Ok(previous)
    }

    async fn remove(&self, key: &str) -> WardenResult<Option<V>> {
        let previous = self.get(key).await?;
        self.store.del(&self.full_key(key)).await?;
        Ok(previous)
    }

    async fn clear(&self) -> WardenResult<()> {
        let keys = self.store.keys_with_prefix(&self.namespace).await?;
        for key in &keys {
            self.store.del(key).await?;
        }
        tracing::debug!(namespace = %self.namespace, removed = keys.len(), "Store cache cleared");
        Ok(())
    }

    async fn size(&self) -> WardenResult<usize> {
        Ok(self.store.keys_with_prefix(&self.namespace).await?.len())
    }

    async fn keys(&self) -> WardenResult<HashSet<String>> {
        let keys = self.store.keys_with_prefix(&self.namespace).await?;
        Ok(keys
            .into_iter()
            .filter_map(|key| key.strip_prefix(&self.namespace).map(str::to_string))
            .collect())
    }

    async fn values(&self) -> WardenResult<Vec<V>> {
        let keys = self.store.keys_with_prefix(&self.namespace).await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut values = Vec::with_capacity(keys.len());
        for json in self.store.mget(&keys).await?.into_iter().flatten() {
            values.push(serde_json::from_str(&json)?);
        }
        Ok(values)
    }
}
