//! In-process storage
//!
//! `MemoryCache` backs the local session store, the retry limiter and the
//! catalog cache in single-node deployments. `MemoryStore` emulates the
//! shared-store primitives so the distributed session store can run without
//! a Redis server (development and tests).
//!
//! Expiry is lazy: an entry past its deadline is dropped the next time it is
//! touched. Deadlines use `tokio::time::Instant`, so paused-clock tests can
//! drive them with `tokio::time::advance`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::domain::cache::Cache;
use crate::domain::store::{SharedStore, TTL_MISSING, TTL_PERSISTENT};
use crate::error::{WardenError, WardenResult};

/// Entry expiry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiry {
    #[default]
    Never,
    /// Deadline set on every write
    AfterWrite(Duration),
    /// Deadline set on every write and every successful read
    AfterAccess(Duration),
}

impl Expiry {
    fn deadline(&self, now: Instant) -> Option<Instant> {
        match self {
            Expiry::Never => None,
            Expiry::AfterWrite(ttl) | Expiry::AfterAccess(ttl) => Some(now + *ttl),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    deadline: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }
}

/// Concurrent in-process cache
#[derive(Debug)]
pub struct MemoryCache<V> {
    entries: Arc<DashMap<String, Entry<V>>>,
    expiry: Expiry,
}

impl<V> Clone for MemoryCache<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            expiry: self.expiry,
        }
    }
}

impl<V> Default for MemoryCache<V> {
    fn default() -> Self {
        Self::new(Expiry::Never)
    }
}

impl<V> MemoryCache<V> {
    pub fn new(expiry: Expiry) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            expiry,
        }
    }

    pub fn expiry(&self) -> Expiry {
        self.expiry
    }

    /// Overwrite `key` only while a live entry holds it; returns whether it
    /// was written
    pub fn replace_existing(&self, key: &str, value: V) -> bool {
        let now = Instant::now();
        match self.entries.get_mut(key) {
            Some(mut entry) if !entry.is_expired(now) => {
                entry.value = value;
                entry.deadline = self.expiry.deadline(now);
                true
            }
            _ => false,
        }
    }

    fn purge_expired(&self, now: Instant) {
        self.entries.retain(|_, entry| !entry.is_expired(now));
    }
}

impl<V: Clone> MemoryCache<V> {
    fn lookup(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        {
            let mut entry = self.entries.get_mut(key)?;
            if !entry.is_expired(now) {
                if let Expiry::AfterAccess(ttl) = self.expiry {
                    entry.deadline = Some(now + ttl);
                }
                return Some(entry.value.clone());
            }
        }
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        None
    }

    fn store(&self, key: &str, value: V) -> Option<V> {
        let now = Instant::now();
        let entry = Entry {
            value,
            deadline: self.expiry.deadline(now),
        };
        self.entries
            .insert(key.to_string(), entry)
            .filter(|previous| !previous.is_expired(now))
            .map(|previous| previous.value)
    }

    fn evict(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        self.entries
            .remove(key)
            .map(|(_, previous)| previous)
            .filter(|previous| !previous.is_expired(now))
            .map(|previous| previous.value)
    }
}

impl<V> Cache<V> for MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> WardenResult<Option<V>> {
        let value = self.lookup(key);
        tracing::trace!(key = %key, hit = value.is_some(), "Memory cache lookup");
        Ok(value)
    }

    async fn put(&self, key: &str, value: V) -> WardenResult<Option<V>> {
        Ok(self.store(key, value))
    }

    async fn remove(&self, key: &str) -> WardenResult<Option<V>> {
        Ok(self.evict(key))
    }

    async fn clear(&self) -> WardenResult<()> {
        self.entries.clear();
        Ok(())
    }

    async fn size(&self) -> WardenResult<usize> {
        self.purge_expired(Instant::now());
        Ok(self.entries.len())
    }

    async fn keys(&self) -> WardenResult<HashSet<String>> {
        self.purge_expired(Instant::now());
        Ok(self.entries.iter().map(|e| e.key().clone()).collect())
    }

    async fn values(&self) -> WardenResult<Vec<V>> {
        self.purge_expired(Instant::now());
        Ok(self.entries.iter().map(|e| e.value().value.clone()).collect())
    }
}

#[derive(Debug, Clone)]
enum StoreValue {
    Str(String),
    Hash(HashMap<String, String>),
    ZSet(HashMap<String, i64>),
}

impl StoreValue {
    fn is_empty(&self) -> bool {
        match self {
            StoreValue::Str(_) => false,
            StoreValue::Hash(map) => map.is_empty(),
            StoreValue::ZSet(set) => set.is_empty(),
        }
    }
}

fn wrong_type(key: &str) -> WardenError {
    WardenError::CacheBackend(format!(
        "WRONGTYPE operation against key '{key}' holding the wrong kind of value"
    ))
}

/// Single-process emulation of the shared-store primitives
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, Entry<StoreValue>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn purge_if_expired(&self, key: &str) {
        let now = Instant::now();
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
    }

    fn write(&self, key: &str, value: StoreValue, ttl: Option<Duration>) {
        let entry = Entry {
            value,
            deadline: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.insert(key.to_string(), entry);
    }

    fn read_str(&self, key: &str) -> WardenResult<Option<String>> {
        self.purge_if_expired(key);
        match self.entries.get(key).map(|e| e.value.clone()) {
            None => Ok(None),
            Some(StoreValue::Str(value)) => Ok(Some(value)),
            Some(_) => Err(wrong_type(key)),
        }
    }

    /// Mutate the container at `key`, creating it with `init` when missing.
    /// Empty containers are removed afterwards.
    fn with_container<T>(
        &self,
        key: &str,
        init: impl FnOnce() -> StoreValue,
        f: impl FnOnce(&mut StoreValue) -> WardenResult<T>,
    ) -> WardenResult<T> {
        self.purge_if_expired(key);
        let result = {
            let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
                value: init(),
                deadline: None,
            });
            f(&mut entry.value)
        };
        self.entries.remove_if(key, |_, entry| entry.value.is_empty());
        result
    }

    fn read_container<T>(
        &self,
        key: &str,
        empty: T,
        f: impl FnOnce(&StoreValue) -> WardenResult<T>,
    ) -> WardenResult<T> {
        self.purge_if_expired(key);
        match self.entries.get(key) {
            None => Ok(empty),
            Some(entry) => f(&entry.value),
        }
    }
}

/// Redis ZRANGE index normalization
fn range_bounds(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (start + len).max(0) } else { start };
    let stop = if stop < 0 { stop + len } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

impl SharedStore for MemoryStore {
    async fn get(&self, key: &str) -> WardenResult<Option<String>> {
        self.read_str(key)
    }

    async fn set(&self, key: &str, value: &str) -> WardenResult<()> {
        self.write(key, StoreValue::Str(value.to_string()), None);
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> WardenResult<()> {
        self.write(
            key,
            StoreValue::Str(value.to_string()),
            Some(Duration::from_secs(ttl_secs)),
        );
        Ok(())
    }

    async fn set_ex_existing(&self, key: &str, value: &str, ttl_secs: u64) -> WardenResult<bool> {
        let now = Instant::now();
        match self.entries.get_mut(key) {
            Some(mut entry) if !entry.is_expired(now) => {
                entry.value = StoreValue::Str(value.to_string());
                entry.deadline = Some(now + Duration::from_secs(ttl_secs));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> WardenResult<i64> {
        self.purge_if_expired(key);
        let Some(entry) = self.entries.get(key) else {
            return Ok(TTL_MISSING);
        };
        Ok(match entry.deadline {
            None => TTL_PERSISTENT,
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                ((remaining.as_millis() + 500) / 1000) as i64
            }
        })
    }

    async fn del(&self, key: &str) -> WardenResult<bool> {
        self.purge_if_expired(key);
        Ok(self.entries.remove(key).is_some())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> WardenResult<Vec<String>> {
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        Ok(self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect())
    }

    async fn mget(&self, keys: &[String]) -> WardenResult<Vec<Option<String>>> {
        // MGET answers nil for non-string keys
        Ok(keys
            .iter()
            .map(|key| self.read_str(key).ok().flatten())
            .collect())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> WardenResult<()> {
        self.with_container(
            key,
            || StoreValue::Hash(HashMap::new()),
            |container| match container {
                StoreValue::Hash(map) => {
                    map.insert(field.to_string(), value.to_string());
                    Ok(())
                }
                _ => Err(wrong_type(key)),
            },
        )
    }

    async fn hget(&self, key: &str, field: &str) -> WardenResult<Option<String>> {
        self.read_container(key, None, |container| match container {
            StoreValue::Hash(map) => Ok(map.get(field).cloned()),
            _ => Err(wrong_type(key)),
        })
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> WardenResult<u64> {
        if !self.entries.contains_key(key) {
            return Ok(0);
        }
        self.with_container(
            key,
            || StoreValue::Hash(HashMap::new()),
            |container| match container {
                StoreValue::Hash(map) => {
                    Ok(fields.iter().filter(|f| map.remove(*f).is_some()).count() as u64)
                }
                _ => Err(wrong_type(key)),
            },
        )
    }

    async fn hgetall(&self, key: &str) -> WardenResult<Vec<(String, String)>> {
        self.read_container(key, Vec::new(), |container| match container {
            StoreValue::Hash(map) => Ok(map
                .iter()
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect()),
            _ => Err(wrong_type(key)),
        })
    }

    async fn zadd(&self, key: &str, member: &str, score: i64) -> WardenResult<()> {
        self.with_container(
            key,
            || StoreValue::ZSet(HashMap::new()),
            |container| match container {
                StoreValue::ZSet(set) => {
                    set.insert(member.to_string(), score);
                    Ok(())
                }
                _ => Err(wrong_type(key)),
            },
        )
    }

    async fn zrange(&self, key: &str, start: i64, stop: i64) -> WardenResult<Vec<String>> {
        self.read_container(key, Vec::new(), |container| match container {
            StoreValue::ZSet(set) => {
                let mut members: Vec<(&String, &i64)> = set.iter().collect();
                members.sort_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)));
                Ok(match range_bounds(members.len(), start, stop) {
                    Some((from, to)) => members[from..=to]
                        .iter()
                        .map(|(member, _)| (*member).clone())
                        .collect(),
                    None => Vec::new(),
                })
            }
            _ => Err(wrong_type(key)),
        })
    }

    async fn zrem(&self, key: &str, members: &[String]) -> WardenResult<u64> {
        if !self.entries.contains_key(key) {
            return Ok(0);
        }
        self.with_container(
            key,
            || StoreValue::ZSet(HashMap::new()),
            |container| match container {
                StoreValue::ZSet(set) => {
                    Ok(members.iter().filter(|m| set.remove(*m).is_some()).count() as u64)
                }
                _ => Err(wrong_type(key)),
            },
        )
    }

    async fn zcard(&self, key: &str) -> WardenResult<u64> {
        self.read_container(key, 0, |container| match container {
            StoreValue::ZSet(set) => Ok(set.len() as u64),
            _ => Err(wrong_type(key)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cache_put_returns_previous() {
        let cache: MemoryCache<u32> = MemoryCache::default();
        assert_eq!(cache.put("a", 1).await.unwrap(), None);
        assert_eq!(cache.put("a", 2).await.unwrap(), Some(1));
        assert_eq!(cache.get("a").await.unwrap(), Some(2));
        assert_eq!(cache.remove("a").await.unwrap(), Some(2));
        assert_eq!(cache.remove("a").await.unwrap(), None);
        assert_eq!(cache.get("missing").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_after_write_expiry() {
        let cache = MemoryCache::new(Expiry::AfterWrite(Duration::from_secs(10)));
        cache.put("a", "x".to_string()).await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(cache.get("a").await.unwrap().is_some());

        // reads do not extend a write deadline
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.get("a").await.unwrap(), None);
        assert_eq!(cache.size().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_after_access_expiry_slides() {
        let cache = MemoryCache::new(Expiry::AfterAccess(Duration::from_secs(10)));
        cache.put("a", 1u32).await.unwrap();
        cache.put("b", 2u32).await.unwrap();

        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get("a").await.unwrap(), Some(1));

        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get("a").await.unwrap(), Some(1));
        assert_eq!(cache.get("b").await.unwrap(), None);

        let keys = cache.keys().await.unwrap();
        assert_eq!(keys, HashSet::from(["a".to_string()]));
        assert_eq!(cache.values().await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_cache_clones_share_entries() {
        let cache: MemoryCache<u32> = MemoryCache::default();
        let other = cache.clone();
        cache.put("a", 1).await.unwrap();
        assert_eq!(other.get("a").await.unwrap(), Some(1));
        other.clear().await.unwrap();
        assert_eq!(cache.size().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_ttl_semantics() {
        let store = MemoryStore::new();
        assert_eq!(store.ttl("k").await.unwrap(), TTL_MISSING);

        store.set("k", "v").await.unwrap();
        assert_eq!(store.ttl("k").await.unwrap(), TTL_PERSISTENT);

        store.set_ex("k", "v", 100).await.unwrap();
        assert_eq!(store.ttl("k").await.unwrap(), 100);

        tokio::time::advance(Duration::from_secs(40)).await;
        assert_eq!(store.ttl("k").await.unwrap(), 60);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.ttl("k").await.unwrap(), TTL_MISSING);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_replace_existing_skips_missing_keys() {
        let cache = MemoryCache::new(Expiry::AfterWrite(Duration::from_secs(10)));
        assert!(!cache.replace_existing("a", 1u32));
        assert_eq!(cache.get("a").await.unwrap(), None);

        cache.put("a", 1).await.unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(cache.replace_existing("a", 2));

        // the write pushed the deadline forward
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get("a").await.unwrap(), Some(2));

        cache.remove("a").await.unwrap();
        assert!(!cache.replace_existing("a", 3));
        assert_eq!(cache.size().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_set_ex_existing() {
        let store = MemoryStore::new();
        assert!(!store.set_ex_existing("k", "v", 100).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set_ex("k", "v1", 10).await.unwrap();
        assert!(store.set_ex_existing("k", "v2", 100).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("v2".into()));
        assert_eq!(store.ttl("k").await.unwrap(), 100);

        tokio::time::advance(Duration::from_secs(100)).await;
        assert!(!store.set_ex_existing("k", "v3", 100).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_strings() {
        let store = MemoryStore::new();
        store.set("p:1", "a").await.unwrap();
        store.set("p:2", "b").await.unwrap();
        store.set("q:1", "c").await.unwrap();

        let mut keys = store.keys_with_prefix("p:").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["p:1", "p:2"]);

        let values = store
            .mget(&["p:1".to_string(), "nope".to_string(), "q:1".to_string()])
            .await
            .unwrap();
        assert_eq!(values, vec![Some("a".into()), None, Some("c".into())]);

        assert!(store.del("p:1").await.unwrap());
        assert!(!store.del("p:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_store_hashes() {
        let store = MemoryStore::new();
        store.hset("h", "PC:1", "s1").await.unwrap();
        store.hset("h", "PC:2", "s2").await.unwrap();
        assert_eq!(store.hget("h", "PC:1").await.unwrap(), Some("s1".into()));
        assert_eq!(store.hgetall("h").await.unwrap().len(), 2);

        let removed = store
            .hdel("h", &["PC:1".to_string(), "PC:9".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);

        store.hdel("h", &["PC:2".to_string()]).await.unwrap();
        assert_eq!(store.ttl("h").await.unwrap(), TTL_MISSING);
        assert_eq!(store.hdel("h", &["PC:2".to_string()]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_sorted_sets() {
        let store = MemoryStore::new();
        store.zadd("z", "c", 30).await.unwrap();
        store.zadd("z", "a", 10).await.unwrap();
        store.zadd("z", "b", 20).await.unwrap();

        assert_eq!(store.zcard("z").await.unwrap(), 3);
        assert_eq!(store.zrange("z", 0, -1).await.unwrap(), vec!["a", "b", "c"]);
        assert_eq!(store.zrange("z", 0, 1).await.unwrap(), vec!["a", "b"]);
        assert_eq!(store.zrange("z", 2, 3).await.unwrap(), vec!["c"]);
        assert!(store.zrange("z", 3, 5).await.unwrap().is_empty());

        assert_eq!(store.zrem("z", &["a".to_string()]).await.unwrap(), 1);
        assert_eq!(store.zrange("z", 0, -1).await.unwrap(), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_store_wrong_type() {
        let store = MemoryStore::new();
        store.hset("h", "f", "v").await.unwrap();
        assert!(matches!(
            store.get("h").await,
            Err(WardenError::CacheBackend(_))
        ));
        assert!(store.zadd("h", "m", 1).await.is_err());
    }
}
