//! Redis Shared Store
//!
//! `SharedStore` over a multiplexed tokio connection. The connection is
//! cloned per call; clones share one socket.

use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;

use crate::domain::store::SharedStore;
use crate::error::WardenResult;

const SCAN_BATCH: usize = 1000;

#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    /// Connect to `redis_url` (e.g. `redis://127.0.0.1:6379/0`)
    pub async fn connect(redis_url: &str) -> WardenResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        tracing::info!("Connected to Redis");
        Ok(Self { conn })
    }

    pub fn from_connection(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }

    fn conn(&self) -> MultiplexedConnection {
        self.conn.clone()
    }
}

/// SCAN MATCH pattern for every key starting with `prefix`
fn prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('*');
    pattern
}

impl SharedStore for RedisStore {
    async fn get(&self, key: &str) -> WardenResult<Option<String>> {
        let mut conn = self.conn();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> WardenResult<()> {
        let mut conn = self.conn();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> WardenResult<()> {
        let mut conn = self.conn();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_ex_existing(&self, key: &str, value: &str, ttl_secs: u64) -> WardenResult<bool> {
        let mut conn = self.conn();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_secs)
            .arg("XX")
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn ttl(&self, key: &str) -> WardenResult<i64> {
        let mut conn = self.conn();
        let ttl: i64 = conn.ttl(key).await?;
        Ok(ttl)
    }

    async fn del(&self, key: &str) -> WardenResult<bool> {
        let mut conn = self.conn();
        let removed: u64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> WardenResult<Vec<String>> {
        let mut conn = self.conn();
        let pattern = prefix_pattern(prefix);
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        // SCAN may return a key more than once
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn mget(&self, keys: &[String]) -> WardenResult<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn();
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut conn)
            .await?;
        Ok(values)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> WardenResult<()> {
        let mut conn = self.conn();
        let _: () = conn.hset(key, field, value).await?;
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> WardenResult<Option<String>> {
        let mut conn = self.conn();
        let value: Option<String> = conn.hget(key, field).await?;
        Ok(value)
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> WardenResult<u64> {
        if fields.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn();
        let removed: u64 = conn.hdel(key, fields).await?;
        Ok(removed)
    }

    async fn hgetall(&self, key: &str) -> WardenResult<Vec<(String, String)>> {
        let mut conn = self.conn();
        let entries: Vec<(String, String)> = conn.hgetall(key).await?;
        Ok(entries)
    }

    async fn zadd(&self, key: &str, member: &str, score: i64) -> WardenResult<()> {
        let mut conn = self.conn();
        let _: () = conn.zadd(key, member, score).await?;
        Ok(())
    }

    async fn zrange(&self, key: &str, start: i64, stop: i64) -> WardenResult<Vec<String>> {
        let mut conn = self.conn();
        let members: Vec<String> = redis::cmd("ZRANGE")
            .arg(key)
            .arg(start)
            .arg(stop)
            .query_async(&mut conn)
            .await?;
        Ok(members)
    }

    async fn zrem(&self, key: &str, members: &[String]) -> WardenResult<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn();
        let removed: u64 = conn.zrem(key, members).await?;
        Ok(removed)
    }

    async fn zcard(&self, key: &str) -> WardenResult<u64> {
        let mut conn = self.conn();
        let count: u64 = conn.zcard(key).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_pattern() {
        assert_eq!(prefix_pattern("warden:sessions:"), "warden:sessions:*");
        assert_eq!(prefix_pattern("a*b?"), "a\\*b\\?*");
        assert_eq!(prefix_pattern("[x]"), "\\[x\\]*");
    }

    #[test]
    fn test_invalid_url_is_backend_failure() {
        let err = redis::Client::open("not a url").map_err(crate::error::WardenError::from);
        assert!(matches!(
            err,
            Err(crate::error::WardenError::CacheBackend(_))
        ));
    }
}
