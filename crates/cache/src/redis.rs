//! Redis-backed response cache.

use crate::error::CacheResult;
use crate::traits::ResponseCache;
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;

/// Redis cache shared across server replicas.
///
/// Pattern invalidation walks the keyspace with `SCAN MATCH` rather than
/// `KEYS`, so a publish never blocks the Redis event loop on large caches.
pub struct RedisCache {
    connection: MultiplexedConnection,
}

impl RedisCache {
    /// Connect to Redis at the given URL (e.g., "redis://:password@host:6379/0").
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl ResponseCache for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut connection = self.connection.clone();
        let value: Option<String> = connection.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        let mut connection = self.connection.clone();
        connection.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn delete_matching(&self, pattern: &str) -> CacheResult<u64> {
        let mut connection = self.connection.clone();

        let keys: Vec<String> = {
            let mut iter = connection.scan_match::<_, String>(pattern).await?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };

        if keys.is_empty() {
            return Ok(0);
        }

        let mut connection = self.connection.clone();
        let deleted: u64 = connection.del(&keys).await?;
        Ok(deleted)
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn health_check(&self) -> CacheResult<()> {
        let mut connection = self.connection.clone();
        redis::cmd("PING")
            .query_async::<_, ()>(&mut connection)
            .await?;
        Ok(())
    }
}
