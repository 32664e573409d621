use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Cache miss: {0}")]
    CacheMiss(String),
}

/// Read-through cache for per-user responses
///
/// A moka cache in front of Redis. Only derived responses are stored here,
/// so every entry may be dropped at any time.
pub struct CacheManager {
    redis: ConnectionManager,
    local: moka::future::Cache<String, Vec<u8>>,
    ttl_secs: u64,
}

impl CacheManager {
    pub async fn new(redis_url: &str, l1_size: u64, ttl_secs: u64) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;

        let local = moka::future::CacheBuilder::new(l1_size)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Ok(Self {
            redis,
            local,
            ttl_secs,
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, CacheError> {
        if let Some(bytes) = self.local.get(key).await {
            tracing::trace!("Local cache hit: {}", key);
            return Ok(serde_json::from_slice(&bytes)?);
        }

        let mut conn = self.redis.clone();
        let stored: Option<Vec<u8>> = conn.get(key).await?;
        let bytes = stored.ok_or_else(|| CacheError::CacheMiss(key.to_string()))?;

        let value = serde_json::from_slice(&bytes)?;
        self.local.insert(key.to_string(), bytes).await;
        tracing::trace!("Redis cache hit: {}", key);

        Ok(value)
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(value)?;

        let mut conn = self.redis.clone();
        conn.set_ex::<_, _, ()>(key, bytes.as_slice(), self.ttl_secs).await?;
        self.local.insert(key.to_string(), bytes).await;

        Ok(())
    }

    pub async fn delete_many(&self, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }

        for key in keys {
            self.local.invalidate(key).await;
        }

        let mut conn = self.redis.clone();
        conn.del::<_, ()>(keys).await?;
        Ok(())
    }

    /// Drop cached stats for every user touched by a write
    ///
    /// Redis failures are logged only: the entry expires with its TTL anyway.
    pub async fn invalidate_users(&self, user_ids: &[&str]) {
        let keys: Vec<String> = user_ids.iter().map(|id| CacheKey::stats(id)).collect();

        if let Err(e) = self.delete_many(&keys).await {
            tracing::warn!("Cache invalidation failed for {:?}: {}", user_ids, e);
        }
    }

    pub async fn ping(&self) -> bool {
        let mut conn = self.redis.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await.is_ok()
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            redis_reachable: self.ping().await,
            local_entries: self.local.entry_count(),
            ttl_secs: self.ttl_secs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    #[serde(rename = "redisReachable")]
    pub redis_reachable: bool,
    #[serde(rename = "localEntries")]
    pub local_entries: u64,
    #[serde(rename = "ttlSecs")]
    pub ttl_secs: u64,
}

pub struct CacheKey;

impl CacheKey {
    /// Key for a user's `/stats` response
    pub fn stats(user_id: &str) -> String {
        format!("stats:{}", user_id)
    }
}
