//! Read-through cache for the handful of things the pipeline would
//! otherwise re-fetch on every poll tick: the Graph auth token (TTL ≈ 55
//! min), the bot's own principal id (used to ignore its own messages),
//! and the agent capability list returned by `AgentGateway::list_agents`.
//! Backed by an in-memory LRU, optionally mirrored to Redis when
//! `cache.backend` is `redis`.

use anyhow::{Context, Result};
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

type RedisPool = deadpool_redis::Pool;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_memory_items: usize,
    pub default_ttl: Option<u64>,
    pub enable_redis: bool,
    pub redis_url: Option<String>,
    pub redis_prefix: String,
    pub enable_stats: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory_items: 1000,
            default_ttl: Some(3600),
            enable_redis: false,
            redis_url: None,
            redis_prefix: "ideagraph:".to_string(),
            enable_stats: true,
        }
    }
}

impl CacheConfig {
    pub fn memory_only() -> Self {
        Self {
            enable_redis: false,
            redis_url: None,
            ..Default::default()
        }
    }

    pub fn with_redis(redis_url: String) -> Self {
        Self {
            enable_redis: true,
            redis_url: Some(redis_url),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry<T> {
    value: T,
    created_at: u64,
    expires_at: Option<u64>,
    access_count: u64,
    last_accessed: u64,
}

impl<T> CacheEntry<T> {
    fn new(value: T, ttl: Option<u64>) -> Self {
        let now = now_timestamp();
        Self {
            value,
            created_at: now,
            expires_at: ttl.map(|t| now + t),
            access_count: 0,
            last_accessed: now,
        }
    }

    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => now_timestamp() > expires_at,
            None => false,
        }
    }

    fn access(&mut self) -> &T {
        self.access_count += 1;
        self.last_accessed = now_timestamp();
        &self.value
    }
}

struct LRUCache<K, V> {
    capacity: usize,
    map: HashMap<K, CacheEntry<V>>,
    access_order: Vec<K>,
}

impl<K: Clone + Eq + Hash, V> LRUCache<K, V> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: HashMap::new(),
            access_order: Vec::new(),
        }
    }

    fn get(&mut self, key: &K) -> Option<&V> {
        if let Some(entry) = self.map.get_mut(key) {
            if entry.is_expired() {
                self.map.remove(key);
                self.access_order.retain(|k| k != key);
                return None;
            }
            self.access_order.retain(|k| k != key);
            self.access_order.push(key.clone());
            Some(entry.access())
        } else {
            None
        }
    }

    fn set(&mut self, key: K, value: V, ttl: Option<u64>) {
        if self.map.contains_key(&key) {
            self.access_order.retain(|k| k != &key);
        }
        while self.map.len() >= self.capacity {
            if let Some(oldest) = self.access_order.first().cloned() {
                self.map.remove(&oldest);
                self.access_order.remove(0);
            } else {
                break;
            }
        }
        self.map.insert(key.clone(), CacheEntry::new(value, ttl));
        self.access_order.push(key);
    }

    fn remove(&mut self, key: &K) -> bool {
        if self.map.remove(key).is_some() {
            self.access_order.retain(|k| k != key);
            true
        } else {
            false
        }
    }

    fn clear(&mut self) {
        self.map.clear();
        self.access_order.clear();
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn cleanup_expired(&mut self) {
        let expired: Vec<_> = self
            .map
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired {
            self.remove(&key);
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub memory_items: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Multi-tier cache: memory LRU in front, optional Redis behind it.
pub struct CacheLayer {
    config: CacheConfig,
    memory_cache: Arc<RwLock<LRUCache<String, Vec<u8>>>>,
    stats: Arc<RwLock<CacheStats>>,
    redis_pool: Option<RedisPool>,
}

impl CacheLayer {
    pub async fn new(config: CacheConfig) -> Result<Self> {
        let memory_cache = Arc::new(RwLock::new(LRUCache::new(config.max_memory_items)));
        let stats = Arc::new(RwLock::new(CacheStats::default()));

        let redis_pool = if config.enable_redis {
            match &config.redis_url {
                Some(url) => {
                    let cfg = deadpool_redis::Config::from_url(url);
                    Some(
                        cfg.create_pool(Some(deadpool_redis::Runtime::Tokio1))
                            .context("failed to create redis pool")?,
                    )
                }
                None => None,
            }
        } else {
            None
        };

        let cache = Self {
            config,
            memory_cache,
            stats,
            redis_pool,
        };
        cache.start_cleanup_task();
        Ok(cache)
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        {
            let mut memory = self.memory_cache.write().await;
            if let Some(bytes) = memory.get(&key.to_string()) {
                if self.config.enable_stats {
                    self.stats.write().await.hits += 1;
                }
                let value: T = bincode::deserialize(bytes).context("failed to deserialize cached value")?;
                return Ok(Some(value));
            }
        }

        if self.config.enable_stats {
            self.stats.write().await.misses += 1;
        }

        if self.config.enable_redis {
            if let Some(value) = self.get_from_redis::<T>(key).await? {
                let bytes = bincode::serialize(&value).context("failed to serialize value")?;
                self.memory_cache
                    .write()
                    .await
                    .set(key.to_string(), bytes, self.config.default_ttl);
                return Ok(Some(value));
            }
        }

        Ok(None)
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: Option<u64>) -> Result<()> {
        let bytes = bincode::serialize(value).context("failed to serialize value")?;
        let ttl = ttl_seconds.or(self.config.default_ttl);

        self.memory_cache.write().await.set(key.to_string(), bytes.clone(), ttl);

        if self.config.enable_stats {
            let mut stats = self.stats.write().await;
            stats.sets += 1;
            stats.memory_items = self.memory_cache.read().await.len();
        }

        if self.config.enable_redis {
            self.set_in_redis(key, &bytes, ttl).await?;
        }

        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        let removed = self.memory_cache.write().await.remove(&key.to_string());
        if self.config.enable_redis {
            self.delete_from_redis(key).await?;
        }
        Ok(removed)
    }

    pub async fn stats(&self) -> CacheStats {
        let mut stats = self.stats.read().await.clone();
        stats.memory_items = self.memory_cache.read().await.len();
        stats
    }

    fn start_cleanup_task(&self) {
        let memory_cache = self.memory_cache.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                memory_cache.write().await.cleanup_expired();
            }
        });
    }

    async fn get_from_redis<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(pool) = &self.redis_pool else {
            return Ok(None);
        };
        let mut conn = pool.get().await.context("failed to get redis connection")?;
        let full_key = self.redis_key(key);
        let bytes: Option<Vec<u8>> = conn.get(&full_key).await.context("failed to get value from redis")?;
        match bytes {
            Some(b) => Ok(Some(
                bincode::deserialize(&b).context("failed to deserialize redis value")?,
            )),
            None => Ok(None),
        }
    }

    async fn set_in_redis(&self, key: &str, bytes: &[u8], ttl: Option<u64>) -> Result<()> {
        let Some(pool) = &self.redis_pool else {
            return Ok(());
        };
        let mut conn = pool.get().await.context("failed to get redis connection")?;
        let full_key = self.redis_key(key);
        if let Some(seconds) = ttl {
            conn.set_ex(&full_key, bytes, seconds)
                .await
                .context("failed to set value in redis with ttl")?;
        } else {
            conn.set(&full_key, bytes).await.context("failed to set value in redis")?;
        }
        Ok(())
    }

    async fn delete_from_redis(&self, key: &str) -> Result<bool> {
        let Some(pool) = &self.redis_pool else {
            return Ok(false);
        };
        let mut conn = pool.get().await.context("failed to get redis connection")?;
        let full_key = self.redis_key(key);
        let removed: bool = conn.del(&full_key).await.context("failed to delete value from redis")?;
        Ok(removed)
    }

    fn redis_key(&self, key: &str) -> String {
        format!("{}{}", self.config.redis_prefix, key)
    }
}

fn now_timestamp() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
}

/// Names the few things this process actually caches, so callers don't
/// hand-build key strings.
pub struct CacheKey;

impl CacheKey {
    pub fn graph_token() -> String {
        "graph:token".to_string()
    }

    pub fn bot_principal() -> String {
        "identity:bot_principal".to_string()
    }

    pub fn agent_capabilities() -> String {
        "agents:capabilities".to_string()
    }
}

/// Caches the Graph access token for a little under its real TTL, so a
/// poll tick that needs Graph three times in a row mints the token once.
pub struct GraphTokenCache {
    layer: Arc<CacheLayer>,
}

impl GraphTokenCache {
    pub fn new(layer: Arc<CacheLayer>) -> Self {
        Self { layer }
    }

    pub async fn get(&self) -> Result<Option<String>> {
        self.layer.get(&CacheKey::graph_token()).await
    }

    /// `ttl_seconds` should be a little less than the token's real
    /// lifetime (spec: "TTL ≈ 55 min" for a 60-minute token) so a cached
    /// entry never outlives the token it represents.
    pub async fn set(&self, token: &str, ttl_seconds: u64) -> Result<()> {
        self.layer.set(&CacheKey::graph_token(), &token.to_string(), Some(ttl_seconds)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lru_cache_evicts_oldest() {
        let mut cache: LRUCache<String, String> = LRUCache::new(2);
        cache.set("a".to_string(), "1".to_string(), None);
        cache.set("b".to_string(), "2".to_string(), None);
        assert_eq!(cache.get(&"a".to_string()), Some(&"1".to_string()));
        cache.set("c".to_string(), "3".to_string(), None);
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&"b".to_string()).is_none());
    }

    #[test]
    fn entry_expires_after_ttl_elapses() {
        let mut cache: LRUCache<String, String> = LRUCache::new(10);
        cache.set("a".to_string(), "1".to_string(), Some(0));
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(cache.get(&"a".to_string()).is_none());
    }

    #[tokio::test]
    async fn get_set_roundtrips_through_memory_tier() {
        let cache = CacheLayer::new(CacheConfig::memory_only()).await.unwrap();
        cache.set("k", &"v".to_string(), Some(60)).await.unwrap();
        let value: Option<String> = cache.get("k").await.unwrap();
        assert_eq!(value, Some("v".to_string()));
        assert_eq!(cache.stats().await.hits, 1);
    }

    #[tokio::test]
    async fn graph_token_cache_stores_and_returns_token() {
        let layer = Arc::new(CacheLayer::new(CacheConfig::memory_only()).await.unwrap());
        let tokens = GraphTokenCache::new(layer);
        assert!(tokens.get().await.unwrap().is_none());
        tokens.set("abc123", 3300).await.unwrap();
        assert_eq!(tokens.get().await.unwrap(), Some("abc123".to_string()));
    }
}
