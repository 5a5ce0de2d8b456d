/// Caching layer for the media service
///
/// Invalidate-on-write only — a dropped entry costs latency, never
/// correctness. Services receive the cache as an explicit `MediaCache`
/// port; `NoopCache` stands in where no redis is available (tests).
use crate::error::{AppError, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Video metadata cache TTL (5 minutes)
const VIDEO_TTL_SECONDS: u64 = 300;
/// Tag search result TTL (5 minutes)
const TAG_SEARCH_TTL_SECONDS: u64 = 300;
/// Popular tag aggregate TTL (10 minutes)
const POPULAR_TAGS_TTL_SECONDS: u64 = 600;
/// Warmed HLS segment TTL (5 minutes); eviction beyond this is redis's job
const SEGMENT_TTL_SECONDS: u64 = 300;

/// Cache port used by the lifecycle and engagement services
#[async_trait]
pub trait MediaCache: Send + Sync {
    async fn get_json(&self, key: &str) -> Result<Option<String>>;
    async fn set_json(&self, key: &str, payload: &str, ttl_seconds: u64) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;

    /// Store raw bytes (warmed HLS segments)
    async fn set_bytes(&self, key: &str, payload: &[u8], ttl_seconds: u64) -> Result<()>;
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

/// Key and TTL helpers shared by all implementations
pub mod keys {
    use super::*;

    pub fn video(id: Uuid) -> String {
        format!("media:video:{id}")
    }

    pub fn tag_search(tag: &str, page: i64, limit: i64) -> String {
        format!("media:tags:search:{tag}:{page}:{limit}")
    }

    pub fn popular_tags(limit: i64) -> String {
        format!("media:tags:popular:{limit}")
    }

    pub fn segment(video_id: Uuid, filename: &str) -> String {
        format!("media:segment:{video_id}:{filename}")
    }

    pub const VIDEO_TTL: u64 = VIDEO_TTL_SECONDS;
    pub const TAG_SEARCH_TTL: u64 = TAG_SEARCH_TTL_SECONDS;
    pub const POPULAR_TAGS_TTL: u64 = POPULAR_TAGS_TTL_SECONDS;
    pub const SEGMENT_TTL: u64 = SEGMENT_TTL_SECONDS;
}

/// Redis-backed cache
#[derive(Clone)]
pub struct RedisCache {
    conn: Arc<Mutex<ConnectionManager>>,
}

impl RedisCache {
    pub async fn new(client: redis::Client) -> Result<Self> {
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to connect to Redis: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(manager)),
        })
    }
}

#[async_trait]
impl MediaCache for RedisCache {
    async fn get_json(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.lock().await;
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to read from cache: {e}")))?;
        Ok(value)
    }

    async fn set_json(&self, key: &str, payload: &str, ttl_seconds: u64) -> Result<()> {
        let mut conn = self.conn.lock().await;
        conn.set_ex(key, payload, ttl_seconds)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to write to cache: {e}")))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.lock().await;
        conn.del(key)
            .await
            .map(|_: usize| ())
            .map_err(|e| AppError::Cache(format!("Failed to delete cache key: {e}")))
    }

    async fn set_bytes(&self, key: &str, payload: &[u8], ttl_seconds: u64) -> Result<()> {
        let mut conn = self.conn.lock().await;
        conn.set_ex(key, payload, ttl_seconds)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to write to cache: {e}")))
    }

    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.lock().await;
        let value: Option<Vec<u8>> = conn
            .get(key)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to read from cache: {e}")))?;
        Ok(value)
    }
}

/// No-op implementation; every read misses, every write succeeds
#[derive(Clone, Default)]
pub struct NoopCache;

#[async_trait]
impl MediaCache for NoopCache {
    async fn get_json(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn set_json(&self, _key: &str, _payload: &str, _ttl_seconds: u64) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    async fn set_bytes(&self, _key: &str, _payload: &[u8], _ttl_seconds: u64) -> Result<()> {
        Ok(())
    }

    async fn get_bytes(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_helpers() {
        let id = Uuid::nil();
        assert_eq!(
            keys::video(id),
            "media:video:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(keys::tag_search("puppy", 1, 20), "media:tags:search:puppy:1:20");
        assert_eq!(keys::popular_tags(10), "media:tags:popular:10");
        assert_eq!(
            keys::segment(id, "480p_007.ts"),
            "media:segment:00000000-0000-0000-0000-000000000000:480p_007.ts"
        );
    }

    #[tokio::test]
    async fn test_noop_cache_always_misses() {
        let cache = NoopCache;
        cache.set_json("k", "v", 60).await.unwrap();
        assert_eq!(cache.get_json("k").await.unwrap(), None);
        cache.set_bytes("k", b"v", 60).await.unwrap();
        assert_eq!(cache.get_bytes("k").await.unwrap(), None);
        cache.delete("k").await.unwrap();
    }
}
