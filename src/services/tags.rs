/// Tag service
///
/// Tags are stored normalized (lowercase, no leading '#'). Search results
/// and the popular aggregate are cached; both are derived from ready public
/// videos only, so short staleness is acceptable.
use crate::cache::{keys, MediaCache};
use crate::db::video_repo;
use crate::error::{AppError, Result};
use crate::models::{Page, TagStats, VideoResponse};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::warn;

/// Strip a leading '#' and lowercase; works for non-ASCII tags too
pub fn normalize_tag(raw: &str) -> String {
    raw.trim().trim_start_matches('#').to_lowercase()
}

pub struct TagService {
    pool: PgPool,
    cache: Arc<dyn MediaCache>,
}

impl TagService {
    pub fn new(pool: PgPool, cache: Arc<dyn MediaCache>) -> Self {
        Self { pool, cache }
    }

    /// Exact-match tag search over the public feed, cached per page
    pub async fn search(&self, raw_tag: &str, page: i64, limit: i64) -> Result<Page<VideoResponse>> {
        let tag = normalize_tag(raw_tag);
        if tag.is_empty() {
            return Err(AppError::Validation("Tag must not be empty".to_string()));
        }

        let cache_key = keys::tag_search(&tag, page, limit);
        if let Some(cached) = self.read_cached::<Page<VideoResponse>>(&cache_key).await {
            return Ok(cached);
        }

        let videos = video_repo::search_by_tag(&self.pool, &tag, page, limit).await?;
        let total = video_repo::count_by_tag(&self.pool, &tag).await?;
        let result = Page {
            items: videos.into_iter().map(VideoResponse::from_video).collect(),
            page,
            limit,
            total,
        };

        self.write_cached(&cache_key, &result, keys::TAG_SEARCH_TTL)
            .await;
        Ok(result)
    }

    /// Most-used tags across ready public videos, cached
    pub async fn popular(&self, limit: i64) -> Result<Vec<TagStats>> {
        let cache_key = keys::popular_tags(limit);
        if let Some(cached) = self.read_cached::<Vec<TagStats>>(&cache_key).await {
            return Ok(cached);
        }

        let stats = video_repo::popular_tags(&self.pool, limit).await?;
        self.write_cached(&cache_key, &stats, keys::POPULAR_TAGS_TTL)
            .await;
        Ok(stats)
    }

    /// Prefix completion; uncached, the query is cheap and input-shaped
    pub async fn suggest(&self, raw_prefix: &str, limit: i64) -> Result<Vec<String>> {
        let prefix = normalize_tag(raw_prefix);
        if prefix.is_empty() {
            return Err(AppError::Validation(
                "Prefix must be at least one character".to_string(),
            ));
        }

        video_repo::suggest_tags(&self.pool, &prefix, limit).await
    }

    async fn read_cached<T: serde::de::DeserializeOwned>(&self, cache_key: &str) -> Option<T> {
        match self.cache.get_json(cache_key).await {
            Ok(Some(payload)) => serde_json::from_str(&payload).ok(),
            Ok(None) => None,
            Err(e) => {
                warn!(cache_key, "tag cache read failed: {e}");
                None
            }
        }
    }

    async fn write_cached<T: serde::Serialize>(&self, cache_key: &str, value: &T, ttl: u64) {
        match serde_json::to_string(value) {
            Ok(payload) => {
                if let Err(e) = self.cache.set_json(cache_key, &payload, ttl).await {
                    warn!(cache_key, "tag cache write failed: {e}");
                }
            }
            Err(e) => warn!(cache_key, "tag cache serialization failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_hash_and_lowercases() {
        assert_eq!(normalize_tag("#Puppy"), "puppy");
        assert_eq!(normalize_tag("GOLDEN"), "golden");
        assert_eq!(normalize_tag("  #Rescue "), "rescue");
        assert_eq!(normalize_tag("#강아지"), "강아지");
        assert_eq!(normalize_tag("#"), "");
    }
}
