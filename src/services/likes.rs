/// Like service
///
/// Toggle semantics over the (video, user) row; the video's like_count is
/// updated in the same transaction as the row change, and the cached video
/// entry is invalidated after every toggle.
use crate::cache::{keys, MediaCache};
use crate::db::{like_repo, video_repo};
use crate::error::{AppError, Result};
use crate::models::{LikeStatusResponse, Page, UploaderRole, VideoResponse};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

pub struct LikeService {
    pool: PgPool,
    cache: Arc<dyn MediaCache>,
}

impl LikeService {
    pub fn new(pool: PgPool, cache: Arc<dyn MediaCache>) -> Self {
        Self { pool, cache }
    }

    /// Like if not liked, unlike otherwise; returns the resulting state and
    /// the count read back inside the toggle transaction
    pub async fn toggle_like(
        &self,
        video_id: Uuid,
        user_id: Uuid,
        user_role: UploaderRole,
    ) -> Result<LikeStatusResponse> {
        if video_repo::find_video(&self.pool, video_id).await?.is_none() {
            return Err(AppError::NotFound("Video not found".to_string()));
        }

        let (is_liked, like_count) =
            like_repo::toggle_like(&self.pool, video_id, user_id, user_role.as_str()).await?;

        if let Err(e) = self.cache.delete(&keys::video(video_id)).await {
            warn!(%video_id, "video cache invalidation failed: {e}");
        }

        Ok(LikeStatusResponse {
            video_id: video_id.to_string(),
            is_liked,
            like_count,
        })
    }

    pub async fn get_like_status(
        &self,
        video_id: Uuid,
        user_id: Uuid,
    ) -> Result<LikeStatusResponse> {
        let video = video_repo::find_video(&self.pool, video_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Video not found".to_string()))?;
        let is_liked = like_repo::has_liked(&self.pool, video_id, user_id).await?;

        Ok(LikeStatusResponse {
            video_id: video_id.to_string(),
            is_liked,
            like_count: video.like_count,
        })
    }

    /// Ready videos the user has liked, most recently liked first. Playback
    /// URLs are not signed here; clients follow up per video.
    pub async fn get_liked_videos(
        &self,
        user_id: Uuid,
        page: i64,
        limit: i64,
    ) -> Result<Page<VideoResponse>> {
        let videos = like_repo::list_liked_videos(&self.pool, user_id, page, limit).await?;
        let total = like_repo::count_liked_videos(&self.pool, user_id).await?;

        Ok(Page {
            items: videos.into_iter().map(VideoResponse::from_video).collect(),
            page,
            limit,
            total,
        })
    }
}
