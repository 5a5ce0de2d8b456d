/// Comment service
///
/// Single-level threading: a reply's parent must be a live top-level comment
/// on the same video. Deletes are soft and author-only; the video's
/// comment_count moves with creates and deletes, and the cached video entry
/// is invalidated on every count change.
use crate::cache::{keys, MediaCache};
use crate::db::{comment_repo, video_repo};
use crate::error::{AppError, Result};
use crate::models::{
    CommentResponse, CreateCommentRequest, Page, UpdateCommentRequest, UploaderRole, VideoComment,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

const MAX_COMMENT_LEN: usize = 500;

pub fn validate_content(content: &str) -> Result<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::Validation(
            "Comment must not be empty".to_string(),
        ));
    }
    if content.chars().count() > MAX_COMMENT_LEN {
        return Err(AppError::Validation(format!(
            "Comment must be at most {MAX_COMMENT_LEN} characters"
        )));
    }
    Ok(content.to_string())
}

/// A reply may only target a live top-level comment on the same video
pub fn validate_parent(parent: &VideoComment, video_id: Uuid) -> Result<()> {
    if parent.is_deleted {
        return Err(AppError::NotFound("Parent comment not found".to_string()));
    }
    if parent.video_id != video_id {
        return Err(AppError::Validation(
            "Parent comment belongs to a different video".to_string(),
        ));
    }
    if parent.parent_id.is_some() {
        return Err(AppError::Validation(
            "Replies to replies are not supported".to_string(),
        ));
    }
    Ok(())
}

pub struct CommentService {
    pool: PgPool,
    cache: Arc<dyn MediaCache>,
}

impl CommentService {
    pub fn new(pool: PgPool, cache: Arc<dyn MediaCache>) -> Self {
        Self { pool, cache }
    }

    pub async fn create_comment(
        &self,
        video_id: Uuid,
        author_id: Uuid,
        author_role: UploaderRole,
        req: CreateCommentRequest,
    ) -> Result<CommentResponse> {
        let content = validate_content(&req.content)?;

        if video_repo::find_video(&self.pool, video_id).await?.is_none() {
            return Err(AppError::NotFound("Video not found".to_string()));
        }

        let parent_id = match &req.parent_id {
            Some(raw) => {
                let parent_id = Uuid::parse_str(raw)
                    .map_err(|_| AppError::Validation("Invalid parent comment id".to_string()))?;
                let parent = comment_repo::find_comment(&self.pool, parent_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Parent comment not found".to_string()))?;
                validate_parent(&parent, video_id)?;
                Some(parent_id)
            }
            None => None,
        };

        let comment = comment_repo::create_comment(
            &self.pool,
            video_id,
            author_id,
            author_role.as_str(),
            parent_id,
            &content,
        )
        .await?;
        self.invalidate_video(video_id).await;

        Ok(CommentResponse::from_comment(comment, 0))
    }

    /// Author-only content edit
    pub async fn update_comment(
        &self,
        comment_id: Uuid,
        author_id: Uuid,
        req: UpdateCommentRequest,
    ) -> Result<CommentResponse> {
        let content = validate_content(&req.content)?;

        let comment = self.require_live_comment(comment_id).await?;
        if comment.author_id != author_id {
            return Err(AppError::Forbidden(
                "Only the author can edit this comment".to_string(),
            ));
        }

        let updated = comment_repo::update_content(&self.pool, comment_id, &content).await?;
        let reply_count = comment_repo::count_replies(&self.pool, comment_id).await?;
        Ok(CommentResponse::from_comment(updated, reply_count))
    }

    /// Author-only soft delete; replies stay visible under the gone parent
    pub async fn delete_comment(&self, comment_id: Uuid, author_id: Uuid) -> Result<()> {
        let comment = self.require_live_comment(comment_id).await?;
        if comment.author_id != author_id {
            return Err(AppError::Forbidden(
                "Only the author can delete this comment".to_string(),
            ));
        }

        if comment_repo::soft_delete(&self.pool, comment_id, comment.video_id).await? {
            self.invalidate_video(comment.video_id).await;
        }
        Ok(())
    }

    /// Top-level comments, newest first, each carrying its live reply count
    pub async fn get_comments(
        &self,
        video_id: Uuid,
        page: i64,
        limit: i64,
    ) -> Result<Page<CommentResponse>> {
        if video_repo::find_video(&self.pool, video_id).await?.is_none() {
            return Err(AppError::NotFound("Video not found".to_string()));
        }

        let comments = comment_repo::list_top_level(&self.pool, video_id, page, limit).await?;
        let total = comment_repo::count_top_level(&self.pool, video_id).await?;

        let parent_ids: Vec<Uuid> = comments.iter().map(|c| c.id).collect();
        let counts = comment_repo::reply_counts(&self.pool, &parent_ids).await?;

        let items = comments
            .into_iter()
            .map(|comment| {
                let reply_count = counts.get(&comment.id).copied().unwrap_or(0);
                CommentResponse::from_comment(comment, reply_count)
            })
            .collect();

        Ok(Page {
            items,
            page,
            limit,
            total,
        })
    }

    /// Replies to one comment, oldest first
    pub async fn get_replies(
        &self,
        parent_id: Uuid,
        page: i64,
        limit: i64,
    ) -> Result<Page<CommentResponse>> {
        let parent = comment_repo::find_comment(&self.pool, parent_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;
        if parent.parent_id.is_some() {
            return Err(AppError::Validation(
                "Replies do not have their own replies".to_string(),
            ));
        }

        let replies = comment_repo::list_replies(&self.pool, parent_id, page, limit).await?;
        let total = comment_repo::count_replies(&self.pool, parent_id).await?;

        Ok(Page {
            items: replies
                .into_iter()
                .map(|reply| CommentResponse::from_comment(reply, 0))
                .collect(),
            page,
            limit,
            total,
        })
    }

    async fn require_live_comment(&self, comment_id: Uuid) -> Result<VideoComment> {
        let comment = comment_repo::find_comment(&self.pool, comment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;
        if comment.is_deleted {
            return Err(AppError::NotFound("Comment not found".to_string()));
        }
        Ok(comment)
    }

    async fn invalidate_video(&self, video_id: Uuid) {
        if let Err(e) = self.cache.delete(&keys::video(video_id)).await {
            warn!(%video_id, "video cache invalidation failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn comment(video_id: Uuid, parent_id: Option<Uuid>, is_deleted: bool) -> VideoComment {
        VideoComment {
            id: Uuid::new_v4(),
            video_id,
            author_id: Uuid::new_v4(),
            author_role: "adopter".to_string(),
            parent_id,
            content: "So fluffy".to_string(),
            is_deleted,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_content_trimmed_and_bounded() {
        assert_eq!(validate_content("  hi  ").unwrap(), "hi");
        assert!(validate_content("   ").is_err());
        assert!(validate_content(&"x".repeat(501)).is_err());
        assert!(validate_content(&"x".repeat(500)).is_ok());
    }

    #[test]
    fn test_parent_must_be_live_top_level_on_same_video() {
        let video_id = Uuid::new_v4();

        let live = comment(video_id, None, false);
        assert!(validate_parent(&live, video_id).is_ok());

        let deleted = comment(video_id, None, true);
        assert!(matches!(
            validate_parent(&deleted, video_id),
            Err(AppError::NotFound(_))
        ));

        let other_video = comment(Uuid::new_v4(), None, false);
        assert!(matches!(
            validate_parent(&other_video, video_id),
            Err(AppError::Validation(_))
        ));

        let reply = comment(video_id, Some(Uuid::new_v4()), false);
        assert!(matches!(
            validate_parent(&reply, video_id),
            Err(AppError::Validation(_))
        ));
    }
}
