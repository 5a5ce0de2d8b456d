/// Data models for the media service
///
/// This module defines structures for:
/// - Video: lifecycle state, storage keys, and derived counters
/// - VideoLike: one row per (video, user) pair
/// - VideoComment: single-level threaded comments
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ========================================
// Video Models
// ========================================

/// Video status in the system lifecycle
///
/// Transitions are one-directional: uploading -> processing -> ready | failed.
/// Only the lifecycle service performs uploading -> processing; only the
/// encode worker performs the terminal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Uploading,
    Processing,
    Ready,
    Failed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "uploading" => Some(Self::Uploading),
            "processing" => Some(Self::Processing),
            "ready" => Some(Self::Ready),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Uploader kind — breeders and adopters can both publish videos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploaderRole {
    Breeder,
    Adopter,
}

impl UploaderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Breeder => "breeder",
            Self::Adopter => "adopter",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "breeder" => Some(Self::Breeder),
            "adopter" => Some(Self::Adopter),
            _ => None,
        }
    }
}

/// Video database entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Video {
    pub id: Uuid,
    pub uploader_id: Uuid,
    pub uploader_role: String,
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub status: String,
    pub raw_key: String,
    pub hls_prefix: Option<String>,
    pub thumbnail_key: Option<String>,
    pub duration_seconds: i32,
    pub width: i32,
    pub height: i32,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub is_public: bool,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Video {
    pub fn get_status(&self) -> VideoStatus {
        VideoStatus::from_str(&self.status).unwrap_or(VideoStatus::Uploading)
    }
}

/// Video response DTO; playback/thumbnail URLs are signed at read time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoResponse {
    pub id: String,
    pub uploader_id: String,
    pub uploader_role: String,
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub status: String,
    pub duration_seconds: i32,
    pub width: i32,
    pub height: i32,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub is_public: bool,
    pub playback_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: i64,
}

impl VideoResponse {
    /// Build a response without signed URLs; the lifecycle service fills
    /// them in for `ready` videos.
    pub fn from_video(video: Video) -> Self {
        let failure_reason = if video.get_status() == VideoStatus::Failed {
            video.failure_reason.clone()
        } else {
            None
        };
        Self {
            id: video.id.to_string(),
            uploader_id: video.uploader_id.to_string(),
            uploader_role: video.uploader_role,
            title: video.title,
            description: video.description,
            tags: video.tags,
            status: video.status,
            duration_seconds: video.duration_seconds,
            width: video.width,
            height: video.height,
            view_count: video.view_count,
            like_count: video.like_count,
            comment_count: video.comment_count,
            is_public: video.is_public,
            playback_url: None,
            thumbnail_url: None,
            failure_reason,
            created_at: video.created_at.timestamp(),
        }
    }
}

/// Issue-upload-URL request DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueUploadUrlRequest {
    pub title: String,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Issue-upload-URL response: the client PUTs the raw file to `upload_url`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadTicketResponse {
    pub video_id: String,
    pub upload_url: String,
    pub storage_key: String,
    pub expires_in_secs: u64,
}

/// Visibility toggle response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibilityResponse {
    pub id: String,
    pub is_public: bool,
}

// ========================================
// Like Models
// ========================================

/// One row per (video, user) pair; uniqueness enforced by the database
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VideoLike {
    pub id: Uuid,
    pub video_id: Uuid,
    pub user_id: Uuid,
    pub user_role: String,
    pub created_at: DateTime<Utc>,
}

/// Like toggle / status response, counts read back from the video row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeStatusResponse {
    pub video_id: String,
    pub is_liked: bool,
    pub like_count: i64,
}

// ========================================
// Comment Models
// ========================================

/// Video comment entity; `parent_id` points at a top-level comment on the
/// same video (one level of nesting only)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VideoComment {
    pub id: Uuid,
    pub video_id: Uuid,
    pub author_id: Uuid,
    pub author_role: String,
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Comment response DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentResponse {
    pub id: String,
    pub video_id: String,
    pub author_id: String,
    pub author_role: String,
    pub parent_id: Option<String>,
    pub content: String,
    pub reply_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl CommentResponse {
    pub fn from_comment(comment: VideoComment, reply_count: i64) -> Self {
        Self {
            id: comment.id.to_string(),
            video_id: comment.video_id.to_string(),
            author_id: comment.author_id.to_string(),
            author_role: comment.author_role,
            parent_id: comment.parent_id.map(|id| id.to_string()),
            content: comment.content,
            reply_count,
            created_at: comment.created_at.timestamp(),
            updated_at: comment.updated_at.timestamp(),
        }
    }
}

/// Create comment request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
    pub parent_id: Option<String>,
}

/// Update comment request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
}

// ========================================
// Tag Models
// ========================================

/// Aggregated tag popularity over ready + public videos
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TagStats {
    pub tag: String,
    pub video_count: i64,
    pub total_views: i64,
}

// ========================================
// Pagination
// ========================================

/// Paginated listing wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            VideoStatus::Uploading,
            VideoStatus::Processing,
            VideoStatus::Ready,
            VideoStatus::Failed,
        ] {
            assert_eq!(VideoStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(VideoStatus::from_str("published"), None);
    }

    #[test]
    fn test_role_round_trip() {
        assert_eq!(UploaderRole::from_str("breeder"), Some(UploaderRole::Breeder));
        assert_eq!(UploaderRole::from_str("adopter"), Some(UploaderRole::Adopter));
        assert_eq!(UploaderRole::from_str("admin"), None);
    }

    #[test]
    fn test_failure_reason_only_exposed_when_failed() {
        let mut video = sample_video();
        video.status = "processing".to_string();
        video.failure_reason = Some("stale".to_string());
        assert_eq!(VideoResponse::from_video(video.clone()).failure_reason, None);

        video.status = "failed".to_string();
        assert_eq!(
            VideoResponse::from_video(video).failure_reason,
            Some("stale".to_string())
        );
    }

    fn sample_video() -> Video {
        Video {
            id: Uuid::new_v4(),
            uploader_id: Uuid::new_v4(),
            uploader_role: "breeder".to_string(),
            title: "puppy-intro".to_string(),
            description: None,
            tags: vec![],
            status: "uploading".to_string(),
            raw_key: "videos/raw/x.mp4".to_string(),
            hls_prefix: None,
            thumbnail_key: None,
            duration_seconds: 0,
            width: 0,
            height: 0,
            view_count: 0,
            like_count: 0,
            comment_count: 0,
            is_public: true,
            failure_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
