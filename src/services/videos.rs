/// Video lifecycle service
///
/// Owns the upload ticket flow, the uploading -> processing handoff to the
/// encode queue, metadata reads with signed playback URLs, the HLS proxy
/// with segment warming, and owner operations (delete, visibility).
use crate::cache::{keys, MediaCache};
use crate::config::MediaConfig;
use crate::db::video_repo;
use crate::error::{AppError, Result};
use crate::models::{
    IssueUploadUrlRequest, Page, UploadTicketResponse, UploaderRole, Video, VideoResponse,
    VideoStatus, VisibilityResponse,
};
use crate::services::encode_worker::{EncodeJob, EncodeQueue};
use crate::services::storage::{self, StorageClient};
use crate::services::tags::normalize_tag;
use crate::services::transcoder::segment_file_name;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

const MAX_TITLE_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 1000;
const MAX_TAGS: usize = 10;
/// Segments warmed ahead of the player per rendition
const PREFETCH_SEGMENTS: u32 = 5;

/// Validate and normalize an upload request in place
pub fn validate_upload_request(req: &mut IssueUploadUrlRequest) -> Result<()> {
    req.title = req.title.trim().to_string();
    if req.title.is_empty() {
        return Err(AppError::Validation("Title must not be empty".to_string()));
    }
    if req.title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::Validation(format!(
            "Title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    if let Some(description) = &req.description {
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(AppError::Validation(format!(
                "Description must be at most {MAX_DESCRIPTION_LEN} characters"
            )));
        }
    }
    if let Some(tags) = &mut req.tags {
        let mut normalized: Vec<String> = Vec::new();
        for tag in tags.iter() {
            let tag = normalize_tag(tag);
            if !tag.is_empty() && !normalized.contains(&tag) {
                normalized.push(tag);
            }
        }
        if normalized.len() > MAX_TAGS {
            return Err(AppError::Validation(format!(
                "At most {MAX_TAGS} tags are allowed"
            )));
        }
        *tags = normalized;
    }
    Ok(())
}

/// Reject playlist/segment names that could escape the video's HLS prefix
pub fn validate_hls_filename(filename: &str) -> Result<()> {
    if filename.is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
    {
        return Err(AppError::Validation("Invalid file name".to_string()));
    }
    if !filename.ends_with(".m3u8") && !filename.ends_with(".ts") {
        return Err(AppError::Validation(
            "Only playlist and segment files are served".to_string(),
        ));
    }
    Ok(())
}

/// Parse `{res}p_{idx}.ts` into (resolution, segment index)
pub fn parse_segment_name(filename: &str) -> Option<(u32, u32)> {
    let stem = filename.strip_suffix(".ts")?;
    let (res, idx) = stem.split_once("p_")?;
    Some((res.parse().ok()?, idx.parse().ok()?))
}

pub struct VideoService {
    pool: PgPool,
    cache: Arc<dyn MediaCache>,
    storage: StorageClient,
    queue: EncodeQueue,
    cfg: MediaConfig,
}

impl VideoService {
    pub fn new(
        pool: PgPool,
        cache: Arc<dyn MediaCache>,
        storage: StorageClient,
        queue: EncodeQueue,
        cfg: MediaConfig,
    ) -> Self {
        Self {
            pool,
            cache,
            storage,
            queue,
            cfg,
        }
    }

    /// Create the video row in `uploading` and hand the client a presigned
    /// PUT URL for the raw file
    pub async fn issue_upload_url(
        &self,
        uploader_id: Uuid,
        uploader_role: UploaderRole,
        mut req: IssueUploadUrlRequest,
    ) -> Result<UploadTicketResponse> {
        validate_upload_request(&mut req)?;

        let video_id = Uuid::new_v4();
        let raw_key = storage::raw_key(video_id);

        video_repo::create_video(
            &self.pool,
            video_id,
            uploader_id,
            uploader_role.as_str(),
            &req.title,
            req.description.as_deref(),
            req.tags.as_deref().unwrap_or(&[]),
            &raw_key,
        )
        .await?;

        let upload_url = self
            .storage
            .presign_upload(
                &raw_key,
                Duration::from_secs(self.cfg.upload_url_ttl_secs),
                "video/mp4",
            )
            .await?;

        debug!(%video_id, %uploader_id, "upload ticket issued");
        Ok(UploadTicketResponse {
            video_id: video_id.to_string(),
            upload_url,
            storage_key: raw_key,
            expires_in_secs: self.cfg.upload_url_ttl_secs,
        })
    }

    /// Client signals the raw upload finished: verify the object, move the
    /// video to `processing`, and enqueue exactly one encode job
    pub async fn complete_upload(&self, video_id: Uuid, user_id: Uuid) -> Result<VideoResponse> {
        let video = self.require_video(video_id).await?;
        if video.uploader_id != user_id {
            return Err(AppError::Forbidden(
                "Only the uploader can complete the upload".to_string(),
            ));
        }

        if !self.storage.object_exists(&video.raw_key).await? {
            return Err(AppError::Validation(
                "Raw upload not found; upload the file before completing".to_string(),
            ));
        }

        // Guarded transition doubles as the enqueue-once latch: a repeated
        // completion call finds the video past `uploading` and conflicts.
        // Re-read for the message, the earlier status may have lost a race.
        if !video_repo::mark_processing(&self.pool, video_id).await? {
            let current = self.require_video(video_id).await?;
            return Err(AppError::Conflict(format!(
                "Video is already {}",
                current.status
            )));
        }

        self.queue
            .enqueue(EncodeJob {
                video_id,
                raw_key: video.raw_key.clone(),
            })
            .await?;

        self.invalidate_video(video_id).await;

        let video = self.require_video(video_id).await?;
        Ok(VideoResponse::from_video(video))
    }

    /// Video metadata with signed playback URLs, cache read-through
    pub async fn get_video(&self, video_id: Uuid, viewer: Option<Uuid>) -> Result<VideoResponse> {
        let video = self.load_video_cached(video_id).await?;
        self.check_visibility(&video, viewer)?;
        self.to_response(video).await
    }

    /// Best-effort view increment; failures are logged, never surfaced
    pub async fn record_view(&self, video_id: Uuid) {
        match video_repo::increment_view_count(&self.pool, video_id).await {
            Ok(true) => {}
            Ok(false) => debug!(%video_id, "view not counted, video not ready"),
            Err(e) => warn!(%video_id, "view increment failed: {e}"),
        }
    }

    /// Serve an HLS playlist or segment through the service. Segments are
    /// warmed in the cache; serving segment N schedules a background warm of
    /// the next few segments of the same rendition.
    pub async fn serve_hls_file(
        &self,
        video_id: Uuid,
        filename: &str,
        viewer: Option<Uuid>,
    ) -> Result<(Vec<u8>, &'static str)> {
        validate_hls_filename(filename)?;

        let video = self.load_video_cached(video_id).await?;
        self.check_visibility(&video, viewer)?;
        if video.get_status() != VideoStatus::Ready {
            return Err(AppError::NotFound("Video is not ready".to_string()));
        }
        let hls_prefix = video
            .hls_prefix
            .ok_or_else(|| AppError::NotFound("Video has no playback artifacts".to_string()))?;

        let content_type = storage::content_type_for(filename);
        let is_segment = filename.ends_with(".ts");

        if is_segment {
            let cache_key = keys::segment(video_id, filename);
            match self.cache.get_bytes(&cache_key).await {
                Ok(Some(bytes)) => {
                    self.schedule_prefetch(video_id, &hls_prefix, filename);
                    return Ok((bytes, content_type));
                }
                Ok(None) => {}
                Err(e) => warn!(%video_id, "segment cache read failed: {e}"),
            }
        }

        let key = format!("{hls_prefix}{filename}");
        let bytes = self.storage.get_object(&key).await?;

        if is_segment {
            let cache_key = keys::segment(video_id, filename);
            if let Err(e) = self
                .cache
                .set_bytes(&cache_key, &bytes, keys::SEGMENT_TTL)
                .await
            {
                warn!(%video_id, "segment cache write failed: {e}");
            }
            self.schedule_prefetch(video_id, &hls_prefix, filename);
        }

        Ok((bytes, content_type))
    }

    /// Warm the next segments of the served rendition in the background
    fn schedule_prefetch(&self, video_id: Uuid, hls_prefix: &str, filename: &str) {
        let Some((resolution, index)) = parse_segment_name(filename) else {
            return;
        };

        let storage = self.storage.clone();
        let cache = Arc::clone(&self.cache);
        let hls_prefix = hls_prefix.to_string();
        tokio::spawn(async move {
            warm_segments(&storage, &cache, video_id, &hls_prefix, resolution, index + 1).await;
        });
    }

    /// Client-driven prefetch: warm the upcoming segments of every rendition
    /// around the player's current position. Per-segment failures are
    /// swallowed; the call only reports whether the video is playable.
    pub async fn prefetch_segments(
        &self,
        video_id: Uuid,
        viewer: Option<Uuid>,
        current_index: u32,
    ) -> Result<()> {
        let video = self.load_video_cached(video_id).await?;
        self.check_visibility(&video, viewer)?;
        if video.get_status() != VideoStatus::Ready {
            return Err(AppError::NotFound("Video is not ready".to_string()));
        }
        let hls_prefix = video
            .hls_prefix
            .ok_or_else(|| AppError::NotFound("Video has no playback artifacts".to_string()))?;

        for &resolution in &self.cfg.resolutions {
            let storage = self.storage.clone();
            let cache = Arc::clone(&self.cache);
            let hls_prefix = hls_prefix.clone();
            tokio::spawn(async move {
                warm_segments(
                    &storage,
                    &cache,
                    video_id,
                    &hls_prefix,
                    resolution,
                    current_index + 1,
                )
                .await;
            });
        }
        Ok(())
    }

    /// Public feed, newest first
    pub async fn get_feed(&self, page: i64, limit: i64) -> Result<Page<VideoResponse>> {
        let videos = video_repo::list_feed(&self.pool, page, limit).await?;
        let total = video_repo::count_feed(&self.pool).await?;
        self.to_page(videos, page, limit, total).await
    }

    /// Most-viewed public videos
    pub async fn get_popular(&self, limit: i64) -> Result<Vec<VideoResponse>> {
        let videos = video_repo::list_popular(&self.pool, limit).await?;
        let mut items = Vec::with_capacity(videos.len());
        for video in videos {
            items.push(self.to_response(video).await?);
        }
        Ok(items)
    }

    /// Uploader's own videos, every status included
    pub async fn get_my_videos(
        &self,
        uploader_id: Uuid,
        page: i64,
        limit: i64,
    ) -> Result<Page<VideoResponse>> {
        let videos = video_repo::list_by_uploader(&self.pool, uploader_id, page, limit).await?;
        let total = video_repo::count_by_uploader(&self.pool, uploader_id).await?;
        self.to_page(videos, page, limit, total).await
    }

    /// Delete the video row (authoritative), then best-effort storage and
    /// cache cleanup
    pub async fn delete_video(&self, video_id: Uuid, user_id: Uuid) -> Result<()> {
        let video = self.require_video(video_id).await?;
        if video.uploader_id != user_id {
            return Err(AppError::Forbidden(
                "Only the uploader can delete this video".to_string(),
            ));
        }

        if !video_repo::delete_video_row(&self.pool, video_id).await? {
            return Err(AppError::NotFound("Video not found".to_string()));
        }
        self.invalidate_video(video_id).await;

        if let Err(e) = self.storage.delete_object(&video.raw_key).await {
            warn!(%video_id, "raw object cleanup failed: {e}");
        }
        if let Some(hls_prefix) = &video.hls_prefix {
            match self.storage.delete_prefix(hls_prefix).await {
                Ok(deleted) => debug!(%video_id, deleted, "HLS artifacts removed"),
                Err(e) => warn!(%video_id, "HLS cleanup failed: {e}"),
            }
        }
        if let Some(thumbnail_key) = &video.thumbnail_key {
            if let Err(e) = self.storage.delete_object(thumbnail_key).await {
                warn!(%video_id, "thumbnail cleanup failed: {e}");
            }
        }

        Ok(())
    }

    /// Owner-only visibility flip
    pub async fn toggle_visibility(
        &self,
        video_id: Uuid,
        user_id: Uuid,
    ) -> Result<VisibilityResponse> {
        let video = self.require_video(video_id).await?;
        if video.uploader_id != user_id {
            return Err(AppError::Forbidden(
                "Only the uploader can change visibility".to_string(),
            ));
        }

        let is_public = video_repo::toggle_visibility(&self.pool, video_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Video not found".to_string()))?;
        self.invalidate_video(video_id).await;

        Ok(VisibilityResponse {
            id: video_id.to_string(),
            is_public,
        })
    }

    async fn require_video(&self, video_id: Uuid) -> Result<Video> {
        video_repo::find_video(&self.pool, video_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Video not found".to_string()))
    }

    /// Read-through: entity JSON under the video key, written on miss
    async fn load_video_cached(&self, video_id: Uuid) -> Result<Video> {
        let cache_key = keys::video(video_id);
        match self.cache.get_json(&cache_key).await {
            Ok(Some(payload)) => {
                if let Ok(video) = serde_json::from_str::<Video>(&payload) {
                    return Ok(video);
                }
                // Stale shape after a deploy; fall through to the database
                let _ = self.cache.delete(&cache_key).await;
            }
            Ok(None) => {}
            Err(e) => warn!(%video_id, "video cache read failed: {e}"),
        }

        let video = self.require_video(video_id).await?;
        match serde_json::to_string(&video) {
            Ok(payload) => {
                if let Err(e) = self.cache.set_json(&cache_key, &payload, keys::VIDEO_TTL).await {
                    warn!(%video_id, "video cache write failed: {e}");
                }
            }
            Err(e) => warn!(%video_id, "video cache serialization failed: {e}"),
        }
        Ok(video)
    }

    /// Private videos read as absent for everyone but the uploader
    fn check_visibility(&self, video: &Video, viewer: Option<Uuid>) -> Result<()> {
        if video.is_public || viewer == Some(video.uploader_id) {
            Ok(())
        } else {
            Err(AppError::NotFound("Video not found".to_string()))
        }
    }

    /// Sign playback and thumbnail URLs for ready videos
    async fn to_response(&self, video: Video) -> Result<VideoResponse> {
        let status = video.get_status();
        let hls_prefix = video.hls_prefix.clone();
        let thumbnail_key = video.thumbnail_key.clone();
        let mut response = VideoResponse::from_video(video);

        if status == VideoStatus::Ready {
            let ttl = Duration::from_secs(self.cfg.playback_url_ttl_secs);
            if let Some(prefix) = hls_prefix {
                response.playback_url = Some(
                    self.storage
                        .presign_playback(&format!("{prefix}master.m3u8"), ttl)
                        .await?,
                );
            }
            if let Some(key) = thumbnail_key {
                response.thumbnail_url = Some(self.storage.presign_playback(&key, ttl).await?);
            }
        }

        Ok(response)
    }

    async fn to_page(
        &self,
        videos: Vec<Video>,
        page: i64,
        limit: i64,
        total: i64,
    ) -> Result<Page<VideoResponse>> {
        let mut items = Vec::with_capacity(videos.len());
        for video in videos {
            items.push(self.to_response(video).await?);
        }
        Ok(Page {
            items,
            page,
            limit,
            total,
        })
    }

    async fn invalidate_video(&self, video_id: Uuid) {
        if let Err(e) = self.cache.delete(&keys::video(video_id)).await {
            warn!(%video_id, "video cache invalidation failed: {e}");
        }
    }
}

/// Warm up to `PREFETCH_SEGMENTS` segments of one rendition, stopping at the
/// first cache failure or the end of the playlist
async fn warm_segments(
    storage: &StorageClient,
    cache: &Arc<dyn MediaCache>,
    video_id: Uuid,
    hls_prefix: &str,
    resolution: u32,
    from_index: u32,
) {
    for index in from_index..(from_index + PREFETCH_SEGMENTS) {
        let name = segment_file_name(resolution, index);
        let cache_key = keys::segment(video_id, &name);
        match cache.get_bytes(&cache_key).await {
            Ok(Some(_)) => continue,
            Ok(None) => {}
            Err(_) => break,
        }
        match storage.get_object(&format!("{hls_prefix}{name}")).await {
            Ok(bytes) => {
                if let Err(e) = cache.set_bytes(&cache_key, &bytes, keys::SEGMENT_TTL).await {
                    warn!(%video_id, "segment warm failed: {e}");
                    break;
                }
            }
            // Past the end of the playlist
            Err(AppError::NotFound(_)) => break,
            Err(e) => {
                warn!(%video_id, "segment prefetch failed: {e}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(title: &str) -> IssueUploadUrlRequest {
        IssueUploadUrlRequest {
            title: title.to_string(),
            description: None,
            tags: None,
        }
    }

    #[test]
    fn test_title_is_trimmed_and_required() {
        let mut req = request("  Luna's first walk  ");
        validate_upload_request(&mut req).unwrap();
        assert_eq!(req.title, "Luna's first walk");

        let mut req = request("   ");
        assert!(matches!(
            validate_upload_request(&mut req),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_title_and_description_length_limits() {
        let mut req = request(&"a".repeat(101));
        assert!(validate_upload_request(&mut req).is_err());

        let mut req = request("ok");
        req.description = Some("d".repeat(1001));
        assert!(validate_upload_request(&mut req).is_err());

        let mut req = request("ok");
        req.description = Some("d".repeat(1000));
        assert!(validate_upload_request(&mut req).is_ok());
    }

    #[test]
    fn test_tags_are_normalized_and_deduplicated() {
        let mut req = request("ok");
        req.tags = Some(vec![
            "#Puppy".to_string(),
            "puppy".to_string(),
            "  ".to_string(),
            "#강아지".to_string(),
        ]);
        validate_upload_request(&mut req).unwrap();
        assert_eq!(
            req.tags,
            Some(vec!["puppy".to_string(), "강아지".to_string()])
        );
    }

    #[test]
    fn test_too_many_tags_rejected() {
        let mut req = request("ok");
        req.tags = Some((0..11).map(|i| format!("tag{i}")).collect());
        assert!(validate_upload_request(&mut req).is_err());
    }

    #[test]
    fn test_hls_filename_validation() {
        assert!(validate_hls_filename("master.m3u8").is_ok());
        assert!(validate_hls_filename("480p.m3u8").is_ok());
        assert!(validate_hls_filename("480p_007.ts").is_ok());

        assert!(validate_hls_filename("").is_err());
        assert!(validate_hls_filename("../secret").is_err());
        assert!(validate_hls_filename("a/b.ts").is_err());
        assert!(validate_hls_filename("notes.txt").is_err());
    }

    #[test]
    fn test_segment_name_parsing() {
        assert_eq!(parse_segment_name("480p_007.ts"), Some((480, 7)));
        assert_eq!(parse_segment_name("1080p_000.ts"), Some((1080, 0)));
        assert_eq!(parse_segment_name("master.m3u8"), None);
        assert_eq!(parse_segment_name("480p.m3u8"), None);
    }
}
