/// Video repository - database operations for videos
///
/// Status transitions are guarded by `WHERE status = ...` clauses and report
/// whether a row was actually updated, so callers can detect lost races and
/// duplicate deliveries without a separate read.
use crate::error::Result;
use crate::models::{TagStats, Video};
use sqlx::PgPool;
use uuid::Uuid;

const VIDEO_COLUMNS: &str = "id, uploader_id, uploader_role, title, description, tags, status, \
     raw_key, hls_prefix, thumbnail_key, duration_seconds, width, height, \
     view_count, like_count, comment_count, is_public, failure_reason, \
     created_at, updated_at";

/// Insert a new video in `uploading` status
#[allow(clippy::too_many_arguments)]
pub async fn create_video(
    pool: &PgPool,
    id: Uuid,
    uploader_id: Uuid,
    uploader_role: &str,
    title: &str,
    description: Option<&str>,
    tags: &[String],
    raw_key: &str,
) -> Result<Video> {
    let video = sqlx::query_as::<_, Video>(&format!(
        "INSERT INTO videos (id, uploader_id, uploader_role, title, description, tags, status, raw_key) \
         VALUES ($1, $2, $3, $4, $5, $6, 'uploading', $7) \
         RETURNING {VIDEO_COLUMNS}"
    ))
    .bind(id)
    .bind(uploader_id)
    .bind(uploader_role)
    .bind(title)
    .bind(description)
    .bind(tags)
    .bind(raw_key)
    .fetch_one(pool)
    .await?;

    Ok(video)
}

pub async fn find_video(pool: &PgPool, id: Uuid) -> Result<Option<Video>> {
    let video = sqlx::query_as::<_, Video>(&format!(
        "SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(video)
}

/// uploading -> processing; returns false if the video was not in `uploading`
pub async fn mark_processing(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE videos SET status = 'processing', updated_at = NOW() \
         WHERE id = $1 AND status = 'uploading'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// processing -> ready with metadata and artifact keys; guarded so the
/// terminal transition happens at most once
pub async fn mark_ready(
    pool: &PgPool,
    id: Uuid,
    duration_seconds: i32,
    width: i32,
    height: i32,
    hls_prefix: &str,
    thumbnail_key: &str,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE videos SET status = 'ready', duration_seconds = $2, width = $3, height = $4, \
         hls_prefix = $5, thumbnail_key = $6, failure_reason = NULL, updated_at = NOW() \
         WHERE id = $1 AND status = 'processing'",
    )
    .bind(id)
    .bind(duration_seconds)
    .bind(width)
    .bind(height)
    .bind(hls_prefix)
    .bind(thumbnail_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// processing -> failed with a human-readable reason
pub async fn mark_failed(pool: &PgPool, id: Uuid, reason: &str) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE videos SET status = 'failed', failure_reason = $2, updated_at = NOW() \
         WHERE id = $1 AND status = 'processing'",
    )
    .bind(id)
    .bind(reason)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Videos stranded in `processing`, oldest first. Used at startup to
/// re-enqueue encode jobs lost with the previous process.
pub async fn list_processing(pool: &PgPool) -> Result<Vec<Video>> {
    let videos = sqlx::query_as::<_, Video>(&format!(
        "SELECT {VIDEO_COLUMNS} FROM videos WHERE status = 'processing' ORDER BY created_at ASC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(videos)
}

/// Best-effort view increment; non-ready videos are never counted
pub async fn increment_view_count(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE videos SET view_count = view_count + 1 WHERE id = $1 AND status = 'ready'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Public feed: ready + public, newest first
pub async fn list_feed(pool: &PgPool, page: i64, limit: i64) -> Result<Vec<Video>> {
    let videos = sqlx::query_as::<_, Video>(&format!(
        "SELECT {VIDEO_COLUMNS} FROM videos \
         WHERE status = 'ready' AND is_public = TRUE \
         ORDER BY created_at DESC LIMIT $1 OFFSET $2"
    ))
    .bind(limit)
    .bind((page - 1) * limit)
    .fetch_all(pool)
    .await?;

    Ok(videos)
}

pub async fn count_feed(pool: &PgPool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM videos WHERE status = 'ready' AND is_public = TRUE",
    )
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Most-viewed ready + public videos
pub async fn list_popular(pool: &PgPool, limit: i64) -> Result<Vec<Video>> {
    let videos = sqlx::query_as::<_, Video>(&format!(
        "SELECT {VIDEO_COLUMNS} FROM videos \
         WHERE status = 'ready' AND is_public = TRUE \
         ORDER BY view_count DESC, created_at DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(videos)
}

/// Owner listing: every status, no visibility filter
pub async fn list_by_uploader(
    pool: &PgPool,
    uploader_id: Uuid,
    page: i64,
    limit: i64,
) -> Result<Vec<Video>> {
    let videos = sqlx::query_as::<_, Video>(&format!(
        "SELECT {VIDEO_COLUMNS} FROM videos WHERE uploader_id = $1 \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3"
    ))
    .bind(uploader_id)
    .bind(limit)
    .bind((page - 1) * limit)
    .fetch_all(pool)
    .await?;

    Ok(videos)
}

pub async fn count_by_uploader(pool: &PgPool, uploader_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM videos WHERE uploader_id = $1")
        .bind(uploader_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Hard-delete the video row; likes and comments cascade. The row delete is
/// the authoritative "gone" signal — storage cleanup happens afterwards.
pub async fn delete_video_row(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM videos WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Flip the public flag, returning the new value
pub async fn toggle_visibility(pool: &PgPool, id: Uuid) -> Result<Option<bool>> {
    let is_public: Option<bool> = sqlx::query_scalar(
        "UPDATE videos SET is_public = NOT is_public, updated_at = NOW() \
         WHERE id = $1 RETURNING is_public",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(is_public)
}

/// Exact-match tag search over ready + public videos; `tag` must already be
/// normalized (lowercase, no leading '#')
pub async fn search_by_tag(pool: &PgPool, tag: &str, page: i64, limit: i64) -> Result<Vec<Video>> {
    let videos = sqlx::query_as::<_, Video>(&format!(
        "SELECT {VIDEO_COLUMNS} FROM videos \
         WHERE status = 'ready' AND is_public = TRUE AND $1 = ANY(tags) \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3"
    ))
    .bind(tag)
    .bind(limit)
    .bind((page - 1) * limit)
    .fetch_all(pool)
    .await?;

    Ok(videos)
}

pub async fn count_by_tag(pool: &PgPool, tag: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM videos \
         WHERE status = 'ready' AND is_public = TRUE AND $1 = ANY(tags)",
    )
    .bind(tag)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Distinct tags over ready + public videos, by video count then summed views
pub async fn popular_tags(pool: &PgPool, limit: i64) -> Result<Vec<TagStats>> {
    // SUM(bigint) is NUMERIC in Postgres; cast back so the count decodes as i64
    let stats = sqlx::query_as::<_, TagStats>(
        "SELECT t.tag, COUNT(*) AS video_count, COALESCE(SUM(v.view_count), 0)::BIGINT AS total_views \
         FROM videos v, UNNEST(v.tags) AS t(tag) \
         WHERE v.status = 'ready' AND v.is_public = TRUE \
         GROUP BY t.tag \
         ORDER BY video_count DESC, total_views DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(stats)
}

/// Case-insensitive tag prefix completion
pub async fn suggest_tags(pool: &PgPool, prefix: &str, limit: i64) -> Result<Vec<String>> {
    let escaped = prefix.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    let tags: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT t.tag \
         FROM videos v, UNNEST(v.tags) AS t(tag) \
         WHERE v.status = 'ready' AND v.is_public = TRUE AND t.tag ILIKE $1 \
         ORDER BY t.tag \
         LIMIT $2",
    )
    .bind(format!("{escaped}%"))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(tags)
}
