/// Like repository - toggle semantics over the (video, user) uniqueness row
///
/// The like row is the source of truth for "is liked"; the denormalized
/// `like_count` on the video rides the same transaction as the row
/// create/delete, so the counter always converges to the live row count.
use crate::error::Result;
use crate::models::Video;
use sqlx::PgPool;
use uuid::Uuid;

/// Toggle the like for (video, user); returns (is_liked, like_count) with
/// the count read back from the video row inside the same transaction.
pub async fn toggle_like(
    pool: &PgPool,
    video_id: Uuid,
    user_id: Uuid,
    user_role: &str,
) -> Result<(bool, i64)> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        "INSERT INTO video_likes (video_id, user_id, user_role) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (video_id, user_id) DO NOTHING",
    )
    .bind(video_id)
    .bind(user_id)
    .bind(user_role)
    .execute(&mut *tx)
    .await?
    .rows_affected()
        > 0;

    let like_count: i64 = if inserted {
        sqlx::query_scalar(
            "UPDATE videos SET like_count = like_count + 1 WHERE id = $1 RETURNING like_count",
        )
        .bind(video_id)
        .fetch_one(&mut *tx)
        .await?
    } else {
        let removed = sqlx::query("DELETE FROM video_likes WHERE video_id = $1 AND user_id = $2")
            .bind(video_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if removed {
            sqlx::query_scalar(
                "UPDATE videos SET like_count = GREATEST(like_count - 1, 0) \
                 WHERE id = $1 RETURNING like_count",
            )
            .bind(video_id)
            .fetch_one(&mut *tx)
            .await?
        } else {
            // Lost a race with a concurrent unlike; the counter already
            // reflects the removal, so only read it back
            sqlx::query_scalar("SELECT like_count FROM videos WHERE id = $1")
                .bind(video_id)
                .fetch_one(&mut *tx)
                .await?
        }
    };

    tx.commit().await?;

    Ok((inserted, like_count))
}

pub async fn has_liked(pool: &PgPool, video_id: Uuid, user_id: Uuid) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM video_likes WHERE video_id = $1 AND user_id = $2)",
    )
    .bind(video_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Videos the user has liked, restricted to `ready` — likes on videos that
/// later failed or were deleted never surface here
pub async fn list_liked_videos(
    pool: &PgPool,
    user_id: Uuid,
    page: i64,
    limit: i64,
) -> Result<Vec<Video>> {
    let videos = sqlx::query_as::<_, Video>(
        "SELECT v.id, v.uploader_id, v.uploader_role, v.title, v.description, v.tags, v.status, \
         v.raw_key, v.hls_prefix, v.thumbnail_key, v.duration_seconds, v.width, v.height, \
         v.view_count, v.like_count, v.comment_count, v.is_public, v.failure_reason, \
         v.created_at, v.updated_at \
         FROM video_likes l \
         JOIN videos v ON v.id = l.video_id \
         WHERE l.user_id = $1 AND v.status = 'ready' \
         ORDER BY l.created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user_id)
    .bind(limit)
    .bind((page - 1) * limit)
    .fetch_all(pool)
    .await?;

    Ok(videos)
}

pub async fn count_liked_videos(pool: &PgPool, user_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM video_likes l \
         JOIN videos v ON v.id = l.video_id \
         WHERE l.user_id = $1 AND v.status = 'ready'",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}
