/// Comment repository - single-level threaded comments with soft delete
///
/// The video's `comment_count` is incremented on create and decremented on
/// soft delete inside the same transaction; the `is_deleted = FALSE` guard
/// on the delete makes the decrement happen exactly once.
use crate::error::Result;
use crate::models::VideoComment;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

const COMMENT_COLUMNS: &str =
    "id, video_id, author_id, author_role, parent_id, content, is_deleted, created_at, updated_at";

pub async fn create_comment(
    pool: &PgPool,
    video_id: Uuid,
    author_id: Uuid,
    author_role: &str,
    parent_id: Option<Uuid>,
    content: &str,
) -> Result<VideoComment> {
    let mut tx = pool.begin().await?;

    let comment = sqlx::query_as::<_, VideoComment>(&format!(
        "INSERT INTO video_comments (video_id, author_id, author_role, parent_id, content) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {COMMENT_COLUMNS}"
    ))
    .bind(video_id)
    .bind(author_id)
    .bind(author_role)
    .bind(parent_id)
    .bind(content)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE videos SET comment_count = comment_count + 1 WHERE id = $1")
        .bind(video_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(comment)
}

/// Fetch a comment regardless of deletion state; callers decide whether a
/// soft-deleted row counts as absent
pub async fn find_comment(pool: &PgPool, id: Uuid) -> Result<Option<VideoComment>> {
    let comment = sqlx::query_as::<_, VideoComment>(&format!(
        "SELECT {COMMENT_COLUMNS} FROM video_comments WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(comment)
}

pub async fn update_content(pool: &PgPool, id: Uuid, content: &str) -> Result<VideoComment> {
    let comment = sqlx::query_as::<_, VideoComment>(&format!(
        "UPDATE video_comments SET content = $2, updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {COMMENT_COLUMNS}"
    ))
    .bind(id)
    .bind(content)
    .fetch_one(pool)
    .await?;

    Ok(comment)
}

/// Soft-delete; returns false when the row was already deleted (or absent),
/// in which case the counter is left untouched
pub async fn soft_delete(pool: &PgPool, id: Uuid, video_id: Uuid) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let deleted = sqlx::query(
        "UPDATE video_comments SET is_deleted = TRUE, updated_at = NOW() \
         WHERE id = $1 AND is_deleted = FALSE",
    )
    .bind(id)
    .execute(&mut *tx)
    .await?
    .rows_affected()
        > 0;

    if deleted {
        sqlx::query(
            "UPDATE videos SET comment_count = GREATEST(comment_count - 1, 0) WHERE id = $1",
        )
        .bind(video_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(deleted)
}

/// Top-level comments, newest first
pub async fn list_top_level(
    pool: &PgPool,
    video_id: Uuid,
    page: i64,
    limit: i64,
) -> Result<Vec<VideoComment>> {
    let comments = sqlx::query_as::<_, VideoComment>(&format!(
        "SELECT {COMMENT_COLUMNS} FROM video_comments \
         WHERE video_id = $1 AND parent_id IS NULL AND is_deleted = FALSE \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3"
    ))
    .bind(video_id)
    .bind(limit)
    .bind((page - 1) * limit)
    .fetch_all(pool)
    .await?;

    Ok(comments)
}

pub async fn count_top_level(pool: &PgPool, video_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM video_comments \
         WHERE video_id = $1 AND parent_id IS NULL AND is_deleted = FALSE",
    )
    .bind(video_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Replies to one top-level comment, oldest first
pub async fn list_replies(
    pool: &PgPool,
    parent_id: Uuid,
    page: i64,
    limit: i64,
) -> Result<Vec<VideoComment>> {
    let replies = sqlx::query_as::<_, VideoComment>(&format!(
        "SELECT {COMMENT_COLUMNS} FROM video_comments \
         WHERE parent_id = $1 AND is_deleted = FALSE \
         ORDER BY created_at ASC LIMIT $2 OFFSET $3"
    ))
    .bind(parent_id)
    .bind(limit)
    .bind((page - 1) * limit)
    .fetch_all(pool)
    .await?;

    Ok(replies)
}

pub async fn count_replies(pool: &PgPool, parent_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM video_comments WHERE parent_id = $1 AND is_deleted = FALSE",
    )
    .bind(parent_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Grouped non-deleted reply counts for a page of top-level comments
pub async fn reply_counts(pool: &PgPool, parent_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>> {
    if parent_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(Uuid, i64)> = sqlx::query_as(
        "SELECT parent_id, COUNT(*) FROM video_comments \
         WHERE parent_id = ANY($1) AND is_deleted = FALSE \
         GROUP BY parent_id",
    )
    .bind(parent_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}
