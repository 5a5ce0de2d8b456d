/// Background encode job processor
///
/// Jobs are submitted to a sharded set of mpsc channels and consumed by one
/// worker task per shard. A job is routed by hashing its video id, so jobs
/// for one video are processed in enqueue order on a single worker while
/// different videos transcode concurrently.
///
/// Each job runs the full pipeline: stage the raw upload locally, probe,
/// thumbnail, adaptive HLS, upload artifacts, then a guarded
/// processing -> ready transition. Transient failures are retried with
/// exponential backoff; after the attempt budget the video is marked failed
/// with a human-readable reason. Temp files are removed on every exit path.
use crate::cache::{keys, MediaCache};
use crate::config::MediaConfig;
use crate::db::video_repo;
use crate::error::{AppError, Result};
use crate::models::VideoStatus;
use crate::services::storage::{self, StorageClient};
use crate::services::transcoder::TranscodingEngine;
use sqlx::PgPool;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// One transcoding request for an uploaded video
#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub video_id: Uuid,
    pub raw_key: String,
}

/// Exponential backoff: base, 2*base, 4*base, ...
pub fn backoff_delay(base_secs: u64, attempt: u32) -> Duration {
    Duration::from_secs(base_secs << (attempt.saturating_sub(1)))
}

/// Stable shard index for a video id
pub fn shard_for(video_id: Uuid, shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    video_id.hash(&mut hasher);
    (hasher.finish() % shards as u64) as usize
}

/// Handle for submitting encode jobs; cheap to clone
#[derive(Clone)]
pub struct EncodeQueue {
    senders: Vec<mpsc::Sender<EncodeJob>>,
}

impl EncodeQueue {
    /// Route the job to its video's shard so same-video jobs serialize
    pub async fn enqueue(&self, job: EncodeJob) -> Result<()> {
        let shard = shard_for(job.video_id, self.senders.len());
        self.senders[shard]
            .send(job)
            .await
            .map_err(|e| AppError::Internal(format!("encode queue closed: {e}")))
    }
}

/// Shared collaborators for the worker pool
#[derive(Clone)]
pub struct EncodeContext {
    pub pool: PgPool,
    pub storage: StorageClient,
    pub engine: TranscodingEngine,
    pub cache: Arc<dyn MediaCache>,
    pub cfg: MediaConfig,
}

/// Spawn the worker pool; returns the queue handle and the worker tasks
pub fn start_encode_workers(
    ctx: EncodeContext,
    capacity: usize,
) -> (EncodeQueue, Vec<tokio::task::JoinHandle<()>>) {
    let shards = ctx.cfg.worker_count.max(1);
    let mut senders = Vec::with_capacity(shards);
    let mut handles = Vec::with_capacity(shards);

    for shard in 0..shards {
        let (tx, mut rx) = mpsc::channel::<EncodeJob>(capacity);
        senders.push(tx);

        let ctx = ctx.clone();
        handles.push(tokio::spawn(async move {
            info!(shard, "encode worker started");
            while let Some(job) = rx.recv().await {
                process_job(&ctx, &job).await;
            }
            info!(shard, "encode worker stopped (channel closed)");
        }));
    }

    (EncodeQueue { senders }, handles)
}

/// Re-enqueue videos left in `processing` by a previous process. The queue
/// is in-memory, so jobs in flight at shutdown are lost with it; the status
/// row survives, and the processor's status guard makes the duplicate
/// delivery safe if the old process did finish. Returns the number requeued.
pub async fn recover_stalled_jobs(pool: &PgPool, queue: &EncodeQueue) -> Result<usize> {
    let stalled = video_repo::list_processing(pool).await?;
    let count = stalled.len();
    for video in stalled {
        info!(video_id = %video.id, "re-enqueueing stalled encode job");
        queue
            .enqueue(EncodeJob {
                video_id: video.id,
                raw_key: video.raw_key,
            })
            .await?;
    }
    Ok(count)
}

/// Run one job to a terminal outcome: ready, failed, or no-op skip
pub async fn process_job(ctx: &EncodeContext, job: &EncodeJob) {
    // Duplicate-delivery guard: only a video still in `processing` is worked on
    match video_repo::find_video(&ctx.pool, job.video_id).await {
        Ok(Some(video)) => match video.get_status() {
            VideoStatus::Processing => {}
            status => {
                info!(video_id = %job.video_id, status = status.as_str(), "skipping encode job");
                return;
            }
        },
        Ok(None) => {
            info!(video_id = %job.video_id, "skipping encode job for deleted video");
            return;
        }
        Err(e) => {
            error!(video_id = %job.video_id, "failed to load video for encode job: {e}");
            return;
        }
    }

    let mut last_error = String::new();
    let mut attempts = 0;
    for attempt in 1..=ctx.cfg.max_attempts {
        attempts = attempt;
        match run_attempt(ctx, job).await {
            Ok(()) => {
                invalidate_meta(ctx, job.video_id).await;
                info!(video_id = %job.video_id, attempt, "encode job succeeded");
                return;
            }
            Err(e) => {
                last_error = e.to_string();
                // A broken upload stays broken; only transient I/O earns a retry
                if !e.is_transient() {
                    warn!(video_id = %job.video_id, attempt, "encode failed permanently: {e}");
                    break;
                }
                warn!(video_id = %job.video_id, attempt, "encode attempt failed: {e}");
                if attempt < ctx.cfg.max_attempts {
                    tokio::time::sleep(backoff_delay(ctx.cfg.retry_base_delay_secs, attempt)).await;
                }
            }
        }
    }

    let reason = format!("transcoding failed after {attempts} attempt(s): {last_error}");
    match video_repo::mark_failed(&ctx.pool, job.video_id, &reason).await {
        Ok(true) => error!(video_id = %job.video_id, "video marked failed: {reason}"),
        Ok(false) => warn!(video_id = %job.video_id, "failed transition skipped, video no longer processing"),
        Err(e) => error!(video_id = %job.video_id, "could not record failure: {e}"),
    }
    invalidate_meta(ctx, job.video_id).await;
}

/// One attempt of the full pipeline; the staging directory is removed on
/// success and failure alike
async fn run_attempt(ctx: &EncodeContext, job: &EncodeJob) -> Result<()> {
    let work_dir = PathBuf::from(&ctx.cfg.tmp_dir).join(format!("pawreel_video_{}", job.video_id));
    tokio::fs::create_dir_all(&work_dir)
        .await
        .map_err(|e| AppError::Storage(format!("failed to create staging dir: {e}")))?;

    let result = run_pipeline(ctx, job, &work_dir).await;

    if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
        warn!(video_id = %job.video_id, "staging cleanup failed: {e}");
    }

    result
}

async fn run_pipeline(ctx: &EncodeContext, job: &EncodeJob, work_dir: &PathBuf) -> Result<()> {
    let raw_path = work_dir.join("original.mp4");
    ctx.storage.download_to_file(&job.raw_key, &raw_path).await?;

    let info = ctx.engine.probe_metadata(&raw_path).await?;

    let thumb_path = work_dir.join("thumbnail.jpg");
    ctx.engine
        .generate_thumbnail(&raw_path, &thumb_path, 10)
        .await?;

    let hls_dir = work_dir.join("hls");
    ctx.engine
        .transcode_to_adaptive_hls(&raw_path, &hls_dir, &ctx.cfg.resolutions)
        .await?;

    let hls_prefix = storage::hls_prefix(job.video_id);
    let mut entries = tokio::fs::read_dir(&hls_dir)
        .await
        .map_err(|e| AppError::Storage(format!("failed to read transcode output: {e}")))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AppError::Storage(format!("failed to read transcode output: {e}")))?
    {
        let file_name = entry.file_name().to_string_lossy().to_string();
        let key = format!("{hls_prefix}{file_name}");
        ctx.storage
            .upload_file(&entry.path(), &key, storage::content_type_for(&file_name))
            .await?;
    }

    let thumbnail_key = storage::thumbnail_key(job.video_id);
    ctx.storage
        .upload_file(&thumb_path, &thumbnail_key, "image/jpeg")
        .await?;

    let became_ready = video_repo::mark_ready(
        &ctx.pool,
        job.video_id,
        info.duration_seconds.ceil() as i32,
        info.width as i32,
        info.height as i32,
        &hls_prefix,
        &thumbnail_key,
    )
    .await?;

    if !became_ready {
        // Another delivery already finished this video; artifacts are
        // identical, so this is a safe no-op
        info!(video_id = %job.video_id, "ready transition skipped, video already terminal");
    }

    Ok(())
}

async fn invalidate_meta(ctx: &EncodeContext, video_id: Uuid) {
    if let Err(e) = ctx.cache.delete(&keys::video(video_id)).await {
        warn!(%video_id, "video cache invalidation failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_from_base() {
        assert_eq!(backoff_delay(10, 1), Duration::from_secs(10));
        assert_eq!(backoff_delay(10, 2), Duration::from_secs(20));
        assert_eq!(backoff_delay(10, 3), Duration::from_secs(40));
    }

    #[test]
    fn test_shard_routing_is_stable() {
        let id = Uuid::new_v4();
        let shard = shard_for(id, 4);
        for _ in 0..16 {
            assert_eq!(shard_for(id, 4), shard);
        }
        assert!(shard < 4);
    }

    #[test]
    fn test_single_shard_takes_everything() {
        for _ in 0..16 {
            assert_eq!(shard_for(Uuid::new_v4(), 1), 0);
        }
    }

    #[tokio::test]
    async fn test_queue_routes_same_video_to_same_channel() {
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        let queue = EncodeQueue {
            senders: vec![tx_a, tx_b],
        };

        let video_id = Uuid::new_v4();
        for _ in 0..3 {
            queue
                .enqueue(EncodeJob {
                    video_id,
                    raw_key: storage::raw_key(video_id),
                })
                .await
                .unwrap();
        }

        let shard = shard_for(video_id, 2);
        let rx = if shard == 0 { &mut rx_a } else { &mut rx_b };
        for _ in 0..3 {
            let job = rx.recv().await.unwrap();
            assert_eq!(job.video_id, video_id);
        }
        let other = if shard == 0 { &mut rx_b } else { &mut rx_a };
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_jobs_delivered_in_enqueue_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let queue = EncodeQueue { senders: vec![tx] };

        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        queue
            .enqueue(EncodeJob {
                video_id: first,
                raw_key: storage::raw_key(first),
            })
            .await
            .unwrap();
        queue
            .enqueue(EncodeJob {
                video_id: second,
                raw_key: storage::raw_key(second),
            })
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().video_id, first);
        assert_eq!(rx.recv().await.unwrap().video_id, second);
    }

    /// Needs Postgres:
    /// `TEST_DATABASE_URL=... cargo test recover_stalled -- --ignored`
    #[tokio::test]
    #[ignore]
    async fn test_recover_stalled_jobs_requeues_processing_videos() {
        let Some(url) = std::env::var("TEST_DATABASE_URL").ok() else {
            return;
        };
        let pool = sqlx::PgPool::connect(&url).await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        let video_id = Uuid::new_v4();
        let raw_key = storage::raw_key(video_id);
        video_repo::create_video(
            &pool,
            video_id,
            Uuid::new_v4(),
            "breeder",
            "stalled upload",
            None,
            &[],
            &raw_key,
        )
        .await
        .unwrap();
        assert!(video_repo::mark_processing(&pool, video_id).await.unwrap());

        let (tx, mut rx) = mpsc::channel(256);
        let queue = EncodeQueue { senders: vec![tx] };
        let requeued = recover_stalled_jobs(&pool, &queue).await.unwrap();
        assert!(requeued >= 1);

        // The channel may also carry other processing rows from the shared
        // database; ours must be among them with its raw key intact
        let mut found = false;
        while let Ok(job) = rx.try_recv() {
            if job.video_id == video_id {
                assert_eq!(job.raw_key, raw_key);
                found = true;
            }
        }
        assert!(found, "stalled video was not requeued");
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_errors() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let queue = EncodeQueue { senders: vec![tx] };
        let video_id = Uuid::new_v4();
        let err = queue
            .enqueue(EncodeJob {
                video_id,
                raw_key: storage::raw_key(video_id),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
