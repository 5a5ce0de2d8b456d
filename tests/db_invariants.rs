//! Database invariant tests
//!
//! Exercise the guarded status transitions, the like-counter convergence
//! property, and the tag aggregates against a real Postgres.
//!
//! Requires a database and is skipped otherwise:
//! ```bash
//! TEST_DATABASE_URL=postgresql://localhost/pawreel_test \
//!   cargo test --test db_invariants -- --ignored
//! ```
use media_service::db::{like_repo, video_repo};
use media_service::models::{Video, VideoStatus};
use sqlx::PgPool;
use uuid::Uuid;

async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = PgPool::connect(&url).await.expect("connect test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    Some(pool)
}

async fn seed_video(pool: &PgPool, tags: &[String]) -> Video {
    let id = Uuid::new_v4();
    video_repo::create_video(
        pool,
        id,
        Uuid::new_v4(),
        "breeder",
        "Luna meets the kittens",
        None,
        tags,
        &format!("videos/raw/{id}.mp4"),
    )
    .await
    .expect("create video")
}

async fn seed_ready_video(pool: &PgPool, tags: &[String]) -> Video {
    let video = seed_video(pool, tags).await;
    assert!(video_repo::mark_processing(pool, video.id).await.unwrap());
    assert!(video_repo::mark_ready(
        pool,
        video.id,
        30,
        1280,
        720,
        &format!("videos/hls/{}/", video.id),
        &format!("videos/thumbs/{}.jpg", video.id),
    )
    .await
    .unwrap());
    video_repo::find_video(pool, video.id).await.unwrap().unwrap()
}

#[tokio::test]
#[ignore]
async fn guarded_transitions_fire_exactly_once() {
    let Some(pool) = test_pool().await else { return };
    let video = seed_video(&pool, &[]).await;

    // Terminal transitions are unreachable from `uploading`
    assert!(!video_repo::mark_ready(&pool, video.id, 30, 1280, 720, "p/", "t.jpg")
        .await
        .unwrap());
    assert!(!video_repo::mark_failed(&pool, video.id, "nope").await.unwrap());

    // The uploading -> processing latch admits exactly one caller
    assert!(video_repo::mark_processing(&pool, video.id).await.unwrap());
    assert!(!video_repo::mark_processing(&pool, video.id).await.unwrap());

    // One terminal transition, then every further attempt is a no-op
    assert!(video_repo::mark_ready(
        &pool,
        video.id,
        42,
        1280,
        720,
        "videos/hls/x/",
        "videos/thumbs/x.jpg"
    )
    .await
    .unwrap());
    assert!(!video_repo::mark_ready(&pool, video.id, 9, 640, 360, "other/", "other.jpg")
        .await
        .unwrap());
    assert!(!video_repo::mark_failed(&pool, video.id, "late failure").await.unwrap());

    let current = video_repo::find_video(&pool, video.id).await.unwrap().unwrap();
    assert_eq!(current.get_status(), VideoStatus::Ready);
    assert_eq!(current.duration_seconds, 42);
    assert_eq!(current.hls_prefix.as_deref(), Some("videos/hls/x/"));
    assert_eq!(current.failure_reason, None);
}

#[tokio::test]
#[ignore]
async fn like_toggle_flips_state_and_count_in_lockstep() {
    let Some(pool) = test_pool().await else { return };
    let video = seed_ready_video(&pool, &[]).await;
    let user = Uuid::new_v4();

    let (liked, count) = like_repo::toggle_like(&pool, video.id, user, "adopter").await.unwrap();
    assert!(liked);
    assert_eq!(count, 1);
    assert!(like_repo::has_liked(&pool, video.id, user).await.unwrap());

    let (liked, count) = like_repo::toggle_like(&pool, video.id, user, "adopter").await.unwrap();
    assert!(!liked);
    assert_eq!(count, 0);
    assert!(!like_repo::has_liked(&pool, video.id, user).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn like_count_converges_under_concurrent_toggles() {
    let Some(pool) = test_pool().await else { return };
    let video = seed_ready_video(&pool, &[]).await;
    let user = Uuid::new_v4();

    // Hammer the same (video, user) pair from many tasks; whatever the
    // interleaving, the stored counter must equal the live row count after
    // everything quiesces
    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        let video_id = video.id;
        handles.push(tokio::spawn(async move {
            for _ in 0..5 {
                like_repo::toggle_like(&pool, video_id, user, "adopter")
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let current = video_repo::find_video(&pool, video.id).await.unwrap().unwrap();
    let row_exists = like_repo::has_liked(&pool, video.id, user).await.unwrap();
    assert_eq!(
        current.like_count,
        if row_exists { 1 } else { 0 },
        "counter diverged from live rows"
    );
}

#[tokio::test]
#[ignore]
async fn popular_tags_aggregate_decodes_and_sums_views() {
    let Some(pool) = test_pool().await else { return };
    // Unique tag so the shared database cannot collide with other runs
    let tag = format!("tag-{}", Uuid::new_v4());

    let first = seed_ready_video(&pool, &[tag.clone()]).await;
    let second = seed_ready_video(&pool, &[tag.clone()]).await;
    assert!(video_repo::increment_view_count(&pool, first.id).await.unwrap());
    assert!(video_repo::increment_view_count(&pool, first.id).await.unwrap());
    assert!(video_repo::increment_view_count(&pool, second.id).await.unwrap());

    let stats = video_repo::popular_tags(&pool, 1000).await.unwrap();
    let ours = stats
        .iter()
        .find(|s| s.tag == tag)
        .expect("tag missing from aggregate");
    assert_eq!(ours.video_count, 2);
    assert_eq!(ours.total_views, 3);
}
