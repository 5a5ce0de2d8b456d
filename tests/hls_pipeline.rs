//! End-to-end exercise of the local transcode pipeline in mock mode:
//! probe, thumbnail, and adaptive HLS output, plus the naming contracts
//! the proxy and prefetcher rely on.
use media_service::config::MediaConfig;
use media_service::services::storage;
use media_service::services::transcoder::{
    build_master_playlist, rendition_playlist_name, segment_file_name, TranscodingEngine,
};
use std::path::PathBuf;
use uuid::Uuid;

fn mock_engine() -> TranscodingEngine {
    let mut cfg = MediaConfig::from_env();
    cfg.enable_mock = true;
    TranscodingEngine::new(cfg)
}

fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("pawreel_it_{}", Uuid::new_v4()))
}

#[tokio::test]
async fn mock_pipeline_produces_complete_artifact_set() {
    let dir = scratch_dir();
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let input = dir.join("upload.mp4");
    tokio::fs::write(&input, b"raw").await.unwrap();

    let engine = mock_engine();

    let info = engine.probe_metadata(&input).await.unwrap();
    assert!(info.duration_seconds > 0.0);
    assert!(info.width > 0 && info.height > 0);

    let thumb = dir.join("thumbnail.jpg");
    engine.generate_thumbnail(&input, &thumb, 10).await.unwrap();
    assert!(thumb.exists());

    let hls_dir = dir.join("hls");
    let resolutions = [360, 480, 720];
    engine
        .transcode_to_adaptive_hls(&input, &hls_dir, &resolutions)
        .await
        .unwrap();

    let master = tokio::fs::read_to_string(hls_dir.join("master.m3u8"))
        .await
        .unwrap();
    assert_eq!(master, build_master_playlist(&resolutions));

    for resolution in resolutions {
        let playlist = hls_dir.join(rendition_playlist_name(resolution));
        assert!(playlist.exists(), "missing playlist for {resolution}p");
        assert!(hls_dir.join(segment_file_name(resolution, 0)).exists());
    }

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn artifact_names_map_onto_storage_keys() {
    let dir = scratch_dir();
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let input = dir.join("upload.mp4");
    tokio::fs::write(&input, b"raw").await.unwrap();

    let hls_dir = dir.join("hls");
    mock_engine()
        .transcode_to_adaptive_hls(&input, &hls_dir, &[480])
        .await
        .unwrap();

    // Every produced file must serve with a concrete content type under the
    // video's HLS prefix
    let video_id = Uuid::new_v4();
    let prefix = storage::hls_prefix(video_id);
    let mut entries = tokio::fs::read_dir(&hls_dir).await.unwrap();
    while let Some(entry) = entries.next_entry().await.unwrap() {
        let name = entry.file_name().to_string_lossy().to_string();
        let key = format!("{prefix}{name}");
        assert!(key.starts_with(&format!("videos/hls/{video_id}/")));
        assert_ne!(
            storage::content_type_for(&name),
            "application/octet-stream",
            "unexpected artifact {name}"
        );
    }

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}
