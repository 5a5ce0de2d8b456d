/// Media Service - HTTP Server
///
/// Issues upload tickets, transcodes uploads into adaptive HLS in the
/// background, and serves metadata, playback and engagement endpoints.
use actix_web::{middleware as actix_middleware, web, App, HttpResponse, HttpServer};
use media_service::cache::{MediaCache, RedisCache};
use media_service::handlers;
use media_service::services::{
    encode_worker, CommentService, EncodeContext, LikeService, StorageClient, TagService,
    TranscodingEngine, VideoService,
};
use media_service::Config;
use sqlx::postgres::PgPoolOptions;
use std::io;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Encode queue depth per worker shard
const ENCODE_QUEUE_CAPACITY: usize = 64;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("Invalid configuration: {e}")))?;

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!(%bind_address, env = %config.app.env, "media service starting");

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .map_err(|e| {
            io::Error::new(
                io::ErrorKind::Other,
                format!("Failed to connect to database: {e}"),
            )
        })?;

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("Migration failed: {e}")))?;

    let redis_client = redis::Client::open(config.cache.redis_url.as_str())
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("Invalid REDIS_URL: {e}")))?;
    let cache: Arc<dyn MediaCache> =
        Arc::new(RedisCache::new(redis_client).await.map_err(|e| {
            io::Error::new(
                io::ErrorKind::Other,
                format!("Failed to initialize cache: {e}"),
            )
        })?);

    let storage = StorageClient::new(config.s3.clone()).await.map_err(|e| {
        io::Error::new(
            io::ErrorKind::Other,
            format!("Failed to initialize storage: {e}"),
        )
    })?;
    if let Err(e) = storage.health_check().await {
        tracing::warn!("storage health check failed at startup: {e}");
    }

    let engine = TranscodingEngine::new(config.media.clone());

    let (encode_queue, _workers) = encode_worker::start_encode_workers(
        EncodeContext {
            pool: db_pool.clone(),
            storage: storage.clone(),
            engine,
            cache: Arc::clone(&cache),
            cfg: config.media.clone(),
        },
        ENCODE_QUEUE_CAPACITY,
    );

    match encode_worker::recover_stalled_jobs(&db_pool, &encode_queue).await {
        Ok(0) => {}
        Ok(count) => tracing::info!(count, "requeued stalled encode jobs"),
        Err(e) => tracing::warn!("stalled job recovery failed: {e}"),
    }

    let video_service = web::Data::new(VideoService::new(
        db_pool.clone(),
        Arc::clone(&cache),
        storage.clone(),
        encode_queue,
        config.media.clone(),
    ));
    let like_service = web::Data::new(LikeService::new(db_pool.clone(), Arc::clone(&cache)));
    let comment_service = web::Data::new(CommentService::new(db_pool.clone(), Arc::clone(&cache)));
    let tag_service = web::Data::new(TagService::new(db_pool.clone(), Arc::clone(&cache)));

    HttpServer::new(move || {
        App::new()
            .app_data(video_service.clone())
            .app_data(like_service.clone())
            .app_data(comment_service.clone())
            .app_data(tag_service.clone())
            .wrap(actix_middleware::Logger::default())
            .route(
                "/api/v1/health",
                web::get()
                    .to(|| async { HttpResponse::Ok().json(serde_json::json!({"status": "ok"})) }),
            )
            .route(
                "/api/v1/health/ready",
                web::get().to(|| async { HttpResponse::Ok().finish() }),
            )
            .service(
                web::scope("/api/v1")
                    .service(
                        web::scope("/videos")
                            .route("/upload-url", web::post().to(handlers::videos::issue_upload_url))
                            .route("/feed", web::get().to(handlers::videos::get_feed))
                            .route("/popular", web::get().to(handlers::videos::get_popular))
                            .route("/mine", web::get().to(handlers::videos::get_my_videos))
                            .route("/liked/mine", web::get().to(handlers::likes::get_liked_videos))
                            .route("/{id}/complete", web::post().to(handlers::videos::complete_upload))
                            .route("/{id}/view", web::post().to(handlers::videos::record_view))
                            .route("/{id}/stream/{filename}", web::get().to(handlers::videos::serve_hls_file))
                            .route("/{id}/prefetch", web::post().to(handlers::videos::prefetch_segments))
                            .route("/{id}/visibility", web::patch().to(handlers::videos::toggle_visibility))
                            .route("/{id}/like", web::post().to(handlers::likes::toggle_like))
                            .route("/{id}/like", web::get().to(handlers::likes::get_like_status))
                            .route("/{id}/comments", web::post().to(handlers::comments::create_comment))
                            .route("/{id}/comments", web::get().to(handlers::comments::get_comments))
                            .route("/{id}", web::get().to(handlers::videos::get_video))
                            .route("/{id}", web::delete().to(handlers::videos::delete_video)),
                    )
                    .service(
                        web::scope("/comments")
                            .route("/{id}/replies", web::get().to(handlers::comments::get_replies))
                            .route("/{id}", web::patch().to(handlers::comments::update_comment))
                            .route("/{id}", web::delete().to(handlers::comments::delete_comment)),
                    )
                    .service(
                        web::scope("/tags")
                            .route("/search", web::get().to(handlers::tags::search))
                            .route("/popular", web::get().to(handlers::tags::popular))
                            .route("/suggest", web::get().to(handlers::tags::suggest)),
                    ),
            )
    })
    .bind(&bind_address)?
    .run()
    .await
}
