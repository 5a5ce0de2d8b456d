/// Video lifecycle and playback endpoints
use crate::error::Result;
use crate::handlers::{extract_identity, optional_identity, PaginationQuery};
use crate::models::IssueUploadUrlRequest;
use crate::services::VideoService;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

/// POST /api/v1/videos/upload-url
pub async fn issue_upload_url(
    req: HttpRequest,
    service: web::Data<VideoService>,
    body: web::Json<IssueUploadUrlRequest>,
) -> Result<HttpResponse> {
    let (user_id, role) = extract_identity(&req)?;
    let ticket = service
        .issue_upload_url(user_id, role, body.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(ticket))
}

/// POST /api/v1/videos/{id}/complete
pub async fn complete_upload(
    req: HttpRequest,
    service: web::Data<VideoService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let (user_id, _) = extract_identity(&req)?;
    let video = service.complete_upload(path.into_inner(), user_id).await?;
    Ok(HttpResponse::Ok().json(video))
}

/// GET /api/v1/videos/feed
pub async fn get_feed(
    service: web::Data<VideoService>,
    query: web::Query<PaginationQuery>,
) -> Result<HttpResponse> {
    let (page, limit) = query.clamped();
    let feed = service.get_feed(page, limit).await?;
    Ok(HttpResponse::Ok().json(feed))
}

#[derive(Debug, Deserialize)]
pub struct PopularQuery {
    pub limit: Option<i64>,
}

/// GET /api/v1/videos/popular
pub async fn get_popular(
    service: web::Data<VideoService>,
    query: web::Query<PopularQuery>,
) -> Result<HttpResponse> {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let videos = service.get_popular(limit).await?;
    Ok(HttpResponse::Ok().json(videos))
}

/// GET /api/v1/videos/mine
pub async fn get_my_videos(
    req: HttpRequest,
    service: web::Data<VideoService>,
    query: web::Query<PaginationQuery>,
) -> Result<HttpResponse> {
    let (user_id, _) = extract_identity(&req)?;
    let (page, limit) = query.clamped();
    let videos = service.get_my_videos(user_id, page, limit).await?;
    Ok(HttpResponse::Ok().json(videos))
}

/// GET /api/v1/videos/{id}
pub async fn get_video(
    req: HttpRequest,
    service: web::Data<VideoService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let viewer = optional_identity(&req);
    let video = service.get_video(path.into_inner(), viewer).await?;
    Ok(HttpResponse::Ok().json(video))
}

/// POST /api/v1/videos/{id}/view
pub async fn record_view(
    service: web::Data<VideoService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    service.record_view(path.into_inner()).await;
    Ok(HttpResponse::Accepted().finish())
}

/// GET /api/v1/videos/{id}/stream/{filename}
pub async fn serve_hls_file(
    req: HttpRequest,
    service: web::Data<VideoService>,
    path: web::Path<(Uuid, String)>,
) -> Result<HttpResponse> {
    let (video_id, filename) = path.into_inner();
    let viewer = optional_identity(&req);
    let (bytes, content_type) = service.serve_hls_file(video_id, &filename, viewer).await?;
    Ok(HttpResponse::Ok().content_type(content_type).body(bytes))
}

#[derive(Debug, Deserialize)]
pub struct PrefetchQuery {
    pub index: Option<u32>,
}

/// POST /api/v1/videos/{id}/prefetch
pub async fn prefetch_segments(
    req: HttpRequest,
    service: web::Data<VideoService>,
    path: web::Path<Uuid>,
    query: web::Query<PrefetchQuery>,
) -> Result<HttpResponse> {
    let viewer = optional_identity(&req);
    service
        .prefetch_segments(path.into_inner(), viewer, query.index.unwrap_or(0))
        .await?;
    Ok(HttpResponse::Accepted().finish())
}

/// DELETE /api/v1/videos/{id}
pub async fn delete_video(
    req: HttpRequest,
    service: web::Data<VideoService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let (user_id, _) = extract_identity(&req)?;
    service.delete_video(path.into_inner(), user_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// PATCH /api/v1/videos/{id}/visibility
pub async fn toggle_visibility(
    req: HttpRequest,
    service: web::Data<VideoService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let (user_id, _) = extract_identity(&req)?;
    let visibility = service.toggle_visibility(path.into_inner(), user_id).await?;
    Ok(HttpResponse::Ok().json(visibility))
}
