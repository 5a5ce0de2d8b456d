/// Like endpoints
use crate::error::Result;
use crate::handlers::{extract_identity, PaginationQuery};
use crate::services::LikeService;
use actix_web::{web, HttpRequest, HttpResponse};
use uuid::Uuid;

/// POST /api/v1/videos/{id}/like
pub async fn toggle_like(
    req: HttpRequest,
    service: web::Data<LikeService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let (user_id, role) = extract_identity(&req)?;
    let status = service.toggle_like(path.into_inner(), user_id, role).await?;
    Ok(HttpResponse::Ok().json(status))
}

/// GET /api/v1/videos/{id}/like
pub async fn get_like_status(
    req: HttpRequest,
    service: web::Data<LikeService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let (user_id, _) = extract_identity(&req)?;
    let status = service.get_like_status(path.into_inner(), user_id).await?;
    Ok(HttpResponse::Ok().json(status))
}

/// GET /api/v1/videos/liked
pub async fn get_liked_videos(
    req: HttpRequest,
    service: web::Data<LikeService>,
    query: web::Query<PaginationQuery>,
) -> Result<HttpResponse> {
    let (user_id, _) = extract_identity(&req)?;
    let (page, limit) = query.clamped();
    let videos = service.get_liked_videos(user_id, page, limit).await?;
    Ok(HttpResponse::Ok().json(videos))
}
