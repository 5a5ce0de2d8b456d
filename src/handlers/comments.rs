/// Comment endpoints
use crate::error::Result;
use crate::handlers::{extract_identity, PaginationQuery};
use crate::models::{CreateCommentRequest, UpdateCommentRequest};
use crate::services::CommentService;
use actix_web::{web, HttpRequest, HttpResponse};
use uuid::Uuid;

/// POST /api/v1/videos/{id}/comments
pub async fn create_comment(
    req: HttpRequest,
    service: web::Data<CommentService>,
    path: web::Path<Uuid>,
    body: web::Json<CreateCommentRequest>,
) -> Result<HttpResponse> {
    let (user_id, role) = extract_identity(&req)?;
    let comment = service
        .create_comment(path.into_inner(), user_id, role, body.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(comment))
}

/// GET /api/v1/videos/{id}/comments
pub async fn get_comments(
    service: web::Data<CommentService>,
    path: web::Path<Uuid>,
    query: web::Query<PaginationQuery>,
) -> Result<HttpResponse> {
    let (page, limit) = query.clamped();
    let comments = service.get_comments(path.into_inner(), page, limit).await?;
    Ok(HttpResponse::Ok().json(comments))
}

/// GET /api/v1/comments/{id}/replies
pub async fn get_replies(
    service: web::Data<CommentService>,
    path: web::Path<Uuid>,
    query: web::Query<PaginationQuery>,
) -> Result<HttpResponse> {
    let (page, limit) = query.clamped();
    let replies = service.get_replies(path.into_inner(), page, limit).await?;
    Ok(HttpResponse::Ok().json(replies))
}

/// PATCH /api/v1/comments/{id}
pub async fn update_comment(
    req: HttpRequest,
    service: web::Data<CommentService>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateCommentRequest>,
) -> Result<HttpResponse> {
    let (user_id, _) = extract_identity(&req)?;
    let comment = service
        .update_comment(path.into_inner(), user_id, body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(comment))
}

/// DELETE /api/v1/comments/{id}
pub async fn delete_comment(
    req: HttpRequest,
    service: web::Data<CommentService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let (user_id, _) = extract_identity(&req)?;
    service.delete_comment(path.into_inner(), user_id).await?;
    Ok(HttpResponse::NoContent().finish())
}
