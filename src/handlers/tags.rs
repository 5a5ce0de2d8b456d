/// Tag search and discovery endpoints
use crate::error::{AppError, Result};
use crate::services::TagService;
use actix_web::{web, HttpResponse};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct TagSearchQuery {
    pub tag: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// GET /api/v1/tags/search?tag=puppy
pub async fn search(
    service: web::Data<TagService>,
    query: web::Query<TagSearchQuery>,
) -> Result<HttpResponse> {
    let tag = query
        .tag
        .as_deref()
        .ok_or_else(|| AppError::Validation("Missing tag parameter".to_string()))?;
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let result = service.search(tag, page, limit).await?;
    Ok(HttpResponse::Ok().json(result))
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

/// GET /api/v1/tags/popular
pub async fn popular(
    service: web::Data<TagService>,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse> {
    let limit = query.limit.unwrap_or(10).clamp(1, 50);
    let stats = service.popular(limit).await?;
    Ok(HttpResponse::Ok().json(stats))
}

#[derive(Debug, Deserialize)]
pub struct SuggestQuery {
    pub q: Option<String>,
    pub limit: Option<i64>,
}

/// GET /api/v1/tags/suggest?q=pu
pub async fn suggest(
    service: web::Data<TagService>,
    query: web::Query<SuggestQuery>,
) -> Result<HttpResponse> {
    let prefix = query
        .q
        .as_deref()
        .ok_or_else(|| AppError::Validation("Missing q parameter".to_string()))?;
    let limit = query.limit.unwrap_or(10).clamp(1, 50);

    let tags = service.suggest(prefix, limit).await?;
    Ok(HttpResponse::Ok().json(tags))
}
