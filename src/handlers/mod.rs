/// HTTP handlers
///
/// Handlers stay thin: extract identity and pagination, delegate to the
/// services, serialize the result. Identity arrives from the gateway as
/// `x-user-id` / `x-user-role` headers.
pub mod comments;
pub mod likes;
pub mod tags;
pub mod videos;

use crate::error::{AppError, Result};
use crate::models::UploaderRole;
use actix_web::HttpRequest;
use serde::Deserialize;
use uuid::Uuid;

const DEFAULT_PAGE_LIMIT: i64 = 20;
const MAX_PAGE_LIMIT: i64 = 100;

/// Authenticated caller; the gateway guarantees the headers on protected
/// routes, so a missing id is a misrouted request
pub fn extract_identity(req: &HttpRequest) -> Result<(Uuid, UploaderRole)> {
    let user_id = optional_identity(req)
        .ok_or_else(|| AppError::Unauthorized("Missing or invalid x-user-id header".to_string()))?;

    let role = req
        .headers()
        .get("x-user-role")
        .and_then(|v| v.to_str().ok())
        .and_then(UploaderRole::from_str)
        .unwrap_or(UploaderRole::Adopter);

    Ok((user_id, role))
}

/// Viewer identity on public routes, if present
pub fn optional_identity(req: &HttpRequest) -> Option<Uuid> {
    req.headers()
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
}

#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PaginationQuery {
    /// Clamp to sane bounds; out-of-range values degrade, never error
    pub fn clamped(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT);
        (page, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_clamps() {
        let q = PaginationQuery {
            page: None,
            limit: None,
        };
        assert_eq!(q.clamped(), (1, 20));

        let q = PaginationQuery {
            page: Some(0),
            limit: Some(1000),
        };
        assert_eq!(q.clamped(), (1, 100));

        let q = PaginationQuery {
            page: Some(3),
            limit: Some(-5),
        };
        assert_eq!(q.clamped(), (3, 1));
    }
}
