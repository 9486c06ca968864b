//! services/api/src/web/middleware.rs
//!
//! Identity middleware for protecting routes.

use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use lorelog_core::domain::Principal;
use tracing::debug;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_NAME_HEADER: &str = "x-user-name";

/// Middleware that reads the caller identity set by the authenticating proxy.
///
/// If valid, inserts the `Principal` into request extensions for handlers to use.
/// If the user id is missing or not a UUID, returns 401 Unauthorized.
pub async fn require_principal(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    // 1. Extract and parse the user id
    let principal = principal_from_headers(req.headers()).ok_or_else(|| {
        debug!("Rejecting request without a valid {} header", USER_ID_HEADER);
        StatusCode::UNAUTHORIZED
    })?;

    // 2. Insert the principal into request extensions
    req.extensions_mut().insert(principal);

    // 3. Continue to the handler
    Ok(next.run(req).await)
}

fn principal_from_headers(headers: &HeaderMap) -> Option<Principal> {
    let user_id = header_text(headers, USER_ID_HEADER).and_then(|v| Uuid::parse_str(&v).ok())?;
    Some(Principal {
        user_id,
        email: header_text(headers, USER_EMAIL_HEADER),
        name: header_text(headers, USER_NAME_HEADER),
    })
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
