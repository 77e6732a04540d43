/// Authentication middleware
///
/// Two gates sit in front of the v1 routes:
///
/// - `jwt_auth_layer` validates a `Bearer` session token and injects a
///   [`SessionContext`] into the request extensions.
/// - `admin_key_layer` compares the `x-admin-key` header against
///   `ADMIN_API_KEY`. Without a configured key every admin request is
///   forbidden.

use crate::{app::AppState, error::ApiError};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use vistagen_shared::auth::jwt::{self, SessionContext};

/// Header carrying the admin key
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// JWT authentication middleware layer
///
/// Extracts and validates the session token from the Authorization header,
/// then injects [`SessionContext`] into request extensions.
pub async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Expected Bearer token".to_string()))?;

    let claims = jwt::validate_token(token, state.jwt_secret())?;
    tracing::debug!(identity = %claims.sub, "Session authenticated");

    req.extensions_mut().insert(SessionContext::from(claims));

    Ok(next.run(req).await)
}

/// Admin key middleware layer
pub async fn admin_key_layer(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let expected = state
        .config
        .admin_api_key
        .as_deref()
        .ok_or_else(|| ApiError::Forbidden("Admin access is disabled".to_string()))?;

    let provided = req
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing admin key".to_string()))?;

    if !constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
        tracing::warn!("Rejected admin request with a wrong key");
        return Err(ApiError::Unauthorized("Invalid admin key".to_string()));
    }

    Ok(next.run(req).await)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
