/// Account status endpoint
///
/// `GET /v1/account` returns the session's account with today's quota.
/// Reading the account applies (and persists) a pending day reset.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Extension, Json};
use vistagen_shared::auth::jwt::SessionContext;
use vistagen_shared::quota::QuotaEvaluation;

/// Current account and quota
///
/// # Errors
///
/// - `404 Not Found`: The session's account no longer exists
/// - `503 Service Unavailable`: Account store failure
pub async fn get_account(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> ApiResult<Json<QuotaEvaluation>> {
    let status = state.accounts.load(&session.identity).await?;
    Ok(Json(status))
}
