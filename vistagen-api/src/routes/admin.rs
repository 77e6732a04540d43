/// Admin endpoints
///
/// Guarded by the `x-admin-key` header.
///
/// - `GET /v1/admin/accounts?q=` - accounts with today's effective usage,
///   optionally filtered by a case-insensitive identity or name substring
/// - `PUT /v1/admin/accounts/:identity` - edit tier, usage or name

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use vistagen_shared::models::account::{Account, AccountUpdate};
use vistagen_shared::quota::QuotaEvaluation;

/// Account list response
#[derive(Debug, Serialize)]
pub struct AccountList {
    pub total: usize,
    pub accounts: Vec<Account>,
}

/// Account list filter
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Substring of identity or name
    pub q: Option<String>,
}

/// List accounts, sorted by identity
pub async fn list_accounts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<AccountList>> {
    let accounts = state.accounts.list_all(query.q.as_deref()).await?;

    Ok(Json(AccountList {
        total: accounts.len(),
        accounts,
    }))
}

/// Edit one account
///
/// # Errors
///
/// - `404 Not Found`: No account for this identity
pub async fn update_account(
    State(state): State<AppState>,
    Path(identity): Path<String>,
    Json(update): Json<AccountUpdate>,
) -> ApiResult<Json<QuotaEvaluation>> {
    let updated = state.accounts.admin_update(&identity, update).await?;
    Ok(Json(updated))
}
