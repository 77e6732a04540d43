/// Session endpoints
///
/// Identity is trusted as given: registering or logging in issues a signed
/// session token for the identity without any credential check.
///
/// # Endpoints
///
/// - `POST /v1/auth/register` - Create an account on the Free tier
/// - `POST /v1/auth/login` - Start a session for an existing account

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;
use vistagen_shared::auth::jwt::{self, SessionClaims, SESSION_LIFETIME_HOURS};
use vistagen_shared::models::account::Account;

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub identity: String,

    /// Optional display name
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub identity: String,
}

/// Session response
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// Bearer token
    pub token: String,

    /// Always "Bearer"
    pub token_type: &'static str,

    /// Token lifetime in seconds
    pub expires_in: i64,

    /// The signed-in account
    pub account: Account,
}

impl SessionResponse {
    fn issue(state: &AppState, account: Account) -> ApiResult<Self> {
        let claims = SessionClaims::new(&account.identity, account.id);
        let token = jwt::create_token(&claims, state.jwt_secret())?;

        Ok(Self {
            token,
            token_type: "Bearer",
            expires_in: SESSION_LIFETIME_HOURS * 3600,
            account,
        })
    }
}

/// Register a new account
///
/// ```text
/// POST /v1/auth/register
/// {"identity": "user@example.com", "name": "Arta"}
/// ```
///
/// # Errors
///
/// - `409 Conflict`: Identity already registered
/// - `422 Unprocessable Entity`: Validation failed
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    req.validate()?;

    let account = state
        .accounts
        .register(&req.identity, req.name.as_deref())
        .await?;

    tracing::info!(identity = %account.identity, "Account registered");

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse::issue(&state, account)?),
    ))
}

/// Start a session
///
/// ```text
/// POST /v1/auth/login
/// {"identity": "user@example.com"}
/// ```
///
/// # Errors
///
/// - `404 Not Found`: No account for this identity
/// - `422 Unprocessable Entity`: Validation failed
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<SessionResponse>> {
    req.validate()?;

    let account = state.accounts.start_session(&req.identity).await?;

    tracing::info!(identity = %account.identity, tier = %account.tier, "Session started");

    Ok(Json(SessionResponse::issue(&state, account)?))
}
