/// Error handling for the API server
///
/// This module provides a unified error type that maps to HTTP responses.
/// All handlers return `Result<T, ApiError>`; domain errors convert into it
/// through the `From` impls below. Internal detail is logged, never returned.
///
/// | Domain error                     | Status | `error`             |
/// |----------------------------------|--------|---------------------|
/// | quota exceeded                   | 429    | `quota_exceeded`    |
/// | enrichment / generation / video  | 502    | `enrichment_failed` / `generation_failed` / `video_failed` |
/// | store unavailable, cancellation  | 503    | `service_unavailable` |
/// | bad or missing session           | 401    | `unauthorized`      |
/// | request validation               | 422    | `validation_error`  |

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use vistagen_engine::orchestrator::GenerationError;
use vistagen_engine::services::{EnrichmentError, VideoError};
use vistagen_shared::accounts::AccountError;
use vistagen_shared::auth::jwt::JwtError;
use vistagen_shared::store::StoreError;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Payment required (402) - card declined
    PaymentDeclined(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409) - e.g., duplicate identity
    Conflict(String),

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Too many requests (429) - daily quota used up
    QuotaExceeded(String),

    /// Internal server error (500)
    InternalError(String),

    /// Bad gateway (502) - an upstream generation service failed
    Upstream { code: &'static str, message: String },

    /// Service unavailable (503)
    ServiceUnavailable(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

impl ValidationErrorDetail {
    /// Single-field validation failure
    pub fn single(field: &str, message: &str) -> ApiError {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: field.to_string(),
            message: message.to_string(),
        }])
    }
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "quota_exceeded", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::PaymentDeclined(msg) => write!(f, "Payment declined: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::QuotaExceeded(msg) => write!(f, "Quota exceeded: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::Upstream { code, message } => write!(f, "Upstream failure ({}): {}", code, message),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::PaymentDeclined(msg) => {
                (StatusCode::PAYMENT_REQUIRED, "payment_declined", msg, None)
            }
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::QuotaExceeded(msg) => {
                (StatusCode::TOO_MANY_REQUESTS, "quota_exceeded", msg, None)
            }
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            ApiError::Upstream { code, message } => (StatusCode::BAD_GATEWAY, code, message, None),
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg,
                None,
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Convert validator errors to API errors
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| ValidationErrorDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid {}", field)),
                })
            })
            .collect();

        ApiError::ValidationError(details)
    }
}

/// Convert orchestrator errors to API errors
impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        let code = err.code();
        let message = err.user_message().to_string();
        match err {
            GenerationError::QuotaExceeded { .. } => ApiError::QuotaExceeded(message),
            GenerationError::AccountNotFound(_) => ApiError::NotFound(message),
            GenerationError::EnrichmentFailed(EnrichmentError::EmptyInput) => {
                ValidationErrorDetail::single("input", &message)
            }
            GenerationError::EnrichmentFailed(_) | GenerationError::GenerationFailed { .. } => {
                ApiError::Upstream { code, message }
            }
            GenerationError::StoreUnavailable(_) | GenerationError::Cancelled => {
                ApiError::ServiceUnavailable(message)
            }
        }
    }
}

/// Convert account errors to API errors
impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::NotFound(_) => {
                ApiError::NotFound("No account exists for this identity".to_string())
            }
            AccountError::AlreadyExists(_) => {
                ApiError::Conflict("An account with this identity already exists".to_string())
            }
            AccountError::InvalidIdentity(_) => {
                ValidationErrorDetail::single("identity", "Identity must not be empty")
            }
            AccountError::Store(e) => e.into(),
        }
    }
}

/// Convert store errors to API errors
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "Account store failure");
        ApiError::ServiceUnavailable(
            "The service is temporarily unavailable. Please try again shortly.".to_string(),
        )
    }
}

/// Convert video errors to API errors
impl From<VideoError> for ApiError {
    fn from(err: VideoError) -> Self {
        match err {
            VideoError::InvalidImage(_) => {
                ValidationErrorDetail::single("image", "Image must be a base64 data URI")
            }
            VideoError::EmptyPrompt => {
                ValidationErrorDetail::single("prompt", "Please describe the motion you want")
            }
            VideoError::Cancelled => {
                ApiError::ServiceUnavailable("The request was cancelled.".to_string())
            }
            other => {
                tracing::warn!(error = %other, "Video generation failed");
                ApiError::Upstream {
                    code: "video_failed",
                    message: "Video generation failed. Please try again.".to_string(),
                }
            }
        }
    }
}

/// Convert JWT errors to API errors
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::Unauthorized("Session expired".to_string()),
            JwtError::InvalidIssuer => ApiError::Unauthorized("Invalid token issuer".to_string()),
            JwtError::CreateError(msg) => ApiError::InternalError(msg),
            JwtError::ValidationError(_) => ApiError::Unauthorized("Invalid session token".to_string()),
        }
    }
}
