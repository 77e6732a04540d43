/// Generation endpoint
///
/// `POST /v1/generations` runs the usage-gated pipeline for the session's
/// account: quota check, enrichment, fan-out, usage commit.
///
/// The pipeline runs under a cancellation token tied to this handler. When
/// the client disconnects, axum drops the handler future, the drop guard
/// fires and outstanding attempts are abandoned without charging usage.
///
/// ```text
/// POST /v1/generations
/// Authorization: Bearer <token>
/// {"input": "nje vajze ne plazh ne Ksamil"}
/// ```

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use validator::Validate;
use vistagen_engine::services::{Artifact, GenerationBrief};
use vistagen_shared::auth::jwt::SessionContext;
use vistagen_shared::quota::QuotaEvaluation;

/// Generation request
#[derive(Debug, Deserialize, Validate)]
pub struct GenerationRequest {
    /// Free-text description
    #[validate(length(min = 1, max = 2000, message = "Input must be 1 to 2000 characters"))]
    pub input: String,
}

/// One generated image
#[derive(Debug, Serialize)]
pub struct ImageResponse {
    /// Attempt index that produced it
    pub index: usize,

    /// MIME type
    pub mime_type: String,

    /// `data:` URI ready for display
    pub data_uri: String,
}

impl From<&Artifact> for ImageResponse {
    fn from(artifact: &Artifact) -> Self {
        ImageResponse {
            index: artifact.index,
            mime_type: artifact.mime_type.clone(),
            data_uri: artifact.data_uri(),
        }
    }
}

/// Generation response
#[derive(Debug, Serialize)]
pub struct GenerationResponse {
    /// Enriched brief
    pub brief: GenerationBrief,

    /// Images in attempt order
    pub images: Vec<ImageResponse>,

    /// Attempts that produced nothing
    pub failed_attempts: usize,

    /// Quota after the charge
    pub quota: QuotaEvaluation,
}

/// Generate images for the session's account
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Blank or oversized input
/// - `429 Too Many Requests`: Daily quota used up
/// - `502 Bad Gateway`: Enrichment failed, or every attempt failed
/// - `503 Service Unavailable`: Account store failure
pub async fn create_generation(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Json(req): Json<GenerationRequest>,
) -> ApiResult<Json<GenerationResponse>> {
    req.validate()?;

    let cancel = CancellationToken::new();
    let _disconnect = cancel.clone().drop_guard();

    let report = state
        .orchestrator
        .request_generation(&session.identity, &req.input, &cancel)
        .await?;

    Ok(Json(GenerationResponse {
        images: report.artifacts.iter().map(ImageResponse::from).collect(),
        failed_attempts: report.failures.len(),
        brief: report.brief,
        quota: report.quota,
    }))
}
