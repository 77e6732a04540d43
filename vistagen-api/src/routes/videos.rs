/// Video endpoint
///
/// `POST /v1/videos` animates one previously generated image. Video
/// extension does not consume quota, but it requires a live session for an
/// existing account. Like generation, the job is abandoned when the client
/// disconnects.
///
/// ```text
/// POST /v1/videos
/// Authorization: Bearer <token>
/// {"image": "data:image/png;base64,...", "prompt": "waves rolling in"}
/// ```

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use validator::Validate;
use vistagen_shared::auth::jwt::SessionContext;

/// Video request
#[derive(Debug, Deserialize, Validate)]
pub struct VideoRequest {
    /// Source frame as a base64 `data:` URI
    #[validate(length(min = 1, message = "Image is required"))]
    pub image: String,

    /// Motion description
    #[validate(length(min = 1, max = 1000, message = "Prompt must be 1 to 1000 characters"))]
    pub prompt: String,
}

/// Video response
#[derive(Debug, Serialize)]
pub struct VideoResponse {
    /// MIME type
    pub mime_type: String,

    /// `data:` URI of the rendered clip
    pub data_uri: String,
}

/// Animate an image
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Image is not a data URI, or blank prompt
/// - `502 Bad Gateway`: The video service failed or never finished
pub async fn create_video(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Json(req): Json<VideoRequest>,
) -> ApiResult<Json<VideoResponse>> {
    req.validate()?;

    // Confirms the account still exists
    state.accounts.load(&session.identity).await?;

    let cancel = CancellationToken::new();
    let _disconnect = cancel.clone().drop_guard();

    tracing::info!(identity = %session.identity, "Video extension requested");
    let video = state.video.extend(&req.image, &req.prompt, &cancel).await?;

    Ok(Json(VideoResponse {
        data_uri: video.data_uri(),
        mime_type: video.mime_type,
    }))
}
