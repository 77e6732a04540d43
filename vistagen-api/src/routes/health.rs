/// Health check endpoint
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "store": "connected",
///   "mode": "live",
///   "timestamp": "2025-06-01T12:00:00Z"
/// }
/// ```
///
/// `store` is `memory` for the in-memory store, otherwise `connected` or
/// `disconnected`. `mode` is `demo` when the generation services are mocks.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vistagen_shared::db::pool;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Application version
    pub version: String,

    /// Account store status
    pub store: String,

    /// `live` or `demo`
    pub mode: String,

    /// Server time
    pub timestamp: DateTime<Utc>,
}

/// Health check handler
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let store_status = match &state.db {
        Some(db) => match pool::health_check(db).await {
            Ok(()) => "connected",
            Err(e) => {
                tracing::warn!(error = %e, "Database health check failed");
                "disconnected"
            }
        },
        None => "memory",
    };

    Ok(Json(HealthResponse {
        status: if store_status == "disconnected" {
            "degraded".to_string()
        } else {
            "healthy".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: store_status.to_string(),
        mode: if state.config.demo_mode() { "demo" } else { "live" }.to_string(),
        timestamp: state.accounts.clock().now(),
    }))
}
