//! Health endpoint for probes and the dashboard footer.

use axum::{Json, extract::State};
use std::sync::Arc;

use super::types::HealthDto;
use super::{ApiResponse, AppState};

/// GET /api/health
///
/// Always answers 200 so a load balancer can read the body; a broken
/// database shows up as `degraded` rather than a dropped connection.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthDto>> {
    let database = match state.store.ping().await {
        Ok(()) => "ok",
        Err(err) => {
            tracing::warn!(error = %err, "Health check failed to reach the database");
            "error"
        }
    };

    let status = if database == "ok" { "ok" } else { "degraded" };

    Json(ApiResponse::success(HealthDto {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.start_time.elapsed().as_secs(),
        database,
    }))
}
