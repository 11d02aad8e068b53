//! Audit API: run the full analysis pipeline for a known restaurant

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use truthlens_common::model::LifecycleStatus;

use crate::error::{ApiError, ApiResult};
use crate::services::resolver;
use crate::AppState;

/// POST /api/audit/start request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAuditRequest {
    pub restaurant_id: String,
    pub restaurant_name: String,
    #[serde(default)]
    pub location: String,
}

/// POST /api/audit/start response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAuditResponse {
    pub success: bool,
    pub restaurant_id: String,
    pub truth_score: f64,
    pub status: LifecycleStatus,
}

/// POST /api/audit/start
///
/// Runs the full audit pipeline synchronously and writes the result: the
/// record moves to `ready` (or keeps `debunked`) before the response is
/// sent. The asynchronous path through `/api/scan` spawns this same
/// pipeline in the background instead.
pub async fn start_audit(
    State(state): State<AppState>,
    Json(request): Json<StartAuditRequest>,
) -> ApiResult<Json<StartAuditResponse>> {
    if request.restaurant_id.trim().is_empty() || request.restaurant_name.trim().is_empty() {
        return Err(ApiError::BadRequest("Missing required fields".to_string()));
    }

    let location = if request.location.trim().is_empty() {
        "unknown"
    } else {
        request.location.trim()
    };

    resolver::run_audit(
        &state,
        request.restaurant_id.trim(),
        request.restaurant_name.trim(),
        location,
    )
    .await?;

    let report = crate::db::reports::fetch_by_key(&state.db, request.restaurant_id.trim())
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("No report for key {}", request.restaurant_id))
        })?;

    Ok(Json(StartAuditResponse {
        success: true,
        restaurant_id: report.restaurant_key.clone(),
        truth_score: report.ai_score.unwrap_or(report.final_score),
        status: report.lifecycle_status,
    }))
}

/// Build audit routes
pub fn audit_routes() -> Router<AppState> {
    Router::new().route("/api/audit/start", post(start_audit))
}
