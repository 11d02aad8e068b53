//! Verification API: receipt-backed verifier submissions

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use truthlens_common::model::TruthReport;

use crate::error::{ApiError, ApiResult};
use crate::services::resolver;
use crate::AppState;

/// POST /api/verify request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub restaurant_key: String,
    pub verifier_id: String,
    /// 0-5
    pub score: f64,
    /// Opaque evidence reference, e.g. a receipt hash
    #[serde(default)]
    pub evidence_ref: String,
}

/// POST /api/verify response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    pub report: TruthReport,
}

/// POST /api/verify
///
/// Appends a verification, recomputes the blend, and returns the updated
/// report. Active `/events` subscribers observe the same update.
pub async fn submit_verification(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> ApiResult<Json<VerifyResponse>> {
    if request.restaurant_key.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Restaurant key is required".to_string(),
        ));
    }

    let report = resolver::submit_verification(
        &state,
        request.restaurant_key.trim(),
        &request.verifier_id,
        request.score,
        &request.evidence_ref,
    )
    .await?;

    Ok(Json(VerifyResponse {
        success: true,
        report,
    }))
}

/// Build verification routes
pub fn verify_routes() -> Router<AppState> {
    Router::new().route("/api/verify", post(submit_verification))
}
