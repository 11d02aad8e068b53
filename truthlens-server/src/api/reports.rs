//! Report read endpoints and the debunk transition

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use truthlens_common::model::{TruthReport, Verification};

use crate::error::{ApiError, ApiResult};
use crate::services::resolver;
use crate::AppState;

/// GET /api/report/:key
pub async fn get_report(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<TruthReport>> {
    let report = crate::db::reports::fetch_by_key(&state.db, &key)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No report for key {}", key)))?;

    Ok(Json(report))
}

/// GET /api/reports response
#[derive(Debug, Serialize)]
pub struct ReportListResponse {
    pub reports: Vec<TruthReport>,
    pub total: usize,
}

/// GET /api/reports - all reports, newest first (map view)
pub async fn list_reports(State(state): State<AppState>) -> ApiResult<Json<ReportListResponse>> {
    let reports = crate::db::reports::list_all(&state.db).await?;
    let total = reports.len();

    Ok(Json(ReportListResponse { reports, total }))
}

/// GET /api/report/:key/verifications response
#[derive(Debug, Serialize)]
pub struct VerificationListResponse {
    pub verifications: Vec<Verification>,
    pub total: usize,
}

/// GET /api/report/:key/verifications - newest first (UI listing)
pub async fn list_verifications(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<VerificationListResponse>> {
    let verifications = crate::db::verifications::list_for(&state.db, &key).await?;
    let total = verifications.len();

    Ok(Json(VerificationListResponse {
        verifications,
        total,
    }))
}

/// POST /api/report/:key/debunk - terminal reveal transition
pub async fn debunk_report(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<TruthReport>> {
    let report = resolver::mark_debunked(&state, &key).await?;
    Ok(Json(report))
}

/// Build report routes
pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/api/reports", get(list_reports))
        .route("/api/report/:key", get(get_report))
        .route("/api/report/:key/verifications", get(list_verifications))
        .route("/api/report/:key/debunk", post(debunk_report))
}
