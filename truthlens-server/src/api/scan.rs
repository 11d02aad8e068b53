//! Scan API: resolve a restaurant to its assembled score summary

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use truthlens_common::model::{EvidenceItem, TruthReport};

use crate::error::{ApiError, ApiResult};
use crate::services::resolver::{self, ResolveStatus};
use crate::AppState;

/// POST /api/scan request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub restaurant_name: String,
    #[serde(default)]
    pub location: String,
}

/// POST /api/scan response: the resolve outcome plus display-ready summary
/// fields assembled server-side.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub success: bool,
    pub found: bool,
    pub status: ResolveStatus,
    pub message: String,
    pub report: TruthReport,
    pub show_seal: bool,
    pub key_findings: Vec<String>,
    pub verdict: String,
    pub evidence_items: Vec<EvidenceItem>,
}

/// POST /api/scan
///
/// Resolves the restaurant (possibly triggering a background audit) and
/// returns the assembled score summary. Returns immediately: a fresh
/// analysis is observed later via `/events` or polling.
pub async fn scan(
    State(state): State<AppState>,
    Json(request): Json<ScanRequest>,
) -> ApiResult<Json<ScanResponse>> {
    if request.restaurant_name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Restaurant name is required".to_string(),
        ));
    }

    let outcome = resolver::resolve(&state, &request.restaurant_name, &request.location).await?;
    let report = outcome.report;

    let show_seal = report.confidence >= 80;

    let key_findings = if report.key_findings.is_empty() {
        summary_findings(&report)
    } else {
        report.key_findings.clone()
    };

    let verdict = if report.verification_count == 0 {
        "AI estimate only - be the first verifier".to_string()
    } else {
        format!(
            "Verified by {} independent receipt(s)",
            report.verification_count
        )
    };

    Ok(Json(ScanResponse {
        success: true,
        found: outcome.found,
        status: outcome.status,
        message: outcome.message,
        show_seal,
        key_findings,
        verdict,
        evidence_items: report.evidence_items.clone(),
        report,
    }))
}

/// Derived findings shown while a scan is still in flight and the record
/// carries no analyzer findings of its own.
fn summary_findings(report: &TruthReport) -> Vec<String> {
    match report.ai_bot_probability {
        Some(bot) => vec![
            format!("Web2 platforms show {:.1} star average", report.web2_score),
            format!("AI detected {:.0}% bot probability", bot),
            format!("{} verifier report(s) on file", report.verification_count),
        ],
        None => vec!["Forensic scan in progress - no findings yet".to_string()],
    }
}

/// Build scan routes
pub fn scan_routes() -> Router<AppState> {
    Router::new().route("/api/scan", post(scan))
}
