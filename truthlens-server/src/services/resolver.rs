//! Search/cache resolution flow
//!
//! Single entry point for "get a score for restaurant X": serve a cached
//! report instantly, report an in-flight scan, or create the record and
//! kick off a background audit. The store's unique key constraint is the
//! only synchronization point: concurrent resolves of the same key create
//! exactly one record and exactly one audit.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use truthlens_common::events::ScoreEvent;
use truthlens_common::model::{
    restaurant_key, should_replace, EvidenceItem, LifecycleStatus, TruthReport, Verification,
};
use truthlens_common::scoring::blend_scores;
use truthlens_common::{Error, Result};

use crate::db::reports::{self, AnalysisUpdate};
use crate::db::verifications;
use crate::AppState;

/// Caller-facing resolve status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveStatus {
    /// Cached report served as-is
    Instant,
    /// An audit is already in flight for this key
    Scanning,
    /// A new audit was just triggered by this call
    Pending,
}

/// Result of a resolve call.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub found: bool,
    pub report: TruthReport,
    pub status: ResolveStatus,
    pub message: String,
}

/// Resolve a restaurant to its truth report.
///
/// Never blocks on the forensic analysis: a miss or a stale record triggers
/// the audit as a detached background task and returns immediately with a
/// provisional status. Store read failures are treated as a miss (fail
/// open) but logged loudly so outages stay diagnosable.
pub async fn resolve(state: &AppState, name: &str, location: &str) -> Result<SearchOutcome> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput(
            "Restaurant name is required".to_string(),
        ));
    }
    let location = if location.trim().is_empty() {
        "unknown"
    } else {
        location.trim()
    };

    let key = restaurant_key(name, location);

    let existing = match reports::fetch_by_key(&state.db, &key).await {
        Ok(existing) => existing,
        Err(e) => {
            // Fail open: a read failure must not surface a hard error to
            // the caller, but it is not a normal miss either.
            error!(restaurant_key = %key, error = %e, "Report lookup failed; treating as miss");
            None
        }
    };

    if let Some(report) = existing {
        match report.lifecycle_status {
            // Terminal; never recomputed or re-scanned.
            LifecycleStatus::Debunked => {
                return Ok(SearchOutcome {
                    found: true,
                    report,
                    status: ResolveStatus::Instant,
                    message: "Report is debunked".to_string(),
                });
            }
            LifecycleStatus::Pending | LifecycleStatus::Scanning => {
                debug!(restaurant_key = %key, "Scan already in progress");
                return Ok(SearchOutcome {
                    found: false,
                    report,
                    status: ResolveStatus::Scanning,
                    message: "Forensic scan in progress".to_string(),
                });
            }
            LifecycleStatus::Ready => {
                let staleness = Duration::hours(state.params.staleness_hours);
                if report.is_fresh(staleness, Utc::now()) {
                    debug!(restaurant_key = %key, "Cache hit");
                    return Ok(SearchOutcome {
                        found: true,
                        report,
                        status: ResolveStatus::Instant,
                        message: "Truth report ready".to_string(),
                    });
                }

                // Stale AI-only report: re-trigger, but keep serving the
                // old fields until the new analysis lands. The conditional
                // update makes the re-trigger at-most-once.
                let won = reports::begin_rescan(&state.db, &key).await.unwrap_or_else(|e| {
                    error!(restaurant_key = %key, error = %e, "Failed to begin rescan");
                    false
                });
                if won {
                    info!(restaurant_key = %key, "Analysis stale, re-triggering audit");
                    trigger_audit(state.clone(), key.clone(), name.to_string(), location.to_string());
                }
                return Ok(SearchOutcome {
                    found: false,
                    report,
                    status: if won {
                        ResolveStatus::Pending
                    } else {
                        ResolveStatus::Scanning
                    },
                    message: "Refreshing stale analysis".to_string(),
                });
            }
        }
    }

    // Miss: create the scanning record. Only the caller whose insert landed
    // triggers the audit; a racing resolve observes rows_affected == 0 and
    // reports the existing scan.
    let report = TruthReport::new_scanning(name, location);
    let created = reports::insert_new_scanning(&state.db, &report).await?;

    if created {
        info!(restaurant_key = %key, name = %name, "New restaurant, triggering audit");
        trigger_audit(state.clone(), key.clone(), name.to_string(), location.to_string());
        Ok(SearchOutcome {
            found: false,
            report,
            status: ResolveStatus::Pending,
            message: "Forensic scan started".to_string(),
        })
    } else {
        // Lost the insert race; the winner's record is authoritative.
        let report = reports::fetch_by_key(&state.db, &key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Report vanished for key {}", key)))?;
        Ok(SearchOutcome {
            found: false,
            report,
            status: ResolveStatus::Scanning,
            message: "Forensic scan in progress".to_string(),
        })
    }
}

/// Fire-and-forget audit trigger. Errors are logged, never propagated to
/// the resolve caller.
fn trigger_audit(state: AppState, key: String, name: String, location: String) {
    state.event_bus.emit_lossy(ScoreEvent::ScanStarted {
        restaurant_key: key.clone(),
        timestamp: Utc::now(),
    });

    tokio::spawn(async move {
        if let Err(e) = run_audit(&state, &key, &name, &location).await {
            error!(restaurant_key = %key, error = %e, "Background audit failed");
        }
    });
}

/// Run the full audit pipeline for one restaurant key.
///
/// Fetches the Web2 snapshot, runs the forensic analyzer (which cannot
/// fail), recomputes the blend against current verifications, persists the
/// result, and emits `AnalysisCompleted`.
pub async fn run_audit(state: &AppState, key: &str, name: &str, location: &str) -> Result<()> {
    info!(restaurant_key = %key, "Starting audit");

    let snapshot = state.reviews.fetch(name, location).await?;
    let analysis = state.analyzer.analyze(name, &snapshot).await;

    let verifier_scores = verifications::scores_for(&state.db, key).await?;
    let blend = blend_scores(
        analysis.truth_score,
        &verifier_scores,
        verifier_scores.len() as u32,
        &state.params.scoring,
    );

    let update = AnalysisUpdate {
        web2_score: snapshot.rating,
        web2_review_count: snapshot.total_reviews,
        ai_score: analysis.truth_score,
        ai_bot_probability: analysis.bot_probability,
        ai_confidence: analysis.confidence,
        analysis_summary: analysis.analysis_summary.clone(),
        key_findings: analysis.key_findings.clone(),
        evidence_items: vec![
            EvidenceItem {
                kind: "web2_analysis".to_string(),
                title: "Web2 review analysis".to_string(),
                description: format!("Analyzed {} reviews", snapshot.total_reviews),
            },
            EvidenceItem {
                kind: "bot_detection".to_string(),
                title: "Bot detection".to_string(),
                description: format!(
                    "{:.0}% probability of fake or bot reviews",
                    analysis.bot_probability
                ),
            },
            EvidenceItem {
                kind: "ai_forensic".to_string(),
                title: "AI forensic report".to_string(),
                description: analysis.analysis_summary.clone(),
            },
        ],
    };

    reports::apply_analysis(&state.db, key, &update, &blend).await?;

    let report = reports::fetch_by_key(&state.db, key)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Report vanished for key {}", key)))?;

    info!(
        restaurant_key = %key,
        truth_score = analysis.truth_score,
        "Audit complete"
    );

    state.event_bus.emit_lossy(ScoreEvent::AnalysisCompleted {
        restaurant_key: key.to_string(),
        report,
        timestamp: Utc::now(),
    });

    Ok(())
}

/// Append a verifier submission and recompute the blend.
///
/// The blend reads the full current score list after the insert, so it is
/// consistent regardless of submission interleaving. A debunked record
/// accepts the verification but keeps its terminal status.
pub async fn submit_verification(
    state: &AppState,
    key: &str,
    verifier_id: &str,
    score: f64,
    evidence_ref: &str,
) -> Result<TruthReport> {
    if verifier_id.trim().is_empty() {
        return Err(Error::InvalidInput("Verifier id is required".to_string()));
    }
    if !(0.0..=5.0).contains(&score) {
        return Err(Error::InvalidInput(format!(
            "Score must be between 0 and 5, got {}",
            score
        )));
    }

    let report = reports::fetch_by_key(&state.db, key)
        .await?
        .ok_or_else(|| Error::NotFound(format!("No report for key {}", key)))?;

    let verification = Verification {
        id: Uuid::new_v4(),
        restaurant_key: key.to_string(),
        verifier_id: verifier_id.trim().to_string(),
        score,
        evidence_ref: evidence_ref.to_string(),
        created_at: Utc::now(),
    };
    verifications::insert(&state.db, &verification).await?;

    let verifier_scores = verifications::scores_for(&state.db, key).await?;
    let blend = blend_scores(
        report.ai_score.unwrap_or(report.final_score),
        &verifier_scores,
        verifier_scores.len() as u32,
        &state.params.scoring,
    );

    reports::apply_blend(&state.db, key, &blend, verifier_scores.len() as u32).await?;

    let updated = reports::fetch_by_key(&state.db, key)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Report vanished for key {}", key)))?;

    info!(
        restaurant_key = %key,
        verification_count = updated.verification_count,
        confidence = updated.confidence,
        "Verification recorded"
    );

    state.event_bus.emit_lossy(ScoreEvent::VerificationRecorded {
        restaurant_key: key.to_string(),
        report: updated.clone(),
        timestamp: Utc::now(),
    });

    Ok(updated)
}

/// One-way debunk transition (reveal workflow).
pub async fn mark_debunked(state: &AppState, key: &str) -> Result<TruthReport> {
    let transitioned = reports::mark_debunked(&state.db, key).await?;

    let report = reports::fetch_by_key(&state.db, key)
        .await?
        .ok_or_else(|| Error::NotFound(format!("No report for key {}", key)))?;

    if transitioned {
        info!(restaurant_key = %key, "Report debunked");
        state.event_bus.emit_lossy(ScoreEvent::ReportDebunked {
            restaurant_key: key.to_string(),
            timestamp: Utc::now(),
        });
    }

    Ok(report)
}

/// Poll-based watch fallback for when push delivery is unavailable.
///
/// Polls the store at a fixed interval, feeding each observation through
/// the forward-transition reducer so a poll arriving after the push path
/// already applied the same transition is a no-op. Resolves once the
/// report reaches `ready` or `debunked`, or returns the latest observation
/// when cancelled. Cancel the token once the caller is subscribed
/// elsewhere or torn down.
pub async fn watch_report(
    pool: &SqlitePool,
    key: &str,
    interval: std::time::Duration,
    cancel: CancellationToken,
) -> Result<Option<TruthReport>> {
    let mut current: Option<TruthReport> = None;

    loop {
        if let Some(observed) = reports::fetch_by_key(pool, key).await? {
            let apply = match &current {
                Some(existing) => should_replace(existing, &observed),
                None => true,
            };
            if apply {
                let settled = matches!(
                    observed.lifecycle_status,
                    LifecycleStatus::Ready | LifecycleStatus::Debunked
                );
                current = Some(observed);
                if settled {
                    return Ok(current);
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(restaurant_key = %key, "Watch cancelled");
                return Ok(current);
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
