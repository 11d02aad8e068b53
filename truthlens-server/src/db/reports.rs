//! Truth report database operations
//!
//! Every write is keyed on `restaurant_key`; the surrogate row id is never
//! used for upserts, so repeated scans of the same restaurant are
//! idempotent.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use truthlens_common::model::{EvidenceItem, LifecycleStatus, TruthReport};
use truthlens_common::scoring::{HybridScore, VerificationStatus};
use truthlens_common::{Error, Result};

/// Fields written when a forensic analysis completes.
#[derive(Debug, Clone)]
pub struct AnalysisUpdate {
    pub web2_score: f64,
    pub web2_review_count: i64,
    pub ai_score: f64,
    pub ai_bot_probability: f64,
    pub ai_confidence: f64,
    pub analysis_summary: String,
    pub key_findings: Vec<String>,
    pub evidence_items: Vec<EvidenceItem>,
}

/// Insert the initial `scanning` record for a missing key.
///
/// Returns true when this call created the row. Under concurrent resolves
/// of the same key, exactly one caller observes true and becomes the one to
/// trigger the audit; the store's uniqueness constraint is the only lock.
pub async fn insert_new_scanning(pool: &SqlitePool, report: &TruthReport) -> Result<bool> {
    let key_findings = serde_json::to_string(&report.key_findings)
        .map_err(|e| Error::Internal(format!("Failed to serialize key findings: {}", e)))?;
    let evidence_items = serde_json::to_string(&report.evidence_items)
        .map_err(|e| Error::Internal(format!("Failed to serialize evidence items: {}", e)))?;

    let result = sqlx::query(
        r#"
        INSERT INTO truth_reports (
            id, restaurant_key, name, location,
            web2_score, web2_review_count,
            final_score, confidence, verification_status, verification_count,
            lifecycle_status, analysis_summary, key_findings, evidence_items,
            created_at, updated_at, last_analysis_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(restaurant_key) DO NOTHING
        "#,
    )
    .bind(report.id.to_string())
    .bind(&report.restaurant_key)
    .bind(&report.name)
    .bind(&report.location)
    .bind(report.web2_score)
    .bind(report.web2_review_count)
    .bind(report.final_score)
    .bind(report.confidence as i64)
    .bind(report.verification_status.as_str())
    .bind(report.verification_count as i64)
    .bind(report.lifecycle_status.as_str())
    .bind(&report.analysis_summary)
    .bind(&key_findings)
    .bind(&evidence_items)
    .bind(report.created_at.to_rfc3339())
    .bind(report.updated_at.to_rfc3339())
    .bind(report.last_analysis_at.map(|dt| dt.to_rfc3339()))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Point lookup by restaurant key.
pub async fn fetch_by_key(pool: &SqlitePool, restaurant_key: &str) -> Result<Option<TruthReport>> {
    let row = sqlx::query("SELECT * FROM truth_reports WHERE restaurant_key = ?")
        .bind(restaurant_key)
        .fetch_optional(pool)
        .await?;

    row.map(report_from_row).transpose()
}

/// All reports, newest first (map view).
pub async fn list_all(pool: &SqlitePool) -> Result<Vec<TruthReport>> {
    let rows = sqlx::query("SELECT * FROM truth_reports ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(report_from_row).collect()
}

/// Flip a stale AI-only `ready` record back to `scanning`.
///
/// Returns true when this call performed the transition; concurrent callers
/// race on the conditional update and only the winner re-triggers the
/// audit. The old score fields are left in place so the caller keeps
/// serving them while the new analysis runs.
pub async fn begin_rescan(pool: &SqlitePool, restaurant_key: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE truth_reports
        SET lifecycle_status = 'scanning', updated_at = ?
        WHERE restaurant_key = ?
          AND lifecycle_status = 'ready'
          AND verification_count = 0
        "#,
    )
    .bind(Utc::now().to_rfc3339())
    .bind(restaurant_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Apply a completed forensic analysis and its recomputed blend.
///
/// Moves the record to `ready` unless it was debunked in the meantime; the
/// debunked state is terminal and survives analysis completion.
pub async fn apply_analysis(
    pool: &SqlitePool,
    restaurant_key: &str,
    update: &AnalysisUpdate,
    blend: &HybridScore,
) -> Result<()> {
    let key_findings = serde_json::to_string(&update.key_findings)
        .map_err(|e| Error::Internal(format!("Failed to serialize key findings: {}", e)))?;
    let evidence_items = serde_json::to_string(&update.evidence_items)
        .map_err(|e| Error::Internal(format!("Failed to serialize evidence items: {}", e)))?;
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE truth_reports
        SET web2_score = ?,
            web2_review_count = ?,
            ai_score = ?,
            ai_bot_probability = ?,
            ai_confidence = ?,
            final_score = ?,
            confidence = ?,
            verification_status = ?,
            lifecycle_status = CASE lifecycle_status
                WHEN 'debunked' THEN 'debunked'
                ELSE 'ready'
            END,
            analysis_summary = ?,
            key_findings = ?,
            evidence_items = ?,
            updated_at = ?,
            last_analysis_at = ?
        WHERE restaurant_key = ?
        "#,
    )
    .bind(update.web2_score)
    .bind(update.web2_review_count)
    .bind(update.ai_score)
    .bind(update.ai_bot_probability)
    .bind(update.ai_confidence)
    .bind(blend.final_score)
    .bind(blend.confidence as i64)
    .bind(blend.status.as_str())
    .bind(&update.analysis_summary)
    .bind(&key_findings)
    .bind(&evidence_items)
    .bind(&now)
    .bind(&now)
    .bind(restaurant_key)
    .execute(pool)
    .await?;

    Ok(())
}

/// Persist a recomputed blend after a verifier submission.
///
/// Leaves the lifecycle status untouched: a `ready` record stays `ready`,
/// a `debunked` record stays `debunked`.
pub async fn apply_blend(
    pool: &SqlitePool,
    restaurant_key: &str,
    blend: &HybridScore,
    verification_count: u32,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE truth_reports
        SET final_score = ?,
            confidence = ?,
            verification_status = ?,
            verification_count = ?,
            updated_at = ?
        WHERE restaurant_key = ?
        "#,
    )
    .bind(blend.final_score)
    .bind(blend.confidence as i64)
    .bind(blend.status.as_str())
    .bind(verification_count as i64)
    .bind(Utc::now().to_rfc3339())
    .bind(restaurant_key)
    .execute(pool)
    .await?;

    Ok(())
}

/// One-way debunk transition. Returns false if already debunked.
pub async fn mark_debunked(pool: &SqlitePool, restaurant_key: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE truth_reports
        SET lifecycle_status = 'debunked', updated_at = ?
        WHERE restaurant_key = ? AND lifecycle_status != 'debunked'
        "#,
    )
    .bind(Utc::now().to_rfc3339())
    .bind(restaurant_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Decode a truth report row, coercing the store's dynamic shapes into the
/// typed domain model at this boundary.
fn report_from_row(row: sqlx::sqlite::SqliteRow) -> Result<TruthReport> {
    let id: String = row.get("id");
    let id = Uuid::parse_str(&id)
        .map_err(|e| Error::Internal(format!("Failed to parse report id: {}", e)))?;

    let verification_status: String = row.get("verification_status");
    let verification_status: VerificationStatus = verification_status.parse()?;

    let lifecycle_status: String = row.get("lifecycle_status");
    let lifecycle_status: LifecycleStatus = lifecycle_status.parse()?;

    let key_findings: String = row.get("key_findings");
    let key_findings: Vec<String> = serde_json::from_str(&key_findings)
        .map_err(|e| Error::Internal(format!("Failed to deserialize key findings: {}", e)))?;

    let evidence_items: String = row.get("evidence_items");
    let evidence_items: Vec<EvidenceItem> = serde_json::from_str(&evidence_items)
        .map_err(|e| Error::Internal(format!("Failed to deserialize evidence items: {}", e)))?;

    let created_at = parse_timestamp(row.get("created_at"), "created_at")?;
    let updated_at = parse_timestamp(row.get("updated_at"), "updated_at")?;
    let last_analysis_at: Option<String> = row.get("last_analysis_at");
    let last_analysis_at = last_analysis_at
        .map(|s| parse_timestamp(s, "last_analysis_at"))
        .transpose()?;

    let confidence: i64 = row.get("confidence");
    let verification_count: i64 = row.get("verification_count");

    Ok(TruthReport {
        id,
        restaurant_key: row.get("restaurant_key"),
        name: row.get("name"),
        location: row.get("location"),
        web2_score: row.get("web2_score"),
        web2_review_count: row.get("web2_review_count"),
        ai_score: row.get("ai_score"),
        ai_bot_probability: row.get("ai_bot_probability"),
        ai_confidence: row.get("ai_confidence"),
        final_score: row.get("final_score"),
        confidence: confidence.clamp(0, 100) as u32,
        verification_status,
        verification_count: verification_count.max(0) as u32,
        lifecycle_status,
        analysis_summary: row.get("analysis_summary"),
        key_findings,
        evidence_items,
        created_at,
        updated_at,
        last_analysis_at,
    })
}

fn parse_timestamp(value: String, column: &str) -> Result<DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}
