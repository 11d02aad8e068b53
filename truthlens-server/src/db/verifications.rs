//! Verification database operations
//!
//! Verifications are append-only; the blend always reads the full current
//! score list, so submission interleaving cannot drop an entry.

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use truthlens_common::model::Verification;
use truthlens_common::{Error, Result};

/// Append a verification row.
pub async fn insert(pool: &SqlitePool, verification: &Verification) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO verifications (id, restaurant_key, verifier_id, score, evidence_ref, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(verification.id.to_string())
    .bind(&verification.restaurant_key)
    .bind(&verification.verifier_id)
    .bind(verification.score)
    .bind(&verification.evidence_ref)
    .bind(verification.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// All verifier scores for a key, in store commit order.
pub async fn scores_for(pool: &SqlitePool, restaurant_key: &str) -> Result<Vec<f64>> {
    let rows = sqlx::query(
        "SELECT score FROM verifications WHERE restaurant_key = ? ORDER BY created_at, id",
    )
    .bind(restaurant_key)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|row| row.get("score")).collect())
}

/// All verifications for a key, newest first (UI listing).
pub async fn list_for(pool: &SqlitePool, restaurant_key: &str) -> Result<Vec<Verification>> {
    let rows = sqlx::query(
        "SELECT * FROM verifications WHERE restaurant_key = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(restaurant_key)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let id: String = row.get("id");
            let id = Uuid::parse_str(&id)
                .map_err(|e| Error::Internal(format!("Failed to parse verification id: {}", e)))?;
            let created_at: String = row.get("created_at");
            let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| Error::Internal(format!("Failed to parse created_at: {}", e)))?
                .with_timezone(&chrono::Utc);

            Ok(Verification {
                id,
                restaurant_key: row.get("restaurant_key"),
                verifier_id: row.get("verifier_id"),
                score: row.get("score"),
                evidence_ref: row.get("evidence_ref"),
                created_at,
            })
        })
        .collect()
}
