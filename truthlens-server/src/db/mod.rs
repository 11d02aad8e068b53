//! Database access for truthlens-server
//!
//! Thin keyed query/update wrapper over SQLite. All mutation is through
//! key-scoped upserts and updates; each restaurant record is an independent
//! unit of consistency, so no cross-key transactions exist.

pub mod reports;
pub mod verifications;

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Connect to an in-memory database (tests and ephemeral deployments).
///
/// Each SQLite connection gets its own `:memory:` database, so the pool is
/// pinned to a single connection that is never recycled.
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Initialize truthlens tables
async fn init_tables(pool: &SqlitePool) -> Result<()> {
    // The UNIQUE constraint on restaurant_key is the synchronization point
    // for concurrent creates: there is no in-process lock.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS truth_reports (
            id TEXT PRIMARY KEY,
            restaurant_key TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            location TEXT NOT NULL,
            web2_score REAL NOT NULL DEFAULT 0,
            web2_review_count INTEGER NOT NULL DEFAULT 0,
            ai_score REAL,
            ai_bot_probability REAL,
            ai_confidence REAL,
            final_score REAL NOT NULL DEFAULT 0,
            confidence INTEGER NOT NULL DEFAULT 0,
            verification_status TEXT NOT NULL DEFAULT 'AI_ANALYZING',
            verification_count INTEGER NOT NULL DEFAULT 0,
            lifecycle_status TEXT NOT NULL DEFAULT 'scanning',
            analysis_summary TEXT NOT NULL DEFAULT '',
            key_findings TEXT NOT NULL DEFAULT '[]',
            evidence_items TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            last_analysis_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS verifications (
            id TEXT PRIMARY KEY,
            restaurant_key TEXT NOT NULL,
            verifier_id TEXT NOT NULL,
            score REAL NOT NULL,
            evidence_ref TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_verifications_key ON verifications (restaurant_key)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (truth_reports, verifications)");

    Ok(())
}
