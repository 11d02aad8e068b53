//! truthlens-server library interface
//!
//! Exposes the application state, router construction, and the service
//! modules for integration testing.

pub mod api;
pub mod db;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

use truthlens_common::events::EventBus;
use truthlens_common::scoring::ScoringParams;

use crate::services::forensic::ForensicAnalyzer;
use crate::services::web2::ReviewSource;

/// Resolution-flow tunables.
#[derive(Debug, Clone, Copy)]
pub struct ResolverParams {
    /// Scoring parameters for the hybrid blend
    pub scoring: ScoringParams,
    /// Hours before an AI-only analysis goes stale
    pub staleness_hours: i64,
}

impl Default for ResolverParams {
    fn default() -> Self {
        Self {
            scoring: ScoringParams::default(),
            staleness_hours: 24,
        }
    }
}

/// Application state shared across handlers.
///
/// The store pool, the analyzer, and the review source are injected here by
/// the process entry point; nothing in the crate holds a module-level
/// client singleton.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting and in-process subscriptions
    pub event_bus: EventBus,
    /// Forensic analyzer (Gemini-backed or fallback-only)
    pub analyzer: Arc<dyn ForensicAnalyzer>,
    /// Web2 review aggregator seam
    pub reviews: Arc<dyn ReviewSource>,
    /// Resolution-flow tunables
    pub params: ResolverParams,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        analyzer: Arc<dyn ForensicAnalyzer>,
        reviews: Arc<dyn ReviewSource>,
        params: ResolverParams,
    ) -> Self {
        Self {
            db,
            event_bus,
            analyzer,
            reviews,
            params,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> axum::Router {
    use axum::routing::get;
    use tower_http::cors::CorsLayer;

    axum::Router::new()
        .merge(api::scan_routes())
        .merge(api::audit_routes())
        .merge(api::verify_routes())
        .merge(api::report_routes())
        .route("/events", get(api::event_stream))
        .merge(api::health_routes())
        // Enable CORS for local browser access
        .layer(CorsLayer::permissive())
        .with_state(state)
}
