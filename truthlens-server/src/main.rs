//! truthlens-server - Restaurant truth-score resolution service
//!
//! Blends an AI forensic estimate of a restaurant's Web2 rating with
//! receipt-backed verifier submissions into a single truth score, serving
//! cached reports instantly and running fresh audits in the background.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use truthlens_common::config::{ensure_root_folder, ServiceConfig};
use truthlens_common::events::EventBus;
use truthlens_server::services::forensic::GeminiAnalyzer;
use truthlens_server::services::web2::MockReviewSource;
use truthlens_server::{build_router, AppState, ResolverParams};

#[derive(Parser, Debug)]
#[command(name = "truthlens-server", about = "Restaurant truth-score resolution service")]
struct Args {
    /// Data root folder (overrides TRUTHLENS_ROOT and the config file)
    #[arg(long)]
    root_folder: Option<String>,

    /// HTTP listen port (overrides TRUTHLENS_PORT)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber first for instant startup feedback
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting Truthlens server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let args = Args::parse();
    let config = ServiceConfig::resolve(args.root_folder.as_deref(), args.port)?;
    ensure_root_folder(&config.root_folder)?;

    let db_path = config.database_path();
    info!("Database path: {}", db_path.display());

    let pool = match truthlens_server::db::init_database_pool(&db_path).await {
        Ok(pool) => {
            info!("Connected to database");
            pool
        }
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            return Err(e);
        }
    };

    // Clients are constructed here and injected through AppState; their
    // lifecycle is owned by this entry point.
    let event_bus = EventBus::new(1000);
    let analyzer = Arc::new(GeminiAnalyzer::new(config.generation_api_key.clone()));
    let reviews = Arc::new(MockReviewSource);
    let params = ResolverParams {
        staleness_hours: config.staleness_hours,
        ..ResolverParams::default()
    };

    let state = AppState::new(pool, event_bus, analyzer, reviews, params);
    let app = build_router(state);

    let addr = format!("127.0.0.1:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("truthlens-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
