use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{error, info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;
mod wiring;

use shared_config::AppConfig;
use webhook_cell::RetrySweeper;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting virtual care API server");

    let config = Arc::new(AppConfig::from_env());
    let services = wiring::Services::from_config(&config);

    // Replay events a previous run left behind, then keep retrying in the background
    let sweeper = Arc::new(RetrySweeper::new(services.processor.clone()));
    match sweeper.sweep().await {
        Ok(report) => info!("Startup webhook replay: {} events attempted", report.attempted),
        Err(e) => error!("Startup webhook replay failed: {}", e),
    }
    let _sweeper_task = sweeper.spawn(Duration::from_secs(config.webhook_retry_interval_seconds.max(1)));

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(config.clone(), &services)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
