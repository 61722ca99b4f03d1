use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::ingestor::WebhookIngestor;

pub fn webhook_routes(config: Arc<AppConfig>, ingestor: Arc<WebhookIngestor>) -> Router {
    // Provider deliveries authenticate with their signature, not a JWT
    let public_routes = Router::new().route("/zoom", post(handlers::receive_zoom_webhook));

    let protected_routes = Router::new()
        .route("/events/failed", get(handlers::list_failed_events))
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(ingestor)
}
