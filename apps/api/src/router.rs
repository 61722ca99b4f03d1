use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::json;

use appointment_cell::appointment_routes;
use shared_config::AppConfig;
use webhook_cell::webhook_routes;

use crate::wiring::Services;

pub fn create_router(config: Arc<AppConfig>, services: &Services) -> Router {
    Router::new()
        .route("/", get(|| async { "Virtual care API is running!" }))
        .route("/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .nest("/appointments", appointment_routes(config.clone(), services.booking.clone()))
        .nest("/webhooks", webhook_routes(config, services.ingestor.clone()))
}
