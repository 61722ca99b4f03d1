// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::booking::AppointmentBookingService;

pub fn appointment_routes(config: Arc<AppConfig>, service: Arc<AppointmentBookingService>) -> Router {
    // All appointment operations require authentication
    let protected_routes = Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/reschedule", patch(handlers::reschedule_appointment))
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new().merge(protected_routes).with_state(service)
}
