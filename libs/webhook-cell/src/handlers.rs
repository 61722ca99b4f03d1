use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_admin;

use crate::services::ingestor::WebhookIngestor;

fn header<'a>(headers: &'a HeaderMap, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .find_map(|name| headers.get(*name).and_then(|v| v.to_str().ok()))
}

/// Receive a Zoom delivery. Anything past signature and JSON checks is
/// answered with 200.
pub async fn receive_zoom_webhook(
    State(ingestor): State<Arc<WebhookIngestor>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let signature = header(&headers, &["x-zm-signature", "signature"]);
    let timestamp = header(&headers, &["x-zm-request-timestamp", "request-timestamp"]);

    let ack = ingestor.ingest(signature, timestamp, &body).await?;
    Ok(Json(ack.to_json()))
}

/// Events that failed processing, plus PENDING events past their grace
/// period, for operator review
#[axum::debug_handler]
pub async fn list_failed_events(
    State(ingestor): State<Arc<WebhookIngestor>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let processor = ingestor.processor();
    let failed = ingestor.events().list_failed().await?;
    let stalled = ingestor.events().list_stalled(processor.stalled_cutoff()).await?;
    let max_retries = processor.max_retries();
    let exhausted = failed.iter().filter(|e| !e.can_retry(max_retries)).count();

    Ok(Json(json!({
        "events": failed,
        "total": failed.len(),
        "exhausted": exhausted,
        "stalled": stalled,
        "max_retries": max_retries
    })))
}
