//! # Webhook Cell
//!
//! Durable ingestion and processing of meeting provider webhooks.
//!
//! Deliveries are verified, written to the event log as `PENDING`, and then
//! processed off the request path against the appointment aggregate. Each
//! stored event ends `PROCESSED`, `IGNORED` (orphan, unsupported or stale) or
//! `FAILED` with a retry count that the [`RetrySweeper`] works down.

pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::WebhookError;
pub use models::*;
pub use router::webhook_routes;
pub use services::*;
