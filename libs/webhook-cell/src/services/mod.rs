// libs/webhook-cell/src/services/mod.rs
pub mod enrichment_events;
pub mod ingestor;
pub mod meeting_events;
pub mod participant_events;
pub mod processor;
pub mod retry;
pub mod store;

pub use ingestor::WebhookIngestor;
pub use processor::EventProcessor;
pub use retry::RetrySweeper;
pub use store::{InMemoryWebhookEventStore, SupabaseWebhookEventStore, WebhookEventStore};
