// libs/webhook-cell/src/services/ingestor.rs
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use shared_config::AppConfig;
use shared_utils::signature::{encrypt_token, verify_request};

use crate::error::WebhookError;
use crate::models::{IngestAck, UrlValidationPayload, WebhookEnvelope, WebhookEvent, WebhookEventType};
use crate::services::processor::EventProcessor;
use crate::services::store::WebhookEventStore;

/// Entry point for provider deliveries.
///
/// Order of work: verify the signature, answer the URL validation
/// handshake, write the event as PENDING, then hand it to the processor on a
/// detached task. The acknowledgement never waits on processing.
pub struct WebhookIngestor {
    events: Arc<dyn WebhookEventStore>,
    processor: Arc<EventProcessor>,
    secret: String,
    tolerance_seconds: i64,
}

impl WebhookIngestor {
    pub fn new(processor: Arc<EventProcessor>, secret: impl Into<String>, tolerance_seconds: i64) -> Self {
        Self {
            events: processor.events().clone(),
            processor,
            secret: secret.into(),
            tolerance_seconds,
        }
    }

    pub fn from_config(processor: Arc<EventProcessor>, config: &AppConfig) -> Self {
        Self::new(
            processor,
            config.zoom_webhook_secret_token.clone(),
            config.webhook_timestamp_tolerance_seconds,
        )
    }

    pub fn events(&self) -> &Arc<dyn WebhookEventStore> {
        &self.events
    }

    pub fn processor(&self) -> &Arc<EventProcessor> {
        &self.processor
    }

    #[instrument(skip(self, signature, timestamp, body), fields(body_len = body.len()))]
    pub async fn ingest(
        &self,
        signature: Option<&str>,
        timestamp: Option<&str>,
        body: &[u8],
    ) -> Result<IngestAck, WebhookError> {
        if let Err(e) = verify_request(&self.secret, signature, timestamp, body, self.tolerance_seconds) {
            warn!("Rejected webhook delivery: {}", e);
            return Err(e.into());
        }

        let envelope: WebhookEnvelope = serde_json::from_slice(body)?;
        let kind: WebhookEventType = match envelope.event.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        };

        if kind == WebhookEventType::UrlValidation {
            let payload: UrlValidationPayload = serde_json::from_value(envelope.payload)?;
            let encrypted_token = encrypt_token(&self.secret, &payload.plain_token)?;
            debug!("Answered endpoint URL validation");
            return Ok(IngestAck::UrlValidation {
                plain_token: payload.plain_token,
                encrypted_token,
            });
        }

        let mut event = WebhookEvent::from_envelope(envelope);
        self.events.insert(&event).await?;

        if !kind.is_supported() {
            event.mark_ignored(format!("unsupported event type {}", kind));
            self.events.update(&event).await?;
            info!("Stored unsupported {} event {} as ignored", kind, event.id);
            return Ok(IngestAck::Ignored { event_id: event.id });
        }

        info!(
            "Stored {} event {} for meeting {:?}",
            kind, event.id, event.meeting_id
        );

        let processor = self.processor.clone();
        let event_id = event.id;
        tokio::spawn(async move {
            if let Err(e) = processor.process(event_id).await {
                error!("Processing webhook event {} failed: {}", event_id, e);
            }
        });

        Ok(IngestAck::Received { event_id })
    }
}
