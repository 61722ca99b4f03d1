// libs/webhook-cell/src/services/processor.rs
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use appointment_cell::{Appointment, AppointmentStore, JobScheduler, SettlementTrigger};
use meeting_channel_cell::MeetingProviderApi;

use crate::error::WebhookError;
use crate::models::{HandlerOutcome, ProcessOutcome, WebhookEvent, WebhookEventType};
use crate::services::store::WebhookEventStore;

/// PENDING events younger than this are assumed to have a run in progress.
const DEFAULT_PENDING_GRACE: Duration = Duration::from_secs(120);

/// Releases an event claim when a run ends, including by unwinding.
struct Claim<'a> {
    in_flight: &'a Mutex<HashSet<Uuid>>,
    event_id: Uuid,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.event_id);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Drives stored webhook events through the appointment aggregate.
///
/// Processing is idempotent per event id: only PENDING events and FAILED
/// events with attempts left are picked up, and an event is claimed for the
/// duration of a run so a retry sweep cannot overlap the first attempt. A
/// handler that panics fails the event like any other handler error.
pub struct EventProcessor {
    pub(crate) events: Arc<dyn WebhookEventStore>,
    pub(crate) appointments: AppointmentStore,
    pub(crate) provider: Arc<dyn MeetingProviderApi>,
    pub(crate) settlement: SettlementTrigger,
    pub(crate) scheduler: Arc<dyn JobScheduler>,
    pub(crate) follow_up_delay: Duration,
    max_retries: u32,
    pending_grace: Duration,
    in_flight: Mutex<HashSet<Uuid>>,
}

impl EventProcessor {
    pub fn new(
        events: Arc<dyn WebhookEventStore>,
        appointments: AppointmentStore,
        provider: Arc<dyn MeetingProviderApi>,
        settlement: SettlementTrigger,
        scheduler: Arc<dyn JobScheduler>,
        follow_up_delay: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            events,
            appointments,
            provider,
            settlement,
            scheduler,
            follow_up_delay,
            max_retries,
            pending_grace: DEFAULT_PENDING_GRACE,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// How long a PENDING event may wait before sweeps treat it as stalled.
    pub fn with_pending_grace(mut self, grace: Duration) -> Self {
        self.pending_grace = grace;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// PENDING events written at or before this instant count as stalled.
    pub fn stalled_cutoff(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.pending_grace)
            .ok()
            .and_then(|grace| Utc::now().checked_sub_signed(grace))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn events(&self) -> &Arc<dyn WebhookEventStore> {
        &self.events
    }

    #[instrument(skip(self))]
    pub async fn process(&self, event_id: Uuid) -> Result<ProcessOutcome, WebhookError> {
        let Some(_claim) = self.claim(event_id) else {
            debug!("Webhook event {} is already being processed", event_id);
            return Ok(ProcessOutcome::Skipped);
        };

        self.process_claimed(event_id).await
    }

    fn claim(&self, event_id: Uuid) -> Option<Claim<'_>> {
        let inserted = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(event_id);

        inserted.then(|| Claim {
            in_flight: &self.in_flight,
            event_id,
        })
    }

    async fn process_claimed(&self, event_id: Uuid) -> Result<ProcessOutcome, WebhookError> {
        let mut event = self
            .events
            .get(event_id)
            .await?
            .ok_or(WebhookError::EventNotFound(event_id))?;

        if !event.is_processable(self.max_retries) {
            debug!(
                "Skipping webhook event {} in status {} after {} attempts",
                event.id, event.status, event.retry_count
            );
            return Ok(ProcessOutcome::Skipped);
        }

        let result = AssertUnwindSafe(self.dispatch(&event))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(WebhookError::HandlerPanicked(panic_message(payload.as_ref()))));

        let outcome = match result {
            Ok(HandlerOutcome::Applied) => {
                event.mark_processed();
                ProcessOutcome::Processed
            }
            Ok(HandlerOutcome::Ignored(reason)) => {
                info!("Ignoring {} event {}: {}", event.event_type, event.id, reason);
                event.mark_ignored(reason.clone());
                ProcessOutcome::Ignored(reason)
            }
            Err(e) if e.is_stale_state() => {
                let reason = format!("appointment no longer accepts {}: {}", event.event_type, e);
                info!("Ignoring stale event {}: {}", event.id, reason);
                event.mark_ignored(reason.clone());
                ProcessOutcome::Ignored(reason)
            }
            Err(e) => {
                error!(
                    "Webhook event {} ({}) failed on attempt {}: {}",
                    event.id,
                    event.event_type,
                    event.retry_count + 1,
                    e
                );
                event.mark_failed(e.to_string());
                if !event.can_retry(self.max_retries) {
                    warn!(
                        "Webhook event {} exhausted {} attempts and needs operator attention",
                        event.id, self.max_retries
                    );
                }
                ProcessOutcome::Failed(e.to_string())
            }
        };

        self.events.update(&event).await?;
        Ok(outcome)
    }

    async fn dispatch(&self, event: &WebhookEvent) -> Result<HandlerOutcome, WebhookError> {
        let kind = event.kind();
        if !kind.is_supported() || kind == WebhookEventType::UrlValidation {
            return Ok(HandlerOutcome::Ignored(format!("unsupported event type {}", kind)));
        }

        let Some(appointment) = self.find_target(event).await? else {
            return Ok(HandlerOutcome::Ignored(format!(
                "no appointment for meeting {}",
                event.meeting_refs().join("/")
            )));
        };

        match kind {
            WebhookEventType::MeetingStarted => self.handle_meeting_started(event, &appointment).await,
            WebhookEventType::MeetingEnded => self.handle_meeting_ended(event, &appointment).await,
            WebhookEventType::ParticipantJoined => self.handle_participant_joined(event, &appointment).await,
            WebhookEventType::ParticipantLeft => self.handle_participant_left(event, &appointment).await,
            WebhookEventType::RecordingCompleted => self.handle_recording_completed(event, &appointment).await,
            WebhookEventType::TranscriptCompleted => self.handle_transcript_completed(event, &appointment).await,
            WebhookEventType::SummaryCompleted => self.handle_summary_completed(event, &appointment).await,
            WebhookEventType::UrlValidation | WebhookEventType::Unsupported(_) => {
                Ok(HandlerOutcome::Ignored(format!("unsupported event type {}", kind)))
            }
        }
    }

    async fn find_target(&self, event: &WebhookEvent) -> Result<Option<Appointment>, WebhookError> {
        for meeting_ref in event.meeting_refs() {
            if let Some(appointment) = self.appointments.find_by_meeting_ref(meeting_ref).await? {
                return Ok(Some(appointment));
            }
        }
        Ok(None)
    }
}
