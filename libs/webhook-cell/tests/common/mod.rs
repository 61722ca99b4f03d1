#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use appointment_cell::{
    Appointment, AppointmentStore, InMemoryEscrowLedger, NewAppointment, PaymentStatus, RecordingJobScheduler,
    SettlementTrigger,
};
use meeting_channel_cell::{
    ChannelError, MeetingChannel, MeetingDetails, MeetingProviderApi, MeetingRecordings, MeetingSummary,
    PastParticipant,
};
use shared_config::AppConfig;
use shared_utils::test_utils::{TestConfig, WebhookTestUtils};
use webhook_cell::{
    EventProcessor, InMemoryWebhookEventStore, WebhookEvent, WebhookEventStatus, WebhookEventStore, WebhookIngestor,
};

pub const PATIENT_EMAIL: &str = "pat@example.com";
pub const SPECIALIST_EMAIL: &str = "dr.ada@clinic.test";
pub const MEETING_ID: &str = "85746065432";
pub const MEETING_UUID: &str = "4444AAAiAAAAAiAiAiiAii==";

/// Provider double with canned answers.
#[derive(Default)]
pub struct ScriptedProvider {
    /// `None` answers 404, `Some(list)` a report.
    pub participants: Option<Vec<PastParticipant>>,
    pub fail_participants: bool,
    /// Number of report calls that panic before answering normally.
    pub panics_remaining: AtomicUsize,
    pub transcript: Option<String>,
    pub fail_transcript: bool,
    pub summary: Option<MeetingSummary>,
    pub participant_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn with_participants(participants: Vec<PastParticipant>) -> Self {
        Self {
            participants: Some(participants),
            ..Self::default()
        }
    }

    fn unavailable() -> ChannelError {
        ChannelError::ProviderApi {
            status: Some(503),
            message: "provider unavailable".to_string(),
        }
    }
}

#[async_trait]
impl MeetingProviderApi for ScriptedProvider {
    async fn list_past_participants(&self, _meeting_ref: &str) -> Result<Option<Vec<PastParticipant>>, ChannelError> {
        self.participant_calls.fetch_add(1, Ordering::SeqCst);
        let panicking = self
            .panics_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if panicking {
            panic!("participant report decoder blew up");
        }
        if self.fail_participants {
            return Err(Self::unavailable());
        }
        Ok(self.participants.clone())
    }

    async fn get_recordings(&self, _meeting_ref: &str) -> Result<Option<MeetingRecordings>, ChannelError> {
        Ok(None)
    }

    async fn download_transcript(
        &self,
        _download_url: &str,
        _download_token: Option<&str>,
    ) -> Result<Option<String>, ChannelError> {
        if self.fail_transcript {
            return Err(Self::unavailable());
        }
        Ok(self.transcript.clone())
    }

    async fn get_meeting_summary(&self, _meeting_ref: &str) -> Result<Option<MeetingSummary>, ChannelError> {
        Ok(self.summary.clone())
    }
}

pub fn participant(email: Option<&str>, name: &str, duration_seconds: i64) -> PastParticipant {
    PastParticipant {
        id: Some(Uuid::new_v4().to_string()),
        user_id: None,
        name: Some(name.to_string()),
        user_email: email.map(str::to_string),
        join_time: None,
        leave_time: None,
        duration: duration_seconds,
    }
}

pub struct Fixture {
    pub config: Arc<AppConfig>,
    pub store: AppointmentStore,
    pub events: Arc<InMemoryWebhookEventStore>,
    pub ledger: Arc<InMemoryEscrowLedger>,
    pub scheduler: Arc<RecordingJobScheduler>,
    pub processor: Arc<EventProcessor>,
    pub ingestor: Arc<WebhookIngestor>,
}

impl Fixture {
    pub fn new(provider: Arc<dyn MeetingProviderApi>) -> Self {
        Self::build(TestConfig::default().to_app_config(), provider)
    }

    pub fn build(config: AppConfig, provider: Arc<dyn MeetingProviderApi>) -> Self {
        let store = AppointmentStore::in_memory();
        let events = Arc::new(InMemoryWebhookEventStore::new());
        let ledger = Arc::new(InMemoryEscrowLedger::new());
        let scheduler = Arc::new(RecordingJobScheduler::new());

        let processor = Arc::new(EventProcessor::new(
            events.clone(),
            store.clone(),
            provider,
            SettlementTrigger::new(ledger.clone(), config.settle_no_shows),
            scheduler.clone(),
            Duration::from_secs(config.follow_up_delay_seconds),
            config.webhook_max_retries,
        )
        .with_pending_grace(Duration::from_secs(config.webhook_pending_grace_seconds)));
        let ingestor = Arc::new(WebhookIngestor::from_config(processor.clone(), &config));

        Self {
            config: Arc::new(config),
            store,
            events,
            ledger,
            scheduler,
            processor,
            ingestor,
        }
    }

    /// A held-escrow zoom appointment that started 40 minutes ago.
    pub async fn seed_appointment(&self) -> Appointment {
        let mut appointment = Appointment::new(NewAppointment {
            patient_id: Uuid::new_v4(),
            specialist_id: Uuid::new_v4(),
            patient_email: Some(PATIENT_EMAIL.to_string()),
            specialist_email: Some(SPECIALIST_EMAIL.to_string()),
            scheduled_start: Utc::now() - chrono::Duration::minutes(40),
            duration_minutes: 30,
            allotted_call_minutes: 30,
            channel: MeetingChannel::Zoom,
            timezone: "UTC".to_string(),
            payment_status: PaymentStatus::Succeeded,
        });
        appointment.hold_funds().unwrap();
        appointment
            .attach_meeting(&MeetingDetails {
                meeting_id: MEETING_ID.to_string(),
                join_url: Some(format!("https://zoom.us/j/{}", MEETING_ID)),
                start_url: None,
                password: None,
            })
            .unwrap();
        self.store.insert(&appointment).await.unwrap()
    }

    /// Stores an event the way the ingestor does and returns its id.
    pub async fn store_event(&self, event: &str, object: Value) -> Uuid {
        let body = WebhookTestUtils::event_body(event, object);
        let envelope = serde_json::from_slice(&body).unwrap();
        let stored = WebhookEvent::from_envelope(envelope);
        self.events.insert(&stored).await.unwrap();
        stored.id
    }

    pub async fn deliver(&self, event: &str, object: Value) -> webhook_cell::IngestAck {
        let body = WebhookTestUtils::event_body(event, object);
        let (signature, timestamp) = WebhookTestUtils::sign(&self.config.zoom_webhook_secret_token, &body);
        self.ingestor
            .ingest(Some(&signature), Some(&timestamp), &body)
            .await
            .unwrap()
    }

    /// Waits for the detached processing task to settle the event.
    pub async fn wait_until_done(&self, event_id: Uuid) -> WebhookEvent {
        for _ in 0..200 {
            if let Some(event) = self.events.get(event_id).await.unwrap() {
                if event.status != WebhookEventStatus::Pending {
                    return event;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("webhook event {} was never processed", event_id);
    }
}

pub fn ended_object(start: DateTime<Utc>, end: DateTime<Utc>) -> Value {
    serde_json::json!({
        "id": MEETING_ID.parse::<u64>().unwrap(),
        "uuid": MEETING_UUID,
        "topic": "Virtual consultation",
        "start_time": start,
        "end_time": end
    })
}
