use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use appointment_cell::ParticipantObservation;
use meeting_channel_cell::models::flexible_id;
use meeting_channel_cell::{PastParticipant, RecordingFile};

use crate::error::WebhookError;

// ==============================================================================
// EVENT TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventType {
    MeetingStarted,
    MeetingEnded,
    ParticipantJoined,
    ParticipantLeft,
    RecordingCompleted,
    TranscriptCompleted,
    SummaryCompleted,
    UrlValidation,
    Unsupported(String),
}

impl WebhookEventType {
    pub fn as_str(&self) -> &str {
        match self {
            WebhookEventType::MeetingStarted => "meeting.started",
            WebhookEventType::MeetingEnded => "meeting.ended",
            WebhookEventType::ParticipantJoined => "participant.joined",
            WebhookEventType::ParticipantLeft => "participant.left",
            WebhookEventType::RecordingCompleted => "recording.completed",
            WebhookEventType::TranscriptCompleted => "recording.transcript_completed",
            WebhookEventType::SummaryCompleted => "meeting.summary_completed",
            WebhookEventType::UrlValidation => "endpoint.url_validation",
            WebhookEventType::Unsupported(name) => name,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, WebhookEventType::Unsupported(_))
    }
}

impl FromStr for WebhookEventType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "meeting.started" => WebhookEventType::MeetingStarted,
            "meeting.ended" => WebhookEventType::MeetingEnded,
            // Zoom prefixes participant events with "meeting."
            "participant.joined" | "meeting.participant_joined" => WebhookEventType::ParticipantJoined,
            "participant.left" | "meeting.participant_left" => WebhookEventType::ParticipantLeft,
            "recording.completed" => WebhookEventType::RecordingCompleted,
            "recording.transcript_completed" => WebhookEventType::TranscriptCompleted,
            "meeting.summary_completed" => WebhookEventType::SummaryCompleted,
            "endpoint.url_validation" => WebhookEventType::UrlValidation,
            other => WebhookEventType::Unsupported(other.to_string()),
        })
    }
}

impl fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==============================================================================
// PROVIDER PAYLOADS
// ==============================================================================

/// Body of every provider delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    /// Milliseconds since the epoch.
    #[serde(default)]
    pub event_ts: Option<i64>,
    #[serde(default)]
    pub payload: Value,
    /// Short-lived token for downloading recording files.
    #[serde(default)]
    pub download_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UrlValidationPayload {
    #[serde(rename = "plainToken")]
    pub plain_token: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ZoomParticipant {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub participant_user_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub join_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub leave_time: Option<DateTime<Utc>>,
    /// Seconds in the meeting, sent on leave.
    #[serde(default)]
    pub duration: Option<i64>,
}

impl ZoomParticipant {
    pub fn to_observation(&self) -> ParticipantObservation {
        ParticipantObservation {
            participant_id: self
                .participant_user_id
                .clone()
                .or_else(|| self.id.clone())
                .or_else(|| self.user_id.clone()),
            name: self.user_name.clone(),
            email: self.email.clone().filter(|e| !e.trim().is_empty()),
            join_time: self.join_time,
            leave_time: self.leave_time,
            duration_seconds: self.duration,
        }
    }
}

/// `payload.object` for meeting, participant and recording events.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ZoomMeetingObject {
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub meeting_uuid: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub participant: Option<ZoomParticipant>,
    #[serde(default)]
    pub share_url: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub total_size: Option<u64>,
    #[serde(default)]
    pub recording_files: Vec<RecordingFile>,
}

impl ZoomMeetingObject {
    pub fn instance_uuid(&self) -> Option<&str> {
        self.uuid.as_deref().or(self.meeting_uuid.as_deref())
    }

    /// Elapsed seconds between start and end, if both are known. The
    /// fallbacks stand in for timestamps missing from the payload.
    pub fn elapsed_seconds(
        &self,
        fallback_start: Option<DateTime<Utc>>,
        fallback_end: Option<DateTime<Utc>>,
    ) -> Option<i64> {
        let end = self.end_time.or(fallback_end)?;
        let start = self.start_time.or(fallback_start)?;
        Some((end - start).num_seconds().max(0))
    }
}

pub fn observation_from_report(row: &PastParticipant) -> ParticipantObservation {
    ParticipantObservation {
        participant_id: row.user_id.clone().or_else(|| row.id.clone()),
        name: row.name.clone(),
        email: row.user_email.clone().filter(|e| !e.trim().is_empty()),
        join_time: row.join_time,
        leave_time: row.leave_time,
        duration_seconds: Some(row.duration),
    }
}

// ==============================================================================
// DURABLE EVENT
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebhookEventStatus {
    Pending,
    Processed,
    Failed,
    Ignored,
}

impl fmt::Display for WebhookEventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WebhookEventStatus::Pending => "PENDING",
            WebhookEventStatus::Processed => "PROCESSED",
            WebhookEventStatus::Failed => "FAILED",
            WebhookEventStatus::Ignored => "IGNORED",
        };
        f.write_str(s)
    }
}

/// A provider delivery as stored before any processing.
///
/// The payload is never modified; only the processing fields change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookEvent {
    pub id: Uuid,
    pub event_type: String,
    pub event_ts: Option<DateTime<Utc>>,
    pub meeting_id: Option<String>,
    pub meeting_uuid: Option<String>,
    pub download_token: Option<String>,
    pub payload: Value,
    pub status: WebhookEventStatus,
    pub error_message: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
}

impl WebhookEvent {
    pub fn from_envelope(envelope: WebhookEnvelope) -> Self {
        let object = envelope
            .payload
            .get("object")
            .cloned()
            .and_then(|o| serde_json::from_value::<ZoomMeetingObject>(o).ok())
            .unwrap_or_default();

        Self {
            id: Uuid::new_v4(),
            event_type: envelope.event,
            event_ts: envelope
                .event_ts
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            meeting_id: object.id.clone(),
            meeting_uuid: object.instance_uuid().map(str::to_string),
            download_token: envelope.download_token,
            payload: envelope.payload,
            status: WebhookEventStatus::Pending,
            error_message: None,
            processed_at: None,
            retry_count: 0,
            created_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> WebhookEventType {
        match self.event_type.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }

    pub fn meeting_object(&self) -> Result<ZoomMeetingObject, WebhookError> {
        match self.payload.get("object") {
            Some(object) => Ok(serde_json::from_value(object.clone())?),
            None => Err(WebhookError::InvalidPayload(format!(
                "{} event has no payload.object",
                self.event_type
            ))),
        }
    }

    /// Meeting references to look the appointment up by, id first.
    pub fn meeting_refs(&self) -> Vec<&str> {
        self.meeting_id
            .as_deref()
            .into_iter()
            .chain(self.meeting_uuid.as_deref())
            .collect()
    }

    pub fn is_processable(&self, max_retries: u32) -> bool {
        match self.status {
            WebhookEventStatus::Pending => true,
            WebhookEventStatus::Failed => self.can_retry(max_retries),
            WebhookEventStatus::Processed | WebhookEventStatus::Ignored => false,
        }
    }

    pub fn can_retry(&self, max_retries: u32) -> bool {
        self.status == WebhookEventStatus::Failed && self.retry_count < max_retries
    }

    pub fn mark_processed(&mut self) {
        self.status = WebhookEventStatus::Processed;
        self.error_message = None;
        self.processed_at = Some(Utc::now());
    }

    pub fn mark_ignored(&mut self, reason: impl Into<String>) {
        self.status = WebhookEventStatus::Ignored;
        self.error_message = Some(reason.into());
        self.processed_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = WebhookEventStatus::Failed;
        self.error_message = Some(error.into());
        self.retry_count += 1;
        self.processed_at = Some(Utc::now());
    }
}

// ==============================================================================
// RESULTS
// ==============================================================================

/// What the provider is told. Downstream outcomes never change it.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestAck {
    Received { event_id: Uuid },
    Ignored { event_id: Uuid },
    UrlValidation { plain_token: String, encrypted_token: String },
}

impl IngestAck {
    pub fn to_json(&self) -> Value {
        match self {
            IngestAck::Received { .. } => serde_json::json!({ "status": "received" }),
            IngestAck::Ignored { .. } => serde_json::json!({ "status": "ignored" }),
            IngestAck::UrlValidation {
                plain_token,
                encrypted_token,
            } => serde_json::json!({
                "plainToken": plain_token,
                "encryptedToken": encrypted_token
            }),
        }
    }
}

/// Result of a handler run against the target appointment.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutcome {
    Applied,
    Ignored(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    Processed,
    Ignored(String),
    Failed(String),
    /// Already handled, out of retries, or claimed by another worker.
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepReport {
    pub attempted: usize,
    /// Stalled PENDING events among the attempts.
    pub recovered: usize,
    pub processed: usize,
    pub ignored: usize,
    pub failed: usize,
}
