// libs/meeting-channel-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

// ==============================================================================
// CHANNELS
// ==============================================================================

/// Medium an appointment takes place over.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MeetingChannel {
    Zoom,
    Whatsapp,
    GoogleMeet,
    Teams,
    Phone,
    InPerson,
}

impl MeetingChannel {
    pub const ALL: [MeetingChannel; 6] = [
        MeetingChannel::Zoom,
        MeetingChannel::Whatsapp,
        MeetingChannel::GoogleMeet,
        MeetingChannel::Teams,
        MeetingChannel::Phone,
        MeetingChannel::InPerson,
    ];

    /// Video providers need a remote meeting to be created before the session.
    pub fn requires_remote_meeting(&self) -> bool {
        matches!(self, MeetingChannel::Zoom | MeetingChannel::GoogleMeet | MeetingChannel::Teams)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingChannel::Zoom => "zoom",
            MeetingChannel::Whatsapp => "whatsapp",
            MeetingChannel::GoogleMeet => "google_meet",
            MeetingChannel::Teams => "teams",
            MeetingChannel::Phone => "phone",
            MeetingChannel::InPerson => "in_person",
        }
    }
}

impl fmt::Display for MeetingChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeetingChannel {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        MeetingChannel::ALL
            .into_iter()
            .find(|channel| channel.as_str() == normalized)
            .ok_or_else(|| ChannelError::UnsupportedChannel(s.to_string()))
    }
}

// ==============================================================================
// PROVISIONING
// ==============================================================================

/// Everything a provider needs to create or move a meeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingRequest {
    pub reference: Uuid,
    pub topic: String,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub timezone: String,
    pub host_email: Option<String>,
    pub attendee_emails: Vec<String>,
}

impl MeetingRequest {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + chrono::Duration::minutes(self.duration_minutes)
    }
}

/// Normalized identifiers of a provisioned meeting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeetingDetails {
    pub meeting_id: String,
    pub join_url: Option<String>,
    pub start_url: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProvisionOutcome {
    /// A remote meeting exists.
    Provisioned(MeetingDetails),
    /// No remote meeting is needed; the channel is usable as-is.
    Ready { join_url: Option<String> },
    /// Provisioning failed; the appointment stays bookable without a link.
    Degraded { reason: String },
}

impl ProvisionOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, ProvisionOutcome::Degraded { .. })
    }

    pub fn meeting(&self) -> Option<&MeetingDetails> {
        match self {
            ProvisionOutcome::Provisioned(details) => Some(details),
            _ => None,
        }
    }
}

// ==============================================================================
// PROVIDER READ MODELS
// ==============================================================================

/// One row of a past meeting's participant report. Durations are seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PastParticipant {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub join_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub leave_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordingFile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub file_extension: Option<String>,
    #[serde(default)]
    pub recording_type: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub play_url: Option<String>,
    #[serde(default)]
    pub recording_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub recording_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub status: Option<String>,
}

impl RecordingFile {
    pub fn is_transcript(&self) -> bool {
        self.file_type.as_deref().map(|t| t.eq_ignore_ascii_case("TRANSCRIPT")).unwrap_or(false)
            || self.recording_type.as_deref() == Some("audio_transcript")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeetingRecordings {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub share_url: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub total_size: Option<u64>,
    #[serde(default)]
    pub recording_files: Vec<RecordingFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryDetail {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeetingSummary {
    #[serde(default)]
    pub summary_title: Option<String>,
    #[serde(default)]
    pub summary_overview: Option<String>,
    #[serde(default)]
    pub summary_details: Vec<SummaryDetail>,
    #[serde(default)]
    pub next_steps: Vec<String>,
}

/// Providers send meeting ids as JSON numbers or strings.
pub fn flexible_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("{channel} provisioning is not configured")]
    NotConfigured { channel: MeetingChannel },

    #[error("Provider authentication failed: {message}")]
    Authentication { message: String },

    #[error("Provider API error: {message}")]
    ProviderApi { status: Option<u16>, message: String },

    #[error("Invalid provider response: {message}")]
    InvalidResponse { message: String },

    #[error("Unsupported channel: {0}")]
    UnsupportedChannel(String),
}

impl From<reqwest::Error> for ChannelError {
    fn from(err: reqwest::Error) -> Self {
        ChannelError::ProviderApi {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_parsing_accepts_wire_names() {
        assert_eq!("zoom".parse::<MeetingChannel>().unwrap(), MeetingChannel::Zoom);
        assert_eq!("google-meet".parse::<MeetingChannel>().unwrap(), MeetingChannel::GoogleMeet);
        assert_eq!("In Person".parse::<MeetingChannel>().unwrap(), MeetingChannel::InPerson);
        assert!("skype".parse::<MeetingChannel>().is_err());
    }

    #[test]
    fn only_video_channels_need_remote_meetings() {
        let remote: Vec<_> = MeetingChannel::ALL
            .into_iter()
            .filter(|c| c.requires_remote_meeting())
            .collect();
        assert_eq!(remote, vec![MeetingChannel::Zoom, MeetingChannel::GoogleMeet, MeetingChannel::Teams]);
    }

    #[test]
    fn recordings_accept_numeric_meeting_ids() {
        let parsed: MeetingRecordings = serde_json::from_value(serde_json::json!({
            "id": 8123456789u64,
            "recording_files": [{"file_type": "TRANSCRIPT", "download_url": "https://x"}]
        }))
        .unwrap();
        assert_eq!(parsed.id.as_deref(), Some("8123456789"));
        assert!(parsed.recording_files[0].is_transcript());
    }
}
