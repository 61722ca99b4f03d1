// libs/meeting-channel-cell/src/services/google_meet.rs
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use shared_config::AppConfig;

use crate::models::{ChannelError, MeetingChannel, MeetingDetails, MeetingRequest};
use crate::services::rest::{parse, require, send};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntryPoint {
    #[serde(default)]
    entry_point_type: Option<String>,
    #[serde(default)]
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConferenceData {
    #[serde(default)]
    entry_points: Vec<EntryPoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarEvent {
    id: String,
    #[serde(default)]
    hangout_link: Option<String>,
    #[serde(default)]
    conference_data: Option<ConferenceData>,
}

/// Google Calendar client that creates events carrying a Meet conference.
pub struct GoogleMeetClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl GoogleMeetClient {
    pub fn new(config: &AppConfig) -> Result<Self, ChannelError> {
        if !config.is_google_meet_configured() {
            return Err(ChannelError::NotConfigured { channel: MeetingChannel::GoogleMeet });
        }

        Ok(Self {
            client: Client::new(),
            base_url: config.google_calendar_base_url.trim_end_matches('/').to_string(),
            access_token: config.google_calendar_access_token.clone(),
        })
    }

    fn event_times(request: &MeetingRequest) -> (Value, Value) {
        (
            json!({"dateTime": request.start_time.to_rfc3339(), "timeZone": request.timezone}),
            json!({"dateTime": request.end_time().to_rfc3339(), "timeZone": request.timezone}),
        )
    }

    /// `invite_attendees` adds the participants to the calendar event; the
    /// reduced retry creates the conference without them.
    pub async fn create_meeting(
        &self,
        request: &MeetingRequest,
        invite_attendees: bool,
    ) -> Result<MeetingDetails, ChannelError> {
        info!("Creating Google Meet conference for appointment {}", request.reference);

        let (start, end) = Self::event_times(request);
        let mut body = json!({
            "summary": request.topic,
            "start": start,
            "end": end,
            "conferenceData": {
                "createRequest": {
                    "requestId": request.reference.to_string(),
                    "conferenceSolutionKey": {"type": "hangoutsMeet"}
                }
            }
        });
        if invite_attendees {
            let attendees: Vec<Value> = request
                .attendee_emails
                .iter()
                .chain(request.host_email.iter())
                .map(|email| json!({"email": email}))
                .collect();
            body["attendees"] = Value::Array(attendees);
        }

        let url = format!(
            "{}/calendars/primary/events?conferenceDataVersion=1&sendUpdates=none",
            self.base_url
        );
        let text = require(
            send(&self.client, Method::POST, &url, &self.access_token, Some(&body)).await?,
            "Google calendar",
        )?;
        let event: CalendarEvent = parse(&text, "calendar event")?;

        let video_uri = event
            .conference_data
            .and_then(|data| {
                data.entry_points
                    .into_iter()
                    .find(|ep| ep.entry_point_type.as_deref() == Some("video"))
                    .and_then(|ep| ep.uri)
            })
            .or(event.hangout_link);

        if video_uri.is_none() {
            warn!("Calendar event {} was created without a conference link", event.id);
        }

        Ok(MeetingDetails {
            meeting_id: event.id,
            join_url: video_uri.clone(),
            start_url: video_uri,
            password: None,
        })
    }

    pub async fn update_meeting(&self, event_id: &str, request: &MeetingRequest) -> Result<(), ChannelError> {
        let (start, end) = Self::event_times(request);
        let body = json!({"start": start, "end": end});
        let url = format!(
            "{}/calendars/primary/events/{}",
            self.base_url,
            urlencoding::encode(event_id)
        );
        require(
            send(&self.client, Method::PATCH, &url, &self.access_token, Some(&body)).await?,
            "Calendar event",
        )?;
        Ok(())
    }

    pub async fn delete_meeting(&self, event_id: &str) -> Result<(), ChannelError> {
        let url = format!(
            "{}/calendars/primary/events/{}",
            self.base_url,
            urlencoding::encode(event_id)
        );
        if send(&self.client, Method::DELETE, &url, &self.access_token, None).await?.is_none() {
            warn!("Calendar event {} was already deleted", event_id);
        }
        Ok(())
    }
}
