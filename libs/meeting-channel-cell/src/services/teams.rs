// libs/meeting-channel-cell/src/services/teams.rs
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use shared_config::AppConfig;

use crate::models::{ChannelError, MeetingChannel, MeetingDetails, MeetingRequest};
use crate::services::rest::{parse, require, send};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OnlineMeeting {
    id: String,
    #[serde(default)]
    join_web_url: Option<String>,
}

/// Microsoft Graph client for organizer-owned online meetings.
pub struct TeamsClient {
    client: Client,
    base_url: String,
    access_token: String,
    organizer_id: String,
}

impl TeamsClient {
    pub fn new(config: &AppConfig) -> Result<Self, ChannelError> {
        if !config.is_teams_configured() {
            return Err(ChannelError::NotConfigured { channel: MeetingChannel::Teams });
        }

        Ok(Self {
            client: Client::new(),
            base_url: config.teams_graph_base_url.trim_end_matches('/').to_string(),
            access_token: config.teams_access_token.clone(),
            organizer_id: config.teams_organizer_id.clone(),
        })
    }

    fn meetings_url(&self) -> String {
        format!("{}/users/{}/onlineMeetings", self.base_url, self.organizer_id)
    }

    /// `lobby_bypass` lets the patient skip the lobby; dropped on retry.
    pub async fn create_meeting(&self, request: &MeetingRequest, lobby_bypass: bool) -> Result<MeetingDetails, ChannelError> {
        info!("Creating Teams meeting for appointment {}", request.reference);

        let mut body = json!({
            "subject": request.topic,
            "startDateTime": request.start_time.to_rfc3339(),
            "endDateTime": request.end_time().to_rfc3339(),
        });
        if lobby_bypass {
            body["lobbyBypassSettings"] = json!({"scope": "everyone", "isDialInBypassEnabled": true});
        }

        let text = require(
            send(&self.client, Method::POST, &self.meetings_url(), &self.access_token, Some(&body)).await?,
            "Teams organizer",
        )?;
        let meeting: OnlineMeeting = parse(&text, "online meeting")?;

        Ok(MeetingDetails {
            meeting_id: meeting.id,
            join_url: meeting.join_web_url.clone(),
            start_url: meeting.join_web_url,
            password: None,
        })
    }

    pub async fn update_meeting(&self, meeting_id: &str, request: &MeetingRequest) -> Result<(), ChannelError> {
        let body = json!({
            "startDateTime": request.start_time.to_rfc3339(),
            "endDateTime": request.end_time().to_rfc3339(),
        });
        let url = format!("{}/{}", self.meetings_url(), urlencoding::encode(meeting_id));
        require(
            send(&self.client, Method::PATCH, &url, &self.access_token, Some(&body)).await?,
            "Teams meeting",
        )?;
        Ok(())
    }

    pub async fn delete_meeting(&self, meeting_id: &str) -> Result<(), ChannelError> {
        let url = format!("{}/{}", self.meetings_url(), urlencoding::encode(meeting_id));
        if send(&self.client, Method::DELETE, &url, &self.access_token, None).await?.is_none() {
            warn!("Teams meeting {} was already deleted", meeting_id);
        }
        Ok(())
    }
}
