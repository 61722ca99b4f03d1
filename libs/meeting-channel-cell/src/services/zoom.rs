// libs/meeting-channel-cell/src/services/zoom.rs
use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use shared_config::AppConfig;

use crate::models::{
    flexible_id, ChannelError, MeetingChannel, MeetingDetails, MeetingRecordings, MeetingRequest,
    MeetingSummary, PastParticipant,
};
use crate::services::provider::MeetingProviderApi;
use crate::services::rest::{parse, require, send};

const PARTICIPANT_PAGE_SIZE: u32 = 300;
const MAX_PARTICIPANT_PAGES: usize = 100;
/// Refresh tokens this long before the provider says they expire.
const TOKEN_REFRESH_MARGIN_SECONDS: i64 = 60;

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ZoomMeetingResponse {
    #[serde(default, deserialize_with = "flexible_id")]
    id: Option<String>,
    #[serde(default)]
    join_url: Option<String>,
    #[serde(default)]
    start_url: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ParticipantPage {
    #[serde(default)]
    participants: Vec<PastParticipant>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Zoom REST client using server-to-server OAuth.
pub struct ZoomClient {
    client: Client,
    api_base_url: String,
    oauth_url: String,
    account_id: String,
    client_id: String,
    client_secret: String,
    token: RwLock<Option<CachedToken>>,
}

impl ZoomClient {
    pub fn new(config: &AppConfig) -> Result<Self, ChannelError> {
        if !config.is_zoom_configured() {
            return Err(ChannelError::NotConfigured { channel: MeetingChannel::Zoom });
        }

        Ok(Self {
            client: Client::new(),
            api_base_url: config.zoom_api_base_url.trim_end_matches('/').to_string(),
            oauth_url: config.zoom_oauth_url.clone(),
            account_id: config.zoom_account_id.clone(),
            client_id: config.zoom_client_id.clone(),
            client_secret: config.zoom_client_secret.clone(),
            token: RwLock::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, ChannelError> {
        if let Some(cached) = self.token.read().await.as_ref() {
            if cached.expires_at > Utc::now() {
                return Ok(cached.value.clone());
            }
        }

        let mut guard = self.token.write().await;
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at > Utc::now() {
                return Ok(cached.value.clone());
            }
        }

        debug!("Requesting Zoom access token");
        let response = self
            .client
            .post(&self.oauth_url)
            .query(&[("grant_type", "account_credentials"), ("account_id", self.account_id.as_str())])
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ChannelError::Authentication {
                message: format!("token request failed with HTTP {}: {}", status, text),
            });
        }

        let token: OAuthTokenResponse = parse(&text, "OAuth token")?;
        let lifetime = (token.expires_in - TOKEN_REFRESH_MARGIN_SECONDS).max(0);
        *guard = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Utc::now() + Duration::seconds(lifetime),
        });

        Ok(token.access_token)
    }

    async fn execute(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Option<String>, ChannelError> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.api_base_url, path);

        match send(&self.client, method, &url, &token, body).await {
            Err(ChannelError::Authentication { message }) => {
                // Token may have been revoked early; fetch a fresh one next time.
                *self.token.write().await = None;
                Err(ChannelError::Authentication { message })
            }
            other => other,
        }
    }

    /// Creates a scheduled meeting. `alternative_host` grants the specialist
    /// co-host rights and is the optional feature dropped on retry.
    #[instrument(skip(self, request), fields(reference = %request.reference))]
    pub async fn create_meeting(
        &self,
        request: &MeetingRequest,
        alternative_host: Option<&str>,
    ) -> Result<MeetingDetails, ChannelError> {
        info!("Creating Zoom meeting for appointment {}", request.reference);

        let mut settings = json!({
            "join_before_host": true,
            "waiting_room": false,
            "auto_recording": "cloud",
            "meeting_authentication": false,
        });
        if let Some(host) = alternative_host {
            settings["alternative_hosts"] = json!(host);
            settings["alternative_hosts_email_notification"] = json!(false);
        }

        let body = json!({
            "topic": request.topic,
            "type": 2,
            "start_time": request.start_time.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            "duration": request.duration_minutes,
            "timezone": request.timezone,
            "settings": settings,
        });

        let text = require(self.execute(Method::POST, "/users/me/meetings", Some(&body)).await?, "Zoom user")?;
        let meeting: ZoomMeetingResponse = parse(&text, "meeting creation")?;
        let meeting_id = meeting.id.ok_or_else(|| ChannelError::InvalidResponse {
            message: "meeting creation response has no id".to_string(),
        })?;

        info!("Created Zoom meeting {} for appointment {}", meeting_id, request.reference);
        Ok(MeetingDetails {
            meeting_id,
            join_url: meeting.join_url,
            start_url: meeting.start_url,
            password: meeting.password,
        })
    }

    /// Moves the meeting. The topic chosen at creation is left as it is.
    #[instrument(skip(self, request))]
    pub async fn update_meeting(&self, meeting_id: &str, request: &MeetingRequest) -> Result<(), ChannelError> {
        let body = json!({
            "start_time": request.start_time.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            "duration": request.duration_minutes,
            "timezone": request.timezone,
        });
        let path = format!("/meetings/{}", encode_meeting_ref(meeting_id));
        require(self.execute(Method::PATCH, &path, Some(&body)).await?, "Zoom meeting")?;
        Ok(())
    }

    /// Deleting a meeting that is already gone counts as success.
    #[instrument(skip(self))]
    pub async fn delete_meeting(&self, meeting_id: &str) -> Result<(), ChannelError> {
        let path = format!("/meetings/{}?schedule_for_reminder=false", encode_meeting_ref(meeting_id));
        if self.execute(Method::DELETE, &path, None).await?.is_none() {
            warn!("Zoom meeting {} was already deleted", meeting_id);
        }
        Ok(())
    }
}

#[async_trait]
impl MeetingProviderApi for ZoomClient {
    #[instrument(skip(self))]
    async fn list_past_participants(&self, meeting_ref: &str) -> Result<Option<Vec<PastParticipant>>, ChannelError> {
        let mut participants = Vec::new();
        let mut next_page_token: Option<String> = None;
        let mut seen_tokens = HashSet::new();

        for page_number in 1..=MAX_PARTICIPANT_PAGES {
            let mut path = format!(
                "/past_meetings/{}/participants?page_size={}",
                encode_meeting_ref(meeting_ref),
                PARTICIPANT_PAGE_SIZE
            );
            if let Some(token) = next_page_token.as_deref() {
                path.push_str(&format!("&next_page_token={}", urlencoding::encode(token)));
            }

            let Some(text) = self.execute(Method::GET, &path, None).await? else {
                if page_number == 1 {
                    return Ok(None);
                }
                // A report that vanishes mid-walk would come back truncated.
                return Err(ChannelError::ProviderApi {
                    status: Some(404),
                    message: format!("participant report for {} disappeared at page {}", meeting_ref, page_number),
                });
            };

            let page: ParticipantPage = parse(&text, "participant report")?;
            participants.extend(page.participants);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => {
                    if !seen_tokens.insert(token.clone()) {
                        return Err(ChannelError::InvalidResponse {
                            message: format!("participant report repeated page token {}", token),
                        });
                    }
                    next_page_token = Some(token);
                }
                None => {
                    debug!("Fetched {} participant rows for meeting {}", participants.len(), meeting_ref);
                    return Ok(Some(participants));
                }
            }
        }

        Err(ChannelError::InvalidResponse {
            message: format!("participant report exceeded {} pages", MAX_PARTICIPANT_PAGES),
        })
    }

    async fn get_recordings(&self, meeting_ref: &str) -> Result<Option<MeetingRecordings>, ChannelError> {
        let path = format!("/meetings/{}/recordings", encode_meeting_ref(meeting_ref));
        self.execute(Method::GET, &path, None)
            .await?
            .map(|text| parse(&text, "recordings"))
            .transpose()
    }

    async fn download_transcript(
        &self,
        download_url: &str,
        download_token: Option<&str>,
    ) -> Result<Option<String>, ChannelError> {
        let token = match download_token {
            Some(token) => token.to_string(),
            None => self.access_token().await?,
        };
        send(&self.client, Method::GET, download_url, &token, None).await
    }

    async fn get_meeting_summary(&self, meeting_ref: &str) -> Result<Option<MeetingSummary>, ChannelError> {
        let path = format!("/meetings/{}/meeting_summary", encode_meeting_ref(meeting_ref));
        self.execute(Method::GET, &path, None)
            .await?
            .map(|text| parse(&text, "meeting summary"))
            .transpose()
    }
}

/// Meeting UUIDs that begin with `/` or contain `//` must be encoded twice.
pub fn encode_meeting_ref(meeting_ref: &str) -> String {
    let once = urlencoding::encode(meeting_ref).into_owned();
    if meeting_ref.starts_with('/') || meeting_ref.contains("//") {
        urlencoding::encode(&once).into_owned()
    } else {
        once
    }
}
