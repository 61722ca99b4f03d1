// libs/meeting-channel-cell/src/services/provider.rs
use async_trait::async_trait;

use crate::models::{ChannelError, MeetingChannel, MeetingRecordings, MeetingSummary, PastParticipant};

/// Read side of the video provider, used after a meeting has taken place.
///
/// Every read treats a missing resource as `Ok(None)`; reports and
/// recordings routinely become available minutes after the webhook fires.
#[async_trait]
pub trait MeetingProviderApi: Send + Sync {
    /// Authoritative participant report, following every result page.
    async fn list_past_participants(&self, meeting_ref: &str) -> Result<Option<Vec<PastParticipant>>, ChannelError>;

    async fn get_recordings(&self, meeting_ref: &str) -> Result<Option<MeetingRecordings>, ChannelError>;

    async fn download_transcript(
        &self,
        download_url: &str,
        download_token: Option<&str>,
    ) -> Result<Option<String>, ChannelError>;

    async fn get_meeting_summary(&self, meeting_ref: &str) -> Result<Option<MeetingSummary>, ChannelError>;
}

/// Stand-in used when provider credentials are missing. Every call fails,
/// which the webhook pipeline degrades around.
pub struct UnavailableProvider;

#[async_trait]
impl MeetingProviderApi for UnavailableProvider {
    async fn list_past_participants(&self, _meeting_ref: &str) -> Result<Option<Vec<PastParticipant>>, ChannelError> {
        Err(ChannelError::NotConfigured { channel: MeetingChannel::Zoom })
    }

    async fn get_recordings(&self, _meeting_ref: &str) -> Result<Option<MeetingRecordings>, ChannelError> {
        Err(ChannelError::NotConfigured { channel: MeetingChannel::Zoom })
    }

    async fn download_transcript(
        &self,
        _download_url: &str,
        _download_token: Option<&str>,
    ) -> Result<Option<String>, ChannelError> {
        Err(ChannelError::NotConfigured { channel: MeetingChannel::Zoom })
    }

    async fn get_meeting_summary(&self, _meeting_ref: &str) -> Result<Option<MeetingSummary>, ChannelError> {
        Err(ChannelError::NotConfigured { channel: MeetingChannel::Zoom })
    }
}
