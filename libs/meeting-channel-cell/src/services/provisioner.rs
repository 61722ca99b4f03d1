// libs/meeting-channel-cell/src/services/provisioner.rs
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use shared_config::AppConfig;

use crate::models::{ChannelError, MeetingChannel, MeetingDetails, MeetingRequest, ProvisionOutcome};
use crate::services::google_meet::GoogleMeetClient;
use crate::services::teams::TeamsClient;
use crate::services::zoom::ZoomClient;

/// Creates, moves and tears down the meeting behind one channel.
#[async_trait]
pub trait MeetingProvisioner: Send + Sync {
    fn channel(&self) -> MeetingChannel;

    async fn provision(&self, request: &MeetingRequest) -> Result<ProvisionOutcome, ChannelError>;

    async fn cancel(&self, meeting_id: &str) -> Result<(), ChannelError>;

    async fn reschedule(&self, meeting_id: &str, request: &MeetingRequest) -> Result<(), ChannelError>;
}

/// Runs `attempt(true)`, and on failure runs `attempt(false)` once with the
/// optional features turned off.
async fn with_reduced_features<F, Fut>(channel: MeetingChannel, attempt: F) -> Result<MeetingDetails, ChannelError>
where
    F: Fn(bool) -> Fut,
    Fut: Future<Output = Result<MeetingDetails, ChannelError>>,
{
    match attempt(true).await {
        Ok(details) => Ok(details),
        Err(e) => {
            warn!("{} provisioning failed ({}), retrying with reduced settings", channel, e);
            attempt(false).await
        }
    }
}

// ==============================================================================
// REMOTE CHANNELS
// ==============================================================================

pub struct ZoomProvisioner {
    client: ZoomClient,
}

impl ZoomProvisioner {
    pub fn new(client: ZoomClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MeetingProvisioner for ZoomProvisioner {
    fn channel(&self) -> MeetingChannel {
        MeetingChannel::Zoom
    }

    async fn provision(&self, request: &MeetingRequest) -> Result<ProvisionOutcome, ChannelError> {
        let details = with_reduced_features(MeetingChannel::Zoom, |full| {
            let alternative_host = if full { request.host_email.as_deref() } else { None };
            self.client.create_meeting(request, alternative_host)
        })
        .await?;
        Ok(ProvisionOutcome::Provisioned(details))
    }

    async fn cancel(&self, meeting_id: &str) -> Result<(), ChannelError> {
        self.client.delete_meeting(meeting_id).await
    }

    async fn reschedule(&self, meeting_id: &str, request: &MeetingRequest) -> Result<(), ChannelError> {
        self.client.update_meeting(meeting_id, request).await
    }
}

pub struct GoogleMeetProvisioner {
    client: GoogleMeetClient,
}

impl GoogleMeetProvisioner {
    pub fn new(client: GoogleMeetClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MeetingProvisioner for GoogleMeetProvisioner {
    fn channel(&self) -> MeetingChannel {
        MeetingChannel::GoogleMeet
    }

    async fn provision(&self, request: &MeetingRequest) -> Result<ProvisionOutcome, ChannelError> {
        let details = with_reduced_features(MeetingChannel::GoogleMeet, |invite| {
            self.client.create_meeting(request, invite)
        })
        .await?;
        Ok(ProvisionOutcome::Provisioned(details))
    }

    async fn cancel(&self, meeting_id: &str) -> Result<(), ChannelError> {
        self.client.delete_meeting(meeting_id).await
    }

    async fn reschedule(&self, meeting_id: &str, request: &MeetingRequest) -> Result<(), ChannelError> {
        self.client.update_meeting(meeting_id, request).await
    }
}

pub struct TeamsProvisioner {
    client: TeamsClient,
}

impl TeamsProvisioner {
    pub fn new(client: TeamsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MeetingProvisioner for TeamsProvisioner {
    fn channel(&self) -> MeetingChannel {
        MeetingChannel::Teams
    }

    async fn provision(&self, request: &MeetingRequest) -> Result<ProvisionOutcome, ChannelError> {
        let details = with_reduced_features(MeetingChannel::Teams, |bypass| {
            self.client.create_meeting(request, bypass)
        })
        .await?;
        Ok(ProvisionOutcome::Provisioned(details))
    }

    async fn cancel(&self, meeting_id: &str) -> Result<(), ChannelError> {
        self.client.delete_meeting(meeting_id).await
    }

    async fn reschedule(&self, meeting_id: &str, request: &MeetingRequest) -> Result<(), ChannelError> {
        self.client.update_meeting(meeting_id, request).await
    }
}

// ==============================================================================
// LOCAL CHANNELS
// ==============================================================================

/// Chat-based sessions over the practice's business number.
pub struct WhatsAppProvisioner {
    business_number: String,
}

impl WhatsAppProvisioner {
    pub fn new(business_number: impl Into<String>) -> Self {
        Self { business_number: business_number.into() }
    }
}

#[async_trait]
impl MeetingProvisioner for WhatsAppProvisioner {
    fn channel(&self) -> MeetingChannel {
        MeetingChannel::Whatsapp
    }

    async fn provision(&self, _request: &MeetingRequest) -> Result<ProvisionOutcome, ChannelError> {
        let digits: String = self.business_number.chars().filter(|c| c.is_ascii_digit()).collect();
        let join_url = (!digits.is_empty()).then(|| format!("https://wa.me/{}", digits));
        Ok(ProvisionOutcome::Ready { join_url })
    }

    async fn cancel(&self, _meeting_id: &str) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn reschedule(&self, _meeting_id: &str, _request: &MeetingRequest) -> Result<(), ChannelError> {
        Ok(())
    }
}

/// Phone and in-person sessions; nothing to create.
pub struct OfflineProvisioner {
    channel: MeetingChannel,
}

impl OfflineProvisioner {
    pub fn new(channel: MeetingChannel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl MeetingProvisioner for OfflineProvisioner {
    fn channel(&self) -> MeetingChannel {
        self.channel
    }

    async fn provision(&self, _request: &MeetingRequest) -> Result<ProvisionOutcome, ChannelError> {
        Ok(ProvisionOutcome::Ready { join_url: None })
    }

    async fn cancel(&self, _meeting_id: &str) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn reschedule(&self, _meeting_id: &str, _request: &MeetingRequest) -> Result<(), ChannelError> {
        Ok(())
    }
}

// ==============================================================================
// REGISTRY
// ==============================================================================

/// Channel to provisioner lookup used by booking.
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    provisioners: HashMap<MeetingChannel, Arc<dyn MeetingProvisioner>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every channel whose credentials are present. Local
    /// channels are always available.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self::new()
            .register(Arc::new(WhatsAppProvisioner::new(config.whatsapp_business_number.clone())))
            .register(Arc::new(OfflineProvisioner::new(MeetingChannel::Phone)))
            .register(Arc::new(OfflineProvisioner::new(MeetingChannel::InPerson)));

        match ZoomClient::new(config) {
            Ok(client) => registry = registry.register(Arc::new(ZoomProvisioner::new(client))),
            Err(e) => warn!("Zoom channel unavailable: {}", e),
        }
        match GoogleMeetClient::new(config) {
            Ok(client) => registry = registry.register(Arc::new(GoogleMeetProvisioner::new(client))),
            Err(e) => warn!("Google Meet channel unavailable: {}", e),
        }
        match TeamsClient::new(config) {
            Ok(client) => registry = registry.register(Arc::new(TeamsProvisioner::new(client))),
            Err(e) => warn!("Teams channel unavailable: {}", e),
        }

        info!("Meeting channels available: {:?}", registry.available_channels());
        registry
    }

    pub fn register(mut self, provisioner: Arc<dyn MeetingProvisioner>) -> Self {
        self.provisioners.insert(provisioner.channel(), provisioner);
        self
    }

    pub fn available_channels(&self) -> Vec<MeetingChannel> {
        MeetingChannel::ALL
            .into_iter()
            .filter(|channel| self.provisioners.contains_key(channel))
            .collect()
    }

    /// Never fails: provider errors and unregistered channels degrade.
    pub async fn provision(&self, channel: MeetingChannel, request: &MeetingRequest) -> ProvisionOutcome {
        let Some(provisioner) = self.provisioners.get(&channel) else {
            warn!("No provisioner registered for {}", channel);
            return ProvisionOutcome::Degraded {
                reason: format!("{} provisioning is not configured", channel),
            };
        };

        match provisioner.provision(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    "Provisioning {} meeting for appointment {} failed: {}",
                    channel, request.reference, e
                );
                ProvisionOutcome::Degraded { reason: e.to_string() }
            }
        }
    }

    pub async fn cancel(&self, channel: MeetingChannel, meeting_id: &str) -> Result<(), ChannelError> {
        match self.provisioners.get(&channel) {
            Some(provisioner) => provisioner.cancel(meeting_id).await,
            None => Err(ChannelError::NotConfigured { channel }),
        }
    }

    pub async fn reschedule(
        &self,
        channel: MeetingChannel,
        meeting_id: &str,
        request: &MeetingRequest,
    ) -> Result<(), ChannelError> {
        match self.provisioners.get(&channel) {
            Some(provisioner) => provisioner.reschedule(meeting_id, request).await,
            None => Err(ChannelError::NotConfigured { channel }),
        }
    }
}
