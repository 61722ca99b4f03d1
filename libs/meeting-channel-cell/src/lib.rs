// libs/meeting-channel-cell/src/lib.rs
//! # Meeting Channel Cell
//!
//! Provisions the meeting behind an appointment for whichever channel the
//! appointment was booked on, and exposes the read operations the webhook
//! pipeline needs from the video provider.
//!
//! ## Architecture
//!
//! ```text
//! +-----------------------------------------------------------+
//! |                   Meeting Channel Cell                    |
//! +-----------------------------------------------------------+
//! |  models.rs          |  Channels, requests, provider DTOs  |
//! |  services/          |                                     |
//! |    provisioner.rs   |  MeetingProvisioner + registry      |
//! |    provider.rs      |  MeetingProviderApi (read side)     |
//! |    zoom.rs          |  Zoom REST client (S2S OAuth)       |
//! |    google_meet.rs   |  Google Calendar conference client  |
//! |    teams.rs         |  Microsoft Graph online meetings    |
//! |    rest.rs          |  shared request/response handling   |
//! +-----------------------------------------------------------+
//! ```
//!
//! Channels without a remote dependency (`phone`, `in_person`, `whatsapp`)
//! never call out and are always ready. Remote channels retry once with a
//! reduced feature set, and the registry turns any remaining failure into a
//! degraded outcome so booking can proceed without a link.
//!
//! ```rust,no_run
//! use meeting_channel_cell::{ChannelRegistry, MeetingChannel, MeetingRequest};
//! use shared_config::AppConfig;
//!
//! # async fn example(request: MeetingRequest) {
//! let registry = ChannelRegistry::from_config(&AppConfig::from_env());
//! let outcome = registry.provision(MeetingChannel::Zoom, &request).await;
//! println!("{:?}", outcome);
//! # }
//! ```

pub mod models;
pub mod services;

pub use models::{
    ChannelError, MeetingChannel, MeetingDetails, MeetingRecordings, MeetingRequest, MeetingSummary,
    PastParticipant, ProvisionOutcome, RecordingFile,
};

pub use services::{
    ChannelRegistry, GoogleMeetClient, MeetingProviderApi, MeetingProvisioner, TeamsClient,
    UnavailableProvider, ZoomClient,
};
