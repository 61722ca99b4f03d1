// libs/meeting-channel-cell/src/services/mod.rs

pub mod google_meet;
pub mod provider;
pub mod provisioner;
pub mod rest;
pub mod teams;
pub mod zoom;

pub use google_meet::GoogleMeetClient;
pub use provider::{MeetingProviderApi, UnavailableProvider};
pub use provisioner::{
    ChannelRegistry, GoogleMeetProvisioner, MeetingProvisioner, OfflineProvisioner, TeamsProvisioner,
    WhatsAppProvisioner, ZoomProvisioner,
};
pub use teams::TeamsClient;
pub use zoom::ZoomClient;
