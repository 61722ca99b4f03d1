// libs/appointment-cell/src/services/mod.rs
pub mod attendance;
pub mod booking;
pub mod collaborators;
pub mod conflict;
pub mod directory;
pub mod jobs;
pub mod ledger;
pub mod lifecycle;
pub mod locks;
pub mod settlement;
pub mod store;

pub use attendance::{AttendanceResolution, AttendanceResolver};
pub use booking::AppointmentBookingService;
pub use collaborators::{
    DeferredJob, EscrowLedger, InMemoryEscrowLedger, InMemorySubscriptionLookup, InMemoryUserDirectory,
    JobScheduler, SettlementReceipt, Subscription, SubscriptionLookup, UserDirectory, UserProfile,
};
pub use directory::{SupabaseSubscriptionLookup, SupabaseUserDirectory};
pub use jobs::{JobRunner, LoggingJobRunner, RecordingJobScheduler, TokioJobScheduler};
pub use ledger::HttpEscrowLedger;
pub use settlement::{SettlementOutcome, SettlementTrigger};
pub use store::{AppointmentRepository, AppointmentStore, InMemoryAppointmentRepository, SupabaseAppointmentRepository};
