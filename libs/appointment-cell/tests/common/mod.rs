#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Timelike, Utc};
use uuid::Uuid;

use appointment_cell::{
    AppointmentBookingService, AppointmentStore, BookAppointmentRequest, InMemorySubscriptionLookup,
    InMemoryUserDirectory, PaymentStatus, RecordingJobScheduler, UserProfile,
};
use meeting_channel_cell::{ChannelRegistry, MeetingChannel};
use shared_config::AppConfig;
use shared_utils::test_utils::TestUser;

pub const PATIENT_EMAIL: &str = "pat@example.com";
pub const SPECIALIST_EMAIL: &str = "dr.ada@clinic.test";

pub struct Fixture {
    pub service: Arc<AppointmentBookingService>,
    pub store: AppointmentStore,
    pub directory: Arc<InMemoryUserDirectory>,
    pub subscriptions: Arc<InMemorySubscriptionLookup>,
    pub scheduler: Arc<RecordingJobScheduler>,
    pub patient: TestUser,
    pub specialist: TestUser,
}

impl Fixture {
    pub async fn new(config: &AppConfig) -> Self {
        let store = AppointmentStore::in_memory();
        let directory = Arc::new(InMemoryUserDirectory::new());
        let subscriptions = Arc::new(InMemorySubscriptionLookup::new());
        let scheduler = Arc::new(RecordingJobScheduler::new());

        let patient = TestUser::patient(PATIENT_EMAIL);
        let specialist = TestUser::doctor(SPECIALIST_EMAIL);
        for user in [&patient, &specialist] {
            directory
                .add(UserProfile {
                    id: Uuid::parse_str(&user.id).unwrap(),
                    email: Some(user.email.clone()),
                    full_name: None,
                    role: Some(user.role.clone()),
                })
                .await;
        }

        let service = Arc::new(AppointmentBookingService::new(
            store.clone(),
            Arc::new(ChannelRegistry::from_config(config)),
            directory.clone(),
            subscriptions.clone(),
            scheduler.clone(),
            config.reminder_lead_minutes,
        ));

        Self {
            service,
            store,
            directory,
            subscriptions,
            scheduler,
            patient,
            specialist,
        }
    }

    pub fn patient_id(&self) -> Uuid {
        Uuid::parse_str(&self.patient.id).unwrap()
    }

    pub fn specialist_id(&self) -> Uuid {
        Uuid::parse_str(&self.specialist.id).unwrap()
    }

    pub fn request(&self, channel: MeetingChannel, start: DateTime<Utc>, minutes: i64) -> BookAppointmentRequest {
        BookAppointmentRequest {
            patient_id: self.patient_id(),
            specialist_id: self.specialist_id(),
            start_time: start,
            duration_minutes: minutes,
            channel,
            timezone: "UTC".to_string(),
            topic: None,
            payment_status: PaymentStatus::Succeeded,
            escrow_hold: true,
        }
    }
}

/// Tomorrow at the given hour, on a minute boundary.
pub fn tomorrow_at(hour: u32, minute: u32) -> DateTime<Utc> {
    let base = Utc::now() + Duration::days(1);
    base.with_hour(hour)
        .and_then(|t| t.with_minute(minute))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap()
}
