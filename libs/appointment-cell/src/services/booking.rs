// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use meeting_channel_cell::{ChannelRegistry, MeetingRequest, ProvisionOutcome};
use shared_models::auth::User;

use crate::models::{
    Appointment, AppointmentError, BookAppointmentRequest, NewAppointment, PaymentStatus,
    RescheduleAppointmentRequest,
};
use crate::services::collaborators::{DeferredJob, JobScheduler, SubscriptionLookup, UserDirectory};
use crate::services::conflict::ensure_no_conflict;
use crate::services::store::AppointmentStore;

const MAX_DURATION_MINUTES: i64 = 8 * 60;

/// Who asked for the booking decides which checks apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingInitiator {
    Patient,
    Specialist,
    Admin,
}

impl BookingInitiator {
    fn resolve(user: &User, request: &BookAppointmentRequest) -> Result<Self, AppointmentError> {
        if user.is_specialist() && request.specialist_id.to_string() == user.id {
            Ok(BookingInitiator::Specialist)
        } else if request.patient_id.to_string() == user.id {
            Ok(BookingInitiator::Patient)
        } else if user.is_admin() {
            Ok(BookingInitiator::Admin)
        } else {
            Err(AppointmentError::Unauthorized)
        }
    }
}

pub struct AppointmentBookingService {
    store: AppointmentStore,
    channels: Arc<ChannelRegistry>,
    directory: Arc<dyn UserDirectory>,
    subscriptions: Arc<dyn SubscriptionLookup>,
    scheduler: Arc<dyn JobScheduler>,
    reminder_lead_minutes: i64,
}

impl AppointmentBookingService {
    pub fn new(
        store: AppointmentStore,
        channels: Arc<ChannelRegistry>,
        directory: Arc<dyn UserDirectory>,
        subscriptions: Arc<dyn SubscriptionLookup>,
        scheduler: Arc<dyn JobScheduler>,
        reminder_lead_minutes: i64,
    ) -> Self {
        Self {
            store,
            channels,
            directory,
            subscriptions,
            scheduler,
            reminder_lead_minutes,
        }
    }

    pub fn store(&self) -> &AppointmentStore {
        &self.store
    }

    fn validate_slot(start: chrono::DateTime<Utc>, duration_minutes: i64) -> Result<(), AppointmentError> {
        if duration_minutes <= 0 || duration_minutes > MAX_DURATION_MINUTES {
            return Err(AppointmentError::ValidationError(format!(
                "duration must be between 1 and {} minutes",
                MAX_DURATION_MINUTES
            )));
        }
        if start <= Utc::now() {
            return Err(AppointmentError::ValidationError(
                "appointment must start in the future".to_string(),
            ));
        }
        Ok(())
    }

    fn meeting_request(appointment: &Appointment, topic: Option<String>) -> MeetingRequest {
        MeetingRequest {
            reference: appointment.id(),
            topic: topic.unwrap_or_else(|| "Virtual consultation".to_string()),
            start_time: appointment.scheduled_start(),
            duration_minutes: appointment.allotted_call_minutes(),
            timezone: appointment.timezone().to_string(),
            host_email: appointment.specialist_email().map(str::to_string),
            attendee_emails: appointment.patient_email().map(str::to_string).into_iter().collect(),
        }
    }

    /// Books an appointment and provisions its meeting.
    ///
    /// Specialist-initiated bookings must not overlap the specialist's open
    /// or ongoing appointments. Provisioning problems never fail the booking.
    #[instrument(skip(self, user, request), fields(user_id = %user.id))]
    pub async fn book(&self, user: &User, request: BookAppointmentRequest) -> Result<Appointment, AppointmentError> {
        let initiator = BookingInitiator::resolve(user, &request)?;
        Self::validate_slot(request.start_time, request.duration_minutes)?;
        debug!("Booking {:?}-initiated {} appointment", initiator, request.channel);

        let patient = self
            .directory
            .find_by_id(request.patient_id)
            .await?
            .ok_or(AppointmentError::PatientNotFound)?;
        let specialist = self
            .directory
            .find_by_id(request.specialist_id)
            .await?
            .ok_or(AppointmentError::SpecialistNotFound)?;

        let allotted_call_minutes = match self.subscriptions.get_active_subscription(request.patient_id).await {
            Ok(Some(subscription)) => subscription
                .call_duration_minutes
                .filter(|m| *m > 0)
                .unwrap_or(request.duration_minutes),
            Ok(None) => request.duration_minutes,
            Err(e) => {
                warn!("Subscription lookup failed for {}: {}", request.patient_id, e);
                request.duration_minutes
            }
        };

        // Serializes concurrent bookings against the same calendar.
        let _calendar_guard = self.store.lock(request.specialist_id).await;

        if initiator == BookingInitiator::Specialist {
            let existing = self.store.list_active_for_specialist(request.specialist_id).await?;
            ensure_no_conflict(
                &existing,
                request.specialist_id,
                request.start_time,
                request.duration_minutes,
                None,
            )?;
        }

        let mut appointment = Appointment::new(NewAppointment {
            patient_id: request.patient_id,
            specialist_id: request.specialist_id,
            patient_email: patient.email,
            specialist_email: specialist.email,
            scheduled_start: request.start_time,
            duration_minutes: request.duration_minutes,
            allotted_call_minutes,
            channel: request.channel,
            timezone: request.timezone.clone(),
            payment_status: request.payment_status,
        });

        if request.escrow_hold && request.payment_status == PaymentStatus::Succeeded {
            appointment.hold_funds()?;
        }

        let meeting_request = Self::meeting_request(&appointment, request.topic.clone());
        match self.channels.provision(request.channel, &meeting_request).await {
            ProvisionOutcome::Provisioned(details) => appointment.attach_meeting(&details)?,
            ProvisionOutcome::Ready { join_url } => appointment.attach_join_url(join_url),
            ProvisionOutcome::Degraded { reason } => {
                warn!(
                    "Appointment {} booked without a {} meeting: {}",
                    appointment.id(),
                    request.channel,
                    reason
                );
                appointment.note_provisioning_failure(reason);
            }
        }

        let stored = self.store.insert(&appointment).await?;
        self.schedule_reminder(&stored);

        info!("Booked appointment {} on {}", stored.id(), stored.channel());
        Ok(stored)
    }

    fn schedule_reminder(&self, appointment: &Appointment) {
        let remind_at = appointment.scheduled_start() - Duration::minutes(self.reminder_lead_minutes);
        match (remind_at - Utc::now()).to_std() {
            Ok(delay) if !delay.is_zero() => self.scheduler.schedule(
                DeferredJob::AppointmentReminder {
                    appointment_id: appointment.id(),
                    scheduled_start: appointment.scheduled_start(),
                },
                delay,
            ),
            _ => debug!("Appointment {} starts too soon for a reminder", appointment.id()),
        }
    }

    fn authorize(user: &User, appointment: &Appointment) -> Result<(), AppointmentError> {
        if user.is_admin() || appointment.is_party(&user.id) {
            Ok(())
        } else {
            Err(AppointmentError::Unauthorized)
        }
    }

    pub async fn get(&self, user: &User, id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.store.get(id).await?;
        Self::authorize(user, &appointment)?;
        Ok(appointment)
    }

    /// Cancels locally first; the provider is told afterwards on a best
    /// effort basis.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn cancel(&self, user: &User, id: Uuid, reason: Option<String>) -> Result<Appointment, AppointmentError> {
        Self::authorize(user, &self.store.get(id).await?)?;

        let (cancelled, ()) = self.store.modify(id, |appt| appt.cancel(reason.clone())).await?;

        if let Some(meeting_id) = cancelled.meeting_id() {
            if let Err(e) = self.channels.cancel(cancelled.channel(), meeting_id).await {
                warn!(
                    "Provider cancel failed for appointment {} (meeting {}), local state kept: {}",
                    id, meeting_id, e
                );
            }
        }

        info!("Cancelled appointment {}", id);
        Ok(cancelled)
    }

    /// Moves an open appointment. The overlap guard runs with the appointment
    /// itself excluded.
    #[instrument(skip(self, user, request), fields(user_id = %user.id))]
    pub async fn reschedule(
        &self,
        user: &User,
        id: Uuid,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.store.get(id).await?;
        Self::authorize(user, &current)?;

        let duration = request.new_duration_minutes.unwrap_or(current.duration_minutes());
        Self::validate_slot(request.new_start_time, duration)?;

        let _calendar_guard = self.store.lock(current.specialist_id()).await;
        let existing = self.store.list_active_for_specialist(current.specialist_id()).await?;
        ensure_no_conflict(
            &existing,
            current.specialist_id(),
            request.new_start_time,
            duration,
            Some(id),
        )?;

        let (moved, ()) = self
            .store
            .modify(id, |appt| appt.reschedule(request.new_start_time, request.new_duration_minutes))
            .await?;

        if let Some(meeting_id) = moved.meeting_id() {
            let meeting_request = Self::meeting_request(&moved, None);
            if let Err(e) = self
                .channels
                .reschedule(moved.channel(), meeting_id, &meeting_request)
                .await
            {
                warn!(
                    "Provider reschedule failed for appointment {} (meeting {}), local state kept: {}",
                    id, meeting_id, e
                );
            }
        }
        self.schedule_reminder(&moved);

        info!("Rescheduled appointment {} to {}", id, moved.scheduled_start());
        Ok(moved)
    }
}
