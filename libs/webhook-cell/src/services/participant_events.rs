// libs/webhook-cell/src/services/participant_events.rs
use tracing::{debug, info};

use appointment_cell::Appointment;

use crate::error::WebhookError;
use crate::models::{HandlerOutcome, WebhookEvent, ZoomParticipant};
use crate::services::processor::EventProcessor;

impl EventProcessor {
    fn participant_of(event: &WebhookEvent) -> Result<(ZoomParticipant, Option<String>), WebhookError> {
        let object = event.meeting_object()?;
        let meeting_uuid = object.instance_uuid().map(str::to_string);
        let participant = object.participant.ok_or_else(|| {
            WebhookError::InvalidPayload(format!("{} event has no participant", event.event_type))
        })?;
        Ok((participant, meeting_uuid))
    }

    pub(crate) async fn handle_participant_joined(
        &self,
        event: &WebhookEvent,
        appointment: &Appointment,
    ) -> Result<HandlerOutcome, WebhookError> {
        let (participant, meeting_uuid) = Self::participant_of(event)?;
        let observed = participant.to_observation();

        let (updated, role) = self
            .appointments
            .modify(appointment.id(), |appt| {
                if let Some(uuid) = &meeting_uuid {
                    appt.set_meeting_uuid(uuid.clone());
                }
                appt.record_participant_joined(observed.clone())
            })
            .await?;

        info!(
            "{:?} joined appointment {} (attendance now {:?})",
            role,
            updated.id(),
            updated.attendance().classification
        );
        Ok(HandlerOutcome::Applied)
    }

    pub(crate) async fn handle_participant_left(
        &self,
        event: &WebhookEvent,
        appointment: &Appointment,
    ) -> Result<HandlerOutcome, WebhookError> {
        let (participant, _) = Self::participant_of(event)?;
        let mut observed = participant.to_observation();
        if observed.leave_time.is_none() {
            observed.leave_time = event.event_ts;
        }

        let (updated, role) = self
            .appointments
            .modify(appointment.id(), |appt| appt.record_participant_left(observed.clone()))
            .await?;

        debug!("{:?} left appointment {}", role, updated.id());
        Ok(HandlerOutcome::Applied)
    }
}
