// libs/webhook-cell/src/services/meeting_events.rs
use chrono::Utc;
use tracing::{info, warn};

use appointment_cell::{minutes_rounded_up, Appointment, AttendanceResolver, DeferredJob, SettlementOutcome};

use crate::error::WebhookError;
use crate::models::{observation_from_report, HandlerOutcome, WebhookEvent};
use crate::services::processor::EventProcessor;

impl EventProcessor {
    /// OPEN to ONGOING with the provider's meeting instance and start time.
    pub(crate) async fn handle_meeting_started(
        &self,
        event: &WebhookEvent,
        appointment: &Appointment,
    ) -> Result<HandlerOutcome, WebhookError> {
        let object = event.meeting_object()?;
        let started_at = object.start_time.or(event.event_ts).unwrap_or_else(Utc::now);
        let meeting_uuid = object.instance_uuid().map(str::to_string);

        self.appointments
            .modify(appointment.id(), |appt| appt.mark_started(meeting_uuid.clone(), started_at))
            .await?;

        info!("Appointment {} is ongoing since {}", appointment.id(), started_at);
        Ok(HandlerOutcome::Applied)
    }

    /// Finalizes attendance from the provider's participant report and
    /// settles held funds.
    ///
    /// Everything from the re-read to the write happens under the
    /// appointment lock, so a duplicate delivery sees the settled escrow and
    /// never reaches the ledger.
    pub(crate) async fn handle_meeting_ended(
        &self,
        event: &WebhookEvent,
        appointment: &Appointment,
    ) -> Result<HandlerOutcome, WebhookError> {
        let object = event.meeting_object()?;
        let ended_at = object.end_time.or(event.event_ts).unwrap_or_else(Utc::now);

        let _guard = self.appointments.lock(appointment.id()).await;
        let mut current = self.appointments.get(appointment.id()).await?;

        if current.status().is_terminal() {
            return self.settle_after_redelivery(&mut current).await;
        }

        let duration_minutes = object
            .elapsed_seconds(current.actual_start(), event.event_ts)
            .map(minutes_rounded_up)
            .unwrap_or(0);

        let meeting_ref = object
            .instance_uuid()
            .or(current.meeting_uuid())
            .or(object.id.as_deref())
            .unwrap_or_default()
            .to_string();

        let resolution = match self.provider.list_past_participants(&meeting_ref).await {
            Ok(Some(report)) => {
                let observed: Vec<_> = report.iter().map(observation_from_report).collect();
                AttendanceResolver::resolve(&current, &observed, duration_minutes)
            }
            Ok(None) => {
                warn!("No participant report yet for meeting {}, attendance left unknown", meeting_ref);
                AttendanceResolver::unresolved(&current, duration_minutes)
            }
            Err(e) => {
                warn!(
                    "Participant report for meeting {} unavailable, attendance left unknown: {}",
                    meeting_ref, e
                );
                AttendanceResolver::unresolved(&current, duration_minutes)
            }
        };

        current.finalize(&resolution, duration_minutes, ended_at)?;
        let settlement = self.settlement.settle(&mut current).await;
        let saved = self.appointments.save(&current).await?;

        info!(
            "Appointment {} finished as {} ({:?}, {}m), settlement: {:?}",
            saved.id(),
            saved.status(),
            resolution.classification,
            duration_minutes,
            settlement
        );

        self.scheduler.schedule(
            DeferredJob::SessionFollowUp {
                appointment_id: saved.id(),
                status: saved.status(),
            },
            self.follow_up_delay,
        );

        Ok(HandlerOutcome::Applied)
    }

    /// A repeated `meeting.ended` only gets another settlement attempt when
    /// an earlier one left the escrow held.
    async fn settle_after_redelivery(&self, current: &mut Appointment) -> Result<HandlerOutcome, WebhookError> {
        match self.settlement.settle(current).await {
            SettlementOutcome::Settled { batch_id } => {
                self.appointments.save(current).await?;
                info!("Settled appointment {} on redelivery (batch {})", current.id(), batch_id);
                Ok(HandlerOutcome::Applied)
            }
            _ => Ok(HandlerOutcome::Ignored(format!(
                "appointment already {}",
                current.status()
            ))),
        }
    }
}
