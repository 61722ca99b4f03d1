// libs/appointment-cell/src/services/conflict.rs
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError};

/// Half-open intervals `[start, end)` overlap when each starts before the
/// other ends. Covers start-inside, end-inside and full containment.
pub fn appointments_overlap(
    start1: DateTime<Utc>,
    end1: DateTime<Utc>,
    start2: DateTime<Utc>,
    end2: DateTime<Utc>,
) -> bool {
    start1 < end2 && start2 < end1
}

/// Rejects a slot that overlaps any active appointment of the specialist.
pub fn ensure_no_conflict(
    existing: &[Appointment],
    specialist_id: Uuid,
    start: DateTime<Utc>,
    duration_minutes: i64,
    exclude_appointment_id: Option<Uuid>,
) -> Result<(), AppointmentError> {
    let end = start + Duration::minutes(duration_minutes);
    debug!("Checking conflicts for specialist {} from {} to {}", specialist_id, start, end);

    let conflict = existing.iter().find(|appt| {
        appt.specialist_id() == specialist_id
            && appt.status().is_active()
            && Some(appt.id()) != exclude_appointment_id
            && appointments_overlap(start, end, appt.scheduled_start(), appt.scheduled_end())
    });

    match conflict {
        Some(appt) => {
            warn!(
                "Slot {} - {} overlaps appointment {} for specialist {}",
                start,
                end,
                appt.id(),
                specialist_id
            );
            Err(AppointmentError::ConflictDetected(appt.id()))
        }
        None => Ok(()),
    }
}
