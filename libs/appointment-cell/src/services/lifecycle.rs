// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

/// Validate that a status transition is allowed
pub fn validate_status_transition(
    current_status: AppointmentStatus,
    new_status: AppointmentStatus,
) -> Result<(), AppointmentError> {
    if !get_valid_transitions(current_status).contains(&new_status) {
        warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
        return Err(AppointmentError::InvalidStatusTransition {
            from: current_status,
            to: new_status,
        });
    }

    debug!("Status transition validated: {} -> {}", current_status, new_status);
    Ok(())
}

/// Get all valid next statuses for a given current status
pub fn get_valid_transitions(current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
    match current_status {
        AppointmentStatus::Open => vec![
            AppointmentStatus::Open, // Reschedule
            AppointmentStatus::Ongoing,
            AppointmentStatus::Cancelled,
        ],
        AppointmentStatus::Ongoing => vec![
            AppointmentStatus::Completed,
            AppointmentStatus::Missed,
        ],
        // Terminal states - no transitions allowed
        AppointmentStatus::Completed => vec![],
        AppointmentStatus::Cancelled => vec![],
        AppointmentStatus::Missed => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AppointmentStatus::*;

    #[test]
    fn open_can_start_cancel_or_reschedule() {
        assert!(validate_status_transition(Open, Ongoing).is_ok());
        assert!(validate_status_transition(Open, Cancelled).is_ok());
        assert!(validate_status_transition(Open, Open).is_ok());
        assert!(validate_status_transition(Open, Completed).is_err());
    }

    #[test]
    fn ongoing_only_finishes() {
        assert!(validate_status_transition(Ongoing, Completed).is_ok());
        assert!(validate_status_transition(Ongoing, Missed).is_ok());
        assert!(validate_status_transition(Ongoing, Cancelled).is_err());
        assert!(validate_status_transition(Ongoing, Open).is_err());
    }

    #[test]
    fn terminal_states_are_final() {
        for terminal in [Completed, Cancelled, Missed] {
            for next in [Open, Ongoing, Completed, Cancelled, Missed] {
                assert!(validate_status_transition(terminal, next).is_err());
            }
        }
    }
}
