// libs/appointment-cell/src/services/attendance.rs
use std::collections::BTreeMap;

use tracing::debug;

use crate::models::{
    minutes_rounded_up, Appointment, AppointmentStatus, AttendanceClassification, Participant,
    ParticipantObservation, ParticipantRole,
};

/// Final attendance verdict for a finished meeting.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceResolution {
    pub classification: AttendanceClassification,
    pub final_status: AppointmentStatus,
    pub patient_matched: bool,
    pub specialist_matched: bool,
    pub unmatched_participants: u32,
    /// One row per distinct participant, merged across rejoins.
    pub participants: Vec<Participant>,
}

/// Decision table for a finished meeting.
///
/// Any non-zero meeting duration counts as evidence the session happened, so
/// only zero participants together with zero duration yields `MISSED`.
pub fn decide(
    patient_matched: bool,
    specialist_matched: bool,
    unmatched: u32,
    meeting_duration_minutes: i64,
) -> (AttendanceClassification, AppointmentStatus) {
    use AttendanceClassification::*;

    let classification = match (patient_matched, specialist_matched, unmatched) {
        (true, true, _) => Both,
        (true, false, 0) => PatientOnly,
        (false, true, 0) => SpecialistOnly,
        (true, false, _) | (false, true, _) => Unknown,
        (false, false, 0) if meeting_duration_minutes <= 0 => None,
        (false, false, _) => Unknown,
    };

    let status = if classification == None {
        AppointmentStatus::Missed
    } else {
        AppointmentStatus::Completed
    };

    (classification, status)
}

pub struct AttendanceResolver;

impl AttendanceResolver {
    /// Resolves attendance from the provider's authoritative participant list.
    pub fn resolve(
        appointment: &Appointment,
        observed: &[ParticipantObservation],
        meeting_duration_minutes: i64,
    ) -> AttendanceResolution {
        let mut merged: BTreeMap<String, Participant> = BTreeMap::new();
        let mut anonymous = Vec::new();

        for row in observed {
            let role = appointment.role_for_email(row.email.as_deref());
            let participant = Participant {
                participant_id: row.participant_id.clone(),
                name: row.name.clone(),
                email: row.email.clone(),
                role,
                join_time: row.join_time,
                leave_time: row.leave_time,
                duration_minutes: row.duration_seconds.map(minutes_rounded_up),
            };

            match participant.identity_key() {
                Some(key) => match merged.get_mut(&key) {
                    Some(existing) => merge_rejoin(existing, participant),
                    None => {
                        merged.insert(key, participant);
                    }
                },
                None => anonymous.push(participant),
            }
        }

        let participants: Vec<Participant> = merged.into_values().chain(anonymous).collect();
        let patient_matched = participants.iter().any(|p| p.role == ParticipantRole::Patient);
        let specialist_matched = participants.iter().any(|p| p.role == ParticipantRole::Specialist);
        let unmatched = participants.iter().filter(|p| p.role == ParticipantRole::Unknown).count() as u32;

        let (classification, final_status) =
            decide(patient_matched, specialist_matched, unmatched, meeting_duration_minutes);

        debug!(
            "Resolved attendance for {}: patient={} specialist={} unmatched={} duration={}m -> {:?}/{}",
            appointment.id(),
            patient_matched,
            specialist_matched,
            unmatched,
            meeting_duration_minutes,
            classification,
            final_status
        );

        AttendanceResolution {
            classification,
            final_status,
            patient_matched,
            specialist_matched,
            unmatched_participants: unmatched,
            participants,
        }
    }

    /// Verdict when the participant report could not be fetched. Attendance
    /// stays `UNKNOWN`; the meeting still finalizes.
    pub fn unresolved(appointment: &Appointment, meeting_duration_minutes: i64) -> AttendanceResolution {
        let final_status = if meeting_duration_minutes > 0 || !appointment.participants().is_empty() {
            AppointmentStatus::Completed
        } else {
            AppointmentStatus::Missed
        };

        AttendanceResolution {
            classification: AttendanceClassification::Unknown,
            final_status,
            patient_matched: false,
            specialist_matched: false,
            unmatched_participants: appointment.attendance().unmatched_participants,
            participants: Vec::new(),
        }
    }
}

fn merge_rejoin(existing: &mut Participant, next: Participant) {
    existing.join_time = match (existing.join_time, next.join_time) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    existing.leave_time = match (existing.leave_time, next.leave_time) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };
    existing.duration_minutes = match (existing.duration_minutes, next.duration_minutes) {
        (Some(a), Some(b)) => Some(a + b),
        (a, b) => a.or(b),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use meeting_channel_cell::MeetingChannel;
    use uuid::Uuid;

    use crate::models::{NewAppointment, PaymentStatus};

    const PATIENT: &str = "pat@example.com";
    const SPECIALIST: &str = "dr.ada@clinic.test";

    fn appointment() -> Appointment {
        Appointment::new(NewAppointment {
            patient_id: Uuid::new_v4(),
            specialist_id: Uuid::new_v4(),
            patient_email: Some(PATIENT.to_string()),
            specialist_email: Some(SPECIALIST.to_string()),
            scheduled_start: Utc::now() - Duration::minutes(30),
            duration_minutes: 30,
            allotted_call_minutes: 30,
            channel: MeetingChannel::Zoom,
            timezone: "UTC".to_string(),
            payment_status: PaymentStatus::Succeeded,
        })
    }

    fn row(email: &str, minutes: i64) -> ParticipantObservation {
        ParticipantObservation {
            email: Some(email.to_string()),
            duration_seconds: Some(minutes * 60),
            ..Default::default()
        }
    }

    #[test]
    fn decision_table() {
        use AppointmentStatus::*;
        use AttendanceClassification::*;

        let cases = [
            ((true, true, 0, 0), (Both, Completed)),
            ((true, true, 3, 20), (Both, Completed)),
            ((true, false, 0, 12), (PatientOnly, Completed)),
            ((true, false, 1, 12), (Unknown, Completed)),
            ((false, true, 0, 0), (SpecialistOnly, Completed)),
            ((false, true, 2, 5), (Unknown, Completed)),
            ((false, false, 0, 7), (Unknown, Completed)),
            ((false, false, 0, 0), (None, Missed)),
            ((false, false, 2, 0), (Unknown, Completed)),
        ];

        for ((p, s, unmatched, duration), expected) in cases {
            assert_eq!(decide(p, s, unmatched, duration), expected, "case {:?}", (p, s, unmatched, duration));
        }
    }

    #[test]
    fn patient_only_scenario() {
        let resolution = AttendanceResolver::resolve(&appointment(), &[row(PATIENT, 12)], 12);
        assert_eq!(resolution.classification, AttendanceClassification::PatientOnly);
        assert_eq!(resolution.final_status, AppointmentStatus::Completed);
    }

    #[test]
    fn empty_report_with_zero_duration_is_missed() {
        let resolution = AttendanceResolver::resolve(&appointment(), &[], 0);
        assert_eq!(resolution.classification, AttendanceClassification::None);
        assert_eq!(resolution.final_status, AppointmentStatus::Missed);
    }

    #[test]
    fn email_matching_ignores_case_and_rejoins_merge() {
        let rows = [row("PAT@Example.com", 5), row(SPECIALIST, 20), row("pat@example.com", 7)];
        let resolution = AttendanceResolver::resolve(&appointment(), &rows, 20);

        assert_eq!(resolution.classification, AttendanceClassification::Both);
        assert_eq!(resolution.participants.len(), 2);
        let patient = resolution
            .participants
            .iter()
            .find(|p| p.role == ParticipantRole::Patient)
            .unwrap();
        assert_eq!(patient.duration_minutes, Some(12));
    }

    #[test]
    fn guests_are_counted_once_per_identity() {
        let rows = [row(PATIENT, 10), row("interpreter@agency.test", 4), row("interpreter@agency.test", 6)];
        let resolution = AttendanceResolver::resolve(&appointment(), &rows, 10);

        assert_eq!(resolution.unmatched_participants, 1);
        assert_eq!(resolution.classification, AttendanceClassification::Unknown);
        assert_eq!(resolution.final_status, AppointmentStatus::Completed);
    }

    #[test]
    fn unresolved_report_depends_on_duration() {
        let appt = appointment();
        assert_eq!(AttendanceResolver::unresolved(&appt, 15).final_status, AppointmentStatus::Completed);
        assert_eq!(AttendanceResolver::unresolved(&appt, 0).final_status, AppointmentStatus::Missed);
        assert_eq!(
            AttendanceResolver::unresolved(&appt, 0).classification,
            AttendanceClassification::Unknown
        );
    }
}
