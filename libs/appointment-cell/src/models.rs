// libs/appointment-cell/src/models.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use meeting_channel_cell::{MeetingChannel, MeetingDetails};

use crate::services::attendance::AttendanceResolution;
use crate::services::lifecycle::validate_status_transition;

// ==============================================================================
// STATUS ENUMS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Open,
    Ongoing,
    Completed,
    Cancelled,
    Missed,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::Missed
        )
    }

    /// Open and ongoing appointments occupy the specialist's calendar.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Open | AppointmentStatus::Ongoing)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Open => write!(f, "OPEN"),
            AppointmentStatus::Ongoing => write!(f, "ONGOING"),
            AppointmentStatus::Completed => write!(f, "COMPLETED"),
            AppointmentStatus::Cancelled => write!(f, "CANCELLED"),
            AppointmentStatus::Missed => write!(f, "MISSED"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceClassification {
    #[default]
    None,
    PatientOnly,
    SpecialistOnly,
    Both,
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Patient,
    Specialist,
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Succeeded,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EscrowStatus {
    #[default]
    None,
    Held,
    Settled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SettlementType {
    Completed,
    NoShow,
}

impl SettlementType {
    /// Only terminal meeting outcomes map to a settlement.
    pub fn for_status(status: AppointmentStatus) -> Option<Self> {
        match status {
            AppointmentStatus::Completed => Some(SettlementType::Completed),
            AppointmentStatus::Missed => Some(SettlementType::NoShow),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementType::Completed => "completed",
            SettlementType::NoShow => "no_show",
        }
    }
}

// ==============================================================================
// AGGREGATE PARTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AttendanceRecord {
    pub patient_joined: bool,
    pub specialist_joined: bool,
    pub patient_joined_at: Option<DateTime<Utc>>,
    pub patient_left_at: Option<DateTime<Utc>>,
    pub specialist_joined_at: Option<DateTime<Utc>>,
    pub specialist_left_at: Option<DateTime<Utc>>,
    pub unmatched_participants: u32,
    pub classification: AttendanceClassification,
}

impl AttendanceRecord {
    /// Classification while the meeting is live: only who has joined so far.
    pub fn live_classification(&self) -> AttendanceClassification {
        match (self.patient_joined, self.specialist_joined) {
            (true, true) => AttendanceClassification::Both,
            (true, false) => AttendanceClassification::PatientOnly,
            (false, true) => AttendanceClassification::SpecialistOnly,
            (false, false) if self.unmatched_participants > 0 => AttendanceClassification::Unknown,
            (false, false) => AttendanceClassification::None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    pub participant_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: ParticipantRole,
    pub join_time: Option<DateTime<Utc>>,
    pub leave_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
}

impl Participant {
    /// Identity used to update a row in place: lowercase email, then the
    /// provider's participant id, then the display name.
    pub fn identity_key(&self) -> Option<String> {
        self.email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .map(|e| e.trim().to_ascii_lowercase())
            .or_else(|| self.participant_id.clone().filter(|id| !id.is_empty()))
            .or_else(|| self.name.clone().filter(|n| !n.is_empty()))
    }
}

/// Participant data as reported by a webhook or the provider's report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticipantObservation {
    pub participant_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub join_time: Option<DateTime<Utc>>,
    pub leave_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EscrowRecord {
    pub status: EscrowStatus,
    pub settlement_batch_id: Option<String>,
    pub settlement_type: Option<SettlementType>,
    pub settled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordingInfo {
    pub share_url: Option<String>,
    pub password: Option<String>,
    pub total_size: Option<u64>,
    pub file_count: usize,
    pub play_url: Option<String>,
    pub download_url: Option<String>,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptInfo {
    pub download_url: Option<String>,
    /// `None` when the transcript exists but could not be fetched.
    pub content: Option<String>,
    pub available_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryInfo {
    pub title: Option<String>,
    pub overview: Option<String>,
    pub details: Vec<String>,
    pub next_steps: Vec<String>,
    pub available_at: DateTime<Utc>,
}

// ==============================================================================
// APPOINTMENT AGGREGATE
// ==============================================================================

/// Fields needed to open a new appointment.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub specialist_id: Uuid,
    pub patient_email: Option<String>,
    pub specialist_email: Option<String>,
    pub scheduled_start: DateTime<Utc>,
    pub duration_minutes: i64,
    pub allotted_call_minutes: i64,
    pub channel: MeetingChannel,
    pub timezone: String,
    pub payment_status: PaymentStatus,
}

/// The appointment and every rule about how it may change.
///
/// Fields are private; status, attendance and escrow change only through the
/// methods below, each of which checks the transition table first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    id: Uuid,
    patient_id: Uuid,
    specialist_id: Uuid,
    patient_email: Option<String>,
    specialist_email: Option<String>,
    scheduled_start: DateTime<Utc>,
    duration_minutes: i64,
    allotted_call_minutes: i64,
    channel: MeetingChannel,
    timezone: String,
    status: AppointmentStatus,
    payment_status: PaymentStatus,
    meeting_id: Option<String>,
    meeting_uuid: Option<String>,
    join_url: Option<String>,
    start_url: Option<String>,
    meeting_password: Option<String>,
    provisioning_note: Option<String>,
    actual_start: Option<DateTime<Utc>>,
    actual_end: Option<DateTime<Utc>>,
    call_duration_minutes: Option<i64>,
    attendance: AttendanceRecord,
    participants: Vec<Participant>,
    recording: Option<RecordingInfo>,
    transcript: Option<TranscriptInfo>,
    summary: Option<SummaryInfo>,
    escrow: EscrowRecord,
    cancellation_reason: Option<String>,
    cancelled_at: Option<DateTime<Utc>>,
    rescheduled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl Appointment {
    pub fn new(input: NewAppointment) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            patient_id: input.patient_id,
            specialist_id: input.specialist_id,
            patient_email: input.patient_email,
            specialist_email: input.specialist_email,
            scheduled_start: input.scheduled_start,
            duration_minutes: input.duration_minutes,
            allotted_call_minutes: input.allotted_call_minutes,
            channel: input.channel,
            timezone: input.timezone,
            status: AppointmentStatus::Open,
            payment_status: input.payment_status,
            meeting_id: None,
            meeting_uuid: None,
            join_url: None,
            start_url: None,
            meeting_password: None,
            provisioning_note: None,
            actual_start: None,
            actual_end: None,
            call_duration_minutes: None,
            attendance: AttendanceRecord::default(),
            participants: Vec::new(),
            recording: None,
            transcript: None,
            summary: None,
            escrow: EscrowRecord::default(),
            cancellation_reason: None,
            cancelled_at: None,
            rescheduled_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    // --- accessors -----------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn patient_id(&self) -> Uuid {
        self.patient_id
    }

    pub fn specialist_id(&self) -> Uuid {
        self.specialist_id
    }

    pub fn patient_email(&self) -> Option<&str> {
        self.patient_email.as_deref()
    }

    pub fn specialist_email(&self) -> Option<&str> {
        self.specialist_email.as_deref()
    }

    pub fn scheduled_start(&self) -> DateTime<Utc> {
        self.scheduled_start
    }

    pub fn scheduled_end(&self) -> DateTime<Utc> {
        self.scheduled_start + Duration::minutes(self.duration_minutes)
    }

    pub fn duration_minutes(&self) -> i64 {
        self.duration_minutes
    }

    pub fn allotted_call_minutes(&self) -> i64 {
        self.allotted_call_minutes
    }

    pub fn channel(&self) -> MeetingChannel {
        self.channel
    }

    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    pub fn status(&self) -> AppointmentStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn meeting_id(&self) -> Option<&str> {
        self.meeting_id.as_deref()
    }

    pub fn meeting_uuid(&self) -> Option<&str> {
        self.meeting_uuid.as_deref()
    }

    pub fn join_url(&self) -> Option<&str> {
        self.join_url.as_deref()
    }

    pub fn start_url(&self) -> Option<&str> {
        self.start_url.as_deref()
    }

    pub fn provisioning_note(&self) -> Option<&str> {
        self.provisioning_note.as_deref()
    }

    pub fn actual_start(&self) -> Option<DateTime<Utc>> {
        self.actual_start
    }

    pub fn actual_end(&self) -> Option<DateTime<Utc>> {
        self.actual_end
    }

    pub fn call_duration_minutes(&self) -> Option<i64> {
        self.call_duration_minutes
    }

    pub fn attendance(&self) -> &AttendanceRecord {
        &self.attendance
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn recording(&self) -> Option<&RecordingInfo> {
        self.recording.as_ref()
    }

    pub fn transcript(&self) -> Option<&TranscriptInfo> {
        self.transcript.as_ref()
    }

    pub fn summary(&self) -> Option<&SummaryInfo> {
        self.summary.as_ref()
    }

    pub fn escrow(&self) -> &EscrowRecord {
        &self.escrow
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn rescheduled_at(&self) -> Option<DateTime<Utc>> {
        self.rescheduled_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn is_party(&self, user_id: &str) -> bool {
        self.patient_id.to_string() == user_id || self.specialist_id.to_string() == user_id
    }

    /// Role of an email address in this appointment, compared case-insensitively.
    pub fn role_for_email(&self, email: Option<&str>) -> ParticipantRole {
        let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) else {
            return ParticipantRole::Unknown;
        };
        let same = |known: &Option<String>| known.as_deref().is_some_and(|k| k.trim().eq_ignore_ascii_case(email));

        if same(&self.patient_email) {
            ParticipantRole::Patient
        } else if same(&self.specialist_email) {
            ParticipantRole::Specialist
        } else {
            ParticipantRole::Unknown
        }
    }

    // --- transitions ---------------------------------------------------------

    fn transition(&mut self, to: AppointmentStatus) -> Result<(), AppointmentError> {
        validate_status_transition(self.status, to)?;
        self.status = to;
        self.touch();
        Ok(())
    }

    fn ensure_attendance_mutable(&self) -> Result<(), AppointmentError> {
        if self.status.is_terminal() {
            return Err(AppointmentError::Finalized(self.status));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn attach_meeting(&mut self, details: &MeetingDetails) -> Result<(), AppointmentError> {
        self.ensure_attendance_mutable()?;
        self.meeting_id = Some(details.meeting_id.clone());
        self.join_url = details.join_url.clone();
        self.start_url = details.start_url.clone();
        self.meeting_password = details.password.clone();
        self.provisioning_note = None;
        self.touch();
        Ok(())
    }

    /// Link for channels that need no remote meeting (e.g. a chat link).
    pub fn attach_join_url(&mut self, join_url: Option<String>) {
        self.join_url = join_url;
        self.touch();
    }

    pub fn note_provisioning_failure(&mut self, reason: impl Into<String>) {
        self.provisioning_note = Some(reason.into());
        self.touch();
    }

    /// OPEN to ONGOING, recording the provider's meeting instance.
    pub fn mark_started(
        &mut self,
        meeting_uuid: Option<String>,
        started_at: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        self.transition(AppointmentStatus::Ongoing)?;
        if meeting_uuid.is_some() {
            self.meeting_uuid = meeting_uuid;
        }
        self.actual_start = Some(started_at);
        Ok(())
    }

    fn upsert_participant(&mut self, participant: Participant) {
        let key = participant.identity_key();
        let existing = key
            .as_ref()
            .and_then(|k| self.participants.iter_mut().find(|p| p.identity_key().as_ref() == Some(k)));

        match existing {
            Some(row) => {
                if participant.join_time.is_some() && row.join_time.is_none() {
                    row.join_time = participant.join_time;
                }
                if participant.leave_time.is_some() {
                    row.leave_time = participant.leave_time;
                }
                if participant.duration_minutes.is_some() {
                    row.duration_minutes = participant.duration_minutes;
                }
                if row.name.is_none() {
                    row.name = participant.name;
                }
                if row.participant_id.is_none() {
                    row.participant_id = participant.participant_id;
                }
            }
            None => self.participants.push(participant),
        }
    }

    fn unmatched_participant_count(&self) -> u32 {
        self.participants
            .iter()
            .filter(|p| p.role == ParticipantRole::Unknown)
            .count() as u32
    }

    pub fn record_participant_joined(&mut self, observed: ParticipantObservation) -> Result<ParticipantRole, AppointmentError> {
        self.ensure_attendance_mutable()?;
        let role = self.role_for_email(observed.email.as_deref());
        let joined_at = observed.join_time.unwrap_or_else(Utc::now);

        match role {
            ParticipantRole::Patient => {
                self.attendance.patient_joined = true;
                self.attendance.patient_joined_at.get_or_insert(joined_at);
            }
            ParticipantRole::Specialist => {
                self.attendance.specialist_joined = true;
                self.attendance.specialist_joined_at.get_or_insert(joined_at);
            }
            ParticipantRole::Unknown => {}
        }

        self.upsert_participant(Participant {
            participant_id: observed.participant_id,
            name: observed.name,
            email: observed.email,
            role,
            join_time: Some(joined_at),
            leave_time: None,
            duration_minutes: None,
        });
        self.attendance.unmatched_participants = self.unmatched_participant_count();
        self.attendance.classification = self.attendance.live_classification();
        self.touch();
        Ok(role)
    }

    pub fn record_participant_left(&mut self, observed: ParticipantObservation) -> Result<ParticipantRole, AppointmentError> {
        self.ensure_attendance_mutable()?;
        let role = self.role_for_email(observed.email.as_deref());
        let left_at = observed.leave_time.unwrap_or_else(Utc::now);

        match role {
            ParticipantRole::Patient => self.attendance.patient_left_at = Some(left_at),
            ParticipantRole::Specialist => self.attendance.specialist_left_at = Some(left_at),
            ParticipantRole::Unknown => {}
        }

        self.upsert_participant(Participant {
            participant_id: observed.participant_id,
            name: observed.name,
            email: observed.email,
            role,
            join_time: observed.join_time,
            leave_time: Some(left_at),
            duration_minutes: observed.duration_seconds.map(minutes_rounded_up),
        });
        self.attendance.unmatched_participants = self.unmatched_participant_count();
        self.attendance.classification = self.attendance.live_classification();
        self.touch();
        Ok(role)
    }

    /// Applies the resolver's verdict. An appointment whose `meeting.started`
    /// never arrived passes through ONGOING on the way.
    pub fn finalize(
        &mut self,
        resolution: &AttendanceResolution,
        call_duration_minutes: i64,
        ended_at: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        self.ensure_attendance_mutable()?;
        validate_status_transition(AppointmentStatus::Ongoing, resolution.final_status)?;
        if self.status == AppointmentStatus::Open {
            self.transition(AppointmentStatus::Ongoing)?;
        }
        self.transition(resolution.final_status)?;

        self.attendance.patient_joined |= resolution.patient_matched;
        self.attendance.specialist_joined |= resolution.specialist_matched;
        self.attendance.unmatched_participants = resolution.unmatched_participants;
        self.attendance.classification = resolution.classification;
        for participant in &resolution.participants {
            self.upsert_participant(participant.clone());
        }

        self.actual_end = Some(ended_at);
        self.call_duration_minutes = Some(call_duration_minutes);
        Ok(())
    }

    pub fn cancel(&mut self, reason: Option<String>) -> Result<(), AppointmentError> {
        self.transition(AppointmentStatus::Cancelled)?;
        self.cancellation_reason = reason;
        self.cancelled_at = Some(Utc::now());
        Ok(())
    }

    /// Moves the appointment; the status stays OPEN.
    pub fn reschedule(&mut self, new_start: DateTime<Utc>, new_duration_minutes: Option<i64>) -> Result<(), AppointmentError> {
        self.transition(AppointmentStatus::Open)?;
        self.scheduled_start = new_start;
        if let Some(duration) = new_duration_minutes {
            self.duration_minutes = duration;
        }
        self.rescheduled_at = Some(Utc::now());
        Ok(())
    }

    // --- enrichment (allowed in every status) --------------------------------

    pub fn attach_recording(&mut self, recording: RecordingInfo) {
        self.recording = Some(recording);
        self.touch();
    }

    pub fn attach_transcript(&mut self, transcript: TranscriptInfo) {
        self.transcript = Some(transcript);
        self.touch();
    }

    pub fn attach_summary(&mut self, summary: SummaryInfo) {
        self.summary = Some(summary);
        self.touch();
    }

    pub fn set_meeting_uuid(&mut self, meeting_uuid: String) {
        if self.meeting_uuid.is_none() {
            self.meeting_uuid = Some(meeting_uuid);
            self.touch();
        }
    }

    // --- escrow --------------------------------------------------------------

    pub fn hold_funds(&mut self) -> Result<(), AppointmentError> {
        if self.payment_status != PaymentStatus::Succeeded {
            return Err(AppointmentError::ValidationError(
                "funds can only be held for a cleared payment".to_string(),
            ));
        }
        if self.escrow.status != EscrowStatus::None {
            return Err(AppointmentError::EscrowState(self.escrow.status));
        }
        self.escrow.status = EscrowStatus::Held;
        self.touch();
        Ok(())
    }

    pub fn mark_escrow_settled(
        &mut self,
        batch_id: String,
        settlement_type: SettlementType,
        settled_at: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        if self.escrow.status != EscrowStatus::Held {
            return Err(AppointmentError::EscrowState(self.escrow.status));
        }
        self.escrow = EscrowRecord {
            status: EscrowStatus::Settled,
            settlement_batch_id: Some(batch_id),
            settlement_type: Some(settlement_type),
            settled_at: Some(settled_at),
        };
        self.touch();
        Ok(())
    }

    /// Set by repositories after a successful write.
    pub(crate) fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}

/// Whole minutes covering `seconds`; negative input counts as zero.
pub fn minutes_rounded_up(seconds: i64) -> i64 {
    if seconds <= 0 {
        0
    } else {
        seconds.saturating_add(59) / 60
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient_id: Uuid,
    pub specialist_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub channel: MeetingChannel,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    pub topic: Option<String>,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    /// Funds were authorized into escrow by the payment collaborator.
    #[serde(default)]
    pub escrow_hold: bool,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_start_time: DateTime<Utc>,
    pub new_duration_minutes: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Specialist not found")]
    SpecialistNotFound,

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Appointment is already {0}")]
    Finalized(AppointmentStatus),

    #[error("Escrow is {0:?}")]
    EscrowState(EscrowStatus),

    #[error("Appointment conflicts with existing booking {0}")]
    ConflictDetected(Uuid),

    #[error("Appointment was modified concurrently")]
    ConcurrentModification,

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),
}

impl AppointmentError {
    /// The aggregate refused a mutation because of its current state.
    pub fn is_stale_state(&self) -> bool {
        matches!(
            self,
            AppointmentError::InvalidStatusTransition { .. }
                | AppointmentError::Finalized(_)
                | AppointmentError::EscrowState(_)
        )
    }
}
