mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use serde_json::json;

use appointment_cell::{
    AppointmentStatus, AttendanceClassification, DeferredJob, EscrowStatus, ParticipantRole, SettlementType,
};
use meeting_channel_cell::MeetingSummary;
use shared_utils::test_utils::TestConfig;
use webhook_cell::{IngestAck, ProcessOutcome, RetrySweeper, WebhookEventStatus, WebhookEventStore};

use common::{
    ended_object, participant, Fixture, ScriptedProvider, MEETING_ID, MEETING_UUID, PATIENT_EMAIL,
    SPECIALIST_EMAIL,
};

#[tokio::test]
async fn test_meeting_with_duration_completes_and_settles_once() {
    let provider = ScriptedProvider::with_participants(vec![participant(
        Some("stranger@example.org"),
        "Unknown caller",
        600,
    )]);
    let fixture = Fixture::new(Arc::new(provider));
    let appointment = fixture.seed_appointment().await;

    let end = Utc::now();
    let object = ended_object(end - Duration::minutes(25), end);

    let first = fixture.store_event("meeting.ended", object.clone()).await;
    let second = fixture.store_event("meeting.ended", object).await;

    assert_eq!(fixture.processor.process(first).await.unwrap(), ProcessOutcome::Processed);
    assert_matches!(fixture.processor.process(second).await.unwrap(), ProcessOutcome::Ignored(_));

    let stored = fixture.store.get(appointment.id()).await.unwrap();
    assert_eq!(stored.status(), AppointmentStatus::Completed);
    assert_eq!(stored.attendance().classification, AttendanceClassification::Unknown);
    assert_eq!(stored.call_duration_minutes(), Some(25));
    assert_eq!(stored.escrow().status, EscrowStatus::Settled);
    assert_eq!(stored.escrow().settlement_type, Some(SettlementType::Completed));
    assert_eq!(fixture.ledger.call_count(), 1);

    let first_row = fixture.events.get(first).await.unwrap().unwrap();
    let second_row = fixture.events.get(second).await.unwrap().unwrap();
    assert_eq!(first_row.status, WebhookEventStatus::Processed);
    assert_eq!(second_row.status, WebhookEventStatus::Ignored);
    assert!(second_row.error_message.unwrap().contains("already COMPLETED"));

    // Processing an already processed event is a no-op.
    assert_eq!(fixture.processor.process(first).await.unwrap(), ProcessOutcome::Skipped);
    assert_eq!(fixture.ledger.call_count(), 1);
}

#[tokio::test]
async fn test_no_participants_and_no_duration_is_missed_without_settlement() {
    let fixture = Fixture::new(Arc::new(ScriptedProvider::with_participants(vec![])));
    let appointment = fixture.seed_appointment().await;

    let at = Utc::now();
    let event_id = fixture.store_event("meeting.ended", ended_object(at, at)).await;
    assert_eq!(fixture.processor.process(event_id).await.unwrap(), ProcessOutcome::Processed);

    let stored = fixture.store.get(appointment.id()).await.unwrap();
    assert_eq!(stored.status(), AppointmentStatus::Missed);
    assert_eq!(stored.attendance().classification, AttendanceClassification::None);
    assert_eq!(stored.escrow().status, EscrowStatus::Held);
    assert_eq!(fixture.ledger.call_count(), 0);
}

#[tokio::test]
async fn test_no_show_settles_when_enabled() {
    let mut config = TestConfig::default().to_app_config();
    config.settle_no_shows = true;
    let fixture = Fixture::build(config, Arc::new(ScriptedProvider::with_participants(vec![])));
    let appointment = fixture.seed_appointment().await;

    let at = Utc::now();
    let event_id = fixture.store_event("meeting.ended", ended_object(at, at)).await;
    fixture.processor.process(event_id).await.unwrap();

    assert_eq!(
        fixture.ledger.settlements().await,
        vec![(appointment.id(), SettlementType::NoShow)]
    );
}

#[tokio::test]
async fn test_patient_only_attendance() {
    let provider = ScriptedProvider::with_participants(vec![participant(Some("PAT@example.com"), "Pat", 720)]);
    let fixture = Fixture::new(Arc::new(provider));
    let appointment = fixture.seed_appointment().await;

    let end = Utc::now();
    let event_id = fixture
        .store_event("meeting.ended", ended_object(end - Duration::minutes(12), end))
        .await;
    fixture.processor.process(event_id).await.unwrap();

    let stored = fixture.store.get(appointment.id()).await.unwrap();
    assert_eq!(stored.attendance().classification, AttendanceClassification::PatientOnly);
    assert_eq!(stored.status(), AppointmentStatus::Completed);
    assert!(stored.attendance().patient_joined);
    assert!(!stored.attendance().specialist_joined);
    assert_eq!(stored.participants()[0].duration_minutes, Some(12));

    let jobs = fixture.scheduler.jobs();
    assert_matches!(
        &jobs[..],
        [(DeferredJob::SessionFollowUp { status: AppointmentStatus::Completed, .. }, _)]
    );
}

#[tokio::test]
async fn test_report_failure_still_finalizes_with_unknown_attendance() {
    let provider = ScriptedProvider {
        fail_participants: true,
        ..ScriptedProvider::default()
    };
    let fixture = Fixture::new(Arc::new(provider));
    let appointment = fixture.seed_appointment().await;

    let end = Utc::now();
    let event_id = fixture
        .store_event("meeting.ended", ended_object(end - Duration::minutes(5), end))
        .await;
    assert_eq!(fixture.processor.process(event_id).await.unwrap(), ProcessOutcome::Processed);

    let stored = fixture.store.get(appointment.id()).await.unwrap();
    assert_eq!(stored.status(), AppointmentStatus::Completed);
    assert_eq!(stored.attendance().classification, AttendanceClassification::Unknown);
}

#[tokio::test]
async fn test_orphan_event_is_ignored() {
    let fixture = Fixture::new(Arc::new(ScriptedProvider::default()));
    fixture.seed_appointment().await;

    let event_id = fixture
        .store_event("meeting.started", json!({"id": 11122233344u64, "uuid": "orphan=="}))
        .await;

    assert_matches!(
        fixture.processor.process(event_id).await.unwrap(),
        ProcessOutcome::Ignored(reason) if reason.contains("no appointment")
    );
    let stored = fixture.events.get(event_id).await.unwrap().unwrap();
    assert_eq!(stored.status, WebhookEventStatus::Ignored);
    assert_eq!(stored.retry_count, 0);
}

#[tokio::test]
async fn test_meeting_lifecycle_from_started_to_ended() {
    let provider = ScriptedProvider::with_participants(vec![
        participant(Some(PATIENT_EMAIL), "Pat", 1200),
        participant(Some(SPECIALIST_EMAIL), "Dr Ada", 1300),
    ]);
    let fixture = Fixture::new(Arc::new(provider));
    let appointment = fixture.seed_appointment().await;
    let start = Utc::now() - Duration::minutes(22);

    let started = fixture
        .store_event(
            "meeting.started",
            json!({"id": MEETING_ID, "uuid": MEETING_UUID, "start_time": start}),
        )
        .await;
    fixture.processor.process(started).await.unwrap();

    let ongoing = fixture.store.get(appointment.id()).await.unwrap();
    assert_eq!(ongoing.status(), AppointmentStatus::Ongoing);
    assert_eq!(ongoing.meeting_uuid(), Some(MEETING_UUID));
    assert_eq!(ongoing.actual_start(), Some(start));

    // A second meeting.started is stale.
    let again = fixture
        .store_event("meeting.started", json!({"id": MEETING_ID, "uuid": MEETING_UUID}))
        .await;
    assert_matches!(fixture.processor.process(again).await.unwrap(), ProcessOutcome::Ignored(_));

    // The ended payload may omit start_time; the recorded start is used.
    let ended = fixture
        .store_event(
            "meeting.ended",
            json!({"id": MEETING_ID, "uuid": MEETING_UUID, "end_time": start + Duration::minutes(21)}),
        )
        .await;
    fixture.processor.process(ended).await.unwrap();

    let finished = fixture.store.get(appointment.id()).await.unwrap();
    assert_eq!(finished.status(), AppointmentStatus::Completed);
    assert_eq!(finished.attendance().classification, AttendanceClassification::Both);
    assert_eq!(finished.call_duration_minutes(), Some(21));
    assert_eq!(finished.participants().len(), 2);
}

#[tokio::test]
async fn test_participant_events_track_attendance_and_go_stale_after_completion() {
    let fixture = Fixture::new(Arc::new(ScriptedProvider::with_participants(vec![])));
    let appointment = fixture.seed_appointment().await;
    let joined_at = Utc::now() - Duration::minutes(10);

    let joined = fixture
        .store_event(
            "meeting.participant_joined",
            json!({
                "id": MEETING_ID,
                "uuid": MEETING_UUID,
                "participant": {"user_name": "Pat", "email": PATIENT_EMAIL, "join_time": joined_at}
            }),
        )
        .await;
    assert_eq!(fixture.processor.process(joined).await.unwrap(), ProcessOutcome::Processed);

    let current = fixture.store.get(appointment.id()).await.unwrap();
    assert!(current.attendance().patient_joined);
    assert_eq!(current.attendance().classification, AttendanceClassification::PatientOnly);
    assert_eq!(current.participants()[0].role, ParticipantRole::Patient);
    assert_eq!(current.meeting_uuid(), Some(MEETING_UUID));

    let left = fixture
        .store_event(
            "meeting.participant_left",
            json!({
                "id": MEETING_ID,
                "participant": {"user_name": "Pat", "email": PATIENT_EMAIL, "duration": 300}
            }),
        )
        .await;
    fixture.processor.process(left).await.unwrap();

    let current = fixture.store.get(appointment.id()).await.unwrap();
    assert_eq!(current.participants().len(), 1);
    assert_eq!(current.participants()[0].duration_minutes, Some(5));
    assert!(current.participants()[0].leave_time.is_some());

    let at = Utc::now();
    let ended = fixture.store_event("meeting.ended", ended_object(at, at)).await;
    fixture.processor.process(ended).await.unwrap();

    let late_join = fixture
        .store_event(
            "participant.joined",
            json!({"id": MEETING_ID, "participant": {"user_name": "Dr Ada", "email": SPECIALIST_EMAIL}}),
        )
        .await;
    assert_matches!(
        fixture.processor.process(late_join).await.unwrap(),
        ProcessOutcome::Ignored(reason) if reason.contains("no longer accepts")
    );
    let final_state = fixture.store.get(appointment.id()).await.unwrap();
    assert!(!final_state.attendance().specialist_joined);
}

#[tokio::test]
async fn test_concurrent_joins_keep_both_parties() {
    let fixture = Fixture::new(Arc::new(ScriptedProvider::default()));
    let appointment = fixture.seed_appointment().await;

    let mut ids = Vec::new();
    for email in [PATIENT_EMAIL, SPECIALIST_EMAIL] {
        ids.push(
            fixture
                .store_event(
                    "meeting.participant_joined",
                    json!({"id": MEETING_ID, "participant": {"email": email}}),
                )
                .await,
        );
    }

    let (a, b) = tokio::join!(fixture.processor.process(ids[0]), fixture.processor.process(ids[1]));
    assert_eq!(a.unwrap(), ProcessOutcome::Processed);
    assert_eq!(b.unwrap(), ProcessOutcome::Processed);

    let current = fixture.store.get(appointment.id()).await.unwrap();
    assert!(current.attendance().patient_joined);
    assert!(current.attendance().specialist_joined);
    assert_eq!(current.attendance().classification, AttendanceClassification::Both);
}

#[tokio::test]
async fn test_enrichment_degrades_and_applies_after_completion() {
    let provider = ScriptedProvider {
        participants: Some(vec![]),
        fail_transcript: true,
        summary: Some(MeetingSummary {
            summary_title: Some("Consultation summary".to_string()),
            summary_overview: Some("Discussed sleep routine".to_string()),
            summary_details: vec![],
            next_steps: vec!["Check in next week".to_string()],
        }),
        ..ScriptedProvider::default()
    };
    let fixture = Fixture::new(Arc::new(provider));
    let appointment = fixture.seed_appointment().await;

    let end = Utc::now();
    let ended = fixture
        .store_event("meeting.ended", ended_object(end - Duration::minutes(15), end))
        .await;
    fixture.processor.process(ended).await.unwrap();

    let recording = fixture
        .store_event(
            "recording.completed",
            json!({
                "id": MEETING_ID,
                "uuid": MEETING_UUID,
                "share_url": "https://zoom.us/rec/share/xyz",
                "recording_files": [{"file_type": "MP4", "download_url": "https://zoom.us/rec/download/mp4"}]
            }),
        )
        .await;
    let transcript = fixture
        .store_event(
            "recording.transcript_completed",
            json!({
                "id": MEETING_ID,
                "uuid": MEETING_UUID,
                "recording_files": [{"file_type": "TRANSCRIPT", "download_url": "https://zoom.us/rec/download/vtt"}]
            }),
        )
        .await;
    let summary = fixture
        .store_event("meeting.summary_completed", json!({"meeting_id": MEETING_ID, "id": MEETING_ID}))
        .await;

    for id in [recording, transcript, summary] {
        assert_eq!(fixture.processor.process(id).await.unwrap(), ProcessOutcome::Processed);
    }

    let stored = fixture.store.get(appointment.id()).await.unwrap();
    assert_eq!(stored.status(), AppointmentStatus::Completed);
    assert_eq!(stored.recording().unwrap().file_count, 1);

    let transcript = stored.transcript().unwrap();
    assert_eq!(transcript.download_url.as_deref(), Some("https://zoom.us/rec/download/vtt"));
    assert_eq!(transcript.content, None);

    let summary = stored.summary().unwrap();
    assert_eq!(summary.title.as_deref(), Some("Consultation summary"));
    assert_eq!(summary.next_steps, vec!["Check in next week".to_string()]);
}

#[tokio::test]
async fn test_failed_event_is_retried_up_to_the_bound() {
    let fixture = Fixture::new(Arc::new(ScriptedProvider::default()));
    fixture.seed_appointment().await;

    // Matches the appointment but has no participant block.
    let broken = fixture
        .store_event("meeting.participant_joined", json!({"id": MEETING_ID}))
        .await;

    assert_matches!(fixture.processor.process(broken).await.unwrap(), ProcessOutcome::Failed(_));

    let sweeper = RetrySweeper::new(fixture.processor.clone());
    let report = sweeper.sweep().await.unwrap();
    assert_eq!(report.attempted, 1);
    assert_eq!(report.failed, 1);

    sweeper.sweep().await.unwrap();
    let exhausted = fixture.events.get(broken).await.unwrap().unwrap();
    assert_eq!(exhausted.status, WebhookEventStatus::Failed);
    assert_eq!(exhausted.retry_count, 3);
    assert!(exhausted.error_message.is_some());

    // Out of attempts: the sweep leaves it for an operator.
    let report = sweeper.sweep().await.unwrap();
    assert_eq!(report.attempted, 0);
    assert_eq!(fixture.events.list_failed().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_ledger_outage_keeps_escrow_held_until_redelivery() {
    let fixture = Fixture::new(Arc::new(ScriptedProvider::with_participants(vec![participant(
        Some(SPECIALIST_EMAIL),
        "Dr Ada",
        900,
    )])));
    let appointment = fixture.seed_appointment().await;
    fixture.ledger.set_unavailable(true);

    let end = Utc::now();
    let object = ended_object(end - Duration::minutes(15), end);
    let first = fixture.store_event("meeting.ended", object.clone()).await;

    // The settlement failure does not fail the event.
    assert_eq!(fixture.processor.process(first).await.unwrap(), ProcessOutcome::Processed);
    let stored = fixture.store.get(appointment.id()).await.unwrap();
    assert_eq!(stored.status(), AppointmentStatus::Completed);
    assert_eq!(stored.escrow().status, EscrowStatus::Held);

    fixture.ledger.set_unavailable(false);
    let second = fixture.store_event("meeting.ended", object).await;
    assert_eq!(fixture.processor.process(second).await.unwrap(), ProcessOutcome::Processed);

    let stored = fixture.store.get(appointment.id()).await.unwrap();
    assert_eq!(stored.escrow().status, EscrowStatus::Settled);
    assert_eq!(fixture.ledger.call_count(), 2);
    assert_eq!(fixture.ledger.settlements().await.len(), 1);
}

#[tokio::test]
async fn test_ingested_event_is_processed_in_the_background() {
    let provider = Arc::new(ScriptedProvider::with_participants(vec![participant(
        Some(PATIENT_EMAIL),
        "Pat",
        300,
    )]));
    let fixture = Fixture::new(provider.clone());
    let appointment = fixture.seed_appointment().await;

    let end = Utc::now();
    let ack = fixture
        .deliver("meeting.ended", ended_object(end - Duration::minutes(5), end))
        .await;
    let IngestAck::Received { event_id } = ack else {
        panic!("expected a received ack, got {:?}", ack);
    };

    let event = fixture.wait_until_done(event_id).await;
    assert_eq!(event.status, WebhookEventStatus::Processed);
    assert_eq!(event.meeting_id.as_deref(), Some(MEETING_ID));
    assert_eq!(provider.participant_calls.load(Ordering::SeqCst), 1);

    let stored = fixture.store.get(appointment.id()).await.unwrap();
    assert_eq!(stored.escrow().status, EscrowStatus::Settled);
}

#[tokio::test]
async fn test_stalled_pending_event_is_recovered_by_the_sweep() {
    let mut config = TestConfig::default().to_app_config();
    config.webhook_pending_grace_seconds = 0;
    let fixture = Fixture::build(
        config,
        Arc::new(ScriptedProvider::with_participants(vec![participant(
            Some(PATIENT_EMAIL),
            "Pat",
            900,
        )])),
    );
    let appointment = fixture.seed_appointment().await;

    // Written ahead but never run, as after a crash between ack and processing.
    let end = Utc::now();
    let stranded = fixture
        .store_event("meeting.ended", ended_object(end - Duration::minutes(15), end))
        .await;

    let report = RetrySweeper::new(fixture.processor.clone()).sweep().await.unwrap();
    assert_eq!(report.attempted, 1);
    assert_eq!(report.recovered, 1);
    assert_eq!(report.processed, 1);

    let event = fixture.events.get(stranded).await.unwrap().unwrap();
    assert_eq!(event.status, WebhookEventStatus::Processed);
    let stored = fixture.store.get(appointment.id()).await.unwrap();
    assert_eq!(stored.status(), AppointmentStatus::Completed);
    assert_eq!(stored.escrow().status, EscrowStatus::Settled);
}

#[tokio::test]
async fn test_fresh_pending_event_is_left_to_its_first_run() {
    let fixture = Fixture::new(Arc::new(ScriptedProvider::default()));
    fixture.seed_appointment().await;

    let pending = fixture
        .store_event("meeting.started", json!({"id": MEETING_ID, "uuid": MEETING_UUID}))
        .await;

    let report = RetrySweeper::new(fixture.processor.clone()).sweep().await.unwrap();
    assert_eq!(report, webhook_cell::SweepReport::default());
    assert_eq!(
        fixture.events.get(pending).await.unwrap().unwrap().status,
        WebhookEventStatus::Pending
    );
}

#[tokio::test]
async fn test_panicking_handler_fails_the_event_and_releases_its_claim() {
    let provider = ScriptedProvider {
        participants: Some(vec![participant(Some(PATIENT_EMAIL), "Pat", 600)]),
        ..ScriptedProvider::default()
    };
    provider.panics_remaining.store(1, Ordering::SeqCst);
    let fixture = Fixture::new(Arc::new(provider));
    let appointment = fixture.seed_appointment().await;

    let end = Utc::now();
    let event_id = fixture
        .store_event("meeting.ended", ended_object(end - Duration::minutes(10), end))
        .await;

    assert_matches!(
        fixture.processor.process(event_id).await.unwrap(),
        ProcessOutcome::Failed(reason) if reason.contains("panicked")
    );
    let failed = fixture.events.get(event_id).await.unwrap().unwrap();
    assert_eq!(failed.status, WebhookEventStatus::Failed);
    assert_eq!(failed.retry_count, 1);
    assert_eq!(
        fixture.store.get(appointment.id()).await.unwrap().status(),
        AppointmentStatus::Open
    );

    // The claim is gone, so the retry runs instead of being skipped.
    let report = RetrySweeper::new(fixture.processor.clone()).sweep().await.unwrap();
    assert_eq!(report.processed, 1);
    let stored = fixture.store.get(appointment.id()).await.unwrap();
    assert_eq!(stored.status(), AppointmentStatus::Completed);
    assert_eq!(stored.attendance().classification, AttendanceClassification::PatientOnly);
}

#[tokio::test]
async fn test_huge_participant_duration_is_clamped() {
    let fixture = Fixture::new(Arc::new(ScriptedProvider::default()));
    let appointment = fixture.seed_appointment().await;

    let joined = fixture
        .store_event(
            "meeting.participant_joined",
            json!({"id": MEETING_ID, "participant": {"user_name": "Pat", "email": PATIENT_EMAIL}}),
        )
        .await;
    fixture.processor.process(joined).await.unwrap();

    let left = fixture
        .store_event(
            "meeting.participant_left",
            json!({
                "id": MEETING_ID,
                "participant": {"user_name": "Pat", "email": PATIENT_EMAIL, "duration": i64::MAX}
            }),
        )
        .await;
    assert_eq!(fixture.processor.process(left).await.unwrap(), ProcessOutcome::Processed);

    let stored = fixture.store.get(appointment.id()).await.unwrap();
    assert_eq!(stored.participants()[0].duration_minutes, Some(i64::MAX / 60));
}

#[tokio::test]
async fn test_missing_end_time_falls_back_to_delivery_time() {
    let fixture = Fixture::new(Arc::new(ScriptedProvider::with_participants(vec![])));
    let appointment = fixture.seed_appointment().await;

    let started = Utc::now() - Duration::minutes(21);
    let event_id = fixture
        .store_event(
            "meeting.ended",
            json!({"id": MEETING_ID, "uuid": MEETING_UUID, "start_time": started}),
        )
        .await;
    tokio_test::assert_ok!(fixture.processor.process(event_id).await);

    let stored = fixture.store.get(appointment.id()).await.unwrap();
    assert_eq!(stored.call_duration_minutes(), Some(21));
    assert_eq!(stored.status(), AppointmentStatus::Completed);
    assert_eq!(stored.attendance().classification, AttendanceClassification::Unknown);
}
