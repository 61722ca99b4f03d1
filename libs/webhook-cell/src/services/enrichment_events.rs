// libs/webhook-cell/src/services/enrichment_events.rs
use chrono::Utc;
use tracing::{info, warn};

use appointment_cell::{Appointment, RecordingInfo, SummaryInfo, TranscriptInfo};
use meeting_channel_cell::{MeetingSummary, RecordingFile};

use crate::error::WebhookError;
use crate::models::{HandlerOutcome, WebhookEvent, ZoomMeetingObject};
use crate::services::processor::EventProcessor;

// Enrichment is allowed in every appointment status and never fails the
// event because provider content is missing.

fn recording_info(object: &ZoomMeetingObject, files: &[RecordingFile]) -> RecordingInfo {
    let media: Vec<&RecordingFile> = files.iter().filter(|f| !f.is_transcript()).collect();
    let primary = media
        .iter()
        .find(|f| f.file_type.as_deref() == Some("MP4"))
        .or_else(|| media.first())
        .copied();

    RecordingInfo {
        share_url: object.share_url.clone(),
        password: object.password.clone(),
        total_size: object.total_size,
        file_count: media.len(),
        play_url: primary.and_then(|f| f.play_url.clone()),
        download_url: primary.and_then(|f| f.download_url.clone()),
        recorded_at: primary.and_then(|f| f.recording_start).or(object.start_time),
    }
}

fn summary_info(summary: MeetingSummary) -> SummaryInfo {
    SummaryInfo {
        title: summary.summary_title,
        overview: summary.summary_overview,
        details: summary
            .summary_details
            .into_iter()
            .filter_map(|d| match (d.label, d.summary) {
                (Some(label), Some(text)) => Some(format!("{}: {}", label, text)),
                (None, Some(text)) => Some(text),
                (Some(label), None) => Some(label),
                (None, None) => None,
            })
            .collect(),
        next_steps: summary.next_steps,
        available_at: Utc::now(),
    }
}

impl EventProcessor {
    pub(crate) async fn handle_recording_completed(
        &self,
        event: &WebhookEvent,
        appointment: &Appointment,
    ) -> Result<HandlerOutcome, WebhookError> {
        let mut object = event.meeting_object()?;

        if object.recording_files.is_empty() {
            let meeting_ref = object.instance_uuid().or(object.id.as_deref()).unwrap_or_default().to_string();
            match self.provider.get_recordings(&meeting_ref).await {
                Ok(Some(recordings)) => {
                    object.share_url = object.share_url.or(recordings.share_url);
                    object.password = object.password.or(recordings.password);
                    object.total_size = object.total_size.or(recordings.total_size);
                    object.recording_files = recordings.recording_files;
                }
                Ok(None) => warn!("Recordings for meeting {} not available yet", meeting_ref),
                Err(e) => warn!("Could not fetch recordings for meeting {}: {}", meeting_ref, e),
            }
        }

        let recording = recording_info(&object, &object.recording_files);
        self.appointments
            .modify(appointment.id(), |appt| {
                appt.attach_recording(recording.clone());
                Ok(())
            })
            .await?;

        info!(
            "Recording attached to appointment {} ({} files)",
            appointment.id(),
            recording.file_count
        );
        Ok(HandlerOutcome::Applied)
    }

    pub(crate) async fn handle_transcript_completed(
        &self,
        event: &WebhookEvent,
        appointment: &Appointment,
    ) -> Result<HandlerOutcome, WebhookError> {
        let object = event.meeting_object()?;

        let mut download_url = object
            .recording_files
            .iter()
            .find(|f| f.is_transcript())
            .and_then(|f| f.download_url.clone());

        if download_url.is_none() {
            let meeting_ref = object.instance_uuid().or(object.id.as_deref()).unwrap_or_default().to_string();
            match self.provider.get_recordings(&meeting_ref).await {
                Ok(Some(recordings)) => {
                    download_url = recordings
                        .recording_files
                        .into_iter()
                        .find(|f| f.is_transcript())
                        .and_then(|f| f.download_url);
                }
                Ok(None) => {}
                Err(e) => warn!("Could not look up transcript file for meeting {}: {}", meeting_ref, e),
            }
        }

        let content = match &download_url {
            Some(url) => match self
                .provider
                .download_transcript(url, event.download_token.as_deref())
                .await
            {
                Ok(content) => content,
                Err(e) => {
                    warn!("Transcript download for appointment {} failed: {}", appointment.id(), e);
                    None
                }
            },
            None => None,
        };

        let transcript = TranscriptInfo {
            download_url,
            content,
            available_at: Utc::now(),
        };
        let has_content = transcript.content.is_some();

        self.appointments
            .modify(appointment.id(), |appt| {
                appt.attach_transcript(transcript.clone());
                Ok(())
            })
            .await?;

        info!(
            "Transcript attached to appointment {} (content fetched: {})",
            appointment.id(),
            has_content
        );
        Ok(HandlerOutcome::Applied)
    }

    pub(crate) async fn handle_summary_completed(
        &self,
        event: &WebhookEvent,
        appointment: &Appointment,
    ) -> Result<HandlerOutcome, WebhookError> {
        let object = event.meeting_object()?;
        let meeting_ref = object
            .instance_uuid()
            .or(appointment.meeting_uuid())
            .or(object.id.as_deref())
            .unwrap_or_default()
            .to_string();

        let untitled = || SummaryInfo {
            title: object.topic.clone(),
            overview: None,
            details: Vec::new(),
            next_steps: Vec::new(),
            available_at: Utc::now(),
        };

        let summary = match self.provider.get_meeting_summary(&meeting_ref).await {
            Ok(Some(summary)) => summary_info(summary),
            Ok(None) => {
                warn!("Summary for meeting {} not available yet", meeting_ref);
                untitled()
            }
            Err(e) => {
                warn!("Could not fetch summary for meeting {}: {}", meeting_ref, e);
                untitled()
            }
        };

        self.appointments
            .modify(appointment.id(), |appt| {
                appt.attach_summary(summary.clone());
                Ok(())
            })
            .await?;

        info!("Summary attached to appointment {}", appointment.id());
        Ok(HandlerOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meeting_channel_cell::models::SummaryDetail;
    use serde_json::json;

    #[test]
    fn recording_prefers_mp4_and_skips_transcripts() {
        let object: ZoomMeetingObject = serde_json::from_value(json!({
            "id": 1,
            "share_url": "https://zoom.us/rec/share/abc",
            "recording_files": [
                {"file_type": "TRANSCRIPT", "download_url": "https://zoom.us/rec/download/vtt"},
                {"file_type": "M4A", "download_url": "https://zoom.us/rec/download/m4a"},
                {"file_type": "MP4", "download_url": "https://zoom.us/rec/download/mp4", "play_url": "https://zoom.us/rec/play/mp4"}
            ]
        }))
        .unwrap();

        let info = recording_info(&object, &object.recording_files);
        assert_eq!(info.file_count, 2);
        assert_eq!(info.download_url.as_deref(), Some("https://zoom.us/rec/download/mp4"));
        assert_eq!(info.share_url.as_deref(), Some("https://zoom.us/rec/share/abc"));
    }

    #[test]
    fn summary_details_are_flattened() {
        let info = summary_info(MeetingSummary {
            summary_title: Some("Follow-up".to_string()),
            summary_overview: Some("Reviewed lab results".to_string()),
            summary_details: vec![
                SummaryDetail {
                    label: Some("Medication".to_string()),
                    summary: Some("Continue current dose".to_string()),
                },
                SummaryDetail { label: None, summary: None },
            ],
            next_steps: vec!["Book blood test".to_string()],
        });

        assert_eq!(info.details, vec!["Medication: Continue current dose".to_string()]);
        assert_eq!(info.next_steps.len(), 1);
    }
}
