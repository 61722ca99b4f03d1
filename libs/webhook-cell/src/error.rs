use thiserror::Error;
use uuid::Uuid;

use appointment_cell::AppointmentError;
use meeting_channel_cell::ChannelError;
use shared_models::error::AppError;
use shared_utils::signature::SignatureError;

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Webhook signature rejected: {0}")]
    Signature(#[from] SignatureError),

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Webhook event not found: {0}")]
    EventNotFound(Uuid),

    #[error("Event store error: {0}")]
    Store(String),

    #[error("Webhook handler panicked: {0}")]
    HandlerPanicked(String),

    #[error(transparent)]
    Appointment(#[from] AppointmentError),

    #[error(transparent)]
    Provider(#[from] ChannelError),
}

impl WebhookError {
    /// The target appointment no longer accepts this event.
    pub fn is_stale_state(&self) -> bool {
        matches!(self, WebhookError::Appointment(e) if e.is_stale_state())
    }
}

impl From<serde_json::Error> for WebhookError {
    fn from(err: serde_json::Error) -> Self {
        WebhookError::InvalidPayload(err.to_string())
    }
}

impl From<WebhookError> for AppError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::Signature(e) => AppError::Auth(e.to_string()),
            WebhookError::InvalidPayload(msg) => AppError::BadRequest(msg),
            WebhookError::EventNotFound(_) => AppError::NotFound(err.to_string()),
            WebhookError::Store(msg) => AppError::Database(msg),
            WebhookError::HandlerPanicked(msg) => AppError::Internal(msg),
            WebhookError::Appointment(e) => e.into(),
            WebhookError::Provider(e) => AppError::ExternalService(e.to_string()),
        }
    }
}
