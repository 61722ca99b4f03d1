// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AppointmentError, BookAppointmentRequest, CancelAppointmentRequest, RescheduleAppointmentRequest,
};
use crate::services::booking::AppointmentBookingService;

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound
            | AppointmentError::PatientNotFound
            | AppointmentError::SpecialistNotFound => AppError::NotFound(err.to_string()),
            AppointmentError::Unauthorized => AppError::Forbidden(err.to_string()),
            AppointmentError::ConflictDetected(_) | AppointmentError::ConcurrentModification => {
                AppError::Conflict(err.to_string())
            }
            AppointmentError::InvalidStatusTransition { .. }
            | AppointmentError::Finalized(_)
            | AppointmentError::EscrowState(_) => AppError::BadRequest(err.to_string()),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
            AppointmentError::ExternalServiceError(msg) => AppError::ExternalService(msg),
        }
    }
}

/// Book an appointment; specialists booking their own calendar get the
/// double-booking check
#[axum::debug_handler]
pub async fn book_appointment(
    State(service): State<Arc<AppointmentBookingService>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = service.book(&user, request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "meeting_ready": appointment.provisioning_note().is_none(),
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(service): State<Arc<AppointmentBookingService>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = service.get(&user, appointment_id).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(service): State<Arc<AppointmentBookingService>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = service.cancel(&user, appointment_id, request.reason).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled successfully"
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(service): State<Arc<AppointmentBookingService>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = service.reschedule(&user, appointment_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment rescheduled successfully"
    })))
}
