// libs/appointment-cell/src/handlers.rs
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Extension, Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, warn};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    Appointment, BookingError, BookingOutcome, BookingRequest, ConflictCheckResponse,
    PaymentEventError, PublicBookingRequest, PublicBookingView,
};
use crate::state::BookingState;
use crate::time::TimeRange;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

// ==============================================================================
// ERROR MAPPING
// ==============================================================================

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::Validation(message) => AppError::ValidationError(message),
            BookingError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            BookingError::Conflict => AppError::Conflict("Slot no longer available".to_string()),
            BookingError::PaymentProvider(message) => {
                AppError::ExternalService(format!("Payment setup failed: {}", message))
            }
            err @ BookingError::InvalidStatusTransition { .. } => AppError::Conflict(err.to_string()),
            BookingError::Store(message) => AppError::Database(message),
            BookingError::Unauthorized(message) => AppError::Forbidden(message),
        }
    }
}

impl From<PaymentEventError> for AppError {
    fn from(err: PaymentEventError) -> Self {
        match err {
            PaymentEventError::InvalidSignature(_) | PaymentEventError::InvalidPayload(_) => {
                AppError::BadRequest(err.to_string())
            }
            PaymentEventError::NotConfigured | PaymentEventError::Transient(_) => {
                AppError::Internal(err.to_string())
            }
        }
    }
}

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct ConflictCheckQuery {
    pub clinician_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub exclude_appointment_id: Option<Uuid>,
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book(
    State(state): State<Arc<BookingState>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let actor = user.actor_id();
    let is_party = actor.is_some_and(|id| id == request.client_id || id == request.clinician_id);

    if !is_party && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to book for this client".to_string(),
        ));
    }

    let orchestrator = state.orchestrator.clone();
    let outcome = with_booking_timeout(&state, async move {
        orchestrator.book(request, actor).await
    })
    .await?;

    Ok((StatusCode::CREATED, Json(booking_body(outcome))))
}

/// Booking through a clinician's share link. No account required.
#[axum::debug_handler]
pub async fn book_public(
    State(state): State<Arc<BookingState>>,
    Path(share_token): Path<String>,
    Json(request): Json<PublicBookingRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let orchestrator = state.orchestrator.clone();
    let outcome = with_booking_timeout(&state, async move {
        orchestrator.book_with_share_token(&share_token, request).await
    })
    .await?;

    Ok((StatusCode::CREATED, Json(booking_body(outcome))))
}

#[axum::debug_handler]
pub async fn get_booking(
    State(state): State<Arc<BookingState>>,
    Path(booking_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment = load_appointment(&state, booking_id).await?;

    if !can_view(&user, &appointment) {
        return Err(AppError::Forbidden("Not authorized to view this booking".to_string()));
    }

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn get_booking_by_token(
    State(state): State<Arc<BookingState>>,
    Path(booking_token): Path<String>,
) -> Result<Json<PublicBookingView>, AppError> {
    let appointment = state
        .collaborators
        .store
        .find_by_booking_token(&booking_token)
        .await
        .map_err(BookingError::from)?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    Ok(Json(PublicBookingView::from(&appointment)))
}

#[axum::debug_handler]
pub async fn cancel_booking(
    State(state): State<Arc<BookingState>>,
    Path(booking_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment = load_appointment(&state, booking_id).await?;

    if !can_view(&user, &appointment) {
        return Err(AppError::Forbidden("Not authorized to cancel this booking".to_string()));
    }

    let cancelled = state.cancellations.cancel(booking_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": cancelled,
        "message": "Booking cancelled"
    })))
}

#[axum::debug_handler]
pub async fn complete_booking(
    State(state): State<Arc<BookingState>>,
    Path(booking_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment = load_appointment(&state, booking_id).await?;

    let is_clinician = user.actor_id() == Some(appointment.clinician_id);
    if !is_clinician && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only the clinician can complete this booking".to_string(),
        ));
    }

    let completed = state.cancellations.complete(booking_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": completed
    })))
}

#[axum::debug_handler]
pub async fn check_conflicts(
    State(state): State<Arc<BookingState>>,
    Query(query): Query<ConflictCheckQuery>,
    Extension(_user): Extension<User>,
) -> Result<Json<ConflictCheckResponse>, AppError> {
    let range = TimeRange::new(query.start_time, query.end_time)
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let conflicts = state
        .orchestrator
        .conflicts()
        .find_conflicts(query.clinician_id, &range, query.exclude_appointment_id)
        .await
        .map_err(BookingError::from)?;

    Ok(Json(ConflictCheckResponse {
        has_conflict: !conflicts.is_empty(),
        conflicting_appointments: conflicts.iter().map(|a| a.id).collect(),
    }))
}

// ==============================================================================
// PAYMENT WEBHOOK
// ==============================================================================

/// Acknowledges every verified event with 200. Only a store failure returns
/// 500, which makes the provider redeliver.
#[axum::debug_handler]
pub async fn payment_webhook(
    State(state): State<Arc<BookingState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing payment signature header".to_string()))?;

    let outcome = state
        .payment_events
        .handle_webhook(&body, signature)
        .await
        .map_err(|e| {
            if matches!(e, PaymentEventError::Transient(_)) {
                error!("Payment webhook will be retried: {}", e);
            }
            AppError::from(e)
        })?;

    Ok(Json(json!({
        "received": true,
        "result": outcome
    })))
}

// ==============================================================================
// HELPERS
// ==============================================================================

/// Runs the saga on its own task. On timeout the task keeps running and may
/// still complete the booking.
async fn with_booking_timeout<F>(state: &BookingState, saga: F) -> Result<BookingOutcome, AppError>
where
    F: Future<Output = Result<BookingOutcome, BookingError>> + Send + 'static,
{
    let limit = Duration::from_secs(state.config.booking_timeout_seconds);
    let task = tokio::spawn(saga);

    match tokio::time::timeout(limit, task).await {
        Ok(Ok(result)) => result.map_err(AppError::from),
        Ok(Err(join_error)) => {
            error!("Booking task failed: {}", join_error);
            Err(AppError::Internal("Booking task failed".to_string()))
        }
        Err(_) => {
            warn!("Booking did not finish within {:?}", limit);
            Err(AppError::Timeout(
                "Booking is taking too long; check its status before retrying".to_string(),
            ))
        }
    }
}

async fn load_appointment(state: &BookingState, booking_id: Uuid) -> Result<Appointment, AppError> {
    state
        .collaborators
        .store
        .get(booking_id)
        .await
        .map_err(BookingError::from)?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
}

fn can_view(user: &User, appointment: &Appointment) -> bool {
    if user.is_admin() {
        return true;
    }

    user.actor_id().is_some_and(|actor| {
        actor == appointment.clinician_id
            || actor == appointment.client_id
            || appointment.created_by_actor_id == Some(actor)
    })
}

fn booking_body(outcome: BookingOutcome) -> Value {
    json!({
        "success": true,
        "appointment": outcome.appointment,
        "paymentUrl": outcome.payment_url,
        "provisioning": outcome.provisioning
    })
}
