//! Booking endpoints:
//! - GET /api/bookings/:id - Booking with trip, bus, route and passenger
//! - POST /api/bookings/:id/cancel - Cancel with refund
//! - PUT /api/bookings/:id/status - Status transition

use crate::error::AppError;
use crate::extractors::{ActorContext, ApiJson, ApiPath};
use crate::state::AppState;
use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use coachline_core::booking::BookingStatus;
use coachline_core::types::BookingId;
use coachline_runtime::{BookingStatusUpdate, BookingView, CancellationOutcome};
use serde::Deserialize;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Optional body of `POST /api/bookings/:id/cancel`.
#[derive(Debug, Default, Deserialize)]
pub struct CancelBookingRequest {
    /// Free-text reason stored on the booking
    #[serde(default)]
    pub reason: Option<String>,
}

/// Body of `PUT /api/bookings/:id/status`.
#[derive(Debug, Deserialize)]
pub struct UpdateBookingStatusRequest {
    /// Target status
    pub status: BookingStatus,
}

// ============================================================================
// Handlers
// ============================================================================

/// Booking details for its owner, the bus operator or an admin.
///
/// # Errors
///
/// 404 for an unknown booking, 403 for anyone else.
pub async fn get_booking(
    State(state): State<AppState>,
    ActorContext(actor): ActorContext,
    ApiPath(booking_id): ApiPath<BookingId>,
) -> Result<Json<BookingView>, AppError> {
    Ok(Json(state.engine.reservations.get_booking(booking_id, &actor).await?))
}

/// Cancel a booking. The body is optional.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/bookings/<id>/cancel \
///   -H "X-Actor-Id: <customer uuid>" -H "X-Actor-Role: customer" \
///   -d '{"reason":"plans changed"}'
/// ```
///
/// # Errors
///
/// 409 if the booking is already cancelled or completed.
pub async fn cancel_booking(
    State(state): State<AppState>,
    ActorContext(actor): ActorContext,
    ApiPath(booking_id): ApiPath<BookingId>,
    body: Bytes,
) -> Result<Json<CancellationOutcome>, AppError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        CancelBookingRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            AppError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
                format!("invalid cancellation body: {e}"),
            )
        })?
    };

    let outcome = state
        .engine
        .reservations
        .cancel_booking(booking_id, request.reason, &actor)
        .await?;
    Ok(Json(outcome))
}

/// Apply a booking status transition.
///
/// # Errors
///
/// 409 for a transition the table forbids, 403 for a customer doing
/// anything but cancelling.
pub async fn update_booking_status(
    State(state): State<AppState>,
    ActorContext(actor): ActorContext,
    ApiPath(booking_id): ApiPath<BookingId>,
    ApiJson(request): ApiJson<UpdateBookingStatusRequest>,
) -> Result<Json<BookingStatusUpdate>, AppError> {
    let update = state
        .engine
        .reservations
        .update_booking_status(booking_id, request.status, &actor)
        .await?;
    Ok(Json(update))
}
