//! Trip endpoints:
//! - POST /api/trips - Schedule a trip (operator or admin)
//! - GET /api/trips/:id - Trip details
//! - PATCH /api/trips/:id - Reschedule
//! - PUT /api/trips/:id/status - Lifecycle transition
//! - DELETE /api/trips/:id - Delete a trip without bookings
//! - GET /api/trips/:id/seats - Seat map
//! - POST /api/trips/:id/bookings - Book seats

use crate::error::AppError;
use crate::extractors::{ActorContext, ApiJson, ApiPath};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use coachline_core::trip::{Trip, TripStatus};
use coachline_core::types::TripId;
use coachline_runtime::{BookingView, CreateBooking, RescheduleTrip, ScheduleTrip, SeatMap};
use serde::Deserialize;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Body of `PUT /api/trips/:id/status`.
#[derive(Debug, Deserialize)]
pub struct UpdateTripStatusRequest {
    /// Target status
    pub status: TripStatus,
}

// ============================================================================
// Handlers
// ============================================================================

/// Schedule a trip.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/trips \
///   -H "X-Actor-Id: <operator uuid>" -H "X-Actor-Role: bus_operator" \
///   -H "Content-Type: application/json" \
///   -d '{"routeId":"...","busId":"...","driverId":"...",
///        "departureTime":"08:00","arrivalTime":"14:30",
///        "departureDate":"2026-11-02","fare":50000}'
/// ```
///
/// # Errors
///
/// 422 on malformed input, 409 when the bus or crew is already committed
/// that day, 403 when the bus belongs to another operator.
pub async fn schedule_trip(
    State(state): State<AppState>,
    ActorContext(actor): ActorContext,
    ApiJson(request): ApiJson<ScheduleTrip>,
) -> Result<(StatusCode, Json<Trip>), AppError> {
    let trip = state.engine.scheduler.schedule(request, &actor).await?;
    Ok((StatusCode::CREATED, Json(trip)))
}

/// Trip details. No actor required.
///
/// # Errors
///
/// 404 for an unknown trip.
pub async fn get_trip(
    State(state): State<AppState>,
    ApiPath(trip_id): ApiPath<TripId>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(state.engine.scheduler.get(trip_id).await?))
}

/// Apply a partial schedule change.
///
/// # Errors
///
/// 409 when the new assignment conflicts or the trip is no longer editable.
pub async fn reschedule_trip(
    State(state): State<AppState>,
    ActorContext(actor): ActorContext,
    ApiPath(trip_id): ApiPath<TripId>,
    ApiJson(changes): ApiJson<RescheduleTrip>,
) -> Result<Json<Trip>, AppError> {
    let trip = state
        .engine
        .scheduler
        .reschedule(trip_id, changes, &actor)
        .await?;
    Ok(Json(trip))
}

/// Move a trip through its lifecycle.
///
/// # Errors
///
/// 409 for a transition the lifecycle forbids.
pub async fn update_trip_status(
    State(state): State<AppState>,
    ActorContext(actor): ActorContext,
    ApiPath(trip_id): ApiPath<TripId>,
    ApiJson(request): ApiJson<UpdateTripStatusRequest>,
) -> Result<Json<Trip>, AppError> {
    let trip = state
        .engine
        .scheduler
        .update_status(trip_id, request.status, &actor)
        .await?;
    Ok(Json(trip))
}

/// Delete a trip.
///
/// # Errors
///
/// 409 if any booking references the trip.
pub async fn delete_trip(
    State(state): State<AppState>,
    ActorContext(actor): ActorContext,
    ApiPath(trip_id): ApiPath<TripId>,
) -> Result<StatusCode, AppError> {
    state.engine.scheduler.delete(trip_id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Held and free seats. No actor required.
///
/// # Errors
///
/// 404 for an unknown trip.
pub async fn seat_map(
    State(state): State<AppState>,
    ApiPath(trip_id): ApiPath<TripId>,
) -> Result<Json<SeatMap>, AppError> {
    Ok(Json(state.engine.reservations.seat_map(trip_id).await?))
}

/// Book seats on a trip for the calling customer.
///
/// # Errors
///
/// 409 with `SEAT_CONFLICT` or `CAPACITY_EXCEEDED` details when the seats
/// cannot be had.
pub async fn create_booking(
    State(state): State<AppState>,
    ActorContext(actor): ActorContext,
    ApiPath(trip_id): ApiPath<TripId>,
    ApiJson(request): ApiJson<CreateBooking>,
) -> Result<(StatusCode, Json<BookingView>), AppError> {
    let view = state
        .engine
        .reservations
        .create_booking(trip_id, request, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}
