//! Router wiring.

use crate::handlers::{bookings, buses, health_check, trips};
use crate::middleware::correlation_id_layer;
use crate::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

/// Builds the application router.
///
/// ```text
/// GET    /health
/// POST   /api/trips
/// GET    /api/trips/:id
/// PATCH  /api/trips/:id
/// DELETE /api/trips/:id
/// PUT    /api/trips/:id/status
/// GET    /api/trips/:id/seats
/// POST   /api/trips/:id/bookings
/// GET    /api/bookings/:id
/// POST   /api/bookings/:id/cancel
/// PUT    /api/bookings/:id/status
/// GET    /api/buses/:id/occupancy?date=YYYY-MM-DD
/// ```
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/trips", post(trips::schedule_trip))
        .route(
            "/trips/:id",
            get(trips::get_trip)
                .patch(trips::reschedule_trip)
                .delete(trips::delete_trip),
        )
        .route("/trips/:id/status", put(trips::update_trip_status))
        .route("/trips/:id/seats", get(trips::seat_map))
        .route("/trips/:id/bookings", post(trips::create_booking))
        .route("/bookings/:id", get(bookings::get_booking))
        .route("/bookings/:id/cancel", post(bookings::cancel_booking))
        .route("/bookings/:id/status", put(bookings::update_booking_status))
        .route("/buses/:id/occupancy", get(buses::bus_occupancy));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}
