//! `GET /api/buses/:id/occupancy?date=YYYY-MM-DD`

use crate::error::AppError;
use crate::extractors::{ActorContext, ApiPath, ApiQuery};
use crate::state::AppState;
use axum::{extract::State, Json};
use chrono::NaiveDate;
use coachline_core::types::BusId;
use coachline_runtime::BusOccupancy;
use serde::Deserialize;

/// Query string of the occupancy endpoint.
#[derive(Debug, Deserialize)]
pub struct OccupancyQuery {
    /// Service date
    pub date: NaiveDate,
}

/// Seats in use across a bus's active trips on one date.
///
/// # Errors
///
/// 404 for an unknown bus, 422 for a missing or malformed date.
pub async fn bus_occupancy(
    State(state): State<AppState>,
    ActorContext(actor): ActorContext,
    ApiPath(bus_id): ApiPath<BusId>,
    ApiQuery(query): ApiQuery<OccupancyQuery>,
) -> Result<Json<BusOccupancy>, AppError> {
    tracing::debug!(actor = %actor.id, %bus_id, date = %query.date, "Occupancy lookup");
    Ok(Json(
        state
            .engine
            .reservations
            .bus_occupancy(bus_id, query.date)
            .await?,
    ))
}
