//! [`TripStore`] over the `trips` table.

use crate::error::{trip_write, unavailable};
use crate::rows::{self, active_statuses, int, minor_units, trip_columns};
use crate::{commit, PostgresStore};
use async_trait::async_trait;
use chrono::NaiveDate;
use coachline_core::error::ContestedResource;
use coachline_core::store::{StoreError, TripStore};
use coachline_core::trip::{Trip, TripDraft, TripStatus};
use coachline_core::types::{BusId, TripId, TripNumber, UserId};
use sqlx::PgConnection;

/// Resources a trip claims on its service date.
struct Claim {
    trip: Option<TripId>,
    bus: BusId,
    driver: UserId,
    helper: Option<UserId>,
    date: NaiveDate,
}

/// Fails with the first contested resource, checked bus, driver, then helper.
///
/// The partial unique indexes reject whatever slips past this check between
/// concurrent transactions.
async fn ensure_free(conn: &mut PgConnection, claim: &Claim) -> Result<(), StoreError> {
    let rivals: Vec<(bool, bool, bool)> = sqlx::query_as(concat!(
        "SELECT bus_id = $2, driver_id = $3, COALESCE(helper_id = $4, FALSE)
         FROM trips
         WHERE departure_date = $1
           AND status IN ",
        active_statuses!(),
        " AND ($5::uuid IS NULL OR id <> $5)
           AND (bus_id = $2 OR driver_id = $3 OR ($4::uuid IS NOT NULL AND helper_id = $4))"
    ))
    .bind(claim.date)
    .bind(*claim.bus.as_uuid())
    .bind(*claim.driver.as_uuid())
    .bind(claim.helper.map(|id| *id.as_uuid()))
    .bind(claim.trip.map(|id| *id.as_uuid()))
    .fetch_all(&mut *conn)
    .await
    .map_err(unavailable("checking resource claims"))?;

    let resource = if rivals.iter().any(|(bus, _, _)| *bus) {
        Some(ContestedResource::Bus)
    } else if rivals.iter().any(|(_, driver, _)| *driver) {
        Some(ContestedResource::Driver)
    } else if rivals.iter().any(|(_, _, helper)| *helper) {
        Some(ContestedResource::Helper)
    } else {
        None
    };
    match resource {
        Some(resource) => Err(StoreError::ResourceTaken {
            resource,
            date: claim.date,
        }),
        None => Ok(()),
    }
}

pub(crate) async fn lock_trip(conn: &mut PgConnection, id: TripId) -> Result<Trip, StoreError> {
    let row = sqlx::query(concat!(
        "SELECT ",
        trip_columns!(),
        " FROM trips WHERE id = $1 FOR UPDATE"
    ))
    .bind(*id.as_uuid())
    .fetch_optional(&mut *conn)
    .await
    .map_err(unavailable("locking trip"))?
    .ok_or(StoreError::TripNotFound(id))?;
    rows::trip(&row)
}

#[async_trait]
impl TripStore for PostgresStore {
    #[tracing::instrument(skip(self, draft), fields(trip_id = %draft.id, bus_id = %draft.bus_id))]
    async fn insert_trip(&self, draft: TripDraft) -> Result<Trip, StoreError> {
        let mut tx = self.begin().await?;
        ensure_free(
            &mut tx,
            &Claim {
                trip: None,
                bus: draft.bus_id,
                driver: draft.driver_id,
                helper: draft.helper_id,
                date: draft.departure_date,
            },
        )
        .await?;

        let (sequence,): (i64,) = sqlx::query_as("SELECT nextval('trip_number_seq')")
            .fetch_one(&mut *tx)
            .await
            .map_err(unavailable("allocating trip number"))?;
        let sequence = u64::try_from(sequence)
            .map_err(|_| StoreError::Unavailable(format!("trip_number_seq returned {sequence}")))?;
        let trip = draft.into_trip(TripNumber::from_sequence(sequence));

        sqlx::query(concat!(
            "INSERT INTO trips (",
            trip_columns!(),
            ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)"
        ))
        .bind(*trip.id.as_uuid())
        .bind(trip.trip_number.as_str())
        .bind(*trip.route_id.as_uuid())
        .bind(*trip.bus_id.as_uuid())
        .bind(*trip.driver_id.as_uuid())
        .bind(trip.helper_id.map(|id| *id.as_uuid()))
        .bind(trip.departure_time.as_naive())
        .bind(trip.arrival_time.as_naive())
        .bind(trip.departure_date)
        .bind(&trip.pickup_points)
        .bind(&trip.drop_points)
        .bind(minor_units(trip.fare)?)
        .bind(int(trip.total_seats))
        .bind(int(trip.available_seats))
        .bind(int(trip.total_bookings))
        .bind(trip.status.as_str())
        .bind(trip.created_at)
        .bind(trip.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(trip_write("inserting trip", trip.departure_date))?;

        commit(tx).await?;
        Ok(trip)
    }

    async fn trip(&self, id: TripId) -> Result<Option<Trip>, StoreError> {
        let row = sqlx::query(concat!("SELECT ", trip_columns!(), " FROM trips WHERE id = $1"))
            .bind(*id.as_uuid())
            .fetch_optional(self.pool())
            .await
            .map_err(unavailable("loading trip"))?;
        row.as_ref().map(rows::trip).transpose()
    }

    #[tracing::instrument(skip(self, trip), fields(trip_id = %trip.id, status = %trip.status))]
    async fn update_trip(&self, trip: &Trip, expected: TripStatus) -> Result<Trip, StoreError> {
        let mut tx = self.begin().await?;
        let stored = lock_trip(&mut tx, trip.id).await?;

        if stored.status != expected {
            return Err(StoreError::TripStatusChanged {
                expected,
                actual: stored.status,
            });
        }

        let bus_changed = stored.bus_id != trip.bus_id;
        let moved = bus_changed || stored.departure_date != trip.departure_date;
        if moved && stored.total_bookings > 0 {
            return Err(StoreError::TripHasBookings(trip.id));
        }

        if trip.status.is_active() {
            ensure_free(
                &mut tx,
                &Claim {
                    trip: Some(trip.id),
                    bus: trip.bus_id,
                    driver: trip.driver_id,
                    helper: trip.helper_id,
                    date: trip.departure_date,
                },
            )
            .await?;
        }

        let (total_seats, available_seats, total_bookings) = if bus_changed {
            (trip.total_seats, trip.total_seats, 0)
        } else {
            (stored.total_seats, stored.available_seats, stored.total_bookings)
        };
        let updated = Trip {
            id: stored.id,
            trip_number: stored.trip_number,
            created_at: stored.created_at,
            total_seats,
            available_seats,
            total_bookings,
            ..trip.clone()
        };

        sqlx::query(
            "UPDATE trips
             SET route_id = $2, bus_id = $3, driver_id = $4, helper_id = $5,
                 departure_time = $6, arrival_time = $7, departure_date = $8,
                 pickup_points = $9, drop_points = $10, fare = $11,
                 total_seats = $12, available_seats = $13, total_bookings = $14,
                 status = $15, updated_at = $16
             WHERE id = $1",
        )
        .bind(*updated.id.as_uuid())
        .bind(*updated.route_id.as_uuid())
        .bind(*updated.bus_id.as_uuid())
        .bind(*updated.driver_id.as_uuid())
        .bind(updated.helper_id.map(|id| *id.as_uuid()))
        .bind(updated.departure_time.as_naive())
        .bind(updated.arrival_time.as_naive())
        .bind(updated.departure_date)
        .bind(&updated.pickup_points)
        .bind(&updated.drop_points)
        .bind(minor_units(updated.fare)?)
        .bind(int(updated.total_seats))
        .bind(int(updated.available_seats))
        .bind(int(updated.total_bookings))
        .bind(updated.status.as_str())
        .bind(updated.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(trip_write("updating trip", updated.departure_date))?;

        commit(tx).await?;
        Ok(updated)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_trip(&self, id: TripId) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;
        lock_trip(&mut tx, id).await?;

        let (booked,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM bookings WHERE trip_id = $1)")
                .bind(*id.as_uuid())
                .fetch_one(&mut *tx)
                .await
                .map_err(unavailable("checking trip bookings"))?;
        if booked {
            return Err(StoreError::TripHasBookings(id));
        }

        sqlx::query("DELETE FROM trips WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(unavailable("deleting trip"))?;
        commit(tx).await
    }
}

/// Seats held on a bus on a date, summed over its active trips.
pub(crate) async fn bus_seats_in_use(
    store: &PostgresStore,
    bus_id: BusId,
    date: NaiveDate,
) -> Result<u32, StoreError> {
    let (total,): (i64,) = sqlx::query_as(concat!(
        "SELECT COALESCE(SUM(total_bookings), 0)::BIGINT
         FROM trips
         WHERE bus_id = $1 AND departure_date = $2 AND status IN ",
        active_statuses!()
    ))
    .bind(*bus_id.as_uuid())
    .bind(date)
    .fetch_one(store.pool())
    .await
    .map_err(unavailable("summing bus occupancy"))?;
    u32::try_from(total).map_err(|_| StoreError::Unavailable(format!("occupancy out of range: {total}")))
}
