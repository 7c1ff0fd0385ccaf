//! [`BookingStore`] over `bookings` and `booking_seats`.

use crate::error::{booking_insert, seat_claim, unavailable};
use crate::rows::{self, booking_columns, int, minor_units, trip_columns};
use crate::trips::{bus_seats_in_use, lock_trip};
use crate::{commit, PostgresStore};
use async_trait::async_trait;
use chrono::NaiveDate;
use coachline_core::booking::{Booking, BookingStatus, BookingTransition};
use coachline_core::store::{BookingStore, StoreError};
use coachline_core::trip::Trip;
use coachline_core::types::{BookingId, BusId, SeatNumber, TripId};
use sqlx::types::Json;
use std::collections::BTreeSet;

fn seat_count(count: usize) -> Result<i32, StoreError> {
    i32::try_from(count).map_err(|_| StoreError::Unavailable(format!("seat count out of range: {count}")))
}

#[async_trait]
impl BookingStore for PostgresStore {
    #[tracing::instrument(skip(self, booking), fields(trip_id = %booking.trip_id, seats = booking.seat_count()))]
    async fn reserve_seats(&self, booking: &Booking) -> Result<Trip, StoreError> {
        let mut tx = self.begin().await?;
        let trip = lock_trip(&mut tx, booking.trip_id).await?;

        if !trip.is_bookable() {
            return Err(StoreError::TripNotBookable(trip.status));
        }
        let requested = booking.seat_count();
        if !u16::try_from(requested).is_ok_and(|count| count <= trip.available_seats) {
            return Err(StoreError::InsufficientSeats {
                requested,
                available: trip.available_seats,
            });
        }

        let seats = booking.seat_numbers();
        let numbers: Vec<i32> = seats.iter().map(|seat| int(seat.get())).collect();
        let taken: Vec<(i32,)> = sqlx::query_as(
            "SELECT seat_number FROM booking_seats
             WHERE trip_id = $1 AND active AND seat_number = ANY($2)
             ORDER BY seat_number",
        )
        .bind(*trip.id.as_uuid())
        .bind(&numbers)
        .fetch_all(&mut *tx)
        .await
        .map_err(unavailable("checking held seats"))?;
        if !taken.is_empty() {
            let taken = taken
                .into_iter()
                .map(|(seat,)| rows::seat_number(seat))
                .collect::<Result<Vec<_>, _>>()?;
            return Err(StoreError::SeatsTaken(taken));
        }

        sqlx::query(concat!(
            "INSERT INTO bookings (",
            booking_columns!(),
            ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)"
        ))
        .bind(*booking.id.as_uuid())
        .bind(booking.reference.as_str())
        .bind(*booking.user_id.as_uuid())
        .bind(*booking.trip_id.as_uuid())
        .bind(*booking.bus_id.as_uuid())
        .bind(*booking.route_id.as_uuid())
        .bind(Json(&booking.seats))
        .bind(&booking.boarding_point)
        .bind(&booking.dropping_point)
        .bind(booking.journey_date)
        .bind(minor_units(booking.total_amount)?)
        .bind(booking.refund_amount.map(minor_units).transpose()?)
        .bind(booking.status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(booking.payment_method.as_str())
        .bind(booking.cancellation_reason.as_deref())
        .bind(booking.cancelled_at)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(booking_insert(booking.reference.clone()))?;

        sqlx::query(
            "INSERT INTO booking_seats (booking_id, trip_id, seat_number)
             SELECT $1, $2, UNNEST($3::INTEGER[])",
        )
        .bind(*booking.id.as_uuid())
        .bind(*trip.id.as_uuid())
        .bind(&numbers)
        .execute(&mut *tx)
        .await
        .map_err(seat_claim(seats))?;

        let row = sqlx::query(concat!(
            "UPDATE trips
             SET available_seats = available_seats - $2,
                 total_bookings = total_bookings + $2,
                 updated_at = $3
             WHERE id = $1
             RETURNING ",
            trip_columns!()
        ))
        .bind(*trip.id.as_uuid())
        .bind(seat_count(requested)?)
        .bind(booking.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(unavailable("taking seats from trip"))?;
        let trip = rows::trip(&row)?;

        commit(tx).await?;
        Ok(trip)
    }

    async fn booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query(concat!(
            "SELECT ",
            booking_columns!(),
            " FROM bookings WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(self.pool())
        .await
        .map_err(unavailable("loading booking"))?;
        row.as_ref().map(rows::booking).transpose()
    }

    async fn held_seats(&self, trip_id: TripId) -> Result<BTreeSet<SeatNumber>, StoreError> {
        let held: Vec<(i32,)> =
            sqlx::query_as("SELECT seat_number FROM booking_seats WHERE trip_id = $1 AND active")
                .bind(*trip_id.as_uuid())
                .fetch_all(self.pool())
                .await
                .map_err(unavailable("loading held seats"))?;
        held.into_iter().map(|(seat,)| rows::seat_number(seat)).collect()
    }

    #[tracing::instrument(skip(self, transition), fields(to = %transition.status))]
    async fn transition_booking(
        &self,
        id: BookingId,
        expected: BookingStatus,
        transition: BookingTransition,
    ) -> Result<(Booking, Trip), StoreError> {
        let mut tx = self.begin().await?;

        let row = sqlx::query(concat!(
            "SELECT ",
            booking_columns!(),
            " FROM bookings WHERE id = $1 FOR UPDATE"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(unavailable("locking booking"))?
        .ok_or(StoreError::BookingNotFound(id))?;
        let mut booking = rows::booking(&row)?;

        if booking.status != expected {
            return Err(StoreError::BookingStatusChanged {
                expected,
                actual: booking.status,
            });
        }

        let mut trip = lock_trip(&mut tx, booking.trip_id).await?;
        if transition.releases_seats() && expected.holds_seats() {
            sqlx::query("UPDATE booking_seats SET active = FALSE WHERE booking_id = $1")
                .bind(*booking.id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(unavailable("releasing seats"))?;

            let row = sqlx::query(concat!(
                "UPDATE trips
                 SET available_seats = available_seats + $2,
                     total_bookings = total_bookings - $2,
                     updated_at = $3
                 WHERE id = $1
                 RETURNING ",
                trip_columns!()
            ))
            .bind(*trip.id.as_uuid())
            .bind(seat_count(booking.seat_count())?)
            .bind(transition.updated_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(unavailable("returning seats to trip"))?;
            trip = rows::trip(&row)?;
        }

        booking.apply(&transition);
        sqlx::query(
            "UPDATE bookings
             SET status = $2, payment_status = $3, cancellation_reason = $4,
                 cancelled_at = $5, refund_amount = $6, updated_at = $7
             WHERE id = $1",
        )
        .bind(*booking.id.as_uuid())
        .bind(booking.status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(booking.cancellation_reason.as_deref())
        .bind(booking.cancelled_at)
        .bind(booking.refund_amount.map(minor_units).transpose()?)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(unavailable("updating booking"))?;

        commit(tx).await?;
        Ok((booking, trip))
    }

    async fn bus_seats_in_use(&self, bus_id: BusId, date: NaiveDate) -> Result<u32, StoreError> {
        bus_seats_in_use(self, bus_id, date).await
    }
}
