//! Translation of `sqlx` failures into [`StoreError`].
//!
//! Constraint violations that back a domain invariant are mapped by constraint
//! name; everything else becomes [`StoreError::Unavailable`] and is logged.

use chrono::NaiveDate;
use coachline_core::error::ContestedResource;
use coachline_core::store::StoreError;
use coachline_core::types::{BookingReference, SeatNumber};

pub(crate) const BUS_PER_DAY: &str = "trips_active_bus_per_day";
pub(crate) const DRIVER_PER_DAY: &str = "trips_active_driver_per_day";
pub(crate) const HELPER_PER_DAY: &str = "trips_active_helper_per_day";
pub(crate) const SEAT_HELD_ONCE: &str = "booking_seats_held_once";
pub(crate) const REFERENCE_KEY: &str = "bookings_reference_key";

/// Wraps an unexpected database error.
pub(crate) fn unavailable(context: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |error| {
        tracing::error!(error = %error, context, "Database operation failed");
        StoreError::Unavailable(format!("{context}: {error}"))
    }
}

fn violated(error: &sqlx::Error) -> Option<String> {
    match error {
        sqlx::Error::Database(db) if db.is_unique_violation() => db.constraint().map(str::to_owned),
        _ => None,
    }
}

fn backstop(constraint: &'static str) {
    tracing::warn!(constraint, "Write rejected by storage constraint");
    metrics::counter!("coachline_store_constraint_rejections_total", "constraint" => constraint)
        .increment(1);
}

/// Maps a trip write failure, naming the resource whose index was violated.
pub(crate) fn trip_write(context: &'static str, date: NaiveDate) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |error| {
        let resource = match violated(&error).as_deref() {
            Some(BUS_PER_DAY) => Some((BUS_PER_DAY, ContestedResource::Bus)),
            Some(DRIVER_PER_DAY) => Some((DRIVER_PER_DAY, ContestedResource::Driver)),
            Some(HELPER_PER_DAY) => Some((HELPER_PER_DAY, ContestedResource::Helper)),
            _ => None,
        };
        match resource {
            Some((constraint, resource)) => {
                backstop(constraint);
                StoreError::ResourceTaken { resource, date }
            }
            None => unavailable(context)(error),
        }
    }
}

/// Maps a booking insert failure on a reference collision.
pub(crate) fn booking_insert(reference: BookingReference) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |error| {
        if violated(&error).as_deref() == Some(REFERENCE_KEY) {
            backstop(REFERENCE_KEY);
            StoreError::DuplicateReference(reference)
        } else {
            unavailable("inserting booking")(error)
        }
    }
}

/// Maps a seat claim failure on a concurrently held seat.
pub(crate) fn seat_claim(requested: Vec<SeatNumber>) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |error| {
        if violated(&error).as_deref() == Some(SEAT_HELD_ONCE) {
            backstop(SEAT_HELD_ONCE);
            StoreError::SeatsTaken(requested)
        } else {
            unavailable("claiming seats")(error)
        }
    }
}
