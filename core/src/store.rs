//! Storage traits.
//!
//! Every method is one atomic step: the check that protects an invariant and
//! the write that depends on it happen together inside the store, never as a
//! read in the caller followed by a write.

use crate::booking::{Booking, BookingStatus, BookingTransition};
use crate::error::ContestedResource;
use crate::trip::{Trip, TripDraft, TripStatus};
use crate::types::{BookingId, BookingReference, BusId, SeatNumber, TripId};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use thiserror::Error;

/// Failures reported by store implementations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No trip with this id.
    #[error("trip {0} not found")]
    TripNotFound(TripId),

    /// No booking with this id.
    #[error("booking {0} not found")]
    BookingNotFound(BookingId),

    /// Another active trip already holds the resource on that date.
    #[error("{resource} already taken on {date}")]
    ResourceTaken {
        /// Which resource
        resource: ContestedResource,
        /// Service date
        date: NaiveDate,
    },

    /// Seats already held on the trip.
    #[error("seats already held: {0:?}")]
    SeatsTaken(Vec<SeatNumber>),

    /// Not enough seats left.
    #[error("requested {requested} seats, {available} available")]
    InsufficientSeats {
        /// Seats requested
        requested: usize,
        /// Seats left
        available: u16,
    },

    /// The trip is not open for booking.
    #[error("trip is {0}")]
    TripNotBookable(TripStatus),

    /// Compare-and-set on trip status lost.
    #[error("trip status is {actual}, expected {expected}")]
    TripStatusChanged {
        /// Status the caller read
        expected: TripStatus,
        /// Status found in the store
        actual: TripStatus,
    },

    /// Compare-and-set on booking status lost.
    #[error("booking status is {actual}, expected {expected}")]
    BookingStatusChanged {
        /// Status the caller read
        expected: BookingStatus,
        /// Status found in the store
        actual: BookingStatus,
    },

    /// The trip has bookings, so it cannot be deleted or moved.
    #[error("trip {0} has bookings")]
    TripHasBookings(TripId),

    /// Booking reference already in use.
    #[error("booking reference {0} already exists")]
    DuplicateReference(BookingReference),

    /// Backend failure.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence of trips and their resource claims.
#[async_trait]
pub trait TripStore: Send + Sync {
    /// Inserts a trip, assigning the next trip number from the store's sequence.
    ///
    /// # Errors
    ///
    /// [`StoreError::ResourceTaken`] if the bus, driver or helper is already held
    /// by an active trip on the same date.
    async fn insert_trip(&self, draft: TripDraft) -> Result<Trip, StoreError>;

    /// Loads a trip.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] on backend failure.
    async fn trip(&self, id: TripId) -> Result<Option<Trip>, StoreError>;

    /// Replaces the trip's schedule and status if its status is still `expected`.
    ///
    /// Seat counters are owned by the store and taken from the stored row, except
    /// when the bus changes, in which case they are reset from `trip.total_seats`.
    /// Resource exclusivity is re-checked (excluding the trip itself) whenever the
    /// new status is active.
    ///
    /// # Errors
    ///
    /// - [`StoreError::TripNotFound`]
    /// - [`StoreError::TripStatusChanged`] if the status moved meanwhile
    /// - [`StoreError::TripHasBookings`] if bus or date change while seats are held
    /// - [`StoreError::ResourceTaken`]
    async fn update_trip(&self, trip: &Trip, expected: TripStatus) -> Result<Trip, StoreError>;

    /// Deletes a trip that has never been booked.
    ///
    /// # Errors
    ///
    /// - [`StoreError::TripNotFound`]
    /// - [`StoreError::TripHasBookings`] if any booking, in any status, references it
    async fn delete_trip(&self, id: TripId) -> Result<(), StoreError>;
}

/// Persistence of bookings and the seat inventory they consume.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Inserts a booking and takes its seats from the trip.
    ///
    /// Succeeds only if the trip is still `scheduled`, has enough seats left and
    /// none of the requested seats is held. Returns the trip with updated counters.
    ///
    /// # Errors
    ///
    /// - [`StoreError::TripNotFound`]
    /// - [`StoreError::TripNotBookable`]
    /// - [`StoreError::InsufficientSeats`]
    /// - [`StoreError::SeatsTaken`] naming every requested seat already held
    /// - [`StoreError::DuplicateReference`]
    async fn reserve_seats(&self, booking: &Booking) -> Result<Trip, StoreError>;

    /// Loads a booking.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] on backend failure.
    async fn booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError>;

    /// Seats held on a trip by bookings that are not cancelled.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] on backend failure.
    async fn held_seats(&self, trip_id: TripId) -> Result<BTreeSet<SeatNumber>, StoreError>;

    /// Moves a booking from `expected` to `transition.status`.
    ///
    /// When the transition releases seats, the trip counters are restored in the
    /// same atomic step. Returns the booking and its trip after the change.
    ///
    /// # Errors
    ///
    /// - [`StoreError::BookingNotFound`]
    /// - [`StoreError::BookingStatusChanged`] if the status moved meanwhile
    async fn transition_booking(
        &self,
        id: BookingId,
        expected: BookingStatus,
        transition: BookingTransition,
    ) -> Result<(Booking, Trip), StoreError>;

    /// Seats held on a bus on a date, summed over its active trips.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] on backend failure.
    async fn bus_seats_in_use(&self, bus_id: BusId, date: NaiveDate) -> Result<u32, StoreError>;
}
