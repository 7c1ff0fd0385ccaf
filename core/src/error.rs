//! Error taxonomy for the allocation and reservation engine.
//!
//! Every variant except [`DomainError::Internal`] is a recoverable, user-facing
//! rejection: it is returned synchronously with an explanatory message and the
//! caller decides whether to resubmit. Nothing in the engine retries.

use crate::store::StoreError;
use crate::types::{format_seats, SeatNumber};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A physical resource that a trip claims for a whole service date.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContestedResource {
    /// The bus itself
    Bus,
    /// The assigned driver
    Driver,
    /// The assigned helper
    Helper,
}

impl ContestedResource {
    /// Lowercase label used in messages and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bus => "bus",
            Self::Driver => "driver",
            Self::Helper => "helper",
        }
    }
}

impl fmt::Display for ContestedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by every scheduler and reservation operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Referenced trip/booking/bus/route/user does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of record that was looked up
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Malformed input.
    #[error("{0}")]
    Validation(String),

    /// Bus, driver or helper already committed to another active trip that day.
    #[error("{resource} is already assigned to another active trip on {date}")]
    ResourceConflict {
        /// Which resource collided
        resource: ContestedResource,
        /// The contested service date
        date: NaiveDate,
    },

    /// Requested seats are held by another booking on the trip.
    #[error("seats already booked on this trip: {}", format_seats(.seats))]
    SeatConflict {
        /// Offending seat numbers, sorted ascending
        seats: Vec<SeatNumber>,
    },

    /// Requested seat count exceeds the trip's remaining inventory.
    #[error("requested {requested} seats but only {available} are available")]
    CapacityExceeded {
        /// Number of seats in the request
        requested: usize,
        /// Seats left on the trip
        available: u16,
    },

    /// Current trip or booking status forbids the operation.
    #[error("{0}")]
    InvalidState(String),

    /// Actor lacks rights over the target booking or trip.
    #[error("{0}")]
    Forbidden(String),

    /// Storage-level conflict the caller may resolve by resubmitting.
    #[error("{0}")]
    Conflict(String),

    /// Unexpected failure (storage unavailable, corrupted row, ...).
    ///
    /// The message is for logs only and must not reach clients.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Shorthand for [`DomainError::NotFound`].
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for [`DomainError::Validation`].
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Shorthand for [`DomainError::InvalidState`].
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Shorthand for [`DomainError::Forbidden`].
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Builds a [`DomainError::SeatConflict`] with seats sorted and deduplicated.
    #[must_use]
    pub fn seat_conflict(mut seats: Vec<SeatNumber>) -> Self {
        seats.sort_unstable();
        seats.dedup();
        Self::SeatConflict { seats }
    }

    /// Stable machine-readable code for the error kind.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::ResourceConflict { .. } => "RESOURCE_CONFLICT",
            Self::SeatConflict { .. } => "SEAT_CONFLICT",
            Self::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Conflict(_) => "CONFLICT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether this is an unexpected failure rather than a business rejection.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

impl From<StoreError> for DomainError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::TripNotFound(id) => Self::not_found("trip", id),
            StoreError::BookingNotFound(id) => Self::not_found("booking", id),
            StoreError::ResourceTaken { resource, date } => {
                Self::ResourceConflict { resource, date }
            }
            StoreError::SeatsTaken(seats) => Self::seat_conflict(seats),
            StoreError::InsufficientSeats {
                requested,
                available,
            } => Self::CapacityExceeded {
                requested,
                available,
            },
            StoreError::TripNotBookable(status) => {
                Self::invalid_state(format!("trip is {status} and no longer accepts bookings"))
            }
            StoreError::TripStatusChanged { expected, actual } => Self::invalid_state(format!(
                "trip status changed concurrently (expected {expected}, found {actual})"
            )),
            StoreError::BookingStatusChanged { expected, actual } => {
                Self::invalid_state(format!(
                    "booking status changed concurrently (expected {expected}, found {actual})"
                ))
            }
            StoreError::TripHasBookings(id) => {
                Self::Conflict(format!("trip {id} has bookings and cannot be changed this way"))
            }
            StoreError::DuplicateReference(reference) => Self::Conflict(format!(
                "booking reference {reference} collided, please retry"
            )),
            StoreError::Unavailable(message) => Self::Internal(message),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::booking::BookingStatus;
    use crate::types::BookingReference;

    #[test]
    fn seat_conflict_names_sorted_seats() {
        let err = DomainError::seat_conflict(vec![SeatNumber::new(7), SeatNumber::new(5), SeatNumber::new(7)]);
        assert_eq!(err.to_string(), "seats already booked on this trip: 5, 7");
        assert_eq!(err.code(), "SEAT_CONFLICT");
    }

    #[test]
    fn resource_conflict_names_resource() {
        let date = NaiveDate::from_ymd_opt(2026, 11, 2).unwrap();
        let err = DomainError::ResourceConflict {
            resource: ContestedResource::Driver,
            date,
        };
        assert_eq!(
            err.to_string(),
            "driver is already assigned to another active trip on 2026-11-02"
        );
    }

    #[test]
    fn store_errors_map_to_taxonomy() {
        let err: DomainError = StoreError::SeatsTaken(vec![SeatNumber::new(5)]).into();
        assert!(matches!(err, DomainError::SeatConflict { .. }));

        let err: DomainError = StoreError::BookingStatusChanged {
            expected: BookingStatus::Pending,
            actual: BookingStatus::Cancelled,
        }
        .into();
        assert_eq!(err.code(), "INVALID_STATE");

        let err: DomainError = StoreError::DuplicateReference(BookingReference::new("bkx")).into();
        assert_eq!(err.code(), "CONFLICT");

        let err: DomainError = StoreError::Unavailable("pool timed out".to_string()).into();
        assert!(err.is_internal());
    }
}
