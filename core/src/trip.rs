//! Trips: one scheduled run of a bus over a route on a service date.
//!
//! # State Machine
//!
//! ```text
//!             ┌──────────► delayed ◄──────────┐
//!             │               │  │            │
//!             │               ▼  ▼            │
//! scheduled ──┴──────► in_progress ───────────┴──► completed
//!    │   ▲                    │
//!    │   └── (from delayed)   │
//!    ▼                        ▼
//! cancelled ◄─────────────────┘   (cancelled reachable from every non-terminal status)
//! ```
//!
//! Only `scheduled` and `in_progress` trips hold their bus, driver and helper for
//! the service date. Only `scheduled` trips accept bookings.

use crate::error::DomainError;
use crate::types::{BusId, Money, RouteId, ServiceTime, TripId, TripNumber, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a trip.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    /// Planned and open for booking
    Scheduled,
    /// The bus is on the road
    InProgress,
    /// The run finished (terminal)
    Completed,
    /// The run was called off (terminal)
    Cancelled,
    /// Departure postponed; resources are not held while delayed
    Delayed,
}

impl TripStatus {
    /// All statuses, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Scheduled,
        Self::InProgress,
        Self::Completed,
        Self::Cancelled,
        Self::Delayed,
    ];

    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Delayed => "delayed",
        }
    }

    /// Whether a trip in this status holds its bus, driver and helper for the day.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Scheduled | Self::InProgress)
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// The single transition table for trips.
    #[must_use]
    pub const fn allowed_transitions(&self) -> &'static [Self] {
        match self {
            Self::Scheduled => &[Self::InProgress, Self::Delayed, Self::Cancelled],
            Self::Delayed => &[Self::Scheduled, Self::InProgress, Self::Cancelled],
            Self::InProgress => &[Self::Completed, Self::Delayed, Self::Cancelled],
            Self::Completed | Self::Cancelled => &[],
        }
    }

    /// Whether `next` may replace this status.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Validates a transition against the table.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidState`] when the table forbids it.
    pub fn transition(self, next: Self) -> Result<Self, DomainError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else if self.is_terminal() {
            Err(DomainError::invalid_state(format!(
                "trip is {self}, which is terminal"
            )))
        } else {
            Err(DomainError::invalid_state(format!(
                "trip cannot move from {self} to {next}"
            )))
        }
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TripStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown trip status '{s}'")))
    }
}

/// A scheduled trip with its own seat inventory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    /// Opaque identifier
    pub id: TripId,
    /// Sequential display number (`TR-001`)
    pub trip_number: TripNumber,
    /// Route served
    pub route_id: RouteId,
    /// Bus assigned
    pub bus_id: BusId,
    /// Driver assigned
    pub driver_id: UserId,
    /// Optional helper
    pub helper_id: Option<UserId>,
    /// Departure time of day
    pub departure_time: ServiceTime,
    /// Arrival time of day
    pub arrival_time: ServiceTime,
    /// Service date
    pub departure_date: NaiveDate,
    /// Where passengers may board
    pub pickup_points: Vec<String>,
    /// Where passengers may alight
    pub drop_points: Vec<String>,
    /// Flat per-seat price
    pub fare: Money,
    /// Seat count of the bus at the time it was assigned
    pub total_seats: u16,
    /// Seats not held by any live booking
    pub available_seats: u16,
    /// Seats held by live bookings
    pub total_bookings: u16,
    /// Lifecycle status
    pub status: TripStatus,
    /// When the trip was scheduled
    pub created_at: DateTime<Utc>,
    /// Last modification
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    /// Departure instant (service date at departure time, UTC).
    #[must_use]
    pub fn departs_at(&self) -> DateTime<Utc> {
        self.departure_date
            .and_time(self.departure_time.as_naive())
            .and_utc()
    }

    /// Whether the trip accepts new bookings right now.
    #[must_use]
    pub fn is_bookable(&self) -> bool {
        self.status == TripStatus::Scheduled
    }

    /// Flat total for `seats` seats.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Validation`] if the amount overflows.
    pub fn fare_for(&self, seats: usize) -> Result<Money, DomainError> {
        u64::try_from(seats)
            .ok()
            .and_then(|count| self.fare.checked_mul(count))
            .ok_or_else(|| DomainError::validation("booking total is too large"))
    }

    /// Whether `user` drives or assists on this trip.
    #[must_use]
    pub fn is_crewed_by(&self, user: UserId) -> bool {
        self.driver_id == user || self.helper_id == Some(user)
    }
}

/// Everything needed to insert a trip; the store assigns the trip number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TripDraft {
    /// Pre-generated identifier
    pub id: TripId,
    /// Route served
    pub route_id: RouteId,
    /// Bus assigned
    pub bus_id: BusId,
    /// Driver assigned
    pub driver_id: UserId,
    /// Optional helper
    pub helper_id: Option<UserId>,
    /// Departure time of day
    pub departure_time: ServiceTime,
    /// Arrival time of day
    pub arrival_time: ServiceTime,
    /// Service date
    pub departure_date: NaiveDate,
    /// Boarding points
    pub pickup_points: Vec<String>,
    /// Alighting points
    pub drop_points: Vec<String>,
    /// Flat per-seat price
    pub fare: Money,
    /// Seat count taken from the bus
    pub total_seats: u16,
    /// Scheduling instant
    pub created_at: DateTime<Utc>,
}

impl TripDraft {
    /// Materializes the trip once the store has assigned a number.
    ///
    /// Seat counters start full and the status starts at `scheduled`.
    #[must_use]
    pub fn into_trip(self, trip_number: TripNumber) -> Trip {
        Trip {
            id: self.id,
            trip_number,
            route_id: self.route_id,
            bus_id: self.bus_id,
            driver_id: self.driver_id,
            helper_id: self.helper_id,
            departure_time: self.departure_time,
            arrival_time: self.arrival_time,
            departure_date: self.departure_date,
            pickup_points: self.pickup_points,
            drop_points: self.drop_points,
            fare: self.fare,
            total_seats: self.total_seats,
            available_seats: self.total_seats,
            total_bookings: 0,
            status: TripStatus::Scheduled,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}
