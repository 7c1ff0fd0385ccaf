//! Response shapes returned by the reservation manager.

use chrono::NaiveDate;
use coachline_core::booking::Booking;
use coachline_core::refund::RefundQuote;
use coachline_core::registry::{Bus, Route, UserProfile};
use coachline_core::trip::Trip;
use coachline_core::types::{BusId, Money, SeatNumber, ServiceTime, TripId, TripNumber, UserId};
use serde::Serialize;

/// Who booked, for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassengerContact {
    /// Account id
    pub id: UserId,
    /// Display name
    pub name: String,
    /// Phone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl From<UserProfile> for PassengerContact {
    fn from(user: UserProfile) -> Self {
        Self {
            id: user.id,
            name: user.name,
            phone: user.phone,
        }
    }
}

/// Bus details, for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusSummary {
    /// Bus id
    pub id: BusId,
    /// Display name
    pub name: String,
    /// Licence plate
    pub registration_number: String,
}

impl From<Bus> for BusSummary {
    fn from(bus: Bus) -> Self {
        Self {
            id: bus.id,
            name: bus.name,
            registration_number: bus.registration_number,
        }
    }
}

/// Trip details, for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripSummary {
    /// Trip id
    pub id: TripId,
    /// `TR-001`
    pub trip_number: TripNumber,
    /// Departure time
    pub departure_time: ServiceTime,
    /// Arrival time
    pub arrival_time: ServiceTime,
    /// Service date
    pub departure_date: NaiveDate,
    /// Per-seat fare
    pub fare: Money,
}

impl From<&Trip> for TripSummary {
    fn from(trip: &Trip) -> Self {
        Self {
            id: trip.id,
            trip_number: trip.trip_number.clone(),
            departure_time: trip.departure_time,
            arrival_time: trip.arrival_time,
            departure_date: trip.departure_date,
            fare: trip.fare,
        }
    }
}

/// A booking with its related records attached.
///
/// Related records that no longer exist in the registry are omitted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    /// The booking itself
    #[serde(flatten)]
    pub booking: Booking,
    /// Trip display fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip: Option<TripSummary>,
    /// Account that booked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<PassengerContact>,
    /// Bus display fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bus: Option<BusSummary>,
    /// Route display fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<Route>,
}

/// Result of cancelling a booking.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationOutcome {
    /// The cancelled booking
    pub booking: Booking,
    /// Refund breakdown
    #[serde(flatten)]
    pub refund: RefundQuote,
}

/// Result of a booking status update.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingStatusUpdate {
    /// The booking after the change
    pub booking: Booking,
    /// Present when the update cancelled the booking
    #[serde(flatten)]
    pub refund: Option<RefundQuote>,
}

impl From<CancellationOutcome> for BookingStatusUpdate {
    fn from(outcome: CancellationOutcome) -> Self {
        Self {
            booking: outcome.booking,
            refund: Some(outcome.refund),
        }
    }
}

/// Taken and free seats of one trip.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatMap {
    /// Trip
    pub trip_id: TripId,
    /// Seat count
    pub total_seats: u16,
    /// Seats free according to the trip counter
    pub available_seats: u16,
    /// Seats held by bookings that are not cancelled
    pub taken: Vec<SeatNumber>,
    /// Seats nobody holds
    pub free: Vec<SeatNumber>,
}

/// Seats in use on a bus for one date, derived from its active trips.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusOccupancy {
    /// Bus
    pub bus_id: BusId,
    /// Service date
    pub date: NaiveDate,
    /// Bus seat count
    pub total_seats: u16,
    /// Seats held on the bus's active trips that day
    pub seats_in_use: u32,
    /// Seats left
    pub available: u32,
}
