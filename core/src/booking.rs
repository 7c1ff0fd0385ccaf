//! Bookings: one customer's claim on one or more seats of a trip.
//!
//! ```text
//! pending ──► confirmed ──► completed
//!    │            │
//!    └────────────┴──► cancelled
//! ```
//!
//! A booking holds its seats in every status except `cancelled`. Cancelling
//! releases the seats back to the trip in the same atomic change.

use crate::error::DomainError;
use crate::types::{BookingId, BookingReference, BusId, Money, RouteId, SeatNumber, TripId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

macro_rules! wire_enum {
    ($name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $name {
            /// Database / wire representation.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(Self::$variant),)+
                    other => Err(DomainError::validation(format!(
                        concat!("unknown ", stringify!($name), " '{}'"),
                        other
                    ))),
                }
            }
        }
    };
}

/// Lifecycle status of a booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Created, awaiting confirmation
    Pending,
    /// Confirmed and paid
    Confirmed,
    /// Journey finished (terminal)
    Completed,
    /// Cancelled; seats released (terminal)
    Cancelled,
}

wire_enum!(BookingStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl BookingStatus {
    /// Whether the booking can still be cancelled or confirmed.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    /// Whether the booking's seats count against the trip inventory.
    ///
    /// Completed bookings hand their seats back just like cancelled ones.
    #[must_use]
    pub const fn holds_seats(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    /// The single transition table for bookings.
    #[must_use]
    pub const fn allowed_transitions(&self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Confirmed, Self::Cancelled],
            Self::Confirmed => &[Self::Completed, Self::Cancelled],
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
        } else {
            Err(DomainError::invalid_state(format!(
                "booking cannot move from {self} to {next}"
            )))
        }
    }

    /// Payment status implied by entering this booking status.
    #[must_use]
    pub const fn payment_on_entry(&self, current: PaymentStatus) -> PaymentStatus {
        match self {
            Self::Confirmed => PaymentStatus::Completed,
            Self::Cancelled => PaymentStatus::Refunded,
            Self::Pending | Self::Completed => current,
        }
    }
}

/// Payment state tracked alongside a booking.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Not yet collected
    #[default]
    Pending,
    /// Collected
    Completed,
    /// Collection failed
    Failed,
    /// Returned to the customer
    Refunded,
}

wire_enum!(PaymentStatus {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
    Refunded => "refunded",
});

/// How the customer intends to pay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash at the counter or on board
    #[default]
    Cash,
    /// Card payment
    Card,
    /// Mobile wallet
    MobileWallet,
    /// Bank transfer
    BankTransfer,
}

wire_enum!(PaymentMethod {
    Cash => "cash",
    Card => "card",
    MobileWallet => "mobile_wallet",
    BankTransfer => "bank_transfer",
});

/// Passenger gender as recorded on the ticket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    /// Male
    Male,
    /// Female
    Female,
    /// Other or undisclosed
    Other,
}

wire_enum!(Gender {
    Male => "male",
    Female => "female",
    Other => "other",
});

/// One seat in a booking and the passenger sitting in it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassengerSeat {
    /// Seat on the bus
    pub seat_number: SeatNumber,
    /// Passenger's name
    pub passenger_name: String,
    /// Passenger's age in years
    pub passenger_age: u8,
    /// Passenger's gender
    pub passenger_gender: Gender,
    /// Contact number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passenger_phone: Option<String>,
}

/// A customer booking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    /// Opaque identifier
    pub id: BookingId,
    /// Customer-facing reference
    #[serde(rename = "bookingReference")]
    pub reference: BookingReference,
    /// Customer who owns the booking
    pub user_id: UserId,
    /// Trip booked
    pub trip_id: TripId,
    /// Denormalized bus of the trip
    pub bus_id: BusId,
    /// Denormalized route of the trip
    pub route_id: RouteId,
    /// Seats and passengers
    pub seats: Vec<PassengerSeat>,
    /// Where the passengers board
    pub boarding_point: String,
    /// Where the passengers alight
    pub dropping_point: String,
    /// Service date of the trip
    pub journey_date: NaiveDate,
    /// Flat total: seats times fare
    pub total_amount: Money,
    /// Refund granted on cancellation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_amount: Option<Money>,
    /// Lifecycle status
    pub status: BookingStatus,
    /// Payment status
    pub payment_status: PaymentStatus,
    /// Payment method
    pub payment_method: PaymentMethod,
    /// Reason given when cancelled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    /// When it was cancelled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Creation instant
    pub created_at: DateTime<Utc>,
    /// Last modification
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Seat numbers claimed by this booking.
    #[must_use]
    pub fn seat_numbers(&self) -> Vec<SeatNumber> {
        self.seats.iter().map(|seat| seat.seat_number).collect()
    }

    /// Number of seats in the booking.
    #[must_use]
    pub fn seat_count(&self) -> usize {
        self.seats.len()
    }

    /// Whether `user` owns this booking.
    #[must_use]
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.user_id == user
    }

    /// Applies a transition in place.
    pub fn apply(&mut self, transition: &BookingTransition) {
        self.status = transition.status;
        self.payment_status = transition.payment_status;
        self.updated_at = transition.updated_at;
        if let Some(cancellation) = &transition.cancellation {
            self.cancellation_reason.clone_from(&cancellation.reason);
            self.cancelled_at = Some(cancellation.cancelled_at);
            self.refund_amount = Some(cancellation.refund_amount);
        }
    }
}

/// Cancellation details written together with a `cancelled` transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cancellation {
    /// Optional free-text reason
    pub reason: Option<String>,
    /// Instant of cancellation
    pub cancelled_at: DateTime<Utc>,
    /// Refund granted
    pub refund_amount: Money,
}

/// A status change for a booking, applied by the store as compare-and-set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookingTransition {
    /// Target status
    pub status: BookingStatus,
    /// Payment status after the change
    pub payment_status: PaymentStatus,
    /// Present when the target is `cancelled`
    pub cancellation: Option<Cancellation>,
    /// Modification instant
    pub updated_at: DateTime<Utc>,
}

impl BookingTransition {
    /// Whether applying this transition releases the booking's seats.
    #[must_use]
    pub const fn releases_seats(&self) -> bool {
        !self.status.holds_seats()
    }
}

/// Checks a seat request against a trip with `total_seats` seats.
///
/// # Errors
///
/// Returns [`DomainError::Validation`] if the list is empty, a seat is out of
/// range or repeated, or a passenger is missing a name.
pub fn validate_seat_request(seats: &[PassengerSeat], total_seats: u16) -> Result<(), DomainError> {
    if seats.is_empty() {
        return Err(DomainError::validation("at least one seat is required"));
    }

    let mut seen = BTreeSet::new();
    for seat in seats {
        if !seat.seat_number.is_within(total_seats) {
            return Err(DomainError::validation(format!(
                "seat {} does not exist on this bus (1-{total_seats})",
                seat.seat_number
            )));
        }
        if !seen.insert(seat.seat_number) {
            return Err(DomainError::validation(format!(
                "seat {} is requested more than once",
                seat.seat_number
            )));
        }
        if seat.passenger_name.trim().is_empty() {
            return Err(DomainError::validation(format!(
                "seat {} is missing a passenger name",
                seat.seat_number
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn seat(number: u16, name: &str) -> PassengerSeat {
        PassengerSeat {
            seat_number: SeatNumber::new(number),
            passenger_name: name.to_string(),
            passenger_age: 30,
            passenger_gender: Gender::Female,
            passenger_phone: None,
        }
    }

    #[test]
    fn seat_request_validation() {
        assert!(validate_seat_request(&[seat(1, "Ada"), seat(40, "Grace")], 40).is_ok());
        assert!(matches!(
            validate_seat_request(&[], 40),
            Err(DomainError::Validation(_))
        ));
        assert!(validate_seat_request(&[seat(0, "Ada")], 40).is_err());
        assert!(validate_seat_request(&[seat(41, "Ada")], 40).is_err());
        assert!(validate_seat_request(&[seat(5, "Ada"), seat(5, "Grace")], 40).is_err());
        assert!(validate_seat_request(&[seat(5, "  ")], 40).is_err());
    }

    #[test]
    fn transition_table() {
        use BookingStatus::{Cancelled, Completed, Confirmed, Pending};
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Cancelled.can_transition_to(Confirmed));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(Cancelled.transition(Cancelled).is_err());
    }

    #[test]
    fn payment_follows_status() {
        assert_eq!(
            BookingStatus::Confirmed.payment_on_entry(PaymentStatus::Pending),
            PaymentStatus::Completed
        );
        assert_eq!(
            BookingStatus::Cancelled.payment_on_entry(PaymentStatus::Completed),
            PaymentStatus::Refunded
        );
        assert_eq!(
            BookingStatus::Completed.payment_on_entry(PaymentStatus::Completed),
            PaymentStatus::Completed
        );
    }

    #[test]
    fn only_active_bookings_hold_seats() {
        assert!(BookingStatus::Pending.holds_seats());
        assert!(BookingStatus::Confirmed.holds_seats());
        assert!(!BookingStatus::Completed.holds_seats());
        assert!(!BookingStatus::Cancelled.holds_seats());
    }

    #[test]
    fn completing_releases_seats() {
        let transition = BookingTransition {
            status: BookingStatus::Completed,
            payment_status: PaymentStatus::Completed,
            cancellation: None,
            updated_at: chrono::Utc::now(),
        };
        assert!(transition.releases_seats());
    }

    #[test]
    fn wire_names() {
        assert_eq!("mobile_wallet".parse::<PaymentMethod>().unwrap(), PaymentMethod::MobileWallet);
        assert_eq!(serde_json::to_string(&BookingStatus::Confirmed).unwrap(), "\"confirmed\"");
        assert!("refunding".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn passenger_seat_uses_camel_case() {
        let json = serde_json::to_value(seat(3, "Ada")).unwrap();
        assert_eq!(json["seatNumber"], 3);
        assert_eq!(json["passengerName"], "Ada");
        assert!(json.get("passengerPhone").is_none());
    }
}
