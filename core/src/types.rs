//! Identifiers and value objects shared by the scheduler and the reservation manager.
//!
//! Persisted identifiers are opaque UUID tokens. The two human-readable
//! identifiers ([`TripNumber`], [`BookingReference`]) are display annotations
//! backed by storage-level uniqueness.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Creates a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a scheduled trip
    TripId
);
uuid_id!(
    /// Unique identifier for a booking
    BookingId
);
uuid_id!(
    /// Unique identifier for a bus
    BusId
);
uuid_id!(
    /// Unique identifier for a route
    RouteId
);
uuid_id!(
    /// Unique identifier for an account (customer, operator, employee or admin)
    UserId
);

// ============================================================================
// Human-readable identifiers
// ============================================================================

/// Display number of a trip, e.g. `TR-007`.
///
/// Derived from a storage-provided monotonic sequence, never from counting rows.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TripNumber(String);

impl TripNumber {
    /// Prefix shared by every trip number.
    pub const PREFIX: &'static str = "TR-";

    /// Formats a sequence value as a trip number (zero-padded to at least 3 digits).
    #[must_use]
    pub fn from_sequence(sequence: u64) -> Self {
        Self(format!("{}{sequence:03}", Self::PREFIX))
    }

    /// Wraps an already formatted trip number (as loaded from storage).
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the trip number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TripNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Customer-facing booking reference, e.g. `BKM1X2Y3Z4QF7A`.
///
/// Uppercase, derived from the creation time plus randomness. Uniqueness is
/// enforced by the store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingReference(String);

impl BookingReference {
    /// Wraps a reference, normalizing it to uppercase.
    #[must_use]
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().to_ascii_uppercase())
    }

    /// Borrow the reference as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookingReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Money Value Object (minor units to avoid floating point errors)
// ============================================================================

/// Represents money in minor currency units (paise, cents, ...).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from minor units
    #[must_use]
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Returns the amount in minor units
    #[must_use]
    pub const fn minor(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiplies money by a quantity with overflow checking
    #[must_use]
    pub const fn checked_mul(self, quantity: u64) -> Option<Self> {
        match self.0.checked_mul(quantity) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Returns `percentage`% of this amount, rounded down.
    ///
    /// Percentages above 100 are clamped to 100.
    #[must_use]
    pub const fn percent(self, percentage: u8) -> Self {
        let pct = if percentage > 100 { 100 } else { percentage as u128 };
        // u64 * 100 always fits in u128, and the quotient never exceeds self.0
        #[allow(clippy::cast_possible_truncation)]
        let value = (self.0 as u128 * pct / 100) as u64;
        Self(value)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Seats
// ============================================================================

/// A 1-based seat number on a bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeatNumber(u16);

impl SeatNumber {
    /// Creates a seat number (range is validated against the bus, not here).
    #[must_use]
    pub const fn new(number: u16) -> Self {
        Self(number)
    }

    /// The raw seat number
    #[must_use]
    pub const fn get(&self) -> u16 {
        self.0
    }

    /// Whether the seat exists on a bus with `total_seats` seats.
    #[must_use]
    pub const fn is_within(&self, total_seats: u16) -> bool {
        self.0 >= 1 && self.0 <= total_seats
    }
}

impl fmt::Display for SeatNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Renders seat numbers as a comma separated list (`5, 6`).
#[must_use]
pub fn format_seats(seats: &[SeatNumber]) -> String {
    seats
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// Time of day
// ============================================================================

/// Error returned when a time of day is not a valid 24-hour `HH:MM` string.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a valid 24-hour HH:MM time")]
pub struct InvalidServiceTime(pub String);

/// A departure or arrival time of day, written `HH:MM` on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceTime(NaiveTime);

impl ServiceTime {
    /// `00:00`
    pub const MIDNIGHT: Self = Self(NaiveTime::MIN);

    /// Parses a strict 24-hour `HH:MM` string (two digits each, `00:00`..=`23:59`).
    ///
    /// # Errors
    ///
    /// Returns [`InvalidServiceTime`] for any other shape.
    pub fn parse(raw: &str) -> Result<Self, InvalidServiceTime> {
        let invalid = || InvalidServiceTime(raw.to_string());
        let bytes = raw.as_bytes();
        if bytes.len() != 5 || bytes[2] != b':' {
            return Err(invalid());
        }
        let digits = [bytes[0], bytes[1], bytes[3], bytes[4]];
        if !digits.iter().all(u8::is_ascii_digit) {
            return Err(invalid());
        }
        let hour = u32::from(bytes[0] - b'0') * 10 + u32::from(bytes[1] - b'0');
        let minute = u32::from(bytes[3] - b'0') * 10 + u32::from(bytes[4] - b'0');
        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(Self)
            .ok_or_else(invalid)
    }

    /// The underlying `NaiveTime`
    #[must_use]
    pub const fn as_naive(&self) -> NaiveTime {
        self.0
    }

    /// Wraps a stored time of day, dropping any seconds.
    #[must_use]
    pub fn from_naive(time: NaiveTime) -> Self {
        Self(
            time.with_second(0)
                .and_then(|time| time.with_nanosecond(0))
                .unwrap_or(time),
        )
    }
}

impl FromStr for ServiceTime {
    type Err = InvalidServiceTime;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ServiceTime {
    type Error = InvalidServiceTime;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ServiceTime> for String {
    fn from(value: ServiceTime) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ServiceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0.hour(), self.0.minute())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn trip_number_is_zero_padded() {
        assert_eq!(TripNumber::from_sequence(1).as_str(), "TR-001");
        assert_eq!(TripNumber::from_sequence(42).as_str(), "TR-042");
        assert_eq!(TripNumber::from_sequence(1234).as_str(), "TR-1234");
    }

    #[test]
    fn booking_reference_is_uppercased() {
        assert_eq!(BookingReference::new("bk12ab").as_str(), "BK12AB");
    }

    #[test]
    fn money_percent_rounds_down() {
        assert_eq!(Money::from_minor(1000).percent(100), Money::from_minor(1000));
        assert_eq!(Money::from_minor(1000).percent(50), Money::from_minor(500));
        assert_eq!(Money::from_minor(999).percent(50), Money::from_minor(499));
        assert_eq!(Money::from_minor(1000).percent(0), Money::ZERO);
        assert_eq!(Money::from_minor(1000).percent(250), Money::from_minor(1000));
        assert_eq!(Money::from_minor(u64::MAX).percent(100).minor(), u64::MAX);
    }

    #[test]
    fn money_checked_mul_detects_overflow() {
        assert_eq!(Money::from_minor(500).checked_mul(2), Some(Money::from_minor(1000)));
        assert_eq!(Money::from_minor(u64::MAX).checked_mul(2), None);
    }

    #[test]
    fn seat_range() {
        assert!(SeatNumber::new(1).is_within(40));
        assert!(SeatNumber::new(40).is_within(40));
        assert!(!SeatNumber::new(0).is_within(40));
        assert!(!SeatNumber::new(41).is_within(40));
        assert_eq!(format_seats(&[SeatNumber::new(5), SeatNumber::new(6)]), "5, 6");
    }

    #[test]
    fn service_time_accepts_24_hour_clock() {
        assert_eq!(ServiceTime::parse("00:00").unwrap().to_string(), "00:00");
        assert_eq!(ServiceTime::parse("09:05").unwrap().to_string(), "09:05");
        assert_eq!(ServiceTime::parse("23:59").unwrap().to_string(), "23:59");
    }

    #[test]
    fn service_time_rejects_malformed_input() {
        for raw in ["24:00", "12:60", "9:05", "09:5", "0905", "ab:cd", "09:05 ", "", "-1:00"] {
            assert!(ServiceTime::parse(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn service_time_serializes_as_string() {
        let time = ServiceTime::parse("07:30").unwrap();
        assert_eq!(serde_json::to_string(&time).unwrap(), "\"07:30\"");
        let parsed: ServiceTime = serde_json::from_str("\"18:45\"").unwrap();
        assert_eq!(parsed.to_string(), "18:45");
        assert!(serde_json::from_str::<ServiceTime>("\"25:00\"").is_err());
    }
}
