//! # Coachline Testing
//!
//! Deterministic collaborators for the Coachline engine.
//!
//! This crate provides:
//! - Mock implementations of the environment traits (clocks, reference generators)
//! - [`InMemoryStore`]: an atomic, single-writer implementation of both storage traits
//! - [`InMemoryRegistry`]: fleet lookups backed by a [`FleetSeed`]
//! - [`fixtures`]: a standard fleet for tests
//! - [`properties`]: proptest strategies for domain types
//!
//! The in-memory store and registry are complete implementations and also
//! serve the server's `memory` backend.
//!
//! ## Example
//!
//! ```
//! use coachline_testing::{fixtures::Fleet, InMemoryStore};
//!
//! let fleet = Fleet::standard();
//! let registry = fleet.registry();
//! let store = InMemoryStore::new();
//! # let _ = (registry, store);
//! ```

use chrono::{DateTime, Duration, Utc};
use coachline_core::environment::{Clock, ReferenceGenerator};
use coachline_core::types::BookingReference;

pub mod fixtures;
pub mod memory;
pub mod registry;

/// Mock implementations of the environment traits.
pub mod mocks {
    use super::{BookingReference, Clock, DateTime, Duration, ReferenceGenerator, Utc};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use coachline_testing::mocks::FixedClock;
    /// use coachline_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same time, so a test can keep one handle and give
    /// another to the engine.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        millis: Arc<AtomicI64>,
    }

    impl ManualClock {
        /// Starts the clock at `time`.
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                millis: Arc::new(AtomicI64::new(time.timestamp_millis())),
            }
        }

        /// Moves the clock forward (or backward, for negative durations).
        pub fn advance(&self, by: Duration) {
            self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
        }

        /// Jumps to `time`.
        pub fn set(&self, time: DateTime<Utc>) {
            self.millis.store(time.timestamp_millis(), Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
        }
    }

    /// Create a default fixed clock for tests (2026-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_epoch())
    }

    /// The instant used by [`test_clock`].
    #[must_use]
    pub fn test_epoch() -> DateTime<Utc> {
        DateTime::from_timestamp(1_767_225_600, 0).unwrap_or_default()
    }

    /// Predictable references: `BKTEST0001`, `BKTEST0002`, ...
    #[derive(Debug, Clone, Default)]
    pub struct SequentialReferenceGenerator {
        next: Arc<AtomicU64>,
    }

    impl SequentialReferenceGenerator {
        /// Creates a generator starting at 1.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl ReferenceGenerator for SequentialReferenceGenerator {
        fn next_reference(&self, _now: DateTime<Utc>) -> BookingReference {
            let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
            BookingReference::new(format!("BKTEST{n:04}"))
        }
    }

    /// Always hands out the same reference, to exercise collision handling.
    #[derive(Debug, Clone)]
    pub struct FixedReferenceGenerator(pub BookingReference);

    impl ReferenceGenerator for FixedReferenceGenerator {
        fn next_reference(&self, _now: DateTime<Utc>) -> BookingReference {
            self.0.clone()
        }
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use coachline_core::booking::{Gender, PassengerSeat};
    use coachline_core::types::SeatNumber;
    use proptest::prelude::*;

    /// A seat number within `1..=total_seats`.
    pub fn seat_number(total_seats: u16) -> impl Strategy<Value = SeatNumber> {
        (1..=total_seats).prop_map(SeatNumber::new)
    }

    /// A passenger in a given seat.
    pub fn passenger(seat: SeatNumber) -> impl Strategy<Value = PassengerSeat> {
        (
            "[A-Z][a-z]{2,10}",
            1u8..90,
            prop_oneof![Just(Gender::Male), Just(Gender::Female), Just(Gender::Other)],
        )
            .prop_map(move |(name, age, gender)| PassengerSeat {
                seat_number: seat,
                passenger_name: name,
                passenger_age: age,
                passenger_gender: gender,
                passenger_phone: None,
            })
    }

    /// A request for 1..=`max` distinct seats on a bus of `total_seats`.
    pub fn seat_request(total_seats: u16, max: usize) -> impl Strategy<Value = Vec<PassengerSeat>> {
        proptest::collection::btree_set(seat_number(total_seats), 1..=max)
            .prop_flat_map(|seats| {
                seats
                    .into_iter()
                    .map(passenger)
                    .collect::<Vec<_>>()
            })
    }
}

// Re-export commonly used items
pub use memory::InMemoryStore;
pub use mocks::{
    FixedClock, FixedReferenceGenerator, ManualClock, SequentialReferenceGenerator, test_clock,
};
pub use registry::{FleetSeed, InMemoryRegistry, SeedError, SwitchableRegistry};

#[cfg(test)]
mod tests {
    use super::*;
    use coachline_core::environment::{Clock, ReferenceGenerator};

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now().to_rfc3339(), "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn manual_clock_advances_shared_time() {
        let clock = ManualClock::new(mocks::test_epoch());
        let handle = clock.clone();
        handle.advance(Duration::hours(5));
        assert_eq!(clock.now(), mocks::test_epoch() + Duration::hours(5));
    }

    #[test]
    fn sequential_references() {
        let references = SequentialReferenceGenerator::new();
        let now = Utc::now();
        assert_eq!(references.next_reference(now).as_str(), "BKTEST0001");
        assert_eq!(references.next_reference(now).as_str(), "BKTEST0002");
    }
}
