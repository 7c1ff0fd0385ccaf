//! In-memory implementation of [`TripStore`] and [`BookingStore`].
//!
//! All state sits behind one async mutex, so every trait method is a single
//! critical section: the invariant check and the write it guards cannot
//! interleave with another writer.

use async_trait::async_trait;
use chrono::NaiveDate;
use coachline_core::booking::{Booking, BookingStatus, BookingTransition};
use coachline_core::error::ContestedResource;
use coachline_core::store::{BookingStore, StoreError, TripStore};
use coachline_core::trip::{Trip, TripDraft, TripStatus};
use coachline_core::types::{BookingId, BookingReference, BusId, SeatNumber, TripId, TripNumber, UserId};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct State {
    trips: HashMap<TripId, Trip>,
    bookings: HashMap<BookingId, Booking>,
    references: HashSet<BookingReference>,
    held: HashMap<TripId, BTreeSet<SeatNumber>>,
    trip_sequence: u64,
}

/// Resource claims of a trip, used for exclusivity checks.
struct Claim {
    trip: Option<TripId>,
    bus: BusId,
    driver: UserId,
    helper: Option<UserId>,
    date: NaiveDate,
}

impl Claim {
    fn of(trip: &Trip) -> Self {
        Self {
            trip: Some(trip.id),
            bus: trip.bus_id,
            driver: trip.driver_id,
            helper: trip.helper_id,
            date: trip.departure_date,
        }
    }
}

impl State {
    fn rivals<'a>(&'a self, claim: &'a Claim) -> impl Iterator<Item = &'a Trip> + 'a {
        self.trips.values().filter(move |other| {
            Some(other.id) != claim.trip && other.departure_date == claim.date && other.status.is_active()
        })
    }

    fn clash(&self, claim: &Claim) -> Option<ContestedResource> {
        if self.rivals(claim).any(|other| other.bus_id == claim.bus) {
            Some(ContestedResource::Bus)
        } else if self.rivals(claim).any(|other| other.driver_id == claim.driver) {
            Some(ContestedResource::Driver)
        } else if claim.helper.is_some()
            && self.rivals(claim).any(|other| other.helper_id == claim.helper)
        {
            Some(ContestedResource::Helper)
        } else {
            None
        }
    }

    fn ensure_free(&self, claim: &Claim) -> Result<(), StoreError> {
        match self.clash(claim) {
            Some(resource) => Err(StoreError::ResourceTaken {
                resource,
                date: claim.date,
            }),
            None => Ok(()),
        }
    }

    fn has_bookings(&self, trip_id: TripId) -> bool {
        self.bookings.values().any(|booking| booking.trip_id == trip_id)
    }
}

/// Thread-safe in-memory store.
///
/// Cloning is cheap and clones share state.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every trip, ordered by trip number.
    pub async fn trips(&self) -> Vec<Trip> {
        let state = self.state.lock().await;
        let mut trips: Vec<_> = state.trips.values().cloned().collect();
        trips.sort_by(|a, b| a.trip_number.as_str().cmp(b.trip_number.as_str()));
        trips
    }

    /// Every booking on a trip, ordered by creation time.
    pub async fn bookings_for_trip(&self, trip_id: TripId) -> Vec<Booking> {
        let state = self.state.lock().await;
        let mut bookings: Vec<_> = state
            .bookings
            .values()
            .filter(|booking| booking.trip_id == trip_id)
            .cloned()
            .collect();
        bookings.sort_by_key(|booking| booking.created_at);
        bookings
    }
}

#[async_trait]
impl TripStore for InMemoryStore {
    async fn insert_trip(&self, draft: TripDraft) -> Result<Trip, StoreError> {
        let mut state = self.state.lock().await;
        state.ensure_free(&Claim {
            trip: None,
            bus: draft.bus_id,
            driver: draft.driver_id,
            helper: draft.helper_id,
            date: draft.departure_date,
        })?;

        state.trip_sequence += 1;
        let trip = draft.into_trip(TripNumber::from_sequence(state.trip_sequence));
        state.trips.insert(trip.id, trip.clone());
        Ok(trip)
    }

    async fn trip(&self, id: TripId) -> Result<Option<Trip>, StoreError> {
        Ok(self.state.lock().await.trips.get(&id).cloned())
    }

    async fn update_trip(&self, trip: &Trip, expected: TripStatus) -> Result<Trip, StoreError> {
        let mut state = self.state.lock().await;
        let stored = state
            .trips
            .get(&trip.id)
            .cloned()
            .ok_or(StoreError::TripNotFound(trip.id))?;

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
            state.ensure_free(&Claim::of(trip))?;
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
        state.trips.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn delete_trip(&self, id: TripId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.trips.contains_key(&id) {
            return Err(StoreError::TripNotFound(id));
        }
        if state.has_bookings(id) {
            return Err(StoreError::TripHasBookings(id));
        }
        state.trips.remove(&id);
        state.held.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn reserve_seats(&self, booking: &Booking) -> Result<Trip, StoreError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let trip = state
            .trips
            .get_mut(&booking.trip_id)
            .ok_or(StoreError::TripNotFound(booking.trip_id))?;

        if !trip.is_bookable() {
            return Err(StoreError::TripNotBookable(trip.status));
        }

        let requested = booking.seat_count();
        let count = u16::try_from(requested)
            .ok()
            .filter(|count| *count <= trip.available_seats)
            .ok_or(StoreError::InsufficientSeats {
                requested,
                available: trip.available_seats,
            })?;

        let held = state.held.entry(trip.id).or_default();
        let taken: Vec<_> = booking
            .seat_numbers()
            .into_iter()
            .filter(|seat| held.contains(seat))
            .collect();
        if !taken.is_empty() {
            return Err(StoreError::SeatsTaken(taken));
        }

        if !state.references.insert(booking.reference.clone()) {
            return Err(StoreError::DuplicateReference(booking.reference.clone()));
        }

        held.extend(booking.seat_numbers());
        trip.available_seats -= count;
        trip.total_bookings += count;
        trip.updated_at = booking.created_at;
        let trip = trip.clone();

        state.bookings.insert(booking.id, booking.clone());
        Ok(trip)
    }

    async fn booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        Ok(self.state.lock().await.bookings.get(&id).cloned())
    }

    async fn held_seats(&self, trip_id: TripId) -> Result<BTreeSet<SeatNumber>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .held
            .get(&trip_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn transition_booking(
        &self,
        id: BookingId,
        expected: BookingStatus,
        transition: BookingTransition,
    ) -> Result<(Booking, Trip), StoreError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let booking = state
            .bookings
            .get_mut(&id)
            .ok_or(StoreError::BookingNotFound(id))?;
        if booking.status != expected {
            return Err(StoreError::BookingStatusChanged {
                expected,
                actual: booking.status,
            });
        }

        let trip = state
            .trips
            .get_mut(&booking.trip_id)
            .ok_or(StoreError::TripNotFound(booking.trip_id))?;

        if transition.releases_seats() && expected.holds_seats() {
            let seats = booking.seat_numbers();
            if let Some(held) = state.held.get_mut(&trip.id) {
                for seat in &seats {
                    held.remove(seat);
                }
            }
            let count = u16::try_from(seats.len()).unwrap_or(u16::MAX);
            trip.available_seats = trip.available_seats.saturating_add(count).min(trip.total_seats);
            trip.total_bookings = trip.total_bookings.saturating_sub(count);
            trip.updated_at = transition.updated_at;
        }

        booking.apply(&transition);
        Ok((booking.clone(), trip.clone()))
    }

    async fn bus_seats_in_use(&self, bus_id: BusId, date: NaiveDate) -> Result<u32, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .trips
            .values()
            .filter(|trip| trip.bus_id == bus_id && trip.departure_date == date && trip.status.is_active())
            .map(|trip| u32::from(trip.total_bookings))
            .sum())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fixtures::{Fleet, booking_for, draft_for};
    use crate::mocks::test_epoch;
    use coachline_core::booking::{Cancellation, PaymentStatus};
    use coachline_core::types::Money;

    #[tokio::test]
    async fn trip_numbers_follow_the_sequence() {
        let fleet = Fleet::standard();
        let store = InMemoryStore::new();

        let first = store.insert_trip(draft_for(&fleet, fleet.date(10))).await.unwrap();
        let second = store.insert_trip(draft_for(&fleet, fleet.date(11))).await.unwrap();

        assert_eq!(first.trip_number.as_str(), "TR-001");
        assert_eq!(second.trip_number.as_str(), "TR-002");
    }

    #[tokio::test]
    async fn same_bus_same_day_is_rejected() {
        let fleet = Fleet::standard();
        let store = InMemoryStore::new();
        store.insert_trip(draft_for(&fleet, fleet.date(10))).await.unwrap();

        let mut clash = draft_for(&fleet, fleet.date(10));
        clash.driver_id = fleet.second_driver.id;
        clash.helper_id = None;
        let err = store.insert_trip(clash).await.unwrap_err();

        assert_eq!(
            err,
            StoreError::ResourceTaken {
                resource: ContestedResource::Bus,
                date: fleet.date(10)
            }
        );
    }

    #[tokio::test]
    async fn same_driver_on_another_bus_is_rejected() {
        let fleet = Fleet::standard();
        let store = InMemoryStore::new();
        store.insert_trip(draft_for(&fleet, fleet.date(10))).await.unwrap();

        let mut clash = draft_for(&fleet, fleet.date(10));
        clash.bus_id = fleet.second_bus.id;
        clash.helper_id = None;
        let err = store.insert_trip(clash).await.unwrap_err();

        assert!(matches!(
            err,
            StoreError::ResourceTaken {
                resource: ContestedResource::Driver,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn cancelled_trips_release_their_resources() {
        let fleet = Fleet::standard();
        let store = InMemoryStore::new();
        let trip = store.insert_trip(draft_for(&fleet, fleet.date(10))).await.unwrap();

        let cancelled = Trip {
            status: TripStatus::Cancelled,
            ..trip.clone()
        };
        store.update_trip(&cancelled, TripStatus::Scheduled).await.unwrap();

        assert!(store.insert_trip(draft_for(&fleet, fleet.date(10))).await.is_ok());
    }

    #[tokio::test]
    async fn reserving_updates_counters_and_detects_taken_seats() {
        let fleet = Fleet::standard();
        let store = InMemoryStore::new();
        let trip = store.insert_trip(draft_for(&fleet, fleet.date(10))).await.unwrap();

        let first = booking_for(&trip, fleet.customer.id, &[5, 6], "BKA");
        let trip = store.reserve_seats(&first).await.unwrap();
        assert_eq!(trip.available_seats, 38);
        assert_eq!(trip.total_bookings, 2);

        let second = booking_for(&trip, fleet.other_customer.id, &[5, 7], "BKB");
        assert_eq!(
            store.reserve_seats(&second).await.unwrap_err(),
            StoreError::SeatsTaken(vec![SeatNumber::new(5)])
        );

        let duplicate = booking_for(&trip, fleet.other_customer.id, &[9], "BKA");
        assert!(matches!(
            store.reserve_seats(&duplicate).await.unwrap_err(),
            StoreError::DuplicateReference(_)
        ));
        assert_eq!(store.held_seats(trip.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn cancelling_releases_seats_once() {
        let fleet = Fleet::standard();
        let store = InMemoryStore::new();
        let trip = store.insert_trip(draft_for(&fleet, fleet.date(10))).await.unwrap();
        let booking = booking_for(&trip, fleet.customer.id, &[1, 2, 3], "BKC");
        store.reserve_seats(&booking).await.unwrap();

        let cancel = BookingTransition {
            status: BookingStatus::Cancelled,
            payment_status: PaymentStatus::Refunded,
            cancellation: Some(Cancellation {
                reason: None,
                cancelled_at: test_epoch(),
                refund_amount: Money::ZERO,
            }),
            updated_at: test_epoch(),
        };
        let (booking, trip) = store
            .transition_booking(booking.id, BookingStatus::Pending, cancel.clone())
            .await
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert_eq!(trip.available_seats, 40);
        assert_eq!(trip.total_bookings, 0);

        let again = store
            .transition_booking(booking.id, BookingStatus::Pending, cancel)
            .await
            .unwrap_err();
        assert!(matches!(again, StoreError::BookingStatusChanged { .. }));
        assert_eq!(store.trip(trip.id).await.unwrap().unwrap().available_seats, 40);
    }

    #[tokio::test]
    async fn completed_bookings_hand_their_seats_back() {
        let fleet = Fleet::standard();
        let store = InMemoryStore::new();
        let trip = store.insert_trip(draft_for(&fleet, fleet.date(10))).await.unwrap();
        let booking = booking_for(&trip, fleet.customer.id, &[2], "BKE");
        store.reserve_seats(&booking).await.unwrap();

        let step = |status| BookingTransition {
            status,
            payment_status: PaymentStatus::Completed,
            cancellation: None,
            updated_at: test_epoch(),
        };
        let (_, trip) = store
            .transition_booking(booking.id, BookingStatus::Pending, step(BookingStatus::Confirmed))
            .await
            .unwrap();
        assert_eq!(trip.available_seats, 39);

        let (booking, trip) = store
            .transition_booking(booking.id, BookingStatus::Confirmed, step(BookingStatus::Completed))
            .await
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Completed);
        assert_eq!(trip.available_seats, 40);
        assert_eq!(trip.total_bookings, 0);
        assert!(store.held_seats(trip.id).await.unwrap().is_empty());

        let rebook = booking_for(&trip, fleet.other_customer.id, &[2], "BKF");
        assert_eq!(store.reserve_seats(&rebook).await.unwrap().available_seats, 39);
    }

    #[tokio::test]
    async fn booked_trips_cannot_be_deleted_or_moved() {
        let fleet = Fleet::standard();
        let store = InMemoryStore::new();
        let trip = store.insert_trip(draft_for(&fleet, fleet.date(10))).await.unwrap();
        store
            .reserve_seats(&booking_for(&trip, fleet.customer.id, &[4], "BKD"))
            .await
            .unwrap();

        assert_eq!(
            store.delete_trip(trip.id).await.unwrap_err(),
            StoreError::TripHasBookings(trip.id)
        );

        let moved = Trip {
            departure_date: fleet.date(12),
            ..trip.clone()
        };
        assert_eq!(
            store.update_trip(&moved, TripStatus::Scheduled).await.unwrap_err(),
            StoreError::TripHasBookings(trip.id)
        );
    }

    #[tokio::test]
    async fn bus_occupancy_counts_active_trips_only() {
        let fleet = Fleet::standard();
        let store = InMemoryStore::new();
        let trip = store.insert_trip(draft_for(&fleet, fleet.date(10))).await.unwrap();
        store
            .reserve_seats(&booking_for(&trip, fleet.customer.id, &[1, 2], "BKE"))
            .await
            .unwrap();

        assert_eq!(store.bus_seats_in_use(fleet.bus.id, fleet.date(10)).await.unwrap(), 2);
        assert_eq!(store.bus_seats_in_use(fleet.bus.id, fleet.date(11)).await.unwrap(), 0);
    }
}
