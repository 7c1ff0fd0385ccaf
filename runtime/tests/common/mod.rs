#![allow(dead_code)]

use coachline_core::booking::PaymentMethod;
use coachline_core::registry::{Actor, ResourceRegistry};
use coachline_core::types::{Money, TripId};
use coachline_runtime::{Collaborators, CreateBooking, ReservationEngine, ScheduleTrip};
use coachline_testing::fixtures::{passenger, Fleet};
use coachline_testing::mocks::test_epoch;
use coachline_testing::{InMemoryStore, ManualClock, SequentialReferenceGenerator};
use std::sync::Arc;

pub struct Harness {
    pub fleet: Fleet,
    pub store: InMemoryStore,
    pub clock: ManualClock,
    pub engine: ReservationEngine,
}

impl Harness {
    pub fn new() -> Self {
        let fleet = Fleet::standard();
        let registry = Arc::new(fleet.registry());
        Self::with_registry(fleet, registry)
    }

    pub fn with_registry(fleet: Fleet, registry: Arc<dyn ResourceRegistry>) -> Self {
        let store = InMemoryStore::new();
        let clock = ManualClock::new(test_epoch());
        let collaborators = Collaborators::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            registry,
        )
        .with_clock(Arc::new(clock.clone()))
        .with_references(Arc::new(SequentialReferenceGenerator::new()));
        Self {
            engine: ReservationEngine::new(collaborators),
            fleet,
            store,
            clock,
        }
    }

    pub fn operator(&self) -> Actor {
        Fleet::actor(&self.fleet.operator)
    }

    pub fn customer(&self) -> Actor {
        Fleet::actor(&self.fleet.customer)
    }

    pub fn other_customer(&self) -> Actor {
        Fleet::actor(&self.fleet.other_customer)
    }

    pub fn admin(&self) -> Actor {
        Fleet::actor(&self.fleet.admin)
    }

    /// Trip on the 40-seat bus, fare 500, departing 08:00 `days` after the epoch.
    pub fn schedule_request(&self, days: i64) -> ScheduleTrip {
        ScheduleTrip {
            route_id: self.fleet.route.id,
            bus_id: self.fleet.bus.id,
            driver_id: self.fleet.driver.id,
            helper_id: Some(self.fleet.helper.id),
            departure_time: "08:00".to_string(),
            arrival_time: "14:30".to_string(),
            departure_date: self.fleet.date(days),
            pickup_points: vec!["Mangaluru Central".to_string()],
            drop_points: vec!["Panaji".to_string()],
            fare: Money::from_minor(500),
        }
    }

    pub async fn scheduled_trip(&self, days: i64) -> TripId {
        self.engine
            .scheduler
            .schedule(self.schedule_request(days), &self.operator())
            .await
            .unwrap()
            .id
    }
}

pub fn booking_request(seats: &[u16]) -> CreateBooking {
    CreateBooking {
        seats: seats.iter().copied().map(passenger).collect(),
        boarding_point: "Mangaluru Central".to_string(),
        dropping_point: "Panaji".to_string(),
        payment_method: Some(PaymentMethod::Card),
    }
}
