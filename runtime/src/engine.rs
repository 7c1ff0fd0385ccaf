use crate::reservations::ReservationManager;
use crate::scheduler::TripScheduler;
use coachline_core::environment::{Clock, RandomReferenceGenerator, ReferenceGenerator, SystemClock};
use coachline_core::refund::RefundPolicy;
use coachline_core::registry::ResourceRegistry;
use coachline_core::store::{BookingStore, TripStore};
use std::sync::Arc;

/// Everything the engine depends on.
#[derive(Clone)]
pub struct Collaborators {
    /// Trip persistence
    pub trips: Arc<dyn TripStore>,
    /// Booking persistence
    pub bookings: Arc<dyn BookingStore>,
    /// Fleet lookups
    pub registry: Arc<dyn ResourceRegistry>,
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Booking reference source
    pub references: Arc<dyn ReferenceGenerator>,
    /// Cancellation refunds
    pub refunds: RefundPolicy,
}

impl Collaborators {
    /// Production defaults: system clock, random references, coarse refunds.
    #[must_use]
    pub fn new(
        trips: Arc<dyn TripStore>,
        bookings: Arc<dyn BookingStore>,
        registry: Arc<dyn ResourceRegistry>,
    ) -> Self {
        Self {
            trips,
            bookings,
            registry,
            clock: Arc::new(SystemClock),
            references: Arc::new(RandomReferenceGenerator),
            refunds: RefundPolicy::default(),
        }
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the reference generator.
    #[must_use]
    pub fn with_references(mut self, references: Arc<dyn ReferenceGenerator>) -> Self {
        self.references = references;
        self
    }

    /// Replaces the refund policy.
    #[must_use]
    pub fn with_refunds(mut self, refunds: RefundPolicy) -> Self {
        self.refunds = refunds;
        self
    }
}

/// The scheduler and the reservation manager sharing one set of collaborators.
#[derive(Clone)]
pub struct ReservationEngine {
    /// Trip scheduling
    pub scheduler: TripScheduler,
    /// Booking reservation
    pub reservations: ReservationManager,
}

impl ReservationEngine {
    /// Wires both services.
    #[must_use]
    pub fn new(collaborators: Collaborators) -> Self {
        let Collaborators {
            trips,
            bookings,
            registry,
            clock,
            references,
            refunds,
        } = collaborators;
        Self {
            scheduler: TripScheduler::new(trips.clone(), registry.clone(), clock.clone()),
            reservations: ReservationManager::new(trips, bookings, registry, clock, references, refunds),
        }
    }
}
