//! Booking reservation: seat allocation, status changes, cancellation refunds.
//!
//! Request-level checks run here and fail fast with a precise error. The
//! [`BookingStore`] repeats the checks that guard invariants (trip bookable,
//! capacity, seat exclusivity, status compare-and-set) inside its atomic write,
//! so a request that loses a race is rejected with the same error kinds.

use crate::metrics::{EngineMetrics, OperationTimer};
use crate::views::{
    BookingStatusUpdate, BookingView, BusOccupancy, CancellationOutcome, SeatMap, TripSummary,
};
use chrono::NaiveDate;
use coachline_core::booking::{
    validate_seat_request, Booking, BookingStatus, BookingTransition, Cancellation, PassengerSeat,
    PaymentMethod, PaymentStatus,
};
use coachline_core::environment::{Clock, ReferenceGenerator};
use coachline_core::error::DomainError;
use coachline_core::refund::RefundPolicy;
use coachline_core::registry::{Actor, Bus, ResourceRegistry, Role, Route, UserProfile};
use coachline_core::store::{BookingStore, StoreError, TripStore};
use coachline_core::trip::Trip;
use coachline_core::types::{BookingId, BusId, SeatNumber, TripId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Request to book seats on a trip.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBooking {
    /// Seats and passengers
    pub seats: Vec<PassengerSeat>,
    /// Must be one of the trip's pickup points when it lists any
    pub boarding_point: String,
    /// Must be one of the trip's drop points when it lists any
    pub dropping_point: String,
    /// Defaults to cash
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
}

/// Creates, transitions and cancels bookings.
#[derive(Clone)]
pub struct ReservationManager {
    trips: Arc<dyn TripStore>,
    bookings: Arc<dyn BookingStore>,
    registry: Arc<dyn ResourceRegistry>,
    clock: Arc<dyn Clock>,
    references: Arc<dyn ReferenceGenerator>,
    refunds: RefundPolicy,
}

struct Parties {
    user: Option<UserProfile>,
    bus: Option<Bus>,
    route: Option<Route>,
}

fn check_stop(kind: &str, requested: &str, allowed: &[String]) -> Result<(), DomainError> {
    if requested.trim().is_empty() {
        return Err(DomainError::validation(format!("{kind} point is required")));
    }
    if !allowed.is_empty() && !allowed.iter().any(|stop| stop == requested) {
        return Err(DomainError::validation(format!(
            "'{requested}' is not a {kind} point of this trip"
        )));
    }
    Ok(())
}

impl ReservationManager {
    /// Creates a manager.
    #[must_use]
    pub fn new(
        trips: Arc<dyn TripStore>,
        bookings: Arc<dyn BookingStore>,
        registry: Arc<dyn ResourceRegistry>,
        clock: Arc<dyn Clock>,
        references: Arc<dyn ReferenceGenerator>,
        refunds: RefundPolicy,
    ) -> Self {
        Self {
            trips,
            bookings,
            registry,
            clock,
            references,
            refunds,
        }
    }

    /// Books seats on a trip for the actor.
    ///
    /// # Errors
    ///
    /// - [`DomainError::NotFound`] if the trip does not exist
    /// - [`DomainError::InvalidState`] if the trip is not `scheduled` or has departed
    /// - [`DomainError::Validation`] for an empty, repeated or out-of-range seat
    ///   list, a missing passenger name or an unknown stop
    /// - [`DomainError::CapacityExceeded`] if fewer seats are left than requested
    /// - [`DomainError::SeatConflict`] naming seats already held
    /// - [`DomainError::Conflict`] on a booking reference collision
    #[tracing::instrument(skip(self, request), fields(actor = %actor.id, seats = request.seats.len()))]
    pub async fn create_booking(
        &self,
        trip_id: TripId,
        request: CreateBooking,
        actor: &Actor,
    ) -> Result<BookingView, DomainError> {
        let _timer = OperationTimer::start("create_booking");

        let trip = self.trip(trip_id).await?;
        if !trip.is_bookable() {
            return Err(DomainError::invalid_state(format!(
                "trip is {} and does not accept bookings",
                trip.status
            )));
        }
        let now = self.clock.now();
        if trip.departs_at() < now {
            return Err(DomainError::invalid_state("trip has already departed"));
        }

        validate_seat_request(&request.seats, trip.total_seats)?;
        check_stop("boarding", &request.boarding_point, &trip.pickup_points)?;
        check_stop("dropping", &request.dropping_point, &trip.drop_points)?;

        if request.seats.len() > usize::from(trip.available_seats) {
            return Err(DomainError::CapacityExceeded {
                requested: request.seats.len(),
                available: trip.available_seats,
            });
        }

        let held = self.bookings.held_seats(trip.id).await?;
        let taken: Vec<SeatNumber> = request
            .seats
            .iter()
            .map(|seat| seat.seat_number)
            .filter(|seat| held.contains(seat))
            .collect();
        if !taken.is_empty() {
            EngineMetrics::record_seat_conflict();
            warn!(trip_id = %trip.id, ?taken, "Booking rejected: seats already held");
            return Err(DomainError::seat_conflict(taken));
        }

        let booking = Booking {
            id: BookingId::new(),
            reference: self.references.next_reference(now),
            user_id: actor.id,
            trip_id: trip.id,
            bus_id: trip.bus_id,
            route_id: trip.route_id,
            total_amount: trip.fare_for(request.seats.len())?,
            seats: request.seats,
            boarding_point: request.boarding_point,
            dropping_point: request.dropping_point,
            journey_date: trip.departure_date,
            refund_amount: None,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: request.payment_method.unwrap_or_default(),
            cancellation_reason: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };

        // A registry failure must surface before anything is stored.
        let parties = self.parties(&booking).await?;
        let trip = self
            .bookings
            .reserve_seats(&booking)
            .await
            .map_err(Self::rejected)?;

        EngineMetrics::record_booking(BookingStatus::Pending);
        info!(
            booking_reference = %booking.reference,
            trip_number = %trip.trip_number,
            available_seats = trip.available_seats,
            "Booking created"
        );
        Ok(Self::view(booking, Some(&trip), parties))
    }

    /// Loads a booking visible to the actor.
    ///
    /// Owners, admins and the operator of the booked bus may read a booking.
    ///
    /// # Errors
    ///
    /// - [`DomainError::NotFound`] or [`DomainError::Forbidden`]
    /// - [`DomainError::Internal`] if the registry cannot be reached
    pub async fn get_booking(&self, booking_id: BookingId, actor: &Actor) -> Result<BookingView, DomainError> {
        let booking = self.booking(booking_id).await?;
        if !booking.is_owned_by(actor.id) && !self.manages(&booking, actor).await? {
            return Err(DomainError::forbidden("you may only view your own bookings"));
        }
        let trip = self.trips.trip(booking.trip_id).await?;
        let parties = self.parties(&booking).await?;
        Ok(Self::view(booking, trip.as_ref(), parties))
    }

    /// Cancels a booking, refunds according to the policy and releases its seats.
    ///
    /// # Errors
    ///
    /// - [`DomainError::NotFound`]
    /// - [`DomainError::Forbidden`] unless the actor owns the booking or is an admin
    /// - [`DomainError::InvalidState`] if it is already cancelled or completed
    #[tracing::instrument(skip(self, reason), fields(actor = %actor.id))]
    pub async fn cancel_booking(
        &self,
        booking_id: BookingId,
        reason: Option<String>,
        actor: &Actor,
    ) -> Result<CancellationOutcome, DomainError> {
        let booking = self.booking(booking_id).await?;
        if !booking.is_owned_by(actor.id) && !actor.is_administrative() {
            return Err(DomainError::forbidden("you may only cancel your own bookings"));
        }
        self.cancel(booking, reason).await
    }

    /// Moves a booking along the booking transition table.
    ///
    /// Admins and the operator of the booked bus may apply any allowed
    /// transition; the owner may only cancel. Cancelling through this path
    /// refunds and releases seats exactly like [`Self::cancel_booking`].
    ///
    /// # Errors
    ///
    /// - [`DomainError::NotFound`]
    /// - [`DomainError::Forbidden`]
    /// - [`DomainError::InvalidState`] for a transition the table forbids or a lost race
    #[tracing::instrument(skip(self), fields(actor = %actor.id))]
    pub async fn update_booking_status(
        &self,
        booking_id: BookingId,
        status: BookingStatus,
        actor: &Actor,
    ) -> Result<BookingStatusUpdate, DomainError> {
        let booking = self.booking(booking_id).await?;
        let manages = self.manages(&booking, actor).await?;

        if status == BookingStatus::Cancelled {
            if !manages && !booking.is_owned_by(actor.id) {
                return Err(DomainError::forbidden("you may only cancel your own bookings"));
            }
            return self.cancel(booking, None).await.map(Into::into);
        }

        if !manages {
            return Err(DomainError::forbidden(
                "only the bus operator or an admin may change booking status",
            ));
        }
        let current = booking.status;
        let next = current.transition(status)?;
        let transition = BookingTransition {
            status: next,
            payment_status: next.payment_on_entry(booking.payment_status),
            cancellation: None,
            updated_at: self.clock.now(),
        };

        let (booking, _trip) = self
            .bookings
            .transition_booking(booking.id, current, transition)
            .await?;
        EngineMetrics::record_booking(next);
        info!(booking_reference = %booking.reference, from = %current, to = %next, "Booking status changed");
        Ok(BookingStatusUpdate {
            booking,
            refund: None,
        })
    }

    /// Seats taken and free on a trip.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] if the trip does not exist.
    pub async fn seat_map(&self, trip_id: TripId) -> Result<SeatMap, DomainError> {
        let trip = self.trip(trip_id).await?;
        let held = self.bookings.held_seats(trip.id).await?;
        let free = (1..=trip.total_seats)
            .map(SeatNumber::new)
            .filter(|seat| !held.contains(seat))
            .collect();
        Ok(SeatMap {
            trip_id: trip.id,
            total_seats: trip.total_seats,
            available_seats: trip.available_seats,
            taken: held.into_iter().collect(),
            free,
        })
    }

    /// Seats in use on a bus for a date, summed over its active trips.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] if the bus does not exist.
    pub async fn bus_occupancy(&self, bus_id: BusId, date: NaiveDate) -> Result<BusOccupancy, DomainError> {
        let bus = self
            .registry
            .bus(bus_id)
            .await?
            .ok_or_else(|| DomainError::not_found("bus", bus_id))?;
        let seats_in_use = self.bookings.bus_seats_in_use(bus.id, date).await?;
        Ok(BusOccupancy {
            bus_id: bus.id,
            date,
            total_seats: bus.total_seats,
            seats_in_use,
            available: u32::from(bus.total_seats).saturating_sub(seats_in_use),
        })
    }

    async fn cancel(
        &self,
        booking: Booking,
        reason: Option<String>,
    ) -> Result<CancellationOutcome, DomainError> {
        let _timer = OperationTimer::start("cancel_booking");

        match booking.status {
            BookingStatus::Cancelled => {
                return Err(DomainError::invalid_state("booking is already cancelled"));
            }
            BookingStatus::Completed => {
                return Err(DomainError::invalid_state("a completed booking cannot be cancelled"));
            }
            BookingStatus::Pending | BookingStatus::Confirmed => {}
        }

        let trip = self.trip(booking.trip_id).await?;
        let now = self.clock.now();
        let quote = self.refunds.quote(booking.total_amount, trip.departs_at() - now);

        let transition = BookingTransition {
            status: BookingStatus::Cancelled,
            payment_status: BookingStatus::Cancelled.payment_on_entry(booking.payment_status),
            cancellation: Some(Cancellation {
                reason: reason.filter(|text| !text.trim().is_empty()),
                cancelled_at: now,
                refund_amount: quote.refund_amount,
            }),
            updated_at: now,
        };

        let (booking, trip) = self
            .bookings
            .transition_booking(booking.id, booking.status, transition)
            .await?;

        EngineMetrics::record_booking(BookingStatus::Cancelled);
        EngineMetrics::record_refund(quote.refund_amount.minor());
        info!(
            booking_reference = %booking.reference,
            refund = %quote.refund_amount,
            refund_percentage = quote.refund_percentage,
            available_seats = trip.available_seats,
            "Booking cancelled"
        );
        Ok(CancellationOutcome {
            booking,
            refund: quote,
        })
    }

    async fn trip(&self, trip_id: TripId) -> Result<Trip, DomainError> {
        self.trips
            .trip(trip_id)
            .await?
            .ok_or_else(|| DomainError::not_found("trip", trip_id))
    }

    async fn booking(&self, booking_id: BookingId) -> Result<Booking, DomainError> {
        self.bookings
            .booking(booking_id)
            .await?
            .ok_or_else(|| DomainError::not_found("booking", booking_id))
    }

    /// Admins, or the operator who owns the booked bus.
    async fn manages(&self, booking: &Booking, actor: &Actor) -> Result<bool, DomainError> {
        if actor.is_administrative() {
            return Ok(true);
        }
        if actor.role != Role::BusOperator {
            return Ok(false);
        }
        Ok(self
            .registry
            .bus(booking.bus_id)
            .await?
            .is_some_and(|bus| actor.may_manage_bus(&bus)))
    }

    /// Owner, bus and route records shown alongside a booking.
    async fn parties(&self, booking: &Booking) -> Result<Parties, DomainError> {
        Ok(Parties {
            user: self.registry.user(booking.user_id).await?,
            bus: self.registry.bus(booking.bus_id).await?,
            route: self.registry.route(booking.route_id).await?,
        })
    }

    fn view(booking: Booking, trip: Option<&Trip>, parties: Parties) -> BookingView {
        BookingView {
            trip: trip.map(TripSummary::from),
            user: parties.user.map(Into::into),
            bus: parties.bus.map(Into::into),
            route: parties.route,
            booking,
        }
    }

    fn rejected(error: StoreError) -> DomainError {
        match &error {
            StoreError::SeatsTaken(seats) => {
                EngineMetrics::record_seat_conflict();
                warn!(?seats, "Booking lost a race for seats");
            }
            StoreError::InsufficientSeats { .. } | StoreError::TripNotBookable(_) => {
                warn!(%error, "Booking rejected at write time");
            }
            StoreError::Unavailable(message) => error!(%message, "Booking store unavailable"),
            _ => {}
        }
        error.into()
    }
}
