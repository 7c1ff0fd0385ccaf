//! Trip scheduling: creating trips and moving them through their lifecycle.
//!
//! The scheduler validates input and authorizes the actor; the [`TripStore`]
//! enforces resource exclusivity atomically when the trip is written.

use crate::metrics::{EngineMetrics, OperationTimer};
use chrono::NaiveDate;
use coachline_core::environment::Clock;
use coachline_core::error::DomainError;
use coachline_core::registry::{Actor, Bus, ResourceRegistry};
use coachline_core::store::{StoreError, TripStore};
use coachline_core::trip::{Trip, TripDraft, TripStatus};
use coachline_core::types::{BusId, Money, RouteId, ServiceTime, TripId, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Request to schedule a trip.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleTrip {
    /// Route to serve
    pub route_id: RouteId,
    /// Bus to assign
    pub bus_id: BusId,
    /// Driver to assign
    pub driver_id: UserId,
    /// Optional helper
    #[serde(default)]
    pub helper_id: Option<UserId>,
    /// `HH:MM`
    pub departure_time: String,
    /// `HH:MM`
    pub arrival_time: String,
    /// Service date
    pub departure_date: NaiveDate,
    /// Boarding points
    #[serde(default)]
    pub pickup_points: Vec<String>,
    /// Alighting points
    #[serde(default)]
    pub drop_points: Vec<String>,
    /// Per-seat fare in minor units
    pub fare: Money,
}

/// Partial update of a trip's schedule. Absent fields are left unchanged.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleTrip {
    /// Move to another bus (only while unbooked)
    #[serde(default)]
    pub bus_id: Option<BusId>,
    /// Replace the driver
    #[serde(default)]
    pub driver_id: Option<UserId>,
    /// Replace the helper
    #[serde(default)]
    pub helper_id: Option<UserId>,
    /// Drop the helper
    #[serde(default)]
    pub remove_helper: bool,
    /// `HH:MM`
    #[serde(default)]
    pub departure_time: Option<String>,
    /// `HH:MM`
    #[serde(default)]
    pub arrival_time: Option<String>,
    /// Move to another date (only while unbooked)
    #[serde(default)]
    pub departure_date: Option<NaiveDate>,
    /// Replace boarding points
    #[serde(default)]
    pub pickup_points: Option<Vec<String>>,
    /// Replace alighting points
    #[serde(default)]
    pub drop_points: Option<Vec<String>>,
    /// Replace the fare (applies to future bookings)
    #[serde(default)]
    pub fare: Option<Money>,
}

/// Creates and manages trips.
#[derive(Clone)]
pub struct TripScheduler {
    trips: Arc<dyn TripStore>,
    registry: Arc<dyn ResourceRegistry>,
    clock: Arc<dyn Clock>,
}

fn parse_time(field: &str, raw: &str) -> Result<ServiceTime, DomainError> {
    ServiceTime::parse(raw)
        .map_err(|_| DomainError::validation(format!("{field} must be a 24-hour HH:MM time, got '{raw}'")))
}

impl TripScheduler {
    /// Creates a scheduler.
    #[must_use]
    pub fn new(
        trips: Arc<dyn TripStore>,
        registry: Arc<dyn ResourceRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            trips,
            registry,
            clock,
        }
    }

    /// Schedules a trip.
    ///
    /// # Errors
    ///
    /// - [`DomainError::Validation`] for malformed times, a past date or an
    ///   unsuitable driver/helper
    /// - [`DomainError::NotFound`] for an unknown bus, route or crew member
    /// - [`DomainError::InvalidState`] if the bus is not active
    /// - [`DomainError::Forbidden`] if the actor does not manage the bus
    /// - [`DomainError::ResourceConflict`] if the bus, driver or helper is taken
    #[tracing::instrument(skip(self, request), fields(bus_id = %request.bus_id, date = %request.departure_date, actor = %actor.id))]
    pub async fn schedule(&self, request: ScheduleTrip, actor: &Actor) -> Result<Trip, DomainError> {
        let _timer = OperationTimer::start("schedule_trip");

        let departure_time = parse_time("departureTime", &request.departure_time)?;
        let arrival_time = parse_time("arrivalTime", &request.arrival_time)?;
        self.ensure_not_past(request.departure_date)?;

        let bus = self.bookable_bus(request.bus_id).await?;
        if !actor.may_manage_bus(&bus) {
            return Err(DomainError::forbidden("only the bus operator or an admin may schedule this bus"));
        }
        self.registry
            .route(request.route_id)
            .await?
            .ok_or_else(|| DomainError::not_found("route", request.route_id))?;
        self.validate_crew(request.driver_id, request.helper_id).await?;

        let draft = TripDraft {
            id: TripId::new(),
            route_id: request.route_id,
            bus_id: bus.id,
            driver_id: request.driver_id,
            helper_id: request.helper_id,
            departure_time,
            arrival_time,
            departure_date: request.departure_date,
            pickup_points: request.pickup_points,
            drop_points: request.drop_points,
            fare: request.fare,
            total_seats: bus.total_seats,
            created_at: self.clock.now(),
        };

        let trip = self.trips.insert_trip(draft).await.map_err(Self::conflict)?;
        EngineMetrics::record_trip_scheduled();
        info!(trip_id = %trip.id, trip_number = %trip.trip_number, "Trip scheduled");
        Ok(trip)
    }

    /// Loads a trip.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] if it does not exist.
    pub async fn get(&self, trip_id: TripId) -> Result<Trip, DomainError> {
        self.trips
            .trip(trip_id)
            .await?
            .ok_or_else(|| DomainError::not_found("trip", trip_id))
    }

    /// Moves a trip to `status` according to the trip transition table.
    ///
    /// Returning to an active status re-checks resource exclusivity.
    ///
    /// # Errors
    ///
    /// - [`DomainError::NotFound`]
    /// - [`DomainError::Forbidden`]
    /// - [`DomainError::InvalidState`] for a transition the table forbids or a lost race
    /// - [`DomainError::ResourceConflict`] when reactivating onto a taken resource
    #[tracing::instrument(skip(self), fields(actor = %actor.id))]
    pub async fn update_status(
        &self,
        trip_id: TripId,
        status: TripStatus,
        actor: &Actor,
    ) -> Result<Trip, DomainError> {
        let _timer = OperationTimer::start("update_trip_status");

        let mut trip = self.get(trip_id).await?;
        self.authorize(&trip, actor).await?;

        let current = trip.status;
        trip.status = current.transition(status)?;
        trip.updated_at = self.clock.now();

        let trip = self
            .trips
            .update_trip(&trip, current)
            .await
            .map_err(Self::conflict)?;
        info!(from = %current, to = %trip.status, "Trip status changed");
        Ok(trip)
    }

    /// Changes a trip's schedule.
    ///
    /// Bus and date may only change while no seats are held.
    ///
    /// # Errors
    ///
    /// Same kinds as [`Self::schedule`], plus [`DomainError::InvalidState`] for
    /// terminal trips or for moving a booked trip.
    #[tracing::instrument(skip(self, changes), fields(actor = %actor.id))]
    pub async fn reschedule(
        &self,
        trip_id: TripId,
        changes: RescheduleTrip,
        actor: &Actor,
    ) -> Result<Trip, DomainError> {
        let _timer = OperationTimer::start("reschedule_trip");

        let mut trip = self.get(trip_id).await?;
        self.authorize(&trip, actor).await?;
        if trip.status.is_terminal() {
            return Err(DomainError::invalid_state(format!(
                "trip is {}, which is terminal",
                trip.status
            )));
        }

        let moves_bus = changes.bus_id.is_some_and(|bus_id| bus_id != trip.bus_id);
        let moves_date = changes
            .departure_date
            .is_some_and(|date| date != trip.departure_date);
        if (moves_bus || moves_date) && trip.total_bookings > 0 {
            return Err(DomainError::invalid_state(
                "a trip with booked seats cannot change bus or date",
            ));
        }

        if let Some(raw) = &changes.departure_time {
            trip.departure_time = parse_time("departureTime", raw)?;
        }
        if let Some(raw) = &changes.arrival_time {
            trip.arrival_time = parse_time("arrivalTime", raw)?;
        }
        if let Some(date) = changes.departure_date {
            self.ensure_not_past(date)?;
            trip.departure_date = date;
        }
        if let Some(bus_id) = changes.bus_id.filter(|_| moves_bus) {
            let bus = self.bookable_bus(bus_id).await?;
            if !actor.may_manage_bus(&bus) {
                return Err(DomainError::forbidden("only the bus operator or an admin may assign this bus"));
            }
            trip.bus_id = bus.id;
            trip.total_seats = bus.total_seats;
        }

        if let Some(driver_id) = changes.driver_id {
            trip.driver_id = driver_id;
        }
        if changes.remove_helper {
            trip.helper_id = None;
        } else if let Some(helper_id) = changes.helper_id {
            trip.helper_id = Some(helper_id);
        }
        self.validate_crew(trip.driver_id, trip.helper_id).await?;

        if let Some(points) = changes.pickup_points {
            trip.pickup_points = points;
        }
        if let Some(points) = changes.drop_points {
            trip.drop_points = points;
        }
        if let Some(fare) = changes.fare {
            trip.fare = fare;
        }
        trip.updated_at = self.clock.now();

        let trip = self
            .trips
            .update_trip(&trip, trip.status)
            .await
            .map_err(Self::conflict)?;
        info!(trip_number = %trip.trip_number, "Trip rescheduled");
        Ok(trip)
    }

    /// Deletes a trip that has never been booked.
    ///
    /// # Errors
    ///
    /// - [`DomainError::NotFound`]
    /// - [`DomainError::Forbidden`]
    /// - [`DomainError::Conflict`] if any booking references the trip
    #[tracing::instrument(skip(self), fields(actor = %actor.id))]
    pub async fn delete(&self, trip_id: TripId, actor: &Actor) -> Result<(), DomainError> {
        let trip = self.get(trip_id).await?;
        self.authorize(&trip, actor).await?;
        self.trips.delete_trip(trip_id).await?;
        info!(trip_number = %trip.trip_number, "Trip deleted");
        Ok(())
    }

    fn ensure_not_past(&self, date: NaiveDate) -> Result<(), DomainError> {
        if date < self.clock.now().date_naive() {
            return Err(DomainError::validation(format!(
                "departure date {date} is in the past"
            )));
        }
        Ok(())
    }

    async fn bookable_bus(&self, bus_id: BusId) -> Result<Bus, DomainError> {
        let bus = self
            .registry
            .bus(bus_id)
            .await?
            .ok_or_else(|| DomainError::not_found("bus", bus_id))?;
        if !bus.is_active() {
            return Err(DomainError::invalid_state(format!(
                "bus {} is not active",
                bus.registration_number
            )));
        }
        Ok(bus)
    }

    async fn validate_crew(
        &self,
        driver_id: UserId,
        helper_id: Option<UserId>,
    ) -> Result<(), DomainError> {
        let driver = self
            .registry
            .user(driver_id)
            .await?
            .ok_or_else(|| DomainError::not_found("driver", driver_id))?;
        if !driver.is_driver() {
            return Err(DomainError::validation(format!(
                "{} is not a bus employee with the driver subrole",
                driver.name
            )));
        }

        if let Some(helper_id) = helper_id {
            if helper_id == driver_id {
                return Err(DomainError::validation("driver and helper must be different people"));
            }
            let helper = self
                .registry
                .user(helper_id)
                .await?
                .ok_or_else(|| DomainError::not_found("helper", helper_id))?;
            if !helper.is_helper() {
                return Err(DomainError::validation(format!(
                    "{} is not a bus employee with the helper subrole",
                    helper.name
                )));
            }
        }
        Ok(())
    }

    async fn authorize(&self, trip: &Trip, actor: &Actor) -> Result<(), DomainError> {
        if actor.is_administrative() {
            return Ok(());
        }
        match self.registry.bus(trip.bus_id).await? {
            Some(bus) if actor.may_manage_bus(&bus) => Ok(()),
            _ => Err(DomainError::forbidden(
                "only the bus operator or an admin may manage this trip",
            )),
        }
    }

    fn conflict(error: StoreError) -> DomainError {
        if let StoreError::ResourceTaken { resource, date } = &error {
            EngineMetrics::record_schedule_conflict(*resource);
            warn!(%resource, %date, "Schedule rejected: resource already assigned");
        }
        error.into()
    }
}
