//! A standard fleet and record builders for tests.
//!
//! Dates are relative to [`crate::mocks::test_epoch`], so tests that pair these
//! fixtures with [`crate::test_clock`] never schedule in the past.

use crate::mocks::test_epoch;
use crate::registry::InMemoryRegistry;
use chrono::{Duration, NaiveDate};
use coachline_core::booking::{Booking, BookingStatus, Gender, PassengerSeat, PaymentMethod, PaymentStatus};
use coachline_core::registry::{Actor, Bus, BusStatus, Role, Route, SubRole, UserProfile};
use coachline_core::trip::{Trip, TripDraft};
use coachline_core::types::{
    BookingId, BookingReference, BusId, Money, RouteId, SeatNumber, ServiceTime, TripId, UserId,
};

/// Accounts, buses and a route wired together.
#[derive(Clone, Debug)]
pub struct Fleet {
    /// Owns `bus`, `second_bus` and `maintenance_bus`
    pub operator: UserProfile,
    /// Owns nothing in this fleet
    pub other_operator: UserProfile,
    /// Driver employee
    pub driver: UserProfile,
    /// Another driver employee
    pub second_driver: UserProfile,
    /// Helper employee
    pub helper: UserProfile,
    /// Booking agent employee (neither driver nor helper)
    pub agent: UserProfile,
    /// Customer
    pub customer: UserProfile,
    /// Another customer
    pub other_customer: UserProfile,
    /// Administrator
    pub admin: UserProfile,
    /// 40-seat active bus
    pub bus: Bus,
    /// 30-seat active bus
    pub second_bus: Bus,
    /// Bus in maintenance
    pub maintenance_bus: Bus,
    /// Route
    pub route: Route,
}

fn user(name: &str, role: Role, subrole: Option<SubRole>) -> UserProfile {
    UserProfile {
        id: UserId::new(),
        name: name.to_string(),
        phone: Some("+91-98450-00000".to_string()),
        role,
        subrole,
    }
}

fn bus(operator: UserId, serial: u16, name: &str, total_seats: u16, status: BusStatus) -> Bus {
    Bus {
        id: BusId::new(),
        operator_id: operator,
        registration_number: format!("KA-01-{serial:04}"),
        name: name.to_string(),
        total_seats,
        status,
    }
}

impl Fleet {
    /// A fresh fleet with random identifiers.
    #[must_use]
    pub fn standard() -> Self {
        let operator = user("Konkan Travels", Role::BusOperator, None);
        let operator_id = operator.id;
        Self {
            other_operator: user("Deccan Lines", Role::BusOperator, None),
            driver: user("Ravi", Role::BusEmployee, Some(SubRole::Driver)),
            second_driver: user("Suresh", Role::BusEmployee, Some(SubRole::Driver)),
            helper: user("Imran", Role::BusEmployee, Some(SubRole::Helper)),
            agent: user("Meena", Role::BusEmployee, Some(SubRole::BookingAgent)),
            customer: user("Asha", Role::Customer, None),
            other_customer: user("Vikram", Role::Customer, None),
            admin: user("Root", Role::Admin, None),
            bus: bus(operator_id, 1, "Night Rider", 40, BusStatus::Active),
            second_bus: bus(operator_id, 2, "Day Liner", 30, BusStatus::Active),
            maintenance_bus: bus(operator_id, 3, "Old Faithful", 40, BusStatus::Maintenance),
            route: Route {
                id: RouteId::new(),
                name: "Coastal".to_string(),
                origin: "Mangaluru".to_string(),
                destination: "Goa".to_string(),
            },
            operator,
        }
    }

    /// Registry holding every record of the fleet.
    #[must_use]
    pub fn registry(&self) -> InMemoryRegistry {
        [
            &self.operator,
            &self.other_operator,
            &self.driver,
            &self.second_driver,
            &self.helper,
            &self.agent,
            &self.customer,
            &self.other_customer,
            &self.admin,
        ]
        .into_iter()
        .cloned()
        .fold(InMemoryRegistry::new(), InMemoryRegistry::with_user)
        .with_bus(self.bus.clone())
        .with_bus(self.second_bus.clone())
        .with_bus(self.maintenance_bus.clone())
        .with_route(self.route.clone())
    }

    /// The service date `days` after the test epoch.
    #[must_use]
    pub fn date(&self, days: i64) -> NaiveDate {
        (test_epoch() + Duration::days(days)).date_naive()
    }

    /// Actor for an account of the fleet.
    #[must_use]
    pub fn actor(profile: &UserProfile) -> Actor {
        Actor::new(profile.id, profile.role)
    }
}

/// Parses a fixture time, falling back to midnight on a typo.
#[must_use]
pub fn time(raw: &str) -> ServiceTime {
    ServiceTime::parse(raw).unwrap_or(ServiceTime::MIDNIGHT)
}

/// A trip draft on the fleet's first bus with its driver and helper, fare 500.
#[must_use]
pub fn draft_for(fleet: &Fleet, date: NaiveDate) -> TripDraft {
    TripDraft {
        id: TripId::new(),
        route_id: fleet.route.id,
        bus_id: fleet.bus.id,
        driver_id: fleet.driver.id,
        helper_id: Some(fleet.helper.id),
        departure_time: time("08:00"),
        arrival_time: time("14:30"),
        departure_date: date,
        pickup_points: vec!["Mangaluru Central".to_string(), "Udupi".to_string()],
        drop_points: vec!["Panaji".to_string()],
        fare: Money::from_minor(500),
        total_seats: fleet.bus.total_seats,
        created_at: test_epoch(),
    }
}

/// A passenger in `seat`.
#[must_use]
pub fn passenger(seat: u16) -> PassengerSeat {
    PassengerSeat {
        seat_number: SeatNumber::new(seat),
        passenger_name: format!("Passenger {seat}"),
        passenger_age: 34,
        passenger_gender: Gender::Other,
        passenger_phone: None,
    }
}

/// A pending booking on `trip` for the given seats, priced at the trip fare.
#[must_use]
pub fn booking_for(trip: &Trip, user_id: UserId, seats: &[u16], reference: &str) -> Booking {
    let seats: Vec<_> = seats.iter().copied().map(passenger).collect();
    let total_amount = trip.fare_for(seats.len()).unwrap_or(Money::ZERO);
    Booking {
        id: BookingId::new(),
        reference: BookingReference::new(reference),
        user_id,
        trip_id: trip.id,
        bus_id: trip.bus_id,
        route_id: trip.route_id,
        seats,
        boarding_point: trip.pickup_points.first().cloned().unwrap_or_default(),
        dropping_point: trip.drop_points.first().cloned().unwrap_or_default(),
        journey_date: trip.departure_date,
        total_amount,
        refund_amount: None,
        status: BookingStatus::Pending,
        payment_status: PaymentStatus::Pending,
        payment_method: PaymentMethod::Cash,
        cancellation_reason: None,
        cancelled_at: None,
        created_at: test_epoch(),
        updated_at: test_epoch(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn fleet_buses_have_distinct_registrations() {
        let fleet = Fleet::standard();
        let registrations: HashSet<_> = [&fleet.bus, &fleet.second_bus, &fleet.maintenance_bus]
            .into_iter()
            .map(|bus| bus.registration_number.as_str())
            .collect();
        assert_eq!(registrations.len(), 3);
        assert_ne!(fleet.bus.registration_number, fleet.maintenance_bus.registration_number);
    }
}
