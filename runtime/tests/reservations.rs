//! Booking lifecycle behaviour against the in-memory store.

#![allow(clippy::unwrap_used, clippy::panic)]

mod common;

use chrono::Duration;
use common::{booking_request, Harness};
use coachline_core::booking::{BookingStatus, PaymentMethod, PaymentStatus};
use coachline_core::error::DomainError;
use coachline_core::trip::TripStatus;
use coachline_core::types::{BookingReference, Money, SeatNumber};
use coachline_runtime::{Collaborators, ReservationEngine};
use coachline_testing::fixtures::{passenger, Fleet};
use coachline_testing::{test_clock, FixedReferenceGenerator, InMemoryStore, SwitchableRegistry};
use std::sync::Arc;

#[tokio::test]
async fn booking_charges_the_fare_per_seat_and_holds_seats() {
    let h = Harness::new();
    let trip_id = h.scheduled_trip(2).await;

    let view = h
        .engine
        .reservations
        .create_booking(trip_id, booking_request(&[5, 6]), &h.customer())
        .await
        .unwrap();

    assert_eq!(view.booking.total_amount, Money::from_minor(1000));
    assert_eq!(view.booking.status, BookingStatus::Pending);
    assert_eq!(view.booking.payment_status, PaymentStatus::Pending);
    assert_eq!(view.booking.payment_method, PaymentMethod::Card);
    assert_eq!(view.booking.reference.as_str(), "BKTEST0001");
    assert_eq!(view.booking.user_id, h.fleet.customer.id);
    assert_eq!(view.trip.as_ref().unwrap().trip_number.as_str(), "TR-001");
    assert_eq!(view.bus.as_ref().unwrap().name, "Night Rider");

    let trip = h.engine.scheduler.get(trip_id).await.unwrap();
    assert_eq!(trip.available_seats, 38);
    assert_eq!(trip.total_bookings, 2);
}

#[tokio::test]
async fn held_seat_cannot_be_booked_twice() {
    let h = Harness::new();
    let trip_id = h.scheduled_trip(2).await;
    let reservations = &h.engine.reservations;

    reservations
        .create_booking(trip_id, booking_request(&[5, 6]), &h.customer())
        .await
        .unwrap();
    let err = reservations
        .create_booking(trip_id, booking_request(&[5]), &h.other_customer())
        .await
        .unwrap_err();

    match err {
        DomainError::SeatConflict { seats } => assert_eq!(seats, vec![SeatNumber::new(5)]),
        other => panic!("expected a seat conflict, got {other:?}"),
    }
    let trip = h.engine.scheduler.get(trip_id).await.unwrap();
    assert_eq!(trip.available_seats, 38);
}

#[tokio::test]
async fn early_cancellation_refunds_everything_and_frees_seats() {
    let h = Harness::new();
    let trip_id = h.scheduled_trip(2).await;
    let reservations = &h.engine.reservations;

    let booking = reservations
        .create_booking(trip_id, booking_request(&[5, 6]), &h.customer())
        .await
        .unwrap()
        .booking;

    let departs = h.engine.scheduler.get(trip_id).await.unwrap().departs_at();
    h.clock.set(departs - Duration::hours(30));

    let outcome = reservations
        .cancel_booking(booking.id, Some("plans changed".to_string()), &h.customer())
        .await
        .unwrap();

    assert_eq!(outcome.refund.refund_percentage, 100);
    assert_eq!(outcome.refund.refund_amount, Money::from_minor(1000));
    assert_eq!(outcome.booking.status, BookingStatus::Cancelled);
    assert_eq!(outcome.booking.payment_status, PaymentStatus::Refunded);
    assert_eq!(outcome.booking.refund_amount, Some(Money::from_minor(1000)));
    assert_eq!(outcome.booking.cancellation_reason.as_deref(), Some("plans changed"));
    assert!(outcome.booking.cancelled_at.is_some());

    let trip = h.engine.scheduler.get(trip_id).await.unwrap();
    assert_eq!(trip.available_seats, 40);
    assert_eq!(trip.total_bookings, 0);

    // Released seats can be booked again.
    reservations
        .create_booking(trip_id, booking_request(&[5]), &h.other_customer())
        .await
        .unwrap();
}

#[tokio::test]
async fn late_cancellation_refunds_nothing() {
    let h = Harness::new();
    let trip_id = h.scheduled_trip(2).await;
    let booking = h
        .engine
        .reservations
        .create_booking(trip_id, booking_request(&[9]), &h.customer())
        .await
        .unwrap()
        .booking;

    let departs = h.engine.scheduler.get(trip_id).await.unwrap().departs_at();
    h.clock.set(departs - Duration::hours(1));

    let outcome = h
        .engine
        .reservations
        .cancel_booking(booking.id, None, &h.customer())
        .await
        .unwrap();
    assert_eq!(outcome.refund.refund_percentage, 0);
    assert_eq!(outcome.refund.refund_amount, Money::ZERO);
    assert!(outcome.refund.hours_until_departure > 0.9 && outcome.refund.hours_until_departure < 1.1);
    assert_eq!(outcome.booking.cancellation_reason, None);
}

#[tokio::test]
async fn middle_tier_refunds_half() {
    let h = Harness::new();
    let trip_id = h.scheduled_trip(2).await;
    let booking = h
        .engine
        .reservations
        .create_booking(trip_id, booking_request(&[1, 2, 3]), &h.customer())
        .await
        .unwrap()
        .booking;

    let departs = h.engine.scheduler.get(trip_id).await.unwrap().departs_at();
    h.clock.set(departs - Duration::hours(10));

    let outcome = h
        .engine
        .reservations
        .cancel_booking(booking.id, None, &h.customer())
        .await
        .unwrap();
    assert_eq!(outcome.refund.refund_percentage, 50);
    assert_eq!(outcome.refund.refund_amount, Money::from_minor(750));
}

#[tokio::test]
async fn refund_tiers_count_down_to_the_departure_time() {
    let h = Harness::new();
    let trip_id = h.scheduled_trip(2).await;
    let reservations = &h.engine.reservations;
    let mut bookings = Vec::new();
    for seat in [1, 2, 3] {
        let booking = reservations
            .create_booking(trip_id, booking_request(&[seat]), &h.customer())
            .await
            .unwrap()
            .booking;
        bookings.push(booking);
    }
    // 08:00 on the service date, not midnight.
    let departs = h.engine.scheduler.get(trip_id).await.unwrap().departs_at();

    h.clock.set(departs - Duration::hours(24) - Duration::minutes(1));
    let early = reservations
        .cancel_booking(bookings[0].id, None, &h.customer())
        .await
        .unwrap();
    assert_eq!(early.refund.refund_percentage, 100);

    h.clock.set(departs - Duration::hours(24));
    let on_the_bound = reservations
        .cancel_booking(bookings[1].id, None, &h.customer())
        .await
        .unwrap();
    assert_eq!(on_the_bound.refund.refund_percentage, 50);
    assert!((on_the_bound.refund.hours_until_departure - 24.0).abs() < f64::EPSILON);

    h.clock.set(departs - Duration::hours(2));
    let late = reservations
        .cancel_booking(bookings[2].id, None, &h.customer())
        .await
        .unwrap();
    assert_eq!(late.refund.refund_percentage, 0);
}

#[tokio::test]
async fn request_larger_than_the_remaining_seats_is_rejected() {
    let h = Harness::new();
    let mut request = h.schedule_request(2);
    request.bus_id = h.fleet.second_bus.id;
    let trip_id = h
        .engine
        .scheduler
        .schedule(request, &h.operator())
        .await
        .unwrap()
        .id;
    let reservations = &h.engine.reservations;

    let all_but_three: Vec<u16> = (1..=27).collect();
    reservations
        .create_booking(trip_id, booking_request(&all_but_three), &h.customer())
        .await
        .unwrap();

    let err = reservations
        .create_booking(trip_id, booking_request(&[28, 29, 30, 1, 2]), &h.other_customer())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DomainError::CapacityExceeded {
            requested: 5,
            available: 3
        }
    ));
}

#[tokio::test]
async fn malformed_seat_requests_are_rejected() {
    let h = Harness::new();
    let trip_id = h.scheduled_trip(2).await;
    let reservations = &h.engine.reservations;

    for seats in [vec![], vec![0], vec![41], vec![3, 3]] {
        let err = reservations
            .create_booking(trip_id, booking_request(&seats), &h.customer())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)), "{seats:?}: {err:?}");
    }

    let mut request = booking_request(&[4]);
    request.seats[0].passenger_name = "  ".to_string();
    assert!(matches!(
        reservations.create_booking(trip_id, request, &h.customer()).await,
        Err(DomainError::Validation(_))
    ));

    let mut request = booking_request(&[4]);
    request.boarding_point = "Karwar".to_string();
    assert!(matches!(
        reservations.create_booking(trip_id, request, &h.customer()).await,
        Err(DomainError::Validation(_))
    ));

    let trip = h.engine.scheduler.get(trip_id).await.unwrap();
    assert_eq!(trip.available_seats, 40);
}

#[tokio::test]
async fn departed_or_unknown_trips_cannot_be_booked() {
    let h = Harness::new();
    let trip_id = h.scheduled_trip(2).await;

    let departs = h.engine.scheduler.get(trip_id).await.unwrap().departs_at();
    h.clock.set(departs + Duration::minutes(5));
    assert!(matches!(
        h.engine
            .reservations
            .create_booking(trip_id, booking_request(&[1]), &h.customer())
            .await,
        Err(DomainError::InvalidState(_))
    ));

    let unknown = coachline_core::types::TripId::new();
    assert!(matches!(
        h.engine
            .reservations
            .create_booking(unknown, booking_request(&[1]), &h.customer())
            .await,
        Err(DomainError::NotFound { entity: "trip", .. })
    ));
}

#[tokio::test]
async fn in_progress_trip_does_not_accept_bookings() {
    let h = Harness::new();
    let trip_id = h.scheduled_trip(2).await;
    h.engine
        .scheduler
        .update_status(trip_id, TripStatus::InProgress, &h.operator())
        .await
        .unwrap();

    assert!(matches!(
        h.engine
            .reservations
            .create_booking(trip_id, booking_request(&[1]), &h.customer())
            .await,
        Err(DomainError::InvalidState(_))
    ));
}

#[tokio::test]
async fn cancelling_twice_or_after_completion_is_invalid() {
    let h = Harness::new();
    let trip_id = h.scheduled_trip(2).await;
    let reservations = &h.engine.reservations;

    let first = reservations
        .create_booking(trip_id, booking_request(&[1]), &h.customer())
        .await
        .unwrap()
        .booking;
    reservations.cancel_booking(first.id, None, &h.customer()).await.unwrap();
    let err = reservations
        .cancel_booking(first.id, None, &h.customer())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidState(_)));

    let second = reservations
        .create_booking(trip_id, booking_request(&[2]), &h.customer())
        .await
        .unwrap()
        .booking;
    reservations
        .update_booking_status(second.id, BookingStatus::Confirmed, &h.operator())
        .await
        .unwrap();
    reservations
        .update_booking_status(second.id, BookingStatus::Completed, &h.operator())
        .await
        .unwrap();
    let err = reservations
        .cancel_booking(second.id, None, &h.customer())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidState(_)));

    // Cancelled seat 1 and completed seat 2 are both back in stock.
    let trip = h.engine.scheduler.get(trip_id).await.unwrap();
    assert_eq!(trip.available_seats, 40);
    assert_eq!(trip.total_bookings, 0);

    let rebooked = reservations
        .create_booking(trip_id, booking_request(&[2]), &h.other_customer())
        .await
        .unwrap();
    assert_eq!(rebooked.booking.status, BookingStatus::Pending);
    let trip = h.engine.scheduler.get(trip_id).await.unwrap();
    assert_eq!(trip.available_seats, 39);
}

#[tokio::test]
async fn status_updates_drive_the_payment_status() {
    let h = Harness::new();
    let trip_id = h.scheduled_trip(2).await;
    let reservations = &h.engine.reservations;
    let booking = reservations
        .create_booking(trip_id, booking_request(&[10, 11]), &h.customer())
        .await
        .unwrap()
        .booking;

    let update = reservations
        .update_booking_status(booking.id, BookingStatus::Confirmed, &h.operator())
        .await
        .unwrap();
    assert_eq!(update.booking.status, BookingStatus::Confirmed);
    assert_eq!(update.booking.payment_status, PaymentStatus::Completed);
    assert!(update.refund.is_none());

    let err = reservations
        .update_booking_status(booking.id, BookingStatus::Pending, &h.operator())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidState(_)));

    let update = reservations
        .update_booking_status(booking.id, BookingStatus::Cancelled, &h.operator())
        .await
        .unwrap();
    assert_eq!(update.booking.payment_status, PaymentStatus::Refunded);
    let refund = update.refund.unwrap();
    assert_eq!(refund.refund_percentage, 100);
    assert_eq!(refund.refund_amount, Money::from_minor(1000));

    let trip = h.engine.scheduler.get(trip_id).await.unwrap();
    assert_eq!(trip.available_seats, 40);
}

#[tokio::test]
async fn only_owners_and_managers_touch_a_booking() {
    let h = Harness::new();
    let trip_id = h.scheduled_trip(2).await;
    let reservations = &h.engine.reservations;
    let booking = reservations
        .create_booking(trip_id, booking_request(&[3]), &h.customer())
        .await
        .unwrap()
        .booking;

    assert!(matches!(
        reservations.get_booking(booking.id, &h.other_customer()).await,
        Err(DomainError::Forbidden(_))
    ));
    assert!(reservations.get_booking(booking.id, &h.operator()).await.is_ok());
    assert!(reservations.get_booking(booking.id, &h.admin()).await.is_ok());

    let stranger = Fleet::actor(&h.fleet.other_operator);
    assert!(matches!(
        reservations
            .update_booking_status(booking.id, BookingStatus::Confirmed, &stranger)
            .await,
        Err(DomainError::Forbidden(_))
    ));
    assert!(matches!(
        reservations
            .update_booking_status(booking.id, BookingStatus::Confirmed, &h.customer())
            .await,
        Err(DomainError::Forbidden(_))
    ));
    assert!(matches!(
        reservations.cancel_booking(booking.id, None, &h.other_customer()).await,
        Err(DomainError::Forbidden(_))
    ));
    assert!(matches!(
        reservations.cancel_booking(booking.id, None, &h.operator()).await,
        Err(DomainError::Forbidden(_))
    ));

    // The owner may cancel through the status path.
    let update = reservations
        .update_booking_status(booking.id, BookingStatus::Cancelled, &h.customer())
        .await
        .unwrap();
    assert_eq!(update.booking.status, BookingStatus::Cancelled);
}

#[tokio::test]
async fn seat_map_and_bus_occupancy_follow_bookings() {
    let h = Harness::new();
    let trip_id = h.scheduled_trip(2).await;
    let reservations = &h.engine.reservations;

    reservations
        .create_booking(trip_id, booking_request(&[1, 40]), &h.customer())
        .await
        .unwrap();
    let cancelled = reservations
        .create_booking(trip_id, booking_request(&[20]), &h.other_customer())
        .await
        .unwrap()
        .booking;
    reservations
        .cancel_booking(cancelled.id, None, &h.other_customer())
        .await
        .unwrap();

    let map = reservations.seat_map(trip_id).await.unwrap();
    assert_eq!(map.taken, vec![SeatNumber::new(1), SeatNumber::new(40)]);
    assert_eq!(map.free.len(), 38);
    assert!(map.free.contains(&SeatNumber::new(20)));
    assert_eq!(map.available_seats, 38);

    let occupancy = reservations
        .bus_occupancy(h.fleet.bus.id, h.fleet.date(2))
        .await
        .unwrap();
    assert_eq!(occupancy.seats_in_use, 2);
    assert_eq!(occupancy.available, 38);

    let other_day = reservations
        .bus_occupancy(h.fleet.bus.id, h.fleet.date(3))
        .await
        .unwrap();
    assert_eq!(other_day.seats_in_use, 0);
}

#[tokio::test]
async fn reference_collision_is_a_conflict() {
    let fleet = Fleet::standard();
    let store = InMemoryStore::new();
    let engine = ReservationEngine::new(
        Collaborators::new(Arc::new(store.clone()), Arc::new(store), Arc::new(fleet.registry()))
            .with_clock(Arc::new(test_clock()))
            .with_references(Arc::new(FixedReferenceGenerator(BookingReference::new("BKSAME")))),
    );
    let operator = Fleet::actor(&fleet.operator);
    let customer = Fleet::actor(&fleet.customer);

    let mut request = coachline_runtime::ScheduleTrip {
        route_id: fleet.route.id,
        bus_id: fleet.bus.id,
        driver_id: fleet.driver.id,
        helper_id: None,
        departure_time: "06:45".to_string(),
        arrival_time: "12:00".to_string(),
        departure_date: fleet.date(1),
        pickup_points: Vec::new(),
        drop_points: Vec::new(),
        fare: Money::from_minor(300),
    };
    request.pickup_points.push("Mangaluru Central".to_string());
    request.drop_points.push("Panaji".to_string());
    let trip = engine.scheduler.schedule(request, &operator).await.unwrap();

    engine
        .reservations
        .create_booking(trip.id, booking_request(&[1]), &customer)
        .await
        .unwrap();
    let mut second = booking_request(&[2]);
    second.seats.push(passenger(3));
    let err = engine
        .reservations
        .create_booking(trip.id, second, &customer)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Conflict(_)));

    let trip = engine.scheduler.get(trip.id).await.unwrap();
    assert_eq!(trip.available_seats, 39);
}

#[tokio::test]
async fn registry_outage_is_an_internal_error_not_an_empty_view() {
    let fleet = Fleet::standard();
    let registry = SwitchableRegistry::new(fleet.registry());
    let h = Harness::with_registry(fleet, Arc::new(registry.clone()));
    let trip_id = h.scheduled_trip(2).await;
    let reservations = &h.engine.reservations;
    let booking = reservations
        .create_booking(trip_id, booking_request(&[4]), &h.customer())
        .await
        .unwrap()
        .booking;

    registry.fail();
    let err = reservations.get_booking(booking.id, &h.customer()).await.unwrap_err();
    assert!(matches!(err, DomainError::Internal(_)), "{err:?}");

    let err = reservations
        .create_booking(trip_id, booking_request(&[5]), &h.customer())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Internal(_)), "{err:?}");

    registry.recover();
    let view = reservations.get_booking(booking.id, &h.customer()).await.unwrap();
    assert_eq!(view.user.map(|user| user.id), Some(h.fleet.customer.id));
    let trip = h.engine.scheduler.get(trip_id).await.unwrap();
    assert_eq!(trip.available_seats, 39);
}
