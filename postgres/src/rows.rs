//! Column lists and row decoding shared by the stores.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use coachline_core::booking::{Booking, PassengerSeat};
use coachline_core::registry::{Bus, BusStatus, Role, Route, SubRole, UserProfile};
use coachline_core::store::StoreError;
use coachline_core::trip::Trip;
use coachline_core::types::{
    BookingId, BookingReference, BusId, Money, RouteId, SeatNumber, ServiceTime, TripId, TripNumber,
    UserId,
};
use sqlx::postgres::PgRow;
use sqlx::types::{Json, Uuid};
use sqlx::{Decode, Postgres, Row, Type};
use std::fmt::Display;
use std::str::FromStr;

/// Columns of `trips`, in [`trip`] decoding order.
macro_rules! trip_columns {
    () => {
        "id, trip_number, route_id, bus_id, driver_id, helper_id, departure_time, arrival_time, \
         departure_date, pickup_points, drop_points, fare, total_seats, available_seats, \
         total_bookings, status, created_at, updated_at"
    };
}

/// Columns of `bookings`, in [`booking`] decoding order.
macro_rules! booking_columns {
    () => {
        "id, booking_reference, user_id, trip_id, bus_id, route_id, passengers, boarding_point, \
         dropping_point, journey_date, total_amount, refund_amount, status, payment_status, \
         payment_method, cancellation_reason, cancelled_at, created_at, updated_at"
    };
}

/// SQL list of the trip statuses that claim resources.
macro_rules! active_statuses {
    () => {
        "('scheduled', 'in_progress')"
    };
}

pub(crate) use {active_statuses, booking_columns, trip_columns};

fn column<'r, T>(row: &'r PgRow, name: &'static str) -> Result<T, StoreError>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Unavailable(format!("failed to decode {name}: {e}")))
}

fn parsed<T>(row: &PgRow, name: &'static str) -> Result<T, StoreError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw: String = column(row, name)?;
    raw.parse()
        .map_err(|e| StoreError::Unavailable(format!("invalid {name} '{raw}': {e}")))
}

fn seats(row: &PgRow, name: &'static str) -> Result<u16, StoreError> {
    let raw: i32 = column(row, name)?;
    u16::try_from(raw).map_err(|_| StoreError::Unavailable(format!("{name} out of range: {raw}")))
}

fn money(raw: i64, name: &'static str) -> Result<Money, StoreError> {
    u64::try_from(raw)
        .map(Money::from_minor)
        .map_err(|_| StoreError::Unavailable(format!("{name} is negative: {raw}")))
}

/// Encodes money for a `BIGINT` column.
pub(crate) fn minor_units(amount: Money) -> Result<i64, StoreError> {
    i64::try_from(amount.minor())
        .map_err(|_| StoreError::Unavailable(format!("amount {amount} exceeds BIGINT")))
}

/// Encodes a seat count or seat number for an `INTEGER` column.
pub(crate) fn int(value: u16) -> i32 {
    i32::from(value)
}

pub(crate) fn seat_number(raw: i32) -> Result<SeatNumber, StoreError> {
    u16::try_from(raw)
        .map(SeatNumber::new)
        .map_err(|_| StoreError::Unavailable(format!("seat number out of range: {raw}")))
}

pub(crate) fn trip(row: &PgRow) -> Result<Trip, StoreError> {
    let departure_time: NaiveTime = column(row, "departure_time")?;
    let arrival_time: NaiveTime = column(row, "arrival_time")?;
    let helper: Option<Uuid> = column(row, "helper_id")?;
    Ok(Trip {
        id: TripId::from_uuid(column(row, "id")?),
        trip_number: TripNumber::from_raw(column::<String>(row, "trip_number")?),
        route_id: RouteId::from_uuid(column(row, "route_id")?),
        bus_id: BusId::from_uuid(column(row, "bus_id")?),
        driver_id: UserId::from_uuid(column(row, "driver_id")?),
        helper_id: helper.map(UserId::from_uuid),
        departure_time: ServiceTime::from_naive(departure_time),
        arrival_time: ServiceTime::from_naive(arrival_time),
        departure_date: column::<NaiveDate>(row, "departure_date")?,
        pickup_points: column(row, "pickup_points")?,
        drop_points: column(row, "drop_points")?,
        fare: money(column(row, "fare")?, "fare")?,
        total_seats: seats(row, "total_seats")?,
        available_seats: seats(row, "available_seats")?,
        total_bookings: seats(row, "total_bookings")?,
        status: parsed(row, "status")?,
        created_at: column::<DateTime<Utc>>(row, "created_at")?,
        updated_at: column::<DateTime<Utc>>(row, "updated_at")?,
    })
}

pub(crate) fn booking(row: &PgRow) -> Result<Booking, StoreError> {
    let passengers: Json<Vec<PassengerSeat>> = column(row, "passengers")?;
    let refund: Option<i64> = column(row, "refund_amount")?;
    Ok(Booking {
        id: BookingId::from_uuid(column(row, "id")?),
        reference: BookingReference::new(column::<String>(row, "booking_reference")?),
        user_id: UserId::from_uuid(column(row, "user_id")?),
        trip_id: TripId::from_uuid(column(row, "trip_id")?),
        bus_id: BusId::from_uuid(column(row, "bus_id")?),
        route_id: RouteId::from_uuid(column(row, "route_id")?),
        seats: passengers.0,
        boarding_point: column(row, "boarding_point")?,
        dropping_point: column(row, "dropping_point")?,
        journey_date: column(row, "journey_date")?,
        total_amount: money(column(row, "total_amount")?, "total_amount")?,
        refund_amount: refund.map(|raw| money(raw, "refund_amount")).transpose()?,
        status: parsed(row, "status")?,
        payment_status: parsed(row, "payment_status")?,
        payment_method: parsed(row, "payment_method")?,
        cancellation_reason: column(row, "cancellation_reason")?,
        cancelled_at: column(row, "cancelled_at")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

pub(crate) fn bus(row: &PgRow) -> Result<Bus, StoreError> {
    let status: String = column(row, "status")?;
    Ok(Bus {
        id: BusId::from_uuid(column(row, "id")?),
        operator_id: UserId::from_uuid(column(row, "operator_id")?),
        registration_number: column(row, "registration_number")?,
        name: column(row, "name")?,
        total_seats: seats(row, "total_seats")?,
        status: BusStatus::parse(&status)
            .ok_or_else(|| StoreError::Unavailable(format!("invalid bus status '{status}'")))?,
    })
}

pub(crate) fn route(row: &PgRow) -> Result<Route, StoreError> {
    Ok(Route {
        id: RouteId::from_uuid(column(row, "id")?),
        name: column(row, "name")?,
        origin: column(row, "origin")?,
        destination: column(row, "destination")?,
    })
}

pub(crate) fn user(row: &PgRow) -> Result<UserProfile, StoreError> {
    let role: String = column(row, "role")?;
    let subrole: Option<String> = column(row, "subrole")?;
    let subrole = match subrole {
        Some(raw) => Some(
            SubRole::parse(&raw)
                .ok_or_else(|| StoreError::Unavailable(format!("invalid subrole '{raw}'")))?,
        ),
        None => None,
    };
    Ok(UserProfile {
        id: UserId::from_uuid(column(row, "id")?),
        name: column(row, "name")?,
        phone: column(row, "phone")?,
        role: Role::parse(&role)
            .ok_or_else(|| StoreError::Unavailable(format!("invalid role '{role}'")))?,
        subrole,
    })
}
