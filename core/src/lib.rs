//! # Coachline Core
//!
//! Domain model and policies for the trip resource allocation and booking
//! reservation engine.
//!
//! This crate performs no I/O. It defines:
//!
//! - **Data model**: [`trip::Trip`], [`booking::Booking`] and the fleet records
//!   in [`registry`]
//! - **State machines**: one transition table per entity, consulted by every
//!   mutation path
//! - **Policies**: [`refund::RefundPolicy`] and the flat fare on [`trip::Trip`]
//! - **Seams**: [`environment::Clock`], [`environment::ReferenceGenerator`],
//!   [`registry::ResourceRegistry`], [`store::TripStore`], [`store::BookingStore`]
//! - **Errors**: [`error::DomainError`]
//!
//! ## Invariants
//!
//! - At most one active trip (`scheduled` or `in_progress`) per bus, driver and
//!   helper per service date.
//! - No seat is held twice on a trip by bookings that are not cancelled.
//! - `available_seats + total_bookings == total_seats` for every trip.
//!
//! Stores enforce these atomically; the runtime only pre-validates input.

pub mod booking;
pub mod environment;
pub mod error;
pub mod refund;
pub mod registry;
pub mod store;
pub mod trip;
pub mod types;

pub use booking::{
    Booking, BookingStatus, BookingTransition, Cancellation, Gender, PassengerSeat, PaymentMethod,
    PaymentStatus,
};
pub use environment::{Clock, RandomReferenceGenerator, ReferenceGenerator, SystemClock};
pub use error::{ContestedResource, DomainError};
pub use refund::{RefundPolicy, RefundQuote, RefundTier};
pub use registry::{Actor, Bus, BusStatus, ResourceRegistry, Role, Route, SubRole, UserProfile};
pub use store::{BookingStore, StoreError, TripStore};
pub use trip::{Trip, TripDraft, TripStatus};
pub use types::{
    BookingId, BookingReference, BusId, Money, RouteId, SeatNumber, ServiceTime, TripId,
    TripNumber, UserId,
};
