//! # Coachline Runtime
//!
//! The engine's services, built over the storage and registry traits of
//! `coachline-core`.
//!
//! ## Core Components
//!
//! - **`TripScheduler`**: schedules trips and moves them through their lifecycle
//! - **`ReservationManager`**: allocates seats, transitions and cancels bookings
//! - **`ReservationEngine`**: both services wired to one set of collaborators
//! - **Metrics**: Prometheus counters and latency histograms
//!
//! ## Example
//!
//! ```ignore
//! use coachline_runtime::{Collaborators, ReservationEngine};
//!
//! let engine = ReservationEngine::new(Collaborators::new(store.clone(), store, registry));
//! let trip = engine.scheduler.schedule(request, &actor).await?;
//! ```

/// Prometheus metrics for observability
pub mod metrics;

/// Trip scheduling
pub mod scheduler;

/// Booking reservation
pub mod reservations;

/// Response shapes
pub mod views;

mod engine;

pub use engine::{Collaborators, ReservationEngine};
pub use reservations::{CreateBooking, ReservationManager};
pub use scheduler::{RescheduleTrip, ScheduleTrip, TripScheduler};
pub use views::{
    BookingStatusUpdate, BookingView, BusOccupancy, BusSummary, CancellationOutcome,
    PassengerContact, SeatMap, TripSummary,
};
