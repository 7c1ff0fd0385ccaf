//! HTTP request handlers, one module per resource.

pub mod bookings;
pub mod buses;
pub mod health;
pub mod trips;

pub use health::health_check;
