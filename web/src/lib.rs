//! HTTP boundary for the Coachline engine.
//!
//! Handlers parse requests, resolve the caller from the `X-Actor-Id` and
//! `X-Actor-Role` headers, call the [`ReservationEngine`] services and map
//! [`DomainError`]s to status codes:
//!
//! | Error | Status |
//! |---|---|
//! | `NOT_FOUND` | 404 |
//! | `VALIDATION_ERROR` | 422 |
//! | `RESOURCE_CONFLICT`, `SEAT_CONFLICT`, `CAPACITY_EXCEEDED`, `INVALID_STATE`, `CONFLICT` | 409 |
//! | `FORBIDDEN` | 403 |
//! | `INTERNAL_ERROR` | 500 |
//!
//! Error bodies are `{"code", "message", "details"}`.
//!
//! ```ignore
//! let app = coachline_web::build_router(AppState::new(engine));
//! axum::serve(listener, app).await?;
//! ```
//!
//! [`ReservationEngine`]: coachline_runtime::ReservationEngine
//! [`DomainError`]: coachline_core::error::DomainError

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::AppError;
pub use extractors::{ActorContext, ApiJson, ApiPath, ApiQuery, ACTOR_ID_HEADER, ACTOR_ROLE_HEADER};
pub use middleware::{correlation_id_layer, CorrelationId, CORRELATION_ID_HEADER};
pub use routes::build_router;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
