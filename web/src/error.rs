//! Error type returned by every handler.
//!
//! [`AppError`] carries the HTTP status, a stable machine-readable code, a
//! user-facing message and optional structured details. Domain errors convert
//! through [`From<DomainError>`]; internal failures keep their cause as a
//! `source` that is logged but never serialized.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use coachline_core::error::DomainError;
use coachline_core::types::SeatNumber;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;

/// Application error type for web handlers.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<Value>,
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Attach structured details for clients.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attach an internal cause, logged but not returned.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// 401: the request carries no usable actor identity.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    /// 500 with a generic message.
    #[must_use]
    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "An internal error occurred",
        )
    }

    /// HTTP status of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Stable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

fn seat_list(seats: &[SeatNumber]) -> Vec<u16> {
    seats.iter().map(SeatNumber::get).collect()
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        let code = err.code();
        let message = err.to_string();
        match err {
            DomainError::NotFound { entity, id } => Self::new(StatusCode::NOT_FOUND, code, message)
                .with_details(json!({ "entity": entity, "id": id })),
            DomainError::Validation(_) => Self::new(StatusCode::UNPROCESSABLE_ENTITY, code, message),
            DomainError::ResourceConflict { resource, date } => {
                Self::new(StatusCode::CONFLICT, code, message)
                    .with_details(json!({ "resource": resource.as_str(), "date": date }))
            }
            DomainError::SeatConflict { seats } => Self::new(StatusCode::CONFLICT, code, message)
                .with_details(json!({ "seats": seat_list(&seats) })),
            DomainError::CapacityExceeded {
                requested,
                available,
            } => Self::new(StatusCode::CONFLICT, code, message)
                .with_details(json!({ "requested": requested, "available": available })),
            DomainError::InvalidState(_) | DomainError::Conflict(_) => {
                Self::new(StatusCode::CONFLICT, code, message)
            }
            DomainError::Forbidden(_) => Self::new(StatusCode::FORBIDDEN, code, message),
            DomainError::Internal(_) => Self::internal().with_source(anyhow::anyhow!(message)),
        }
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    error = %source,
                    "Request failed"
                ),
                None => tracing::error!(status = %self.status, code = self.code, "Request failed"),
            }
        } else {
            tracing::debug!(status = %self.status, code = self.code, message = %self.message, "Request rejected");
        }
        metrics::counter!("coachline_http_errors_total", "code" => self.code).increment(1);

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}
