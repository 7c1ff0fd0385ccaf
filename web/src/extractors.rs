//! Custom Axum extractors.
//!
//! - [`ActorContext`]: the caller identity from `X-Actor-Id` and `X-Actor-Role`
//! - [`ApiJson`], [`ApiPath`], [`ApiQuery`]: the stock extractors with
//!   rejections rendered as [`AppError`] bodies
//!
//! # Examples
//!
//! ```ignore
//! async fn handler(
//!     State(state): State<AppState>,
//!     ActorContext(actor): ActorContext,
//!     ApiPath(trip_id): ApiPath<TripId>,
//!     ApiJson(request): ApiJson<CreateBooking>,
//! ) -> Result<Json<BookingView>, AppError> {
//!     Ok(Json(state.engine.reservations.create_booking(trip_id, request, &actor).await?))
//! }
//! ```

use crate::error::AppError;
use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts,
    },
    http::{request::Parts, StatusCode},
};
use coachline_core::registry::{Actor, Role};
use coachline_core::types::UserId;
use uuid::Uuid;

/// Header carrying the caller's account id.
pub const ACTOR_ID_HEADER: &str = "X-Actor-Id";

/// Header carrying the caller's role.
pub const ACTOR_ROLE_HEADER: &str = "X-Actor-Role";

/// The authenticated caller.
///
/// Authentication happens upstream; the gateway forwards the verified
/// identity in [`ACTOR_ID_HEADER`] and [`ACTOR_ROLE_HEADER`]. A request
/// without both headers, or with unparseable values, is rejected with 401.
#[derive(Debug, Clone, Copy)]
pub struct ActorContext(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for ActorContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let id = header(ACTOR_ID_HEADER)
            .ok_or_else(|| AppError::unauthorized(format!("{ACTOR_ID_HEADER} header is required")))?;
        let id = Uuid::parse_str(id)
            .map_err(|_| AppError::unauthorized(format!("{ACTOR_ID_HEADER} must be a UUID")))?;

        let role = header(ACTOR_ROLE_HEADER).ok_or_else(|| {
            AppError::unauthorized(format!("{ACTOR_ROLE_HEADER} header is required"))
        })?;
        let role = Role::parse(role)
            .ok_or_else(|| AppError::unauthorized(format!("unknown role '{role}'")))?;

        Ok(Self(Actor::new(UserId::from_uuid(id), role)))
    }
}

/// JSON body extractor that rejects with a `VALIDATION_ERROR` body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Path extractor that rejects with a `VALIDATION_ERROR` body.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Query string extractor that rejects with a `VALIDATION_ERROR` body.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

fn malformed(message: String) -> AppError {
    AppError::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        malformed(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        malformed(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        malformed(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use axum::http::Request;

    async fn extract(headers: &[(&str, &str)]) -> Result<ActorContext, AppError> {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        ActorContext::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_actor_from_headers() {
        let id = Uuid::new_v4();
        let ActorContext(actor) = extract(&[
            (ACTOR_ID_HEADER, &id.to_string()),
            (ACTOR_ROLE_HEADER, "bus_operator"),
        ])
        .await
        .unwrap();

        assert_eq!(actor.id, UserId::from_uuid(id));
        assert_eq!(actor.role, Role::BusOperator);
    }

    #[tokio::test]
    async fn test_missing_actor_is_unauthorized() {
        let err = extract(&[(ACTOR_ROLE_HEADER, "customer")]).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let id = Uuid::new_v4().to_string();
        let err = extract(&[(ACTOR_ID_HEADER, &id)]).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_actor_is_unauthorized() {
        let err = extract(&[(ACTOR_ID_HEADER, "42"), (ACTOR_ROLE_HEADER, "customer")])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");

        let id = Uuid::new_v4().to_string();
        let err = extract(&[(ACTOR_ID_HEADER, &id), (ACTOR_ROLE_HEADER, "pilot")])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }
}
