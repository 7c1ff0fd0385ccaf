//! Request correlation and access logging.
//!
//! [`correlation_id_layer`] gives every request a [`CorrelationId`]: the
//! client's `X-Correlation-ID` when it is a short printable token, a fresh
//! UUID otherwise. The id is stored in request extensions, recorded on an
//! `http_request` span around the handler, and echoed on the response.
//! Each completed request also lands in the
//! `coachline_http_request_duration_seconds` histogram.
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/api/trips", post(schedule_trip))
//!     .layer(correlation_id_layer());
//! ```

use axum::{
    extract::Request,
    http::HeaderValue,
    response::Response,
};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

/// Header name for correlation ID.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

const MAX_CORRELATION_ID_LEN: usize = 64;

/// Identifier tying together the log lines of one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Adopts a client-supplied id if it is 1 to 64 visible ASCII characters.
    #[must_use]
    pub fn from_client(raw: &str) -> Option<Self> {
        let acceptable = !raw.is_empty()
            && raw.len() <= MAX_CORRELATION_ID_LEN
            && raw.bytes().all(|b| b.is_ascii_graphic());
        acceptable.then(|| Self(raw.to_string()))
    }

    /// A fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The id as sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Layer that assigns correlation ids and times requests.
#[must_use]
pub fn correlation_id_layer() -> CorrelationIdLayer {
    CorrelationIdLayer
}

/// Layer for correlation ID tracking.
#[derive(Clone, Debug)]
pub struct CorrelationIdLayer;

impl<S> Layer<S> for CorrelationIdLayer {
    type Service = CorrelationIdMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationIdMiddleware { inner }
    }
}

/// Middleware service for correlation ID tracking.
#[derive(Clone, Debug)]
pub struct CorrelationIdMiddleware<S> {
    inner: S,
}

impl<S> Service<Request> for CorrelationIdMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let correlation_id = req
            .headers()
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(CorrelationId::from_client)
            .unwrap_or_else(CorrelationId::generate);

        let method = req.method().clone();
        let span = tracing::info_span!(
            "http_request",
            correlation_id = %correlation_id,
            method = %method,
            path = %req.uri().path(),
        );
        req.extensions_mut().insert(correlation_id.clone());

        let started = Instant::now();
        let fut = self.inner.call(req);

        Box::pin(async move {
            let mut response = fut.instrument(span).await?;

            let status = response.status();
            metrics::histogram!(
                "coachline_http_request_duration_seconds",
                "method" => method.to_string(),
                "status" => status.as_u16().to_string(),
            )
            .record(started.elapsed().as_secs_f64());

            if let Ok(value) = HeaderValue::from_str(correlation_id.as_str()) {
                response.headers_mut().insert(CORRELATION_ID_HEADER, value);
            }
            Ok(response)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get, Extension, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route(
                "/echo",
                get(|Extension(id): Extension<CorrelationId>| async move { id.to_string() }),
            )
            .layer(correlation_id_layer())
    }

    #[tokio::test]
    async fn test_correlation_id_generated_if_missing() {
        let request = Request::builder().uri("/echo").body(Body::empty()).unwrap();
        let response = app().oneshot(request).await.unwrap();

        let header = response.headers().get(CORRELATION_ID_HEADER).unwrap();
        assert!(Uuid::parse_str(header.to_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_client_correlation_id_reaches_handler() {
        let request = Request::builder()
            .uri("/echo")
            .header(CORRELATION_ID_HEADER, "gateway-7f3a")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.headers().get(CORRELATION_ID_HEADER).unwrap(), "gateway-7f3a");
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"gateway-7f3a");
    }

    #[test]
    fn test_unusable_client_ids_are_replaced() {
        assert!(CorrelationId::from_client("").is_none());
        assert!(CorrelationId::from_client("has space").is_none());
        assert!(CorrelationId::from_client(&"x".repeat(65)).is_none());
        assert!(CorrelationId::from_client(&"x".repeat(64)).is_some());
    }
}
