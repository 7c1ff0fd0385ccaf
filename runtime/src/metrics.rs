//! Prometheus metrics for the scheduler and the reservation manager.
//!
//! Metrics are recorded through the `metrics` facade; nothing is exported until
//! [`MetricsServer::start`] installs the Prometheus recorder. The server binary
//! serves [`MetricsServer::render`] on its metrics listener.
//!
//! # Example
//!
//! ```rust,no_run
//! use coachline_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! let body = server.render();
//! # let _ = body;
//! # Ok(())
//! # }
//! ```

use coachline_core::booking::BookingStatus;
use coachline_core::error::ContestedResource;
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder plus the address its scrape endpoint is served on.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server for `addr`.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Address the scrape endpoint should bind to.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Registers metric descriptions and installs the Prometheus recorder.
    ///
    /// The recorder is process-wide. Later calls, from this or another
    /// server, share the handle installed by the first.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        self.handle = Some(installed_recorder()?);
        tracing::info!(addr = %self.addr, "Metrics recorder ready");
        Ok(())
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` until [`Self::start`] succeeds.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

static RECORDER: OnceLock<PrometheusHandle> = OnceLock::new();
static INSTALLING: Mutex<()> = Mutex::new(());

fn installed_recorder() -> Result<PrometheusHandle, MetricsError> {
    if let Some(handle) = RECORDER.get() {
        return Ok(handle.clone());
    }
    let _guard = INSTALLING.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(handle) = RECORDER.get() {
        return Ok(handle.clone());
    }

    register_metrics();
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5],
        )
        .map_err(|e| MetricsError::Build(e.to_string()))?
        .install_recorder()
        .map_err(|e| MetricsError::Install(e.to_string()))?;
    tracing::info!("Metrics recorder installed");
    Ok(RECORDER.get_or_init(|| handle).clone())
}

fn register_metrics() {
    describe_counter!(
        "coachline_trips_scheduled_total",
        "Total number of trips scheduled"
    );
    describe_counter!(
        "coachline_schedule_conflicts_total",
        "Trip scheduling attempts rejected because a resource was taken"
    );
    describe_counter!(
        "coachline_bookings_total",
        "Booking lifecycle changes by resulting status"
    );
    describe_counter!(
        "coachline_seat_conflicts_total",
        "Booking attempts rejected because seats were already held"
    );
    describe_counter!(
        "coachline_refunds_cents_total",
        "Refunded amount in minor currency units"
    );
    describe_histogram!(
        "coachline_operation_duration_seconds",
        "Time taken by engine operations"
    );
}

/// Engine metrics recorder.
pub struct EngineMetrics;

impl EngineMetrics {
    /// Record a scheduled trip.
    pub fn record_trip_scheduled() {
        counter!("coachline_trips_scheduled_total").increment(1);
    }

    /// Record a rejected schedule.
    pub fn record_schedule_conflict(resource: ContestedResource) {
        counter!("coachline_schedule_conflicts_total", "resource" => resource.as_str()).increment(1);
    }

    /// Record a booking entering `status`.
    pub fn record_booking(status: BookingStatus) {
        counter!("coachline_bookings_total", "status" => status.as_str()).increment(1);
    }

    /// Record a seat conflict.
    pub fn record_seat_conflict() {
        counter!("coachline_seat_conflicts_total").increment(1);
    }

    /// Record a refund.
    pub fn record_refund(minor_units: u64) {
        counter!("coachline_refunds_cents_total").increment(minor_units);
    }

    /// Record how long `operation` took.
    pub fn record_duration(operation: &'static str, duration: Duration) {
        histogram!("coachline_operation_duration_seconds", "operation" => operation)
            .record(duration.as_secs_f64());
    }
}

/// Records the elapsed time of an operation when dropped.
pub(crate) struct OperationTimer {
    operation: &'static str,
    started: Instant,
}

impl OperationTimer {
    pub(crate) fn start(operation: &'static str) -> Self {
        Self {
            operation,
            started: Instant::now(),
        }
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        EngineMetrics::record_duration(self.operation, self.started.elapsed());
    }
}
