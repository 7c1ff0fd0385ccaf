//! Application state shared across handlers.

use coachline_runtime::ReservationEngine;
use std::sync::Arc;

/// Handles to the engine's services.
#[derive(Clone)]
pub struct AppState {
    /// Scheduler and reservation manager
    pub engine: Arc<ReservationEngine>,
}

impl AppState {
    /// Wraps an engine.
    #[must_use]
    pub fn new(engine: ReservationEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}
