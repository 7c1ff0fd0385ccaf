//! Fleet lookups backed by in-memory maps.

use async_trait::async_trait;
use coachline_core::registry::{Bus, ResourceRegistry, Route, UserProfile};
use coachline_core::store::StoreError;
use coachline_core::types::{BusId, RouteId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Errors loading a fleet seed file.
#[derive(Error, Debug)]
pub enum SeedError {
    /// The file could not be read.
    #[error("failed to read fleet seed {path}: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid seed document.
    #[error("invalid fleet seed {path}: {source}")]
    Parse {
        /// File path
        path: String,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },
}

/// Buses, routes and users to preload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetSeed {
    /// Buses
    #[serde(default)]
    pub buses: Vec<Bus>,
    /// Routes
    #[serde(default)]
    pub routes: Vec<Route>,
    /// Accounts
    #[serde(default)]
    pub users: Vec<UserProfile>,
}

impl FleetSeed {
    /// Reads a JSON seed document.
    ///
    /// # Errors
    ///
    /// Returns [`SeedError`] if the file is unreadable or malformed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| SeedError::Io {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| SeedError::Parse {
            path: display,
            source,
        })
    }
}

/// Read-only registry. Build it up front, then share it behind an `Arc`.
#[derive(Clone, Debug, Default)]
pub struct InMemoryRegistry {
    buses: HashMap<BusId, Bus>,
    routes: HashMap<RouteId, Route>,
    users: HashMap<UserId, UserProfile>,
}

impl InMemoryRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every record of a seed.
    #[must_use]
    pub fn from_seed(seed: FleetSeed) -> Self {
        let registry = seed.buses.into_iter().fold(Self::new(), Self::with_bus);
        let registry = seed.routes.into_iter().fold(registry, Self::with_route);
        seed.users.into_iter().fold(registry, Self::with_user)
    }

    /// Adds a bus.
    #[must_use]
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.buses.insert(bus.id, bus);
        self
    }

    /// Adds a route.
    #[must_use]
    pub fn with_route(mut self, route: Route) -> Self {
        self.routes.insert(route.id, route);
        self
    }

    /// Adds a user account.
    #[must_use]
    pub fn with_user(mut self, user: UserProfile) -> Self {
        self.users.insert(user.id, user);
        self
    }

    /// Record counts `(buses, routes, users)`.
    #[must_use]
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.buses.len(), self.routes.len(), self.users.len())
    }
}

#[async_trait]
impl ResourceRegistry for InMemoryRegistry {
    async fn bus(&self, id: BusId) -> Result<Option<Bus>, StoreError> {
        Ok(self.buses.get(&id).cloned())
    }

    async fn route(&self, id: RouteId) -> Result<Option<Route>, StoreError> {
        Ok(self.routes.get(&id).cloned())
    }

    async fn user(&self, id: UserId) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.users.get(&id).cloned())
    }
}

/// Wraps a registry with a switch that makes every lookup fail.
///
/// Clones share the switch.
#[derive(Clone, Debug)]
pub struct SwitchableRegistry {
    inner: InMemoryRegistry,
    down: Arc<AtomicBool>,
}

impl SwitchableRegistry {
    /// Starts healthy.
    #[must_use]
    pub fn new(inner: InMemoryRegistry) -> Self {
        Self {
            inner,
            down: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes lookups return [`StoreError::Unavailable`] until [`Self::recover`].
    pub fn fail(&self) {
        self.down.store(true, Ordering::SeqCst);
    }

    /// Serves lookups again.
    pub fn recover(&self) {
        self.down.store(false, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("registry is down".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceRegistry for SwitchableRegistry {
    async fn bus(&self, id: BusId) -> Result<Option<Bus>, StoreError> {
        self.check()?;
        self.inner.bus(id).await
    }

    async fn route(&self, id: RouteId) -> Result<Option<Route>, StoreError> {
        self.check()?;
        self.inner.route(id).await
    }

    async fn user(&self, id: UserId) -> Result<Option<UserProfile>, StoreError> {
        self.check()?;
        self.inner.user(id).await
    }
}
