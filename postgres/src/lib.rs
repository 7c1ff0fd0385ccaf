//! `PostgreSQL` storage for Coachline.
//!
//! [`PostgresStore`] implements [`TripStore`](coachline_core::store::TripStore)
//! and [`BookingStore`](coachline_core::store::BookingStore);
//! [`PostgresRegistry`] implements
//! [`ResourceRegistry`](coachline_core::registry::ResourceRegistry) over the
//! replicated fleet tables.
//!
//! Every write runs in one transaction. Booking writes lock the trip row
//! (`SELECT ... FOR UPDATE`) before checking inventory, and the schema carries
//! partial unique indexes so that no interleaving can double-assign a bus,
//! driver, helper or seat:
//!
//! - `trips_active_{bus,driver,helper}_per_day` over active trips
//! - `booking_seats_held_once` over seats of pending and confirmed bookings
//! - `trips_seat_inventory`, a check that counters add up to the seat count
//!
//! Trip numbers come from the `trip_number_seq` sequence.
//!
//! # Example
//!
//! ```no_run
//! use coachline_postgres::PostgresStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PostgresStore::connect("postgres://localhost/coachline", 10, 30).await?;
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod bookings;
mod error;
mod registry;
mod rows;
mod trips;

pub use registry::PostgresRegistry;

use coachline_core::store::StoreError;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Duration;

/// Trip and booking store backed by `PostgreSQL`.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connects a pool to `database_url`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] if no connection can be established.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(error::unavailable("connecting to database"))?;
        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, shared with [`PostgresRegistry`].
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies the embedded migrations.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(error::unavailable("starting transaction"))
    }
}

async fn commit(tx: Transaction<'static, Postgres>) -> Result<(), StoreError> {
    tx.commit()
        .await
        .map_err(error::unavailable("committing transaction"))
}
