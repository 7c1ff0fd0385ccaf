//! Fleet lookups over the replicated `buses`, `routes` and `users` tables.

use crate::error::unavailable;
use crate::rows::{self, int};
use async_trait::async_trait;
use coachline_core::registry::{Bus, ResourceRegistry, Route, SubRole, UserProfile};
use coachline_core::store::StoreError;
use coachline_core::types::{BusId, RouteId, UserId};
use sqlx::PgPool;

/// [`ResourceRegistry`] backed by `PostgreSQL`.
#[derive(Clone, Debug)]
pub struct PostgresRegistry {
    pool: PgPool,
}

impl PostgresRegistry {
    /// Creates a registry on `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts or replaces a bus.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] on database failure.
    pub async fn upsert_bus(&self, bus: &Bus) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO buses (id, operator_id, registration_number, name, total_seats, status)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (id) DO UPDATE
             SET operator_id = EXCLUDED.operator_id,
                 registration_number = EXCLUDED.registration_number,
                 name = EXCLUDED.name,
                 total_seats = EXCLUDED.total_seats,
                 status = EXCLUDED.status",
        )
        .bind(*bus.id.as_uuid())
        .bind(*bus.operator_id.as_uuid())
        .bind(&bus.registration_number)
        .bind(&bus.name)
        .bind(int(bus.total_seats))
        .bind(bus.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(unavailable("upserting bus"))?;
        Ok(())
    }

    /// Inserts or replaces a route.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] on database failure.
    pub async fn upsert_route(&self, route: &Route) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO routes (id, name, origin, destination)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE
             SET name = EXCLUDED.name, origin = EXCLUDED.origin, destination = EXCLUDED.destination",
        )
        .bind(*route.id.as_uuid())
        .bind(&route.name)
        .bind(&route.origin)
        .bind(&route.destination)
        .execute(&self.pool)
        .await
        .map_err(unavailable("upserting route"))?;
        Ok(())
    }

    /// Inserts or replaces a user profile.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] on database failure.
    pub async fn upsert_user(&self, user: &UserProfile) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, name, phone, role, subrole)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE
             SET name = EXCLUDED.name, phone = EXCLUDED.phone,
                 role = EXCLUDED.role, subrole = EXCLUDED.subrole",
        )
        .bind(*user.id.as_uuid())
        .bind(&user.name)
        .bind(user.phone.as_deref())
        .bind(user.role.as_str())
        .bind(user.subrole.as_ref().map(SubRole::as_str))
        .execute(&self.pool)
        .await
        .map_err(unavailable("upserting user"))?;
        Ok(())
    }
}

#[async_trait]
impl ResourceRegistry for PostgresRegistry {
    async fn bus(&self, id: BusId) -> Result<Option<Bus>, StoreError> {
        let row = sqlx::query(
            "SELECT id, operator_id, registration_number, name, total_seats, status
             FROM buses WHERE id = $1",
        )
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable("loading bus"))?;
        row.as_ref().map(rows::bus).transpose()
    }

    async fn route(&self, id: RouteId) -> Result<Option<Route>, StoreError> {
        let row = sqlx::query("SELECT id, name, origin, destination FROM routes WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable("loading route"))?;
        row.as_ref().map(rows::route).transpose()
    }

    async fn user(&self, id: UserId) -> Result<Option<UserProfile>, StoreError> {
        let row = sqlx::query("SELECT id, name, phone, role, subrole FROM users WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable("loading user"))?;
        row.as_ref().map(rows::user).transpose()
    }
}
