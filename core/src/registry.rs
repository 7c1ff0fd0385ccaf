//! Read-only view of the fleet: buses, routes and user accounts.
//!
//! Fleet records are owned by another part of the system. The engine only
//! reads them to validate assignments and authorize actors.

use crate::store::StoreError;
use crate::types::{BusId, RouteId, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Operational status of a bus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusStatus {
    /// In service
    #[default]
    Active,
    /// Temporarily off the road
    Maintenance,
    /// Retired
    Inactive,
}

/// A bus in an operator's fleet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bus {
    /// Identifier
    pub id: BusId,
    /// Operator account that owns the bus
    pub operator_id: UserId,
    /// Licence plate
    pub registration_number: String,
    /// Display name
    pub name: String,
    /// Seat count
    pub total_seats: u16,
    /// Operational status
    #[serde(default)]
    pub status: BusStatus,
}

impl BusStatus {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Maintenance => "maintenance",
            Self::Inactive => "inactive",
        }
    }

    /// Parses the wire representation.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        [Self::Active, Self::Maintenance, Self::Inactive]
            .into_iter()
            .find(|status| status.as_str() == raw)
    }
}

impl Bus {
    /// Whether trips may be scheduled on this bus.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == BusStatus::Active
    }
}

/// A route between two places.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Identifier
    pub id: RouteId,
    /// Display name
    pub name: String,
    /// Starting city
    pub origin: String,
    /// Final city
    pub destination: String,
}

/// Account role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Platform owner
    SuperAdmin,
    /// Platform administrator
    Admin,
    /// Company that owns buses
    BusOperator,
    /// Crew member employed by an operator
    BusEmployee,
    /// Passenger
    Customer,
}

impl Role {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::BusOperator => "bus_operator",
            Self::BusEmployee => "bus_employee",
            Self::Customer => "customer",
        }
    }

    /// Parses the wire representation.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        [
            Self::SuperAdmin,
            Self::Admin,
            Self::BusOperator,
            Self::BusEmployee,
            Self::Customer,
        ]
        .into_iter()
        .find(|role| role.as_str() == raw)
    }

    /// Whether the role may act on any trip or booking.
    #[must_use]
    pub const fn is_administrative(&self) -> bool {
        matches!(self, Self::SuperAdmin | Self::Admin)
    }
}

/// Crew position of a bus employee.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubRole {
    /// Drives the bus
    Driver,
    /// Assists on board
    Helper,
    /// Sells tickets
    BookingAgent,
}

impl SubRole {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Driver => "driver",
            Self::Helper => "helper",
            Self::BookingAgent => "booking_agent",
        }
    }

    /// Parses the wire representation.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        [Self::Driver, Self::Helper, Self::BookingAgent]
            .into_iter()
            .find(|subrole| subrole.as_str() == raw)
    }
}

/// A user account as seen by the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Identifier
    pub id: UserId,
    /// Display name
    pub name: String,
    /// Phone number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Account role
    pub role: Role,
    /// Crew position, for bus employees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subrole: Option<SubRole>,
}

impl UserProfile {
    /// Whether the account may be assigned as a driver.
    #[must_use]
    pub fn is_driver(&self) -> bool {
        self.role == Role::BusEmployee && self.subrole == Some(SubRole::Driver)
    }

    /// Whether the account may be assigned as a helper.
    #[must_use]
    pub fn is_helper(&self) -> bool {
        self.role == Role::BusEmployee && self.subrole == Some(SubRole::Helper)
    }
}

/// The authenticated caller of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Actor {
    /// Caller's account
    pub id: UserId,
    /// Caller's role
    pub role: Role,
}

impl Actor {
    /// Creates an actor.
    #[must_use]
    pub const fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    /// See [`Role::is_administrative`].
    #[must_use]
    pub const fn is_administrative(&self) -> bool {
        self.role.is_administrative()
    }

    /// Admins manage every bus; operators manage the buses they own.
    #[must_use]
    pub fn may_manage_bus(&self, bus: &Bus) -> bool {
        self.is_administrative() || (self.role == Role::BusOperator && bus.operator_id == self.id)
    }
}

/// Lookups against fleet records.
#[async_trait]
pub trait ResourceRegistry: Send + Sync {
    /// Loads a bus.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the backing store fails.
    async fn bus(&self, id: BusId) -> Result<Option<Bus>, StoreError>;

    /// Loads a route.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the backing store fails.
    async fn route(&self, id: RouteId) -> Result<Option<Route>, StoreError>;

    /// Loads a user account.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the backing store fails.
    async fn user(&self, id: UserId) -> Result<Option<UserProfile>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus_owned_by(operator: UserId) -> Bus {
        Bus {
            id: BusId::new(),
            operator_id: operator,
            registration_number: "KA-01-1234".to_string(),
            name: "Night Rider".to_string(),
            total_seats: 40,
            status: BusStatus::Active,
        }
    }

    #[test]
    fn operators_manage_only_their_buses() {
        let operator = UserId::new();
        let bus = bus_owned_by(operator);

        assert!(Actor::new(operator, Role::BusOperator).may_manage_bus(&bus));
        assert!(!Actor::new(UserId::new(), Role::BusOperator).may_manage_bus(&bus));
        assert!(Actor::new(UserId::new(), Role::Admin).may_manage_bus(&bus));
        assert!(Actor::new(UserId::new(), Role::SuperAdmin).may_manage_bus(&bus));
        assert!(!Actor::new(operator, Role::Customer).may_manage_bus(&bus));
    }

    #[test]
    fn crew_positions() {
        let driver = UserProfile {
            id: UserId::new(),
            name: "Ravi".to_string(),
            phone: None,
            role: Role::BusEmployee,
            subrole: Some(SubRole::Driver),
        };
        assert!(driver.is_driver());
        assert!(!driver.is_helper());

        let customer = UserProfile {
            role: Role::Customer,
            ..driver
        };
        assert!(!customer.is_driver());
    }

    #[test]
    fn role_parsing() {
        assert_eq!(Role::parse("bus_operator"), Some(Role::BusOperator));
        assert_eq!(Role::parse("pilot"), None);
        assert_eq!(SubRole::parse("booking_agent"), Some(SubRole::BookingAgent));
        assert_eq!(BusStatus::parse("maintenance"), Some(BusStatus::Maintenance));
        assert_eq!(BusStatus::parse("scrapped"), None);
    }
}
