//! Caller identity for the HTTP surface.
//!
//! The service runs behind the shop gateway, which authenticates users and
//! forwards identity as trusted headers. Handlers extract a [`Principal`]
//! and gate mutating operations by role.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;

/// Header carrying the authenticated user id, set by the gateway
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the authenticated user role, set by the gateway
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Caller role as asserted by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Mechanic,
    Admin,
}

impl Role {
    /// Staff roles may mutate orders, schedules and invoices
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Mechanic | Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "mechanic" => Ok(Role::Mechanic),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Customer => "customer",
            Role::Mechanic => "mechanic",
            Role::Admin => "admin",
        };
        write!(f, "{}", name)
    }
}

/// Authenticated caller extracted from gateway headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

impl Principal {
    /// Rejects callers without a staff role
    pub fn require_staff(&self) -> Result<(), ServiceError> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "staff role required for this operation".to_string(),
            ))
        }
    }

    /// Rejects callers without the admin role
    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "admin role required for this operation".to_string(),
            ))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Check if already extracted (from middleware)
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(*principal);
        }

        let raw_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ServiceError::Unauthorized(format!("missing {} header", USER_ID_HEADER))
            })?;

        let id = Uuid::parse_str(raw_id.trim()).map_err(|_| {
            ServiceError::Unauthorized(format!("{} is not a valid UUID", USER_ID_HEADER))
        })?;

        let raw_role = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ServiceError::Unauthorized(format!("missing {} header", USER_ROLE_HEADER))
            })?;

        let role = raw_role
            .parse::<Role>()
            .map_err(ServiceError::Unauthorized)?;

        let principal = Principal { id, role };

        // Store in extensions for potential reuse
        parts.extensions.insert(principal);

        Ok(principal)
    }
}
