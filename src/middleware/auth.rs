//! Requester identity extraction
//!
//! Authentication itself happens upstream; by the time a request reaches
//! this service the auth proxy has set `x-user-id` and `x-user-role`
//! headers. The extractor turns those into an [`AuthenticatedUser`] and
//! rejects protected routes when they are missing or malformed. The
//! gateway callback route deliberately does not use it.

use crate::error::{AppError, ValidationError};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::str::FromStr;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserRole {
    User,
    Host,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Host => "host",
            UserRole::Admin => "admin",
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "user" | "guest" => Ok(UserRole::User),
            "host" => Ok(UserRole::Host),
            "admin" => Ok(UserRole::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// The already-authenticated requester, as asserted by the auth proxy.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub role: UserRole,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }

    /// Ownership rule shared by the read paths: the owner or an admin.
    pub fn may_view(&self, owner: Uuid) -> bool {
        self.id == owner || self.is_admin()
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id_header = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::validation(ValidationError::Unauthenticated {
                    reason: format!("missing {} header", USER_ID_HEADER),
                })
            })?;

        let id = Uuid::parse_str(id_header).map_err(|_| {
            AppError::validation(ValidationError::Unauthenticated {
                reason: format!("{} is not a valid UUID", USER_ID_HEADER),
            })
        })?;

        let role = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("user")
            .parse::<UserRole>()
            .map_err(|reason| {
                AppError::validation(ValidationError::Unauthenticated { reason })
            })?;

        Ok(AuthenticatedUser { id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!("Admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!("HOST".parse::<UserRole>().unwrap(), UserRole::Host);
        assert_eq!("guest".parse::<UserRole>().unwrap(), UserRole::User);
        assert!("superuser".parse::<UserRole>().is_err());
    }

    #[test]
    fn owner_and_admin_may_view() {
        let owner = Uuid::new_v4();
        let as_owner = AuthenticatedUser {
            id: owner,
            role: UserRole::User,
        };
        let as_admin = AuthenticatedUser {
            id: Uuid::new_v4(),
            role: UserRole::Admin,
        };
        let as_stranger = AuthenticatedUser {
            id: Uuid::new_v4(),
            role: UserRole::User,
        };

        assert!(as_owner.may_view(owner));
        assert!(as_admin.may_view(owner));
        assert!(!as_stranger.may_view(owner));
    }
}
