//! Request principals: who is calling, and with what access scope.
//!
//! A [`Principal`] is attached to a request for its lifetime only and is never
//! persisted. Absence of a principal is represented as `Option::None` at the
//! call sites, never as a principal with an empty role set.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::identity::UserRecord;

/// Platform-wide capability grants checked against per-operation requirements.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    OwnerAdmin,
    ReadOnly,
    Consumer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::SuperAdmin => "SUPER_ADMIN",
            Role::OwnerAdmin => "OWNER_ADMIN",
            Role::ReadOnly => "READ_ONLY",
            Role::Consumer => "CONSUMER",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUPER_ADMIN" => Ok(Role::SuperAdmin),
            "OWNER_ADMIN" => Ok(Role::OwnerAdmin),
            "READ_ONLY" => Ok(Role::ReadOnly),
            "CONSUMER" => Ok(Role::Consumer),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A caller identity whose authorization scope is a fixed set of roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPrincipal {
    pub username: String,
    pub roles: Vec<Role>,
}

/// The resolved identity for one request.
///
/// `Trusted` principals bypass role checks entirely; they are only produced by
/// the trusted-header strategy for co-located callers that vouch for identity
/// without re-authenticating. `Scoped` principals carry the roles loaded from
/// the identity collaborator at resolution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Trusted { username: String },
    Scoped(UserPrincipal),
}

impl Principal {
    /// Build a scoped principal from an identity record.
    ///
    /// Roles are copied out of the record, so later mutation of the stored
    /// user cannot change an in-flight request's authorization outcome.
    pub fn scoped(record: &UserRecord) -> Self {
        Principal::Scoped(UserPrincipal {
            username: record.username.clone(),
            roles: record.roles.clone(),
        })
    }

    pub fn username(&self) -> &str {
        match self {
            Principal::Trusted { username } => username,
            Principal::Scoped(user) => &user.username,
        }
    }

    /// Trust-elevated principals bypass role checks entirely.
    pub fn has_full_access(&self) -> bool {
        matches!(self, Principal::Trusted { .. })
    }

    pub fn has_role(&self, role: Role) -> bool {
        match self {
            Principal::Trusted { .. } => true,
            Principal::Scoped(user) => user.roles.contains(&role),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trusted_principal_has_full_access() {
        let p = Principal::Trusted {
            username: "system".to_string(),
        };
        assert!(p.has_full_access());
        assert!(p.has_role(Role::SuperAdmin));
        assert_eq!(p.username(), "system");
    }

    #[test]
    fn test_scoped_principal_checks_roles() {
        let record = UserRecord {
            username: "alice".to_string(),
            roles: vec![Role::OwnerAdmin],
        };
        let p = Principal::scoped(&record);
        assert!(!p.has_full_access());
        assert!(p.has_role(Role::OwnerAdmin));
        assert!(!p.has_role(Role::SuperAdmin));
    }

    #[test]
    fn test_scoped_principal_copies_roles() {
        let mut record = UserRecord {
            username: "bob".to_string(),
            roles: vec![Role::ReadOnly],
        };
        let p = Principal::scoped(&record);
        record.roles.push(Role::SuperAdmin);
        assert!(!p.has_role(Role::SuperAdmin));
    }

    #[test]
    fn test_role_round_trip() {
        for role in [Role::SuperAdmin, Role::OwnerAdmin, Role::ReadOnly, Role::Consumer] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert!("NOT_A_ROLE".parse::<Role>().is_err());
    }
}
