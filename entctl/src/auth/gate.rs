//! Per-operation authorization requirements and the gate that enforces them.
//!
//! Every routed operation carries a [`RoleRequirement`]. The registry is
//! keyed by method and route template; an operation nobody registered gets
//! `Authenticated`, so forgetting to register an endpoint can only ever make
//! it stricter, not open.

use axum::http::Method;
use std::collections::HashMap;
use tracing::debug;

use crate::auth::principal::{Principal, Role};
use crate::errors::{Error, Result};

/// What a caller must present to invoke an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleRequirement {
    /// Open to anonymous callers
    NoAuthRequired,
    /// Any successfully authenticated principal
    Authenticated,
    /// A principal holding at least one of these roles (logical OR)
    AnyRole(Vec<Role>),
}

/// Check one principal (or its absence) against one requirement.
///
/// Anonymous callers are always distinguished from authenticated-but-lacking
/// callers: the former get `Unauthenticated`, the latter `Forbidden`.
pub fn authorize(principal: Option<&Principal>, requirement: &RoleRequirement, resource: &str) -> Result<()> {
    match requirement {
        RoleRequirement::NoAuthRequired => Ok(()),
        RoleRequirement::Authenticated => match principal {
            Some(_) => Ok(()),
            None => Err(Error::Unauthenticated { message: None }),
        },
        RoleRequirement::AnyRole(roles) => {
            let Some(principal) = principal else {
                return Err(Error::Unauthenticated { message: None });
            };
            if principal.has_full_access() || roles.iter().any(|role| principal.has_role(*role)) {
                Ok(())
            } else {
                debug!(
                    "Principal {} denied for {resource}: holds none of {roles:?}",
                    principal.username()
                );
                Err(Error::Forbidden {
                    resource: resource.to_string(),
                })
            }
        }
    }
}

/// Requirements for the routed operations, keyed by method and route template
/// (the matched path, e.g. `/owners/{key}`, not the concrete URI).
#[derive(Debug, Default)]
pub struct RequirementRegistry {
    requirements: HashMap<(Method, String), RoleRequirement>,
}

impl RequirementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, method: Method, route: &str, requirement: RoleRequirement) -> Self {
        self.requirements.insert((method, route.to_string()), requirement);
        self
    }

    /// Look up the requirement for an operation. Unregistered operations
    /// require authentication.
    pub fn requirement(&self, method: &Method, route: &str) -> &RoleRequirement {
        self.requirements
            .get(&(method.clone(), route.to_string()))
            .unwrap_or(&RoleRequirement::Authenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::principal::UserPrincipal;

    fn scoped(roles: Vec<Role>) -> Principal {
        Principal::Scoped(UserPrincipal {
            username: "alice".to_string(),
            roles,
        })
    }

    #[test]
    fn test_no_auth_required_allows_anonymous() {
        assert!(authorize(None, &RoleRequirement::NoAuthRequired, "status").is_ok());
    }

    #[test]
    fn test_authenticated_rejects_anonymous() {
        let err = authorize(None, &RoleRequirement::Authenticated, "owners").unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));
    }

    #[test]
    fn test_authenticated_allows_any_principal() {
        let p = scoped(vec![]);
        assert!(authorize(Some(&p), &RoleRequirement::Authenticated, "owners").is_ok());
    }

    #[test]
    fn test_any_role_is_a_logical_or() {
        let requirement = RoleRequirement::AnyRole(vec![Role::SuperAdmin, Role::OwnerAdmin]);
        let p = scoped(vec![Role::OwnerAdmin]);
        assert!(authorize(Some(&p), &requirement, "users").is_ok());
    }

    #[test]
    fn test_missing_role_is_forbidden_not_unauthenticated() {
        let requirement = RoleRequirement::AnyRole(vec![Role::SuperAdmin]);
        let p = scoped(vec![Role::ReadOnly]);
        let err = authorize(Some(&p), &requirement, "users").unwrap_err();
        assert!(matches!(err, Error::Forbidden { .. }));
    }

    #[test]
    fn test_anonymous_against_role_requirement_is_unauthenticated() {
        let requirement = RoleRequirement::AnyRole(vec![Role::SuperAdmin]);
        let err = authorize(None, &requirement, "users").unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));
    }

    #[test]
    fn test_trusted_principal_bypasses_role_checks() {
        let requirement = RoleRequirement::AnyRole(vec![Role::SuperAdmin]);
        let p = Principal::Trusted {
            username: "system".to_string(),
        };
        assert!(authorize(Some(&p), &requirement, "users").is_ok());
    }

    #[test]
    fn test_unregistered_operation_defaults_to_authenticated() {
        let registry = RequirementRegistry::new().register(Method::GET, "/status", RoleRequirement::NoAuthRequired);

        assert_eq!(registry.requirement(&Method::GET, "/status"), &RoleRequirement::NoAuthRequired);
        assert_eq!(
            registry.requirement(&Method::DELETE, "/not-registered"),
            &RoleRequirement::Authenticated
        );
    }
}
