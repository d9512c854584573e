//! Boundary traits for the external collaborators the request pipeline calls.
//!
//! The authentication strategies never touch storage directly; they go through
//! an [`IdentityAdapter`], and handlers that enumerate tenants go through an
//! [`OwnerCurator`]. Production wires these to PostgreSQL (see [`crate::db`]);
//! tests substitute in-memory fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::api::models::pagination::PageRequest;
use crate::auth::principal::Role;
use crate::types::OwnerId;

/// Failure talking to the identity store. Deliberately not an authentication
/// outcome: an unreachable store must never look like a rejected caller.
#[derive(Error, Debug)]
#[error("identity lookup failed: {0}")]
pub struct IdentityError(#[from] pub anyhow::Error);

/// A plain data record describing a user known to the identity store.
///
/// Principals are built as a pure function of this record; it carries no live
/// reference back into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    pub roles: Vec<Role>,
}

/// Lookup and credential validation against the user-identity store.
///
/// Implementations must be safe for concurrent reads; the pipeline performs at
/// most one lookup per request and never caches results across requests.
#[async_trait]
pub trait IdentityAdapter: Send + Sync {
    /// Find a user by login name.
    async fn find_by_login(&self, username: &str) -> Result<Option<UserRecord>, IdentityError>;

    /// Check a username/password pair. `false` means the credentials are
    /// wrong, not that the user is unknown.
    async fn validate_user(&self, username: &str, password: &str) -> Result<bool, IdentityError>;

    /// Resolve an access token to its user.
    async fn find_by_token(&self, token: &str) -> Result<Option<UserRecord>, IdentityError>;
}

/// An owner (organization) record, the tenancy root of the entitlement model.
#[derive(Debug, Clone, PartialEq)]
pub struct Owner {
    pub id: OwnerId,
    pub key: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// Read access to the owner table.
///
/// This is where `sort_by` legitimacy is decided: the curator knows which
/// columns are sortable, the pagination parser does not.
#[async_trait]
pub trait OwnerCurator: Send + Sync {
    /// List owners, applying the page request's sorting and (when paging)
    /// slicing. `None` means return everything, unordered.
    async fn list(&self, page: Option<&PageRequest>) -> crate::errors::Result<Vec<Owner>>;

    /// Fetch a single owner by its key.
    async fn get(&self, key: &str) -> crate::errors::Result<Option<Owner>>;
}
