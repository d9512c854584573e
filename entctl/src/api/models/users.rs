//! API representations of users.

use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::principal::Role;
use crate::identity::UserRecord;

/// A user as returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    pub username: String,
    pub roles: Vec<Role>,
}

impl From<UserRecord> for UserResponse {
    fn from(record: UserRecord) -> Self {
        Self {
            username: record.username,
            roles: record.roles,
        }
    }
}
