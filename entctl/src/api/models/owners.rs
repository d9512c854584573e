//! API representations of owners (organizations).

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::identity::Owner;
use crate::types::OwnerId;

/// An owner as returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OwnerResponse {
    #[schema(value_type = uuid::Uuid)]
    pub id: OwnerId,
    pub key: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<Owner> for OwnerResponse {
    fn from(owner: Owner) -> Self {
        Self {
            id: owner.id,
            key: owner.key,
            display_name: owner.display_name,
            created_at: owner.created_at,
        }
    }
}
