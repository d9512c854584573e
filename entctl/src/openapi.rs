//! OpenAPI documentation for the API surface.

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::handlers;
use crate::api::models::{owners::OwnerResponse, pagination::Order, users::UserResponse};
use crate::auth::principal::Role;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::status::get_status,
        handlers::users::get_user,
        handlers::owners::list_owners,
        handlers::owners::get_owner,
    ),
    components(schemas(UserResponse, OwnerResponse, Role, Order, handlers::status::StatusResponse)),
    modifiers(&SecurityAddon),
    tags(
        (name = "status", description = "Service status"),
        (name = "users", description = "User lookup"),
        (name = "owners", description = "Owner (organization) management")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme("BearerAuth", SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)));
            components.add_security_scheme("BasicAuth", SecurityScheme::Http(Http::new(HttpAuthScheme::Basic)));
        }
    }
}
