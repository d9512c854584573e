use axum::{
    Json,
    extract::{Path, State},
};

use crate::AppState;
use crate::api::models::users::UserResponse;
use crate::errors::{Error, Result};

#[utoipa::path(
    get,
    path = "/users/{username}",
    tag = "users",
    summary = "Get a user by login name",
    responses(
        (status = 200, description = "User details", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Insufficient roles"),
        (status = 404, description = "User not found"),
        (status = 503, description = "Identity store unavailable")
    ),
    params(
        ("username" = String, Path, description = "Login name of the user")
    ),
    security(
        ("BearerAuth" = []),
        ("BasicAuth" = [])
    )
)]
#[tracing::instrument(skip(state))]
pub async fn get_user(State(state): State<AppState>, Path(username): Path<String>) -> Result<Json<UserResponse>> {
    let record = state.identity.find_by_login(&username).await?.ok_or_else(|| Error::NotFound {
        resource: "User".to_string(),
        id: username.clone(),
    })?;
    Ok(Json(record.into()))
}
