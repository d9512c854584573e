use axum::{
    Json,
    extract::{Path, State},
};
use tracing::trace;

use crate::AppState;
use crate::api::models::owners::OwnerResponse;
use crate::errors::{Error, Result};
use crate::pipeline::{CurrentPrincipal, Page};

#[utoipa::path(
    get,
    path = "/owners",
    tag = "owners",
    summary = "List owners",
    responses(
        (status = 200, description = "List of owners", body = Vec<OwnerResponse>),
        (status = 400, description = "Invalid paging or sorting parameters"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Insufficient roles")
    ),
    params(
        ("page" = Option<i32>, Query, description = "Page number (1-based)"),
        ("per_page" = Option<i32>, Query, description = "Items per page"),
        ("sort_by" = Option<String>, Query, description = "Column to sort by"),
        ("order" = Option<String>, Query, description = "Sort direction: ascending or descending"),
    ),
    security(
        ("BearerAuth" = []),
        ("BasicAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_owners(State(state): State<AppState>, Page(page): Page) -> Result<Json<Vec<OwnerResponse>>> {
    trace!("Listing owners with page context {page:?}");
    let owners = state.owners.list(page.as_ref()).await?;
    Ok(Json(owners.into_iter().map(OwnerResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/owners/{key}",
    tag = "owners",
    summary = "Get an owner by key",
    responses(
        (status = 200, description = "Owner details", body = OwnerResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Owner not found")
    ),
    params(
        ("key" = String, Path, description = "Owner key")
    ),
    security(
        ("BearerAuth" = []),
        ("BasicAuth" = [])
    )
)]
#[tracing::instrument(skip(state, principal))]
pub async fn get_owner(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(key): Path<String>,
) -> Result<Json<OwnerResponse>> {
    trace!("Owner {key} requested by {}", principal.username());
    let owner = state.owners.get(&key).await?.ok_or_else(|| Error::NotFound {
        resource: "Owner".to_string(),
        id: key.clone(),
    })?;
    Ok(Json(owner.into()))
}
