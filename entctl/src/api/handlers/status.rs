use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

/// Service status document.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusResponse {
    pub result: String,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/status",
    tag = "status",
    summary = "Service status",
    responses(
        (status = 200, description = "Service status", body = StatusResponse)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_status() -> Json<StatusResponse> {
    Json(StatusResponse {
        result: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
