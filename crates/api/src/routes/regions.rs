use axum::{extract::State, http::HeaderMap, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    routes::models::RegionSummary,
    services::region as region_service,
    ApiError, AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct RegionsResponse {
    pub regions: Vec<RegionSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecategorizeResponse {
    pub updated: u64,
}

#[utoipa::path(
    get,
    path = "/api/regions",
    tag = "Regions",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Configured regions with property counts", body = RegionsResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_regions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RegionsResponse>, ApiError> {
    state.actor(&headers).await?;

    let regions = region_service::list_regions(state.db_pool(), state.regions()).await?;

    Ok(Json(RegionsResponse { regions }))
}

#[utoipa::path(
    post,
    path = "/api/properties/recategorize",
    tag = "Regions",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Regions recomputed for every property", body = RecategorizeResponse),
        (status = 403, description = "Admin role required", body = crate::error::ErrorResponse)
    )
)]
pub async fn recategorize(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RecategorizeResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let updated = region_service::recategorize_all(state.db_pool(), &actor, state.regions())
        .await
        .map_err(|e| {
            tracing::error!("Failed to recategorize properties: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(RecategorizeResponse { updated }))
}
