use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    routes::models::{CreateManagerRequest, Manager, UpdateManagerRequest},
    services::managers as manager_service,
    ApiError, AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct ManagersResponse {
    pub managers: Vec<Manager>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ManagerResponse {
    pub manager: Manager,
}

#[utoipa::path(
    get,
    path = "/api/managers",
    tag = "Managers",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "All property managers", body = ManagersResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Admin role required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_managers(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ManagersResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let managers = manager_service::list_managers(state.db_pool(), &actor)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list managers: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(ManagersResponse {
        managers: managers.into_iter().map(Manager::from).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/managers",
    tag = "Managers",
    security(("bearerAuth" = [])),
    request_body = CreateManagerRequest,
    responses(
        (status = 200, description = "Manager created", body = ManagerResponse),
        (status = 400, description = "Invalid manager payload", body = crate::error::ErrorResponse),
        (status = 403, description = "Admin role required", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already in use", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_manager(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateManagerRequest>,
) -> Result<Json<ManagerResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let manager = manager_service::create_manager(state.db_pool(), &actor, req)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create manager: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(ManagerResponse {
        manager: manager.into(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/managers/{manager_id}",
    tag = "Managers",
    security(("bearerAuth" = [])),
    params(("manager_id" = String, Path, description = "Manager public identifier")),
    responses(
        (status = 200, description = "Manager fetched", body = ManagerResponse),
        (status = 403, description = "Admin role required", body = crate::error::ErrorResponse),
        (status = 404, description = "Manager not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_manager(
    State(state): State<AppState>,
    Path(manager_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ManagerResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let manager = manager_service::get_manager(state.db_pool(), &actor, &manager_id).await?;

    Ok(Json(ManagerResponse {
        manager: manager.into(),
    }))
}

#[utoipa::path(
    put,
    path = "/api/managers/{manager_id}",
    tag = "Managers",
    security(("bearerAuth" = [])),
    params(("manager_id" = String, Path, description = "Manager public identifier")),
    request_body = UpdateManagerRequest,
    responses(
        (status = 200, description = "Manager updated", body = ManagerResponse),
        (status = 400, description = "Invalid update payload", body = crate::error::ErrorResponse),
        (status = 403, description = "Admin role required", body = crate::error::ErrorResponse),
        (status = 404, description = "Manager not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_manager(
    State(state): State<AppState>,
    Path(manager_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<UpdateManagerRequest>,
) -> Result<Json<ManagerResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let manager = manager_service::update_manager(state.db_pool(), &actor, &manager_id, req)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update manager: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(ManagerResponse {
        manager: manager.into(),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/managers/{manager_id}",
    tag = "Managers",
    security(("bearerAuth" = [])),
    params(("manager_id" = String, Path, description = "Manager public identifier")),
    responses(
        (status = 204, description = "Manager deleted"),
        (status = 400, description = "Cannot delete yourself", body = crate::error::ErrorResponse),
        (status = 403, description = "Admin role required", body = crate::error::ErrorResponse),
        (status = 409, description = "Manager still owns clients", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_manager(
    State(state): State<AppState>,
    Path(manager_id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let actor = state.actor(&headers).await?;

    manager_service::delete_manager(state.db_pool(), &actor, &manager_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete manager: {}", e);
            ApiError::from(e)
        })?;

    Ok(StatusCode::NO_CONTENT)
}
