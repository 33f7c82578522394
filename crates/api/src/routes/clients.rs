use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    routes::models::{
        AssignPropertyRequest, Assignment, Client, CreateClientRequest,
        ReorderAssignmentsRequest, UpdateAssignmentRequest, UpdateClientRequest,
    },
    services::{assignments as assignment_service, clients as client_service},
    ApiError, AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct ClientsResponse {
    pub clients: Vec<Client>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClientResponse {
    pub client: Client,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssignmentsResponse {
    pub assignments: Vec<Assignment>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssignmentResponse {
    pub assignment: Assignment,
}

#[utoipa::path(
    get,
    path = "/api/clients",
    tag = "Clients",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Clients visible to the caller", body = ClientsResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Manager account required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_clients(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ClientsResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let clients = client_service::list_clients(state.db_pool(), &actor)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list clients: {}", e);
            ApiError::from(e)
        })?;

    let base_url = state.public_base_url();
    Ok(Json(ClientsResponse {
        clients: clients
            .into_iter()
            .map(|row| Client::from_row(row, base_url))
            .collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/clients",
    tag = "Clients",
    security(("bearerAuth" = [])),
    request_body = CreateClientRequest,
    responses(
        (status = 200, description = "Client created", body = ClientResponse),
        (status = 400, description = "Invalid client payload", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already in use", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_client(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateClientRequest>,
) -> Result<Json<ClientResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let client = client_service::create_client(state.db_pool(), &actor, req)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create client: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(ClientResponse {
        client: Client::from_row(client, state.public_base_url()),
    }))
}

#[utoipa::path(
    get,
    path = "/api/clients/{client_id}",
    tag = "Clients",
    security(("bearerAuth" = [])),
    params(("client_id" = String, Path, description = "Client public identifier")),
    responses(
        (status = 200, description = "Client fetched", body = ClientResponse),
        (status = 403, description = "Client belongs to another manager", body = crate::error::ErrorResponse),
        (status = 404, description = "Client not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_client(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ClientResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let client = client_service::get_client(state.db_pool(), &actor, &client_id).await?;

    Ok(Json(ClientResponse {
        client: Client::from_row(client, state.public_base_url()),
    }))
}

#[utoipa::path(
    patch,
    path = "/api/clients/{client_id}",
    tag = "Clients",
    security(("bearerAuth" = [])),
    params(("client_id" = String, Path, description = "Client public identifier")),
    request_body = UpdateClientRequest,
    responses(
        (status = 200, description = "Client updated", body = ClientResponse),
        (status = 400, description = "Invalid update payload", body = crate::error::ErrorResponse),
        (status = 403, description = "Client belongs to another manager", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already in use", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_client(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<UpdateClientRequest>,
) -> Result<Json<ClientResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let client = client_service::update_client(state.db_pool(), &actor, &client_id, req)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update client: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(ClientResponse {
        client: Client::from_row(client, state.public_base_url()),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/clients/{client_id}",
    tag = "Clients",
    security(("bearerAuth" = [])),
    params(("client_id" = String, Path, description = "Client public identifier")),
    responses(
        (status = 204, description = "Client and their assignments deleted"),
        (status = 403, description = "Client belongs to another manager", body = crate::error::ErrorResponse),
        (status = 409, description = "Client has invoices or quotes", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_client(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let actor = state.actor(&headers).await?;

    client_service::delete_client(state.db_pool(), &actor, &client_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete client: {}", e);
            ApiError::from(e)
        })?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/clients/{client_id}/assignments",
    tag = "Assignments",
    security(("bearerAuth" = [])),
    params(("client_id" = String, Path, description = "Client public identifier")),
    responses(
        (status = 200, description = "Assigned properties in portfolio order", body = AssignmentsResponse),
        (status = 403, description = "Client belongs to another manager", body = crate::error::ErrorResponse),
        (status = 404, description = "Client not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_assignments(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<AssignmentsResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let rows = assignment_service::list_assignments(state.db_pool(), &actor, &client_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list assignments: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(AssignmentsResponse {
        assignments: rows.into_iter().map(Assignment::from).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/clients/{client_id}/assignments",
    tag = "Assignments",
    security(("bearerAuth" = [])),
    params(("client_id" = String, Path, description = "Client public identifier")),
    request_body = AssignPropertyRequest,
    responses(
        (status = 200, description = "Property added to the end of the portfolio", body = AssignmentResponse),
        (status = 400, description = "Unknown property", body = crate::error::ErrorResponse),
        (status = 409, description = "Property already assigned", body = crate::error::ErrorResponse)
    )
)]
pub async fn assign_property(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<AssignPropertyRequest>,
) -> Result<Json<AssignmentResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let row = assignment_service::assign_property(state.db_pool(), &actor, &client_id, req)
        .await
        .map_err(|e| {
            tracing::error!("Failed to assign property: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(AssignmentResponse {
        assignment: row.into(),
    }))
}

#[utoipa::path(
    put,
    path = "/api/clients/{client_id}/assignments/order",
    tag = "Assignments",
    security(("bearerAuth" = [])),
    params(("client_id" = String, Path, description = "Client public identifier")),
    request_body = ReorderAssignmentsRequest,
    responses(
        (status = 200, description = "Portfolio reordered", body = AssignmentsResponse),
        (status = 400, description = "List does not match the assigned properties", body = crate::error::ErrorResponse)
    )
)]
pub async fn reorder_assignments(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<ReorderAssignmentsRequest>,
) -> Result<Json<AssignmentsResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let rows = assignment_service::reorder_assignments(state.db_pool(), &actor, &client_id, req)
        .await
        .map_err(|e| {
            tracing::error!("Failed to reorder assignments: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(AssignmentsResponse {
        assignments: rows.into_iter().map(Assignment::from).collect(),
    }))
}

#[utoipa::path(
    patch,
    path = "/api/clients/{client_id}/assignments/{property_id}",
    tag = "Assignments",
    security(("bearerAuth" = [])),
    params(
        ("client_id" = String, Path, description = "Client public identifier"),
        ("property_id" = String, Path, description = "Property public identifier")
    ),
    request_body = UpdateAssignmentRequest,
    responses(
        (status = 200, description = "Overrides or notes updated", body = AssignmentResponse),
        (status = 404, description = "Property is not assigned to this client", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_assignment(
    State(state): State<AppState>,
    Path((client_id, property_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(req): Json<UpdateAssignmentRequest>,
) -> Result<Json<AssignmentResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let row = assignment_service::update_assignment(
        state.db_pool(),
        &actor,
        &client_id,
        &property_id,
        req,
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to update assignment: {}", e);
        ApiError::from(e)
    })?;

    Ok(Json(AssignmentResponse {
        assignment: row.into(),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/clients/{client_id}/assignments/{property_id}",
    tag = "Assignments",
    security(("bearerAuth" = [])),
    params(
        ("client_id" = String, Path, description = "Client public identifier"),
        ("property_id" = String, Path, description = "Property public identifier")
    ),
    responses(
        (status = 204, description = "Property removed from the portfolio"),
        (status = 404, description = "Property is not assigned to this client", body = crate::error::ErrorResponse)
    )
)]
pub async fn unassign_property(
    State(state): State<AppState>,
    Path((client_id, property_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let actor = state.actor(&headers).await?;

    assignment_service::unassign_property(state.db_pool(), &actor, &client_id, &property_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to unassign property: {}", e);
            ApiError::from(e)
        })?;

    Ok(StatusCode::NO_CONTENT)
}
