use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    routes::models::{CreateAgentRequest, ListingAgent, UpdateAgentRequest},
    services::agents as agent_service,
    ApiError, AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct AgentsResponse {
    pub agents: Vec<ListingAgent>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AgentResponse {
    pub agent: ListingAgent,
}

#[utoipa::path(
    get,
    path = "/api/agents",
    tag = "Agents",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Listing agents", body = AgentsResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_agents(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AgentsResponse>, ApiError> {
    state.actor(&headers).await?;

    let agents = agent_service::list_agents(state.db_pool())
        .await
        .map_err(|e| {
            tracing::error!("Failed to list agents: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(AgentsResponse { agents }))
}

#[utoipa::path(
    post,
    path = "/api/agents",
    tag = "Agents",
    security(("bearerAuth" = [])),
    request_body = CreateAgentRequest,
    responses(
        (status = 200, description = "Agent created", body = AgentResponse),
        (status = 400, description = "Invalid agent payload", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateAgentRequest>,
) -> Result<Json<AgentResponse>, ApiError> {
    state.actor(&headers).await?;

    let agent = agent_service::create_agent(state.db_pool(), req)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create agent: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(AgentResponse { agent }))
}

#[utoipa::path(
    get,
    path = "/api/agents/{agent_id}",
    tag = "Agents",
    security(("bearerAuth" = [])),
    params(("agent_id" = String, Path, description = "Agent public identifier")),
    responses(
        (status = 200, description = "Agent fetched", body = AgentResponse),
        (status = 404, description = "Agent not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<AgentResponse>, ApiError> {
    state.actor(&headers).await?;

    let agent = agent_service::get_agent(state.db_pool(), &agent_id).await?;

    Ok(Json(AgentResponse { agent }))
}

#[utoipa::path(
    put,
    path = "/api/agents/{agent_id}",
    tag = "Agents",
    security(("bearerAuth" = [])),
    params(("agent_id" = String, Path, description = "Agent public identifier")),
    request_body = UpdateAgentRequest,
    responses(
        (status = 200, description = "Agent updated", body = AgentResponse),
        (status = 404, description = "Agent not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<UpdateAgentRequest>,
) -> Result<Json<AgentResponse>, ApiError> {
    state.actor(&headers).await?;

    let agent = agent_service::update_agent(state.db_pool(), &agent_id, req)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update agent: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(AgentResponse { agent }))
}

#[utoipa::path(
    delete,
    path = "/api/agents/{agent_id}",
    tag = "Agents",
    security(("bearerAuth" = [])),
    params(("agent_id" = String, Path, description = "Agent public identifier")),
    responses(
        (status = 204, description = "Agent deleted; their properties are unlinked"),
        (status = 404, description = "Agent not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    state.actor(&headers).await?;

    agent_service::delete_agent(state.db_pool(), &agent_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
