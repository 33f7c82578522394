use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    routes::models::{
        AddImageRequest, CreatePropertyRequest, ImportListingRequest, Property, PropertyQuery,
        UpdatePropertyRequest,
    },
    services::properties as property_service,
    ApiError, AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct PropertiesResponse {
    pub properties: Vec<Property>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PropertyResponse {
    pub property: Property,
}

#[utoipa::path(
    get,
    path = "/api/properties",
    tag = "Properties",
    security(("bearerAuth" = [])),
    params(PropertyQuery),
    responses(
        (status = 200, description = "Properties matching the filters", body = PropertiesResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Manager account required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_properties(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PropertyQuery>,
) -> Result<Json<PropertiesResponse>, ApiError> {
    state.actor(&headers).await?;

    let properties = property_service::list_properties(state.db_pool(), &query)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list properties: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(PropertiesResponse {
        properties: properties.into_iter().map(Property::from).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/properties",
    tag = "Properties",
    security(("bearerAuth" = [])),
    request_body = CreatePropertyRequest,
    responses(
        (status = 200, description = "Property created", body = PropertyResponse),
        (status = 400, description = "Invalid property payload", body = crate::error::ErrorResponse),
        (status = 409, description = "Listing URL already imported", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_property(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreatePropertyRequest>,
) -> Result<Json<PropertyResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let property =
        property_service::create_property(state.db_pool(), &actor, state.regions(), req)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create property: {}", e);
                ApiError::from(e)
            })?;

    Ok(Json(PropertyResponse {
        property: property.into(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/properties/import",
    tag = "Properties",
    security(("bearerAuth" = [])),
    request_body = ImportListingRequest,
    responses(
        (status = 200, description = "Listing scraped and stored", body = PropertyResponse),
        (status = 400, description = "Not a supported listing URL", body = crate::error::ErrorResponse),
        (status = 409, description = "Listing URL already imported", body = crate::error::ErrorResponse),
        (status = 502, description = "Listing provider failed", body = crate::error::ErrorResponse),
        (status = 503, description = "Listing provider not configured", body = crate::error::ErrorResponse)
    )
)]
pub async fn import_listing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ImportListingRequest>,
) -> Result<Json<PropertyResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let property = property_service::import_from_listing(
        state.db_pool(),
        &actor,
        state.integrations(),
        state.regions(),
        req,
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to import listing: {}", e);
        ApiError::from(e)
    })?;

    Ok(Json(PropertyResponse {
        property: property.into(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/properties/{property_id}",
    tag = "Properties",
    security(("bearerAuth" = [])),
    params(("property_id" = String, Path, description = "Property public identifier")),
    responses(
        (status = 200, description = "Property fetched", body = PropertyResponse),
        (status = 404, description = "Property not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_property(
    State(state): State<AppState>,
    Path(property_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<PropertyResponse>, ApiError> {
    state.actor(&headers).await?;

    let property = property_service::get_property(state.db_pool(), &property_id).await?;

    Ok(Json(PropertyResponse {
        property: property.into(),
    }))
}

#[utoipa::path(
    patch,
    path = "/api/properties/{property_id}",
    tag = "Properties",
    security(("bearerAuth" = [])),
    params(("property_id" = String, Path, description = "Property public identifier")),
    request_body = UpdatePropertyRequest,
    responses(
        (status = 200, description = "Property updated", body = PropertyResponse),
        (status = 400, description = "Invalid update payload", body = crate::error::ErrorResponse),
        (status = 403, description = "Only the creator or an admin may edit", body = crate::error::ErrorResponse),
        (status = 404, description = "Property not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_property(
    State(state): State<AppState>,
    Path(property_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<UpdatePropertyRequest>,
) -> Result<Json<PropertyResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let property = property_service::update_property(
        state.db_pool(),
        &actor,
        state.regions(),
        &property_id,
        req,
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to update property: {}", e);
        ApiError::from(e)
    })?;

    Ok(Json(PropertyResponse {
        property: property.into(),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/properties/{property_id}",
    tag = "Properties",
    security(("bearerAuth" = [])),
    params(("property_id" = String, Path, description = "Property public identifier")),
    responses(
        (status = 204, description = "Property deleted"),
        (status = 403, description = "Only the creator or an admin may delete", body = crate::error::ErrorResponse),
        (status = 404, description = "Property not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_property(
    State(state): State<AppState>,
    Path(property_id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let actor = state.actor(&headers).await?;

    property_service::delete_property(state.db_pool(), &actor, &property_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete property: {}", e);
            ApiError::from(e)
        })?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/properties/{property_id}/images",
    tag = "Properties",
    security(("bearerAuth" = [])),
    params(("property_id" = String, Path, description = "Property public identifier")),
    request_body = AddImageRequest,
    responses(
        (status = 200, description = "Image uploaded and appended", body = PropertyResponse),
        (status = 403, description = "Only the creator or an admin may edit", body = crate::error::ErrorResponse),
        (status = 502, description = "Image CDN failed", body = crate::error::ErrorResponse),
        (status = 503, description = "Image CDN not configured", body = crate::error::ErrorResponse)
    )
)]
pub async fn add_image(
    State(state): State<AppState>,
    Path(property_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<AddImageRequest>,
) -> Result<Json<PropertyResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let property = property_service::add_image(
        state.db_pool(),
        &actor,
        state.integrations(),
        &property_id,
        &req.image_url,
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to add property image: {}", e);
        ApiError::from(e)
    })?;

    Ok(Json(PropertyResponse {
        property: property.into(),
    }))
}
