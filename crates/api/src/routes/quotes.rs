use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    routes::models::{BillingQuery, CreateQuoteRequest, UpdateQuoteRequest},
    services::quotes::{self as quote_service, Quote, QuoteConversion},
    util::inline_pdf_disposition,
    ApiError, AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct QuotesResponse {
    pub quotes: Vec<Quote>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QuoteResponse {
    pub quote: Quote,
}

#[utoipa::path(
    get,
    path = "/api/quotes",
    tag = "Quotes",
    security(("bearerAuth" = [])),
    params(BillingQuery),
    responses(
        (status = 200, description = "Quotes for clients the caller manages", body = QuotesResponse),
        (status = 400, description = "Unknown status filter", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_quotes(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<BillingQuery>,
) -> Result<Json<QuotesResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let quotes = quote_service::list_quotes(state.db_pool(), &actor, &query)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list quotes: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(QuotesResponse { quotes }))
}

#[utoipa::path(
    post,
    path = "/api/quotes",
    tag = "Quotes",
    security(("bearerAuth" = [])),
    request_body = CreateQuoteRequest,
    responses(
        (status = 200, description = "Draft quote created", body = QuoteResponse),
        (status = 400, description = "Invalid line items, tax rate or dates", body = crate::error::ErrorResponse),
        (status = 403, description = "Client belongs to another manager", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_quote(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateQuoteRequest>,
) -> Result<Json<QuoteResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let quote = quote_service::create_quote(state.db_pool(), &actor, req)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create quote: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(QuoteResponse { quote }))
}

#[utoipa::path(
    get,
    path = "/api/quotes/{quote_id}",
    tag = "Quotes",
    security(("bearerAuth" = [])),
    params(("quote_id" = String, Path, description = "Quote public identifier")),
    responses(
        (status = 200, description = "Quote fetched", body = QuoteResponse),
        (status = 404, description = "Quote not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_quote(
    State(state): State<AppState>,
    Path(quote_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<QuoteResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let quote = quote_service::get_quote(state.db_pool(), &actor, &quote_id).await?;

    Ok(Json(QuoteResponse { quote }))
}

#[utoipa::path(
    patch,
    path = "/api/quotes/{quote_id}",
    tag = "Quotes",
    security(("bearerAuth" = [])),
    params(("quote_id" = String, Path, description = "Quote public identifier")),
    request_body = UpdateQuoteRequest,
    responses(
        (status = 200, description = "Draft updated and totals recomputed", body = QuoteResponse),
        (status = 400, description = "Invalid update payload", body = crate::error::ErrorResponse),
        (status = 409, description = "Quote is no longer a draft", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_quote(
    State(state): State<AppState>,
    Path(quote_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<UpdateQuoteRequest>,
) -> Result<Json<QuoteResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let quote = quote_service::update_quote(state.db_pool(), &actor, &quote_id, req)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update quote: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(QuoteResponse { quote }))
}

#[utoipa::path(
    delete,
    path = "/api/quotes/{quote_id}",
    tag = "Quotes",
    security(("bearerAuth" = [])),
    params(("quote_id" = String, Path, description = "Quote public identifier")),
    responses(
        (status = 204, description = "Draft deleted"),
        (status = 409, description = "Quote is no longer a draft", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_quote(
    State(state): State<AppState>,
    Path(quote_id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let actor = state.actor(&headers).await?;

    quote_service::delete_quote(state.db_pool(), &actor, &quote_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete quote: {}", e);
            ApiError::from(e)
        })?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/quotes/{quote_id}/send",
    tag = "Quotes",
    security(("bearerAuth" = [])),
    params(("quote_id" = String, Path, description = "Quote public identifier")),
    responses(
        (status = 200, description = "Quote marked as sent", body = QuoteResponse),
        (status = 409, description = "Quote is not a draft", body = crate::error::ErrorResponse)
    )
)]
pub async fn send_quote(
    State(state): State<AppState>,
    Path(quote_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<QuoteResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let quote = quote_service::send_quote(state.db_pool(), &actor, &quote_id).await?;

    Ok(Json(QuoteResponse { quote }))
}

#[utoipa::path(
    post,
    path = "/api/quotes/{quote_id}/accept",
    tag = "Quotes",
    security(("bearerAuth" = [])),
    params(("quote_id" = String, Path, description = "Quote public identifier")),
    responses(
        (status = 200, description = "Quote accepted", body = QuoteResponse),
        (status = 409, description = "Quote is not sent or has expired", body = crate::error::ErrorResponse)
    )
)]
pub async fn accept_quote(
    State(state): State<AppState>,
    Path(quote_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<QuoteResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let quote = quote_service::accept_quote(state.db_pool(), &actor, &quote_id).await?;

    Ok(Json(QuoteResponse { quote }))
}

#[utoipa::path(
    post,
    path = "/api/quotes/{quote_id}/decline",
    tag = "Quotes",
    security(("bearerAuth" = [])),
    params(("quote_id" = String, Path, description = "Quote public identifier")),
    responses(
        (status = 200, description = "Quote declined", body = QuoteResponse),
        (status = 409, description = "Quote is not awaiting an answer", body = crate::error::ErrorResponse)
    )
)]
pub async fn decline_quote(
    State(state): State<AppState>,
    Path(quote_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<QuoteResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let quote = quote_service::decline_quote(state.db_pool(), &actor, &quote_id).await?;

    Ok(Json(QuoteResponse { quote }))
}

#[utoipa::path(
    post,
    path = "/api/quotes/{quote_id}/convert",
    tag = "Quotes",
    security(("bearerAuth" = [])),
    params(("quote_id" = String, Path, description = "Quote public identifier")),
    responses(
        (status = 200, description = "Draft invoice created from the quote", body = QuoteConversion),
        (status = 409, description = "Quote not accepted or already converted", body = crate::error::ErrorResponse)
    )
)]
pub async fn convert_quote(
    State(state): State<AppState>,
    Path(quote_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<QuoteConversion>, ApiError> {
    let actor = state.actor(&headers).await?;

    let conversion = quote_service::convert_quote(state.db_pool(), &actor, &quote_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to convert quote: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(conversion))
}

#[utoipa::path(
    get,
    path = "/api/quotes/{quote_id}/pdf",
    tag = "Quotes",
    security(("bearerAuth" = [])),
    params(("quote_id" = String, Path, description = "Quote public identifier")),
    responses(
        (status = 200, description = "Rendered quote", content_type = "application/pdf", body = Vec<u8>),
        (status = 404, description = "Quote not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn quote_pdf(
    State(state): State<AppState>,
    Path(quote_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let actor = state.actor(&headers).await?;

    let (number, bytes) =
        quote_service::quote_pdf(state.db_pool(), &actor, &state.business(), &quote_id)
            .await
            .map_err(|e| {
                tracing::error!("Failed to render quote pdf: {}", e);
                ApiError::from(e)
            })?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, inline_pdf_disposition(&number)),
        ],
        bytes,
    )
        .into_response())
}
