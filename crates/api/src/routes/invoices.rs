use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    routes::models::{BillingQuery, CreateInvoiceRequest, UpdateInvoiceRequest},
    services::invoices::{self as invoice_service, Invoice},
    util::inline_pdf_disposition,
    ApiError, AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct InvoicesResponse {
    pub invoices: Vec<Invoice>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InvoiceResponse {
    pub invoice: Invoice,
}

#[utoipa::path(
    get,
    path = "/api/invoices",
    tag = "Invoices",
    security(("bearerAuth" = [])),
    params(BillingQuery),
    responses(
        (status = 200, description = "Invoices for clients the caller manages", body = InvoicesResponse),
        (status = 400, description = "Unknown status filter", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_invoices(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<BillingQuery>,
) -> Result<Json<InvoicesResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let invoices = invoice_service::list_invoices(state.db_pool(), &actor, &query)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list invoices: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(InvoicesResponse { invoices }))
}

#[utoipa::path(
    post,
    path = "/api/invoices",
    tag = "Invoices",
    security(("bearerAuth" = [])),
    request_body = CreateInvoiceRequest,
    responses(
        (status = 200, description = "Draft invoice created", body = InvoiceResponse),
        (status = 400, description = "Invalid line items, tax rate or dates", body = crate::error::ErrorResponse),
        (status = 403, description = "Client belongs to another manager", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_invoice(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateInvoiceRequest>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let invoice = invoice_service::create_invoice(state.db_pool(), &actor, req)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create invoice: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(InvoiceResponse { invoice }))
}

#[utoipa::path(
    get,
    path = "/api/invoices/{invoice_id}",
    tag = "Invoices",
    security(("bearerAuth" = [])),
    params(("invoice_id" = String, Path, description = "Invoice public identifier")),
    responses(
        (status = 200, description = "Invoice fetched", body = InvoiceResponse),
        (status = 404, description = "Invoice not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let invoice = invoice_service::get_invoice(state.db_pool(), &actor, &invoice_id).await?;

    Ok(Json(InvoiceResponse { invoice }))
}

#[utoipa::path(
    patch,
    path = "/api/invoices/{invoice_id}",
    tag = "Invoices",
    security(("bearerAuth" = [])),
    params(("invoice_id" = String, Path, description = "Invoice public identifier")),
    request_body = UpdateInvoiceRequest,
    responses(
        (status = 200, description = "Draft updated and totals recomputed", body = InvoiceResponse),
        (status = 400, description = "Invalid update payload", body = crate::error::ErrorResponse),
        (status = 409, description = "Invoice is no longer a draft", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<UpdateInvoiceRequest>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let invoice = invoice_service::update_invoice(state.db_pool(), &actor, &invoice_id, req)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update invoice: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(InvoiceResponse { invoice }))
}

#[utoipa::path(
    delete,
    path = "/api/invoices/{invoice_id}",
    tag = "Invoices",
    security(("bearerAuth" = [])),
    params(("invoice_id" = String, Path, description = "Invoice public identifier")),
    responses(
        (status = 204, description = "Draft deleted"),
        (status = 409, description = "Invoice is no longer a draft", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let actor = state.actor(&headers).await?;

    invoice_service::delete_invoice(state.db_pool(), &actor, &invoice_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete invoice: {}", e);
            ApiError::from(e)
        })?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/invoices/{invoice_id}/send",
    tag = "Invoices",
    security(("bearerAuth" = [])),
    params(("invoice_id" = String, Path, description = "Invoice public identifier")),
    responses(
        (status = 200, description = "Invoice marked as sent", body = InvoiceResponse),
        (status = 409, description = "Invoice is not a draft", body = crate::error::ErrorResponse)
    )
)]
pub async fn send_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let invoice = invoice_service::send_invoice(state.db_pool(), &actor, &invoice_id).await?;

    Ok(Json(InvoiceResponse { invoice }))
}

#[utoipa::path(
    post,
    path = "/api/invoices/{invoice_id}/void",
    tag = "Invoices",
    security(("bearerAuth" = [])),
    params(("invoice_id" = String, Path, description = "Invoice public identifier")),
    responses(
        (status = 200, description = "Invoice voided", body = InvoiceResponse),
        (status = 409, description = "Paid or already void", body = crate::error::ErrorResponse)
    )
)]
pub async fn void_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let invoice = invoice_service::void_invoice(state.db_pool(), &actor, &invoice_id).await?;

    Ok(Json(InvoiceResponse { invoice }))
}

#[utoipa::path(
    post,
    path = "/api/invoices/{invoice_id}/mark-paid",
    tag = "Invoices",
    security(("bearerAuth" = [])),
    params(("invoice_id" = String, Path, description = "Invoice public identifier")),
    responses(
        (status = 200, description = "Payment recorded", body = InvoiceResponse),
        (status = 409, description = "Invoice is not awaiting payment", body = crate::error::ErrorResponse)
    )
)]
pub async fn mark_invoice_paid(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let actor = state.actor(&headers).await?;

    let invoice =
        invoice_service::mark_invoice_paid(state.db_pool(), &actor, &invoice_id).await?;

    Ok(Json(InvoiceResponse { invoice }))
}

#[utoipa::path(
    get,
    path = "/api/invoices/{invoice_id}/pdf",
    tag = "Invoices",
    security(("bearerAuth" = [])),
    params(("invoice_id" = String, Path, description = "Invoice public identifier")),
    responses(
        (status = 200, description = "Rendered invoice", content_type = "application/pdf", body = Vec<u8>),
        (status = 404, description = "Invoice not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn invoice_pdf(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let actor = state.actor(&headers).await?;

    let (number, bytes) =
        invoice_service::invoice_pdf(state.db_pool(), &actor, &state.business(), &invoice_id)
            .await
            .map_err(|e| {
                tracing::error!("Failed to render invoice pdf: {}", e);
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
