use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    routes::models::{CreatePaymentIntentRequest, PaymentIntentResponse},
    services::payments::{self as payment_service, WebhookOutcome},
    ApiError, AppState,
};

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
    /// `invoice_paid`, `already_settled` or `ignored`.
    pub outcome: String,
    /// Invoice number that was paid, or the ignored event type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<WebhookOutcome> for WebhookAck {
    fn from(outcome: WebhookOutcome) -> Self {
        let (outcome, detail) = match outcome {
            WebhookOutcome::InvoicePaid(number) => ("invoice_paid", Some(number)),
            WebhookOutcome::AlreadySettled => ("already_settled", None),
            WebhookOutcome::Ignored(event_type) => ("ignored", Some(event_type)),
        };
        Self {
            received: true,
            outcome: outcome.to_string(),
            detail,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/payments/intent",
    tag = "Payments",
    request_body = CreatePaymentIntentRequest,
    responses(
        (status = 200, description = "Payment intent created for the invoice total", body = PaymentIntentResponse),
        (status = 400, description = "Invoice is not payable", body = crate::error::ErrorResponse),
        (status = 404, description = "Invoice not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Invoice already paid", body = crate::error::ErrorResponse),
        (status = 502, description = "Stripe rejected the request", body = crate::error::ErrorResponse),
        (status = 503, description = "Stripe not configured", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    Json(req): Json<CreatePaymentIntentRequest>,
) -> Result<Json<PaymentIntentResponse>, ApiError> {
    let intent =
        payment_service::create_payment_intent(state.db_pool(), state.integrations(), req)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create payment intent: {}", e);
                ApiError::from(e)
            })?;

    Ok(Json(intent))
}

#[utoipa::path(
    post,
    path = "/api/payments/webhook",
    tag = "Payments",
    request_body(content = String, description = "Raw Stripe event body", content_type = "application/json"),
    params(("Stripe-Signature" = String, Header, description = "Stripe webhook signature")),
    responses(
        (status = 200, description = "Event accepted", body = WebhookAck),
        (status = 400, description = "Signature or payload rejected", body = crate::error::ErrorResponse),
        (status = 503, description = "Webhook secret not configured", body = crate::error::ErrorResponse)
    )
)]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = payment_service::handle_webhook(
        state.db_pool(),
        state.integrations(),
        &body,
        signature,
        chrono::Utc::now().timestamp(),
    )
    .await
    .map_err(|e| {
        tracing::warn!("Rejected stripe webhook: {}", e);
        ApiError::from(e)
    })?;

    Ok(Json(outcome.into()))
}
