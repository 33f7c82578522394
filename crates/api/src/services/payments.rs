//! Card payments for sent invoices through Stripe payment intents.

use std::collections::BTreeMap;

use concierge_integrations::{Integrations, StripeEvent};
use sqlx::SqlitePool;
use tracing::{info, warn};

use super::error::ServiceError;
use super::invoices::{attach_payment_intent, find_invoice, settle_payment_intent, InvoiceStatus};
use crate::routes::models::{CreatePaymentIntentRequest, PaymentIntentResponse};

pub const PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";

/// What a webhook delivery did, for logging and the acknowledgement body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    InvoicePaid(String),
    AlreadySettled,
    Ignored(String),
}

/// Open a payment intent for the full invoice total. Public: the invoice id is the capability.
pub async fn create_payment_intent(
    pool: &SqlitePool,
    integrations: &Integrations,
    req: CreatePaymentIntentRequest,
) -> Result<PaymentIntentResponse, ServiceError> {
    let invoice = find_invoice(pool, &req.invoice_id).await?;
    match invoice.status()? {
        InvoiceStatus::Sent => {}
        InvoiceStatus::Paid => {
            return Err(ServiceError::conflict(format!(
                "Invoice {} is already paid",
                invoice.number
            )))
        }
        other => {
            return Err(ServiceError::bad_request(format!(
                "Invoice {} is {} and cannot be paid",
                invoice.number,
                other.as_str()
            )))
        }
    }
    if invoice.total_cents <= 0 {
        return Err(ServiceError::bad_request("Invoice has nothing to pay"));
    }

    let stripe = integrations.stripe()?;
    let currency = integrations.currency().to_string();
    let metadata = BTreeMap::from([
        ("invoice_id".to_string(), invoice.public_id.clone()),
        ("invoice_number".to_string(), invoice.number.clone()),
    ]);

    let intent = stripe
        .create_payment_intent(invoice.total_cents, &currency, &metadata)
        .await?;
    attach_payment_intent(pool, invoice.id, &intent.id).await?;

    info!(invoice = %invoice.public_id, payment_intent = %intent.id, "payment intent attached");
    Ok(PaymentIntentResponse {
        client_secret: intent.client_secret,
        payment_intent_id: intent.id,
        amount_cents: intent.amount,
        currency: intent.currency,
    })
}

/// Verify and apply a Stripe webhook delivery.
pub async fn handle_webhook(
    pool: &SqlitePool,
    integrations: &Integrations,
    payload: &[u8],
    signature_header: Option<&str>,
    now: i64,
) -> Result<WebhookOutcome, ServiceError> {
    let header = signature_header
        .ok_or_else(|| ServiceError::bad_request("missing Stripe-Signature header"))?;
    integrations.verify_stripe_webhook(payload, header, now)?;

    let event = StripeEvent::parse(payload)
        .map_err(|e| ServiceError::bad_request(format!("malformed event payload: {e}")))?;

    if event.event_type != PAYMENT_SUCCEEDED {
        info!(event = %event.id, event_type = %event.event_type, "ignoring stripe event");
        return Ok(WebhookOutcome::Ignored(event.event_type));
    }

    let intent_id = event
        .object_id()
        .ok_or_else(|| ServiceError::bad_request("event has no payment intent id"))?;

    match settle_payment_intent(pool, intent_id, event.metadata("invoice_id")).await? {
        Some(number) => {
            info!(event = %event.id, payment_intent = %intent_id, invoice = %number, "invoice paid");
            Ok(WebhookOutcome::InvoicePaid(number))
        }
        None => {
            warn!(event = %event.id, payment_intent = %intent_id, "no sent invoice for payment intent");
            Ok(WebhookOutcome::AlreadySettled)
        }
    }
}
