//! Pieces shared by invoices and quotes: line item validation, totals and numbering.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;

use super::error::ServiceError;
use crate::routes::models::LineItem;

pub const MAX_TAX_RATE_BPS: i64 = 10_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct Totals {
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

/// Which numbered document a sequence belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Invoice,
    Quote,
}

impl DocumentKind {
    fn prefix(self) -> &'static str {
        match self {
            DocumentKind::Invoice => "INV",
            DocumentKind::Quote => "QTE",
        }
    }

    fn table(self) -> &'static str {
        match self {
            DocumentKind::Invoice => "invoices",
            DocumentKind::Quote => "quotes",
        }
    }
}

pub fn validate_line_items(items: &[LineItem]) -> Result<(), ServiceError> {
    if items.is_empty() {
        return Err(ServiceError::bad_request("at least one line item is required"));
    }
    for (index, item) in items.iter().enumerate() {
        if item.description.trim().is_empty() {
            return Err(ServiceError::bad_request(format!(
                "line item {} needs a description",
                index + 1
            )));
        }
        if item.quantity <= 0 {
            return Err(ServiceError::bad_request(format!(
                "line item {} quantity must be positive",
                index + 1
            )));
        }
        if item.unit_price_cents < 0 {
            return Err(ServiceError::bad_request(format!(
                "line item {} unit price cannot be negative",
                index + 1
            )));
        }
    }
    Ok(())
}

pub fn validate_tax_rate(tax_rate_bps: i64) -> Result<(), ServiceError> {
    if !(0..=MAX_TAX_RATE_BPS).contains(&tax_rate_bps) {
        return Err(ServiceError::bad_request(
            "tax_rate_bps must be between 0 and 10000",
        ));
    }
    Ok(())
}

/// Subtotal, tax rounded half up to the cent, and total.
pub fn compute_totals(items: &[LineItem], tax_rate_bps: i64) -> Result<Totals, ServiceError> {
    let overflow = || ServiceError::bad_request("line item amounts are too large");

    let subtotal_cents = items.iter().try_fold(0i64, |sum, item| {
        item.quantity
            .checked_mul(item.unit_price_cents)
            .and_then(|amount| sum.checked_add(amount))
            .ok_or_else(overflow)
    })?;

    let tax_cents = subtotal_cents
        .checked_mul(tax_rate_bps)
        .and_then(|scaled| scaled.checked_add(MAX_TAX_RATE_BPS / 2))
        .map(|scaled| scaled / MAX_TAX_RATE_BPS)
        .ok_or_else(overflow)?;

    let total_cents = subtotal_cents.checked_add(tax_cents).ok_or_else(overflow)?;

    Ok(Totals {
        subtotal_cents,
        tax_cents,
        total_cents,
    })
}

/// Parse a `YYYY-MM-DD` date from a request.
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ServiceError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ServiceError::bad_request(format!("{field} must be a YYYY-MM-DD date")))
}

pub fn optional_date(field: &str, value: Option<&str>) -> Result<Option<String>, ServiceError> {
    value
        .map(|value| parse_date(field, value).map(|date| date.to_string()))
        .transpose()
}

pub fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

pub fn items_json(items: &[LineItem]) -> Result<String, ServiceError> {
    serde_json::to_string(items)
        .map_err(|e| ServiceError::internal(format!("failed to encode line items: {e}")))
}

pub fn items_from_json(raw: &str) -> Result<Vec<LineItem>, ServiceError> {
    serde_json::from_str(raw)
        .map_err(|e| ServiceError::internal(format!("stored line items are unreadable: {e}")))
}

pub fn format_number(kind: DocumentKind, year: i32, sequence: i64) -> String {
    format!("{}-{year}-{sequence:04}", kind.prefix())
}

/// Reserve the next number for the year of `issue_date`: one past the highest ever handed out,
/// including numbers of documents that were deleted since.
pub async fn next_number<'e, E>(
    executor: E,
    kind: DocumentKind,
    issue_date: NaiveDate,
) -> Result<String, ServiceError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let year = issue_date.year();
    let prefix = format!("{}-{year}-", kind.prefix());

    let sequence: i64 = sqlx::query_scalar(&format!(
        "INSERT INTO document_sequences (prefix, last_sequence)
         VALUES (?, COALESCE(
             (SELECT MAX(CAST(SUBSTR(number, ?) AS INTEGER)) FROM {} WHERE number LIKE ?), 0) + 1)
         ON CONFLICT(prefix) DO UPDATE
             SET last_sequence = MAX(document_sequences.last_sequence + 1, excluded.last_sequence)
         RETURNING last_sequence",
        kind.table()
    ))
    .bind(&prefix)
    .bind(prefix.len() as i64 + 1)
    .bind(format!("{prefix}%"))
    .fetch_one(executor)
    .await?;

    Ok(format_number(kind, year, sequence))
}

/// Client row id for a public id the actor can access.
pub(crate) async fn client_id_for(
    pool: &SqlitePool,
    actor: &super::access::Actor,
    client_public_id: &str,
) -> Result<i64, ServiceError> {
    super::clients::load_accessible_client(pool, actor, client_public_id)
        .await
        .map(|client| client.id)
}
