use chrono::NaiveDate;
use concierge_auth::new_public_id;
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use tracing::info;
use utoipa::ToSchema;

use super::access::Actor;
use super::billing::{
    client_id_for, compute_totals, items_from_json, items_json, next_number, optional_date,
    parse_date, today, validate_line_items, validate_tax_rate, DocumentKind, Totals,
};
use super::error::ServiceError;
use super::invoices::{get_invoice, Invoice};
use super::pdf::{render_document, BusinessInfo, DocumentView};
use crate::routes::models::{BillingQuery, CreateQuoteRequest, LineItem, UpdateQuoteRequest};

/// Stored statuses plus `expired`, which is derived from `valid_until` and never written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Accepted,
    Declined,
    Expired,
}

impl QuoteStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QuoteStatus::Draft => "draft",
            QuoteStatus::Sent => "sent",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Declined => "declined",
            QuoteStatus::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(QuoteStatus::Draft),
            "sent" => Some(QuoteStatus::Sent),
            "accepted" => Some(QuoteStatus::Accepted),
            "declined" => Some(QuoteStatus::Declined),
            "expired" => Some(QuoteStatus::Expired),
            _ => None,
        }
    }

    /// A sent quote whose `valid_until` is before `on` reads as expired.
    pub fn effective(stored: QuoteStatus, valid_until: Option<&str>, on: NaiveDate) -> QuoteStatus {
        let lapsed = valid_until
            .and_then(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
            .is_some_and(|date| date < on);
        if stored == QuoteStatus::Sent && lapsed {
            QuoteStatus::Expired
        } else {
            stored
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct QuoteRow {
    pub id: i64,
    pub public_id: String,
    pub number: String,
    pub client_id: i64,
    pub client_public_id: String,
    pub client_name: String,
    pub client_email: String,
    pub client_manager_id: i64,
    pub status: String,
    pub line_items: String,
    pub tax_rate_bps: i64,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub notes: Option<String>,
    pub issue_date: String,
    pub valid_until: Option<String>,
    pub converted_invoice_id: Option<i64>,
    pub converted_invoice_public_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

const QUOTE_COLUMNS: &str = "q.id, q.public_id, q.number, q.client_id, \
    c.public_id AS client_public_id, c.full_name AS client_name, c.email AS client_email, \
    c.manager_id AS client_manager_id, q.status, q.line_items, q.tax_rate_bps, \
    q.subtotal_cents, q.tax_cents, q.total_cents, q.notes, q.issue_date, q.valid_until, \
    q.converted_invoice_id, ci.public_id AS converted_invoice_public_id, q.created_at, q.updated_at";

impl QuoteRow {
    fn stored_status(&self) -> Result<QuoteStatus, ServiceError> {
        QuoteStatus::parse(&self.status)
            .filter(|status| *status != QuoteStatus::Expired)
            .ok_or_else(|| {
                ServiceError::internal(format!("quote {} has unknown status {}", self.number, self.status))
            })
    }

    pub fn status(&self) -> Result<QuoteStatus, ServiceError> {
        Ok(QuoteStatus::effective(
            self.stored_status()?,
            self.valid_until.as_deref(),
            today(),
        ))
    }

    pub fn totals(&self) -> Totals {
        Totals {
            subtotal_cents: self.subtotal_cents,
            tax_cents: self.tax_cents,
            total_cents: self.total_cents,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Quote {
    pub id: String,
    pub number: String,
    /// Client public id.
    pub client_id: String,
    pub client_name: String,
    pub status: QuoteStatus,
    pub line_items: Vec<LineItem>,
    pub tax_rate_bps: i64,
    #[serde(flatten)]
    pub totals: Totals,
    pub notes: Option<String>,
    pub issue_date: String,
    pub valid_until: Option<String>,
    /// Public id of the invoice this quote became.
    pub converted_invoice_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<QuoteRow> for Quote {
    type Error = ServiceError;

    fn try_from(row: QuoteRow) -> Result<Self, Self::Error> {
        Ok(Quote {
            status: row.status()?,
            line_items: items_from_json(&row.line_items)?,
            totals: row.totals(),
            id: row.public_id,
            number: row.number,
            client_id: row.client_public_id,
            client_name: row.client_name,
            tax_rate_bps: row.tax_rate_bps,
            notes: row.notes,
            issue_date: row.issue_date,
            valid_until: row.valid_until,
            converted_invoice_id: row.converted_invoice_public_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Result of converting a quote: the quote as it now stands and the new invoice.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuoteConversion {
    pub quote: Quote,
    pub invoice: Invoice,
}

fn select_quote() -> String {
    format!(
        "SELECT {QUOTE_COLUMNS} FROM quotes q
         JOIN clients c ON c.id = q.client_id
         LEFT JOIN invoices ci ON ci.id = q.converted_invoice_id"
    )
}

async fn load_accessible_quote(
    pool: &SqlitePool,
    actor: &Actor,
    public_id: &str,
) -> Result<QuoteRow, ServiceError> {
    let quote = sqlx::query_as::<_, QuoteRow>(&format!("{} WHERE q.public_id = ?", select_quote()))
        .bind(public_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("Quote not found"))?;

    if !actor.can_manage(Some(quote.client_manager_id)) {
        return Err(ServiceError::forbidden("You do not manage this quote's client"));
    }
    Ok(quote)
}

fn ensure_valid_after_issue(issue_date: &str, valid_until: Option<&str>) -> Result<(), ServiceError> {
    match valid_until {
        Some(until) if until < issue_date => Err(ServiceError::bad_request(
            "valid_until cannot be before issue_date",
        )),
        _ => Ok(()),
    }
}

pub async fn list_quotes(
    pool: &SqlitePool,
    actor: &Actor,
    query: &BillingQuery,
) -> Result<Vec<Quote>, ServiceError> {
    let wanted = query
        .status
        .as_deref()
        .map(|status| {
            QuoteStatus::parse(status)
                .ok_or_else(|| ServiceError::bad_request(format!("unknown quote status {status}")))
        })
        .transpose()?;
    let scope = if actor.is_admin() {
        None
    } else {
        Some(actor.manager_id())
    };

    let rows = sqlx::query_as::<_, QuoteRow>(&format!(
        "{} WHERE (?1 IS NULL OR c.manager_id = ?1)
           AND (?2 IS NULL OR c.public_id = ?2)
         ORDER BY q.issue_date DESC, q.id DESC",
        select_quote()
    ))
    .bind(scope)
    .bind(query.client_id.as_deref())
    .fetch_all(pool)
    .await?;

    // Expiry is derived, so the status filter runs after conversion.
    let quotes = rows
        .into_iter()
        .map(Quote::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(match wanted {
        Some(status) => quotes.into_iter().filter(|quote| quote.status == status).collect(),
        None => quotes,
    })
}

pub async fn get_quote(
    pool: &SqlitePool,
    actor: &Actor,
    public_id: &str,
) -> Result<Quote, ServiceError> {
    load_accessible_quote(pool, actor, public_id).await?.try_into()
}

pub async fn create_quote(
    pool: &SqlitePool,
    actor: &Actor,
    req: CreateQuoteRequest,
) -> Result<Quote, ServiceError> {
    validate_line_items(&req.line_items)?;
    validate_tax_rate(req.tax_rate_bps)?;
    let client_id = client_id_for(pool, actor, &req.client_id).await?;
    let issue_date = match req.issue_date.as_deref() {
        Some(value) => parse_date("issue_date", value)?,
        None => today(),
    };
    let valid_until = optional_date("valid_until", req.valid_until.as_deref())?;
    let issue = issue_date.to_string();
    ensure_valid_after_issue(&issue, valid_until.as_deref())?;

    let totals = compute_totals(&req.line_items, req.tax_rate_bps)?;
    let public_id = new_public_id();
    let now = chrono::Utc::now().to_rfc3339();

    let mut tx = pool.begin().await?;
    let number = next_number(&mut *tx, DocumentKind::Quote, issue_date).await?;

    sqlx::query(
        r#"
        INSERT INTO quotes (public_id, number, client_id, manager_id, status, line_items, tax_rate_bps,
                            subtotal_cents, tax_cents, total_cents, notes, issue_date, valid_until,
                            created_at, updated_at)
        VALUES (?, ?, ?, ?, 'draft', ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&public_id)
    .bind(&number)
    .bind(client_id)
    .bind(actor.manager_id())
    .bind(items_json(&req.line_items)?)
    .bind(req.tax_rate_bps)
    .bind(totals.subtotal_cents)
    .bind(totals.tax_cents)
    .bind(totals.total_cents)
    .bind(&req.notes)
    .bind(&issue)
    .bind(&valid_until)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await
    .map_err(ServiceError::on_constraint("Quote number already taken, retry"))?;

    tx.commit().await?;

    info!(quote = %public_id, number = %number, "created quote");
    get_quote(pool, actor, &public_id).await
}

fn require_draft(quote: &QuoteRow) -> Result<(), ServiceError> {
    if quote.stored_status()? != QuoteStatus::Draft {
        return Err(ServiceError::conflict(format!(
            "Quote {} is {} and can no longer be changed",
            quote.number, quote.status
        )));
    }
    Ok(())
}

pub async fn update_quote(
    pool: &SqlitePool,
    actor: &Actor,
    public_id: &str,
    req: UpdateQuoteRequest,
) -> Result<Quote, ServiceError> {
    let existing = load_accessible_quote(pool, actor, public_id).await?;
    require_draft(&existing)?;

    let line_items = match req.line_items {
        Some(items) => {
            validate_line_items(&items)?;
            items
        }
        None => items_from_json(&existing.line_items)?,
    };
    let tax_rate_bps = req.tax_rate_bps.unwrap_or(existing.tax_rate_bps);
    validate_tax_rate(tax_rate_bps)?;
    let issue_date = match req.issue_date.as_deref() {
        Some(value) => parse_date("issue_date", value)?.to_string(),
        None => existing.issue_date.clone(),
    };
    let valid_until = match req.valid_until {
        Some(value) => optional_date("valid_until", value.as_deref())?,
        None => existing.valid_until.clone(),
    };
    ensure_valid_after_issue(&issue_date, valid_until.as_deref())?;
    let notes = req.notes.unwrap_or(existing.notes.clone());
    let totals = compute_totals(&line_items, tax_rate_bps)?;

    sqlx::query(
        r#"
        UPDATE quotes
        SET line_items = ?, tax_rate_bps = ?, subtotal_cents = ?, tax_cents = ?, total_cents = ?,
            notes = ?, issue_date = ?, valid_until = ?, updated_at = ?
        WHERE id = ? AND status = 'draft'
        "#,
    )
    .bind(items_json(&line_items)?)
    .bind(tax_rate_bps)
    .bind(totals.subtotal_cents)
    .bind(totals.tax_cents)
    .bind(totals.total_cents)
    .bind(&notes)
    .bind(&issue_date)
    .bind(&valid_until)
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(existing.id)
    .execute(pool)
    .await?;

    get_quote(pool, actor, public_id).await
}

pub async fn delete_quote(
    pool: &SqlitePool,
    actor: &Actor,
    public_id: &str,
) -> Result<(), ServiceError> {
    let existing = load_accessible_quote(pool, actor, public_id).await?;
    require_draft(&existing)?;

    sqlx::query("DELETE FROM quotes WHERE id = ? AND status = 'draft'")
        .bind(existing.id)
        .execute(pool)
        .await?;

    info!(quote = %public_id, number = %existing.number, "deleted quote");
    Ok(())
}

/// Move a quote from one of `from` (its effective status) to a stored status.
async fn transition(
    pool: &SqlitePool,
    actor: &Actor,
    public_id: &str,
    from: &[QuoteStatus],
    to: QuoteStatus,
) -> Result<Quote, ServiceError> {
    let existing = load_accessible_quote(pool, actor, public_id).await?;
    let current = existing.status()?;
    if !from.contains(&current) {
        return Err(ServiceError::conflict(format!(
            "Quote {} is {} and cannot become {}",
            existing.number,
            current.as_str(),
            to.as_str()
        )));
    }

    let updated = sqlx::query("UPDATE quotes SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
        .bind(to.as_str())
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(existing.id)
        .bind(&existing.status)
        .execute(pool)
        .await?;

    if updated.rows_affected() == 0 {
        return Err(ServiceError::conflict("Quote changed concurrently, reload and retry"));
    }

    info!(quote = %public_id, from = current.as_str(), to = to.as_str(), "quote status changed");
    get_quote(pool, actor, public_id).await
}

pub async fn send_quote(
    pool: &SqlitePool,
    actor: &Actor,
    public_id: &str,
) -> Result<Quote, ServiceError> {
    transition(pool, actor, public_id, &[QuoteStatus::Draft], QuoteStatus::Sent).await
}

/// Accepting needs a sent quote that has not lapsed.
pub async fn accept_quote(
    pool: &SqlitePool,
    actor: &Actor,
    public_id: &str,
) -> Result<Quote, ServiceError> {
    transition(pool, actor, public_id, &[QuoteStatus::Sent], QuoteStatus::Accepted).await
}

pub async fn decline_quote(
    pool: &SqlitePool,
    actor: &Actor,
    public_id: &str,
) -> Result<Quote, ServiceError> {
    transition(
        pool,
        actor,
        public_id,
        &[QuoteStatus::Sent, QuoteStatus::Expired],
        QuoteStatus::Declined,
    )
    .await
}

/// Turn an accepted quote into a draft invoice dated today.
pub async fn convert_quote(
    pool: &SqlitePool,
    actor: &Actor,
    public_id: &str,
) -> Result<QuoteConversion, ServiceError> {
    let existing = load_accessible_quote(pool, actor, public_id).await?;
    if existing.converted_invoice_id.is_some() {
        return Err(ServiceError::conflict(format!(
            "Quote {} was already converted",
            existing.number
        )));
    }
    if existing.stored_status()? != QuoteStatus::Accepted {
        return Err(ServiceError::conflict(format!(
            "Quote {} must be accepted before converting",
            existing.number
        )));
    }

    let issue_date = today();
    let invoice_public_id = new_public_id();
    let now = chrono::Utc::now().to_rfc3339();

    let mut tx = pool.begin().await?;
    let number = next_number(&mut *tx, DocumentKind::Invoice, issue_date).await?;

    let invoice_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO invoices (public_id, number, client_id, manager_id, status, line_items, tax_rate_bps,
                              subtotal_cents, tax_cents, total_cents, notes, issue_date,
                              created_at, updated_at)
        VALUES (?, ?, ?, ?, 'draft', ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&invoice_public_id)
    .bind(&number)
    .bind(existing.client_id)
    .bind(actor.manager_id())
    .bind(&existing.line_items)
    .bind(existing.tax_rate_bps)
    .bind(existing.subtotal_cents)
    .bind(existing.tax_cents)
    .bind(existing.total_cents)
    .bind(&existing.notes)
    .bind(issue_date.to_string())
    .bind(&now)
    .bind(&now)
    .fetch_one(&mut *tx)
    .await
    .map_err(ServiceError::on_constraint("Invoice number already taken, retry"))?;

    let claimed = sqlx::query(
        "UPDATE quotes SET converted_invoice_id = ?, updated_at = ?
         WHERE id = ? AND converted_invoice_id IS NULL",
    )
    .bind(invoice_id)
    .bind(&now)
    .bind(existing.id)
    .execute(&mut *tx)
    .await?;

    if claimed.rows_affected() == 0 {
        return Err(ServiceError::conflict(format!(
            "Quote {} was already converted",
            existing.number
        )));
    }
    tx.commit().await?;

    info!(quote = %public_id, invoice = %invoice_public_id, number = %number, "converted quote");
    Ok(QuoteConversion {
        quote: get_quote(pool, actor, public_id).await?,
        invoice: get_invoice(pool, actor, &invoice_public_id).await?,
    })
}

fn document_view(row: &QuoteRow) -> Result<DocumentView, ServiceError> {
    Ok(DocumentView {
        title: "QUOTE",
        number: row.number.clone(),
        status: row.status()?.as_str().to_uppercase(),
        client_name: row.client_name.clone(),
        client_email: row.client_email.clone(),
        issue_date: row.issue_date.clone(),
        secondary_date: row.valid_until.clone().map(|until| ("Valid until", until)),
        line_items: items_from_json(&row.line_items)?,
        tax_rate_bps: row.tax_rate_bps,
        totals: row.totals(),
        notes: row.notes.clone(),
    })
}

pub async fn quote_pdf(
    pool: &SqlitePool,
    actor: &Actor,
    business: &BusinessInfo,
    public_id: &str,
) -> Result<(String, Vec<u8>), ServiceError> {
    let row = load_accessible_quote(pool, actor, public_id).await?;
    let bytes = render_document(business, &document_view(&row)?)?;
    Ok((row.number, bytes))
}
