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
use super::pdf::{render_document, BusinessInfo, DocumentView};
use crate::routes::models::{BillingQuery, CreateInvoiceRequest, LineItem, UpdateInvoiceRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Void,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Void => "void",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(InvoiceStatus::Draft),
            "sent" => Some(InvoiceStatus::Sent),
            "paid" => Some(InvoiceStatus::Paid),
            "void" => Some(InvoiceStatus::Void),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct InvoiceRow {
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
    pub due_date: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
    pub paid_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

const INVOICE_COLUMNS: &str = "i.id, i.public_id, i.number, i.client_id, \
    c.public_id AS client_public_id, c.full_name AS client_name, c.email AS client_email, \
    c.manager_id AS client_manager_id, i.status, i.line_items, i.tax_rate_bps, \
    i.subtotal_cents, i.tax_cents, i.total_cents, i.notes, i.issue_date, i.due_date, \
    i.stripe_payment_intent_id, i.paid_at, i.created_at, i.updated_at";

impl InvoiceRow {
    pub fn status(&self) -> Result<InvoiceStatus, ServiceError> {
        InvoiceStatus::parse(&self.status).ok_or_else(|| {
            ServiceError::internal(format!("invoice {} has unknown status {}", self.number, self.status))
        })
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
pub struct Invoice {
    pub id: String,
    pub number: String,
    /// Client public id.
    pub client_id: String,
    pub client_name: String,
    pub status: InvoiceStatus,
    pub line_items: Vec<LineItem>,
    pub tax_rate_bps: i64,
    #[serde(flatten)]
    pub totals: Totals,
    pub notes: Option<String>,
    pub issue_date: String,
    pub due_date: Option<String>,
    /// Sent and past its due date.
    pub overdue: bool,
    pub paid_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = ServiceError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        let status = row.status()?;
        Ok(Invoice {
            overdue: status == InvoiceStatus::Sent && is_overdue(row.due_date.as_deref(), today()),
            status,
            line_items: items_from_json(&row.line_items)?,
            totals: row.totals(),
            id: row.public_id,
            number: row.number,
            client_id: row.client_public_id,
            client_name: row.client_name,
            tax_rate_bps: row.tax_rate_bps,
            notes: row.notes,
            issue_date: row.issue_date,
            due_date: row.due_date,
            paid_at: row.paid_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn select_invoice() -> String {
    format!("SELECT {INVOICE_COLUMNS} FROM invoices i JOIN clients c ON c.id = i.client_id")
}

pub(crate) async fn find_invoice(
    pool: &SqlitePool,
    public_id: &str,
) -> Result<InvoiceRow, ServiceError> {
    sqlx::query_as::<_, InvoiceRow>(&format!("{} WHERE i.public_id = ?", select_invoice()))
        .bind(public_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("Invoice not found"))
}

async fn load_accessible_invoice(
    pool: &SqlitePool,
    actor: &Actor,
    public_id: &str,
) -> Result<InvoiceRow, ServiceError> {
    let invoice = find_invoice(pool, public_id).await?;
    if !actor.can_manage(Some(invoice.client_manager_id)) {
        return Err(ServiceError::forbidden("You do not manage this invoice's client"));
    }
    Ok(invoice)
}

fn ensure_due_after_issue(issue_date: &str, due_date: Option<&str>) -> Result<(), ServiceError> {
    if let Some(due) = due_date {
        if due < issue_date {
            return Err(ServiceError::bad_request("due_date cannot be before issue_date"));
        }
    }
    Ok(())
}

pub async fn list_invoices(
    pool: &SqlitePool,
    actor: &Actor,
    query: &BillingQuery,
) -> Result<Vec<Invoice>, ServiceError> {
    let status = query
        .status
        .as_deref()
        .map(|status| {
            InvoiceStatus::parse(status)
                .ok_or_else(|| ServiceError::bad_request(format!("unknown invoice status {status}")))
        })
        .transpose()?;
    let scope = if actor.is_admin() {
        None
    } else {
        Some(actor.manager_id())
    };

    let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
        "{} WHERE (?1 IS NULL OR c.manager_id = ?1)
           AND (?2 IS NULL OR c.public_id = ?2)
           AND (?3 IS NULL OR i.status = ?3)
         ORDER BY i.issue_date DESC, i.id DESC",
        select_invoice()
    ))
    .bind(scope)
    .bind(query.client_id.as_deref())
    .bind(status.map(InvoiceStatus::as_str))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Invoice::try_from).collect()
}

pub async fn get_invoice(
    pool: &SqlitePool,
    actor: &Actor,
    public_id: &str,
) -> Result<Invoice, ServiceError> {
    load_accessible_invoice(pool, actor, public_id).await?.try_into()
}

pub async fn create_invoice(
    pool: &SqlitePool,
    actor: &Actor,
    req: CreateInvoiceRequest,
) -> Result<Invoice, ServiceError> {
    validate_line_items(&req.line_items)?;
    validate_tax_rate(req.tax_rate_bps)?;
    let client_id = client_id_for(pool, actor, &req.client_id).await?;
    let issue_date = match req.issue_date.as_deref() {
        Some(value) => parse_date("issue_date", value)?,
        None => today(),
    };
    let due_date = optional_date("due_date", req.due_date.as_deref())?;
    let issue = issue_date.to_string();
    ensure_due_after_issue(&issue, due_date.as_deref())?;

    let totals = compute_totals(&req.line_items, req.tax_rate_bps)?;
    let items = items_json(&req.line_items)?;
    let public_id = new_public_id();
    let now = chrono::Utc::now().to_rfc3339();

    let mut tx = pool.begin().await?;
    let number = next_number(&mut *tx, DocumentKind::Invoice, issue_date).await?;

    sqlx::query(
        r#"
        INSERT INTO invoices (public_id, number, client_id, manager_id, status, line_items, tax_rate_bps,
                              subtotal_cents, tax_cents, total_cents, notes, issue_date, due_date,
                              created_at, updated_at)
        VALUES (?, ?, ?, ?, 'draft', ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&public_id)
    .bind(&number)
    .bind(client_id)
    .bind(actor.manager_id())
    .bind(&items)
    .bind(req.tax_rate_bps)
    .bind(totals.subtotal_cents)
    .bind(totals.tax_cents)
    .bind(totals.total_cents)
    .bind(&req.notes)
    .bind(&issue)
    .bind(&due_date)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await
    .map_err(ServiceError::on_constraint("Invoice number already taken, retry"))?;

    tx.commit().await?;

    info!(invoice = %public_id, number = %number, total_cents = totals.total_cents, "created invoice");
    get_invoice(pool, actor, &public_id).await
}

fn require_draft(invoice: &InvoiceRow) -> Result<(), ServiceError> {
    if invoice.status()? != InvoiceStatus::Draft {
        return Err(ServiceError::conflict(format!(
            "Invoice {} is {} and can no longer be changed",
            invoice.number, invoice.status
        )));
    }
    Ok(())
}

pub async fn update_invoice(
    pool: &SqlitePool,
    actor: &Actor,
    public_id: &str,
    req: UpdateInvoiceRequest,
) -> Result<Invoice, ServiceError> {
    let existing = load_accessible_invoice(pool, actor, public_id).await?;
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
    let due_date = match req.due_date {
        Some(value) => optional_date("due_date", value.as_deref())?,
        None => existing.due_date.clone(),
    };
    ensure_due_after_issue(&issue_date, due_date.as_deref())?;
    let notes = req.notes.unwrap_or(existing.notes.clone());

    let totals = compute_totals(&line_items, tax_rate_bps)?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE invoices
        SET line_items = ?, tax_rate_bps = ?, subtotal_cents = ?, tax_cents = ?, total_cents = ?,
            notes = ?, issue_date = ?, due_date = ?, updated_at = ?
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
    .bind(&due_date)
    .bind(&now)
    .bind(existing.id)
    .execute(pool)
    .await?;

    get_invoice(pool, actor, public_id).await
}

pub async fn delete_invoice(
    pool: &SqlitePool,
    actor: &Actor,
    public_id: &str,
) -> Result<(), ServiceError> {
    let existing = load_accessible_invoice(pool, actor, public_id).await?;
    require_draft(&existing)?;

    sqlx::query("DELETE FROM invoices WHERE id = ? AND status = 'draft'")
        .bind(existing.id)
        .execute(pool)
        .await
        .map_err(ServiceError::on_constraint(
            "Invoice is referenced by a converted quote",
        ))?;

    info!(invoice = %public_id, number = %existing.number, "deleted invoice");
    Ok(())
}

/// Move an invoice to `to` when its current status is one of `from`.
async fn transition(
    pool: &SqlitePool,
    actor: &Actor,
    public_id: &str,
    from: &[InvoiceStatus],
    to: InvoiceStatus,
) -> Result<Invoice, ServiceError> {
    let existing = load_accessible_invoice(pool, actor, public_id).await?;
    let current = existing.status()?;
    if !from.contains(&current) {
        return Err(ServiceError::conflict(format!(
            "Invoice {} is {} and cannot become {}",
            existing.number,
            current.as_str(),
            to.as_str()
        )));
    }

    let now = chrono::Utc::now().to_rfc3339();
    let paid_at = (to == InvoiceStatus::Paid).then(|| now.clone());
    let updated = sqlx::query(
        "UPDATE invoices SET status = ?, paid_at = COALESCE(?, paid_at), updated_at = ?
         WHERE id = ? AND status = ?",
    )
    .bind(to.as_str())
    .bind(&paid_at)
    .bind(&now)
    .bind(existing.id)
    .bind(current.as_str())
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(ServiceError::conflict("Invoice changed concurrently, reload and retry"));
    }

    info!(invoice = %public_id, from = current.as_str(), to = to.as_str(), "invoice status changed");
    get_invoice(pool, actor, public_id).await
}

pub async fn send_invoice(
    pool: &SqlitePool,
    actor: &Actor,
    public_id: &str,
) -> Result<Invoice, ServiceError> {
    transition(pool, actor, public_id, &[InvoiceStatus::Draft], InvoiceStatus::Sent).await
}

pub async fn void_invoice(
    pool: &SqlitePool,
    actor: &Actor,
    public_id: &str,
) -> Result<Invoice, ServiceError> {
    transition(
        pool,
        actor,
        public_id,
        &[InvoiceStatus::Draft, InvoiceStatus::Sent],
        InvoiceStatus::Void,
    )
    .await
}

/// Record a payment collected outside Stripe.
pub async fn mark_invoice_paid(
    pool: &SqlitePool,
    actor: &Actor,
    public_id: &str,
) -> Result<Invoice, ServiceError> {
    transition(pool, actor, public_id, &[InvoiceStatus::Sent], InvoiceStatus::Paid).await
}

/// Attach a freshly created payment intent to a sent invoice.
pub(crate) async fn attach_payment_intent(
    pool: &SqlitePool,
    invoice_id: i64,
    payment_intent_id: &str,
) -> Result<(), ServiceError> {
    sqlx::query(
        "UPDATE invoices SET stripe_payment_intent_id = ?, updated_at = ? WHERE id = ?",
    )
    .bind(payment_intent_id)
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(invoice_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Settle the sent invoice a succeeded payment intent belongs to. Returns the invoice number
/// when one was marked paid; redelivered events find nothing left to update.
pub(crate) async fn settle_payment_intent(
    pool: &SqlitePool,
    payment_intent_id: &str,
    invoice_public_id: Option<&str>,
) -> Result<Option<String>, ServiceError> {
    let now = chrono::Utc::now().to_rfc3339();
    let number = sqlx::query_scalar::<_, String>(
        r#"
        UPDATE invoices
        SET status = 'paid', paid_at = ?1, updated_at = ?1,
            stripe_payment_intent_id = COALESCE(stripe_payment_intent_id, ?2)
        WHERE status = 'sent'
          AND (stripe_payment_intent_id = ?2 OR (?3 IS NOT NULL AND public_id = ?3))
        RETURNING number
        "#,
    )
    .bind(&now)
    .bind(payment_intent_id)
    .bind(invoice_public_id)
    .fetch_optional(pool)
    .await?;

    Ok(number)
}

fn document_view(row: &InvoiceRow) -> Result<DocumentView, ServiceError> {
    Ok(DocumentView {
        title: "INVOICE",
        number: row.number.clone(),
        status: row.status()?.as_str().to_uppercase(),
        client_name: row.client_name.clone(),
        client_email: row.client_email.clone(),
        issue_date: row.issue_date.clone(),
        secondary_date: row.due_date.clone().map(|due| ("Due", due)),
        line_items: items_from_json(&row.line_items)?,
        tax_rate_bps: row.tax_rate_bps,
        totals: row.totals(),
        notes: row.notes.clone(),
    })
}

/// Render the invoice, returning its number for the download filename.
pub async fn invoice_pdf(
    pool: &SqlitePool,
    actor: &Actor,
    business: &BusinessInfo,
    public_id: &str,
) -> Result<(String, Vec<u8>), ServiceError> {
    let row = load_accessible_invoice(pool, actor, public_id).await?;
    let bytes = render_document(business, &document_view(&row)?)?;
    Ok((row.number, bytes))
}

/// Whether a stored due date has passed.
pub fn is_overdue(due_date: Option<&str>, on: NaiveDate) -> bool {
    due_date
        .and_then(|due| NaiveDate::parse_from_str(due, "%Y-%m-%d").ok())
        .is_some_and(|due| due < on)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_utils::{create_test_db, TestFixtures};

    fn item(description: &str, quantity: i64, unit_price_cents: i64) -> LineItem {
        LineItem {
            description: description.to_string(),
            quantity,
            unit_price_cents,
        }
    }

    fn request(client_id: &str) -> CreateInvoiceRequest {
        CreateInvoiceRequest {
            client_id: client_id.to_string(),
            line_items: vec![item("Placement fee", 1, 150_000), item("Photos", 2, 12_500)],
            tax_rate_bps: 700,
            notes: Some("Thanks".into()),
            issue_date: Some("2024-04-02".into()),
            due_date: Some("2024-04-30".into()),
        }
    }

    #[tokio::test]
    async fn create_numbers_and_totals() {
        let (pool, _dir) = create_test_db().await;
        let fixtures = TestFixtures::new(&pool);
        let manager = fixtures.manager("ana@example.com").await;
        let client = fixtures.client(&manager, "Lena Park", "lena-park").await;
        let client_public = fixtures.public_id("clients", client).await;

        let first = create_invoice(&pool, &manager, request(&client_public)).await.unwrap();
        assert_eq!(first.number, "INV-2024-0001");
        assert_eq!(first.status, InvoiceStatus::Draft);
        assert_eq!(first.totals.subtotal_cents, 175_000);
        assert_eq!(first.totals.tax_cents, 12_250);
        assert_eq!(first.totals.total_cents, 187_250);
        assert_eq!(first.client_name, "Lena Park");

        let second = create_invoice(&pool, &manager, request(&client_public)).await.unwrap();
        assert_eq!(second.number, "INV-2024-0002");

        // Deleted drafts keep their numbers, including the most recent one.
        delete_invoice(&pool, &manager, &first.id).await.unwrap();
        let third = create_invoice(&pool, &manager, request(&client_public)).await.unwrap();
        assert_eq!(third.number, "INV-2024-0003");

        delete_invoice(&pool, &manager, &third.id).await.unwrap();
        let fourth = create_invoice(&pool, &manager, request(&client_public)).await.unwrap();
        assert_eq!(fourth.number, "INV-2024-0004");
    }

    #[tokio::test]
    async fn create_validates_input() {
        let (pool, _dir) = create_test_db().await;
        let fixtures = TestFixtures::new(&pool);
        let manager = fixtures.manager("ana@example.com").await;
        let client = fixtures.client(&manager, "Lena Park", "lena-park").await;
        let client_public = fixtures.public_id("clients", client).await;

        let mut bad_due = request(&client_public);
        bad_due.due_date = Some("2024-03-01".into());
        assert!(matches!(
            create_invoice(&pool, &manager, bad_due).await.unwrap_err(),
            ServiceError::BadRequest(_)
        ));

        let mut no_items = request(&client_public);
        no_items.line_items.clear();
        assert!(matches!(
            create_invoice(&pool, &manager, no_items).await.unwrap_err(),
            ServiceError::BadRequest(_)
        ));

        let mut bad_tax = request(&client_public);
        bad_tax.tax_rate_bps = 20_000;
        assert!(matches!(
            create_invoice(&pool, &manager, bad_tax).await.unwrap_err(),
            ServiceError::BadRequest(_)
        ));
    }

    #[tokio::test]
    async fn other_managers_cannot_see_or_bill_a_client() {
        let (pool, _dir) = create_test_db().await;
        let fixtures = TestFixtures::new(&pool);
        let owner = fixtures.manager("ana@example.com").await;
        let other = fixtures.manager("ben@example.com").await;
        let admin = fixtures.admin("root@example.com").await;
        let client = fixtures.client(&owner, "Lena Park", "lena-park").await;
        let client_public = fixtures.public_id("clients", client).await;

        let invoice = create_invoice(&pool, &owner, request(&client_public)).await.unwrap();

        assert!(matches!(
            create_invoice(&pool, &other, request(&client_public)).await.unwrap_err(),
            ServiceError::Forbidden(_)
        ));
        assert!(matches!(
            get_invoice(&pool, &other, &invoice.id).await.unwrap_err(),
            ServiceError::Forbidden(_)
        ));
        assert!(list_invoices(&pool, &other, &BillingQuery::default()).await.unwrap().is_empty());
        assert_eq!(list_invoices(&pool, &admin, &BillingQuery::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn status_lifecycle() {
        let (pool, _dir) = create_test_db().await;
        let fixtures = TestFixtures::new(&pool);
        let manager = fixtures.manager("ana@example.com").await;
        let client = fixtures.client(&manager, "Lena Park", "lena-park").await;
        let client_public = fixtures.public_id("clients", client).await;
        let invoice = create_invoice(&pool, &manager, request(&client_public)).await.unwrap();

        // Only sent invoices can be marked paid.
        assert!(matches!(
            mark_invoice_paid(&pool, &manager, &invoice.id).await.unwrap_err(),
            ServiceError::Conflict(_)
        ));

        let sent = send_invoice(&pool, &manager, &invoice.id).await.unwrap();
        assert_eq!(sent.status, InvoiceStatus::Sent);

        let edit = update_invoice(
            &pool,
            &manager,
            &invoice.id,
            UpdateInvoiceRequest {
                tax_rate_bps: Some(0),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(edit.unwrap_err(), ServiceError::Conflict(_)));
        assert!(matches!(
            delete_invoice(&pool, &manager, &invoice.id).await.unwrap_err(),
            ServiceError::Conflict(_)
        ));

        let paid = mark_invoice_paid(&pool, &manager, &invoice.id).await.unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert!(paid.paid_at.is_some());

        assert!(matches!(
            void_invoice(&pool, &manager, &invoice.id).await.unwrap_err(),
            ServiceError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn void_from_draft_or_sent() {
        let (pool, _dir) = create_test_db().await;
        let fixtures = TestFixtures::new(&pool);
        let manager = fixtures.manager("ana@example.com").await;
        let client = fixtures.client(&manager, "Lena Park", "lena-park").await;
        let client_public = fixtures.public_id("clients", client).await;

        let draft = create_invoice(&pool, &manager, request(&client_public)).await.unwrap();
        let voided = void_invoice(&pool, &manager, &draft.id).await.unwrap();
        assert_eq!(voided.status, InvoiceStatus::Void);
        assert!(voided.paid_at.is_none());

        let sent = create_invoice(&pool, &manager, request(&client_public)).await.unwrap();
        send_invoice(&pool, &manager, &sent.id).await.unwrap();
        assert_eq!(
            void_invoice(&pool, &manager, &sent.id).await.unwrap().status,
            InvoiceStatus::Void
        );
    }

    #[tokio::test]
    async fn update_recomputes_totals_and_clears_due_date() {
        let (pool, _dir) = create_test_db().await;
        let fixtures = TestFixtures::new(&pool);
        let manager = fixtures.manager("ana@example.com").await;
        let client = fixtures.client(&manager, "Lena Park", "lena-park").await;
        let client_public = fixtures.public_id("clients", client).await;
        let invoice = create_invoice(&pool, &manager, request(&client_public)).await.unwrap();

        let updated = update_invoice(
            &pool,
            &manager,
            &invoice.id,
            UpdateInvoiceRequest {
                line_items: Some(vec![item("Consultation", 3, 10_000)]),
                tax_rate_bps: Some(1_000),
                due_date: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.totals.subtotal_cents, 30_000);
        assert_eq!(updated.totals.tax_cents, 3_000);
        assert_eq!(updated.totals.total_cents, 33_000);
        assert!(updated.due_date.is_none());
        assert_eq!(updated.notes.as_deref(), Some("Thanks"));
    }

    #[tokio::test]
    async fn list_filters_by_status_and_client() {
        let (pool, _dir) = create_test_db().await;
        let fixtures = TestFixtures::new(&pool);
        let manager = fixtures.manager("ana@example.com").await;
        let lena = fixtures.client(&manager, "Lena Park", "lena-park").await;
        let omar = fixtures.client(&manager, "Omar Diaz", "omar-diaz").await;
        let lena_public = fixtures.public_id("clients", lena).await;
        let omar_public = fixtures.public_id("clients", omar).await;

        let first = create_invoice(&pool, &manager, request(&lena_public)).await.unwrap();
        create_invoice(&pool, &manager, request(&omar_public)).await.unwrap();
        send_invoice(&pool, &manager, &first.id).await.unwrap();

        let sent = list_invoices(
            &pool,
            &manager,
            &BillingQuery {
                client_id: None,
                status: Some("sent".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, first.id);

        let omar_only = list_invoices(
            &pool,
            &manager,
            &BillingQuery {
                client_id: Some(omar_public),
                status: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(omar_only.len(), 1);
        assert_eq!(omar_only[0].client_name, "Omar Diaz");

        let unknown = list_invoices(
            &pool,
            &manager,
            &BillingQuery {
                client_id: None,
                status: Some("overdue".into()),
            },
        )
        .await;
        assert!(matches!(unknown.unwrap_err(), ServiceError::BadRequest(_)));
    }

    #[tokio::test]
    async fn settling_a_payment_intent_is_idempotent() {
        let (pool, _dir) = create_test_db().await;
        let fixtures = TestFixtures::new(&pool);
        let manager = fixtures.manager("ana@example.com").await;
        let client = fixtures.client(&manager, "Lena Park", "lena-park").await;
        let client_public = fixtures.public_id("clients", client).await;
        let invoice = create_invoice(&pool, &manager, request(&client_public)).await.unwrap();
        send_invoice(&pool, &manager, &invoice.id).await.unwrap();

        let row = find_invoice(&pool, &invoice.id).await.unwrap();
        attach_payment_intent(&pool, row.id, "pi_123").await.unwrap();

        assert_eq!(
            settle_payment_intent(&pool, "pi_123", None).await.unwrap().as_deref(),
            Some("INV-2024-0001")
        );
        assert!(settle_payment_intent(&pool, "pi_123", None).await.unwrap().is_none());

        let paid = get_invoice(&pool, &manager, &invoice.id).await.unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
    }

    #[tokio::test]
    async fn pdf_uses_invoice_number() {
        let (pool, _dir) = create_test_db().await;
        let fixtures = TestFixtures::new(&pool);
        let manager = fixtures.manager("ana@example.com").await;
        let client = fixtures.client(&manager, "Lena Park", "lena-park").await;
        let client_public = fixtures.public_id("clients", client).await;
        let invoice = create_invoice(&pool, &manager, request(&client_public)).await.unwrap();

        let business = BusinessInfo {
            name: "Sunrise Concierge".into(),
            email: None,
            address: None,
        };
        let (number, bytes) = invoice_pdf(&pool, &manager, &business, &invoice.id).await.unwrap();
        assert_eq!(number, "INV-2024-0001");
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn overdue_compares_dates() {
        let on = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert!(is_overdue(Some("2024-04-30"), on));
        assert!(!is_overdue(Some("2024-05-01"), on));
        assert!(!is_overdue(None, on));
        assert!(!is_overdue(Some("garbage"), on));
    }
}
