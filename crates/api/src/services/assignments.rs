use std::collections::HashSet;

use sqlx::SqlitePool;
use tracing::info;

use super::access::Actor;
use super::clients::load_accessible_client;
use super::error::ServiceError;
use super::pricing::{resolve, ClientPricing};
use crate::routes::models::{
    AssignPropertyRequest, Assignment, AssignmentRow, Property, ReorderAssignmentsRequest,
    UpdateAssignmentRequest, ASSIGNMENT_COLUMNS, PROPERTY_COLUMNS,
};

impl From<AssignmentRow> for Assignment {
    fn from(row: AssignmentRow) -> Self {
        let overrides = row.overrides();
        let visibility = resolve(row.property.visibility(), overrides);
        let client_pricing = ClientPricing::from_property(&row.property, visibility);

        Self {
            property: Property::from(row.property),
            position: row.position,
            overrides,
            visibility,
            client_pricing,
            notes: row.assignment_notes,
            assigned_at: row.assigned_at,
        }
    }
}

fn select_assignments() -> String {
    format!(
        "SELECT {PROPERTY_COLUMNS}, {ASSIGNMENT_COLUMNS} \
         FROM client_property_assignments cpa \
         JOIN properties p ON p.id = cpa.property_id \
         LEFT JOIN listing_agents a ON a.id = p.listing_agent_id"
    )
}

async fn fetch_assignment(
    pool: &SqlitePool,
    client_id: i64,
    property_public_id: &str,
) -> Result<AssignmentRow, ServiceError> {
    sqlx::query_as::<_, AssignmentRow>(&format!(
        "{} WHERE cpa.client_id = ? AND p.public_id = ?",
        select_assignments()
    ))
    .bind(client_id)
    .bind(property_public_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ServiceError::not_found("Property is not assigned to this client"))
}

pub async fn list_assignments(
    pool: &SqlitePool,
    actor: &Actor,
    client_public_id: &str,
) -> Result<Vec<AssignmentRow>, ServiceError> {
    let client = load_accessible_client(pool, actor, client_public_id).await?;

    let rows = sqlx::query_as::<_, AssignmentRow>(&format!(
        "{} WHERE cpa.client_id = ? ORDER BY cpa.position ASC, cpa.id ASC",
        select_assignments()
    ))
    .bind(client.id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Append a property to the end of a client's portfolio.
pub async fn assign_property(
    pool: &SqlitePool,
    actor: &Actor,
    client_public_id: &str,
    req: AssignPropertyRequest,
) -> Result<AssignmentRow, ServiceError> {
    let client = load_accessible_client(pool, actor, client_public_id).await?;

    let property_id = sqlx::query_scalar::<_, i64>("SELECT id FROM properties WHERE public_id = ?")
        .bind(&req.property_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("Property not found"))?;

    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query(
        r#"
        INSERT INTO client_property_assignments (
            client_id, property_id, position, show_purchase_price, show_monthly_rent,
            show_hoa_fee, show_property_tax, notes, created_at
        )
        SELECT ?, ?, COALESCE(MAX(position), -1) + 1, ?, ?, ?, ?, ?, ?
        FROM client_property_assignments WHERE client_id = ?
        "#,
    )
    .bind(client.id)
    .bind(property_id)
    .bind(req.overrides.purchase_price)
    .bind(req.overrides.monthly_rent)
    .bind(req.overrides.hoa_fee)
    .bind(req.overrides.property_tax)
    .bind(&req.notes)
    .bind(&now)
    .bind(client.id)
    .execute(pool)
    .await
    .map_err(ServiceError::on_constraint(
        "Property is already assigned to this client",
    ))?;

    info!(client = %client.public_id, property = %req.property_id, "assigned property");
    fetch_assignment(pool, client.id, &req.property_id).await
}

pub async fn update_assignment(
    pool: &SqlitePool,
    actor: &Actor,
    client_public_id: &str,
    property_public_id: &str,
    req: UpdateAssignmentRequest,
) -> Result<AssignmentRow, ServiceError> {
    let client = load_accessible_client(pool, actor, client_public_id).await?;
    let existing = fetch_assignment(pool, client.id, property_public_id).await?;

    let overrides = req.overrides.unwrap_or(existing.overrides());
    let notes = req.notes.unwrap_or(existing.assignment_notes);

    sqlx::query(
        r#"
        UPDATE client_property_assignments
        SET show_purchase_price = ?, show_monthly_rent = ?, show_hoa_fee = ?,
            show_property_tax = ?, notes = ?
        WHERE id = ?
        "#,
    )
    .bind(overrides.purchase_price)
    .bind(overrides.monthly_rent)
    .bind(overrides.hoa_fee)
    .bind(overrides.property_tax)
    .bind(&notes)
    .bind(existing.assignment_id)
    .execute(pool)
    .await?;

    fetch_assignment(pool, client.id, property_public_id).await
}

pub async fn unassign_property(
    pool: &SqlitePool,
    actor: &Actor,
    client_public_id: &str,
    property_public_id: &str,
) -> Result<(), ServiceError> {
    let client = load_accessible_client(pool, actor, client_public_id).await?;
    let existing = fetch_assignment(pool, client.id, property_public_id).await?;

    sqlx::query("DELETE FROM client_property_assignments WHERE id = ?")
        .bind(existing.assignment_id)
        .execute(pool)
        .await?;

    info!(client = %client.public_id, property = %property_public_id, "unassigned property");
    Ok(())
}

/// Rewrite positions to follow `property_ids`, which must name every assigned property once.
pub async fn reorder_assignments(
    pool: &SqlitePool,
    actor: &Actor,
    client_public_id: &str,
    req: ReorderAssignmentsRequest,
) -> Result<Vec<AssignmentRow>, ServiceError> {
    let client = load_accessible_client(pool, actor, client_public_id).await?;

    let assigned: Vec<(i64, String)> = sqlx::query_as(
        r#"
        SELECT cpa.id, p.public_id
        FROM client_property_assignments cpa
        JOIN properties p ON p.id = cpa.property_id
        WHERE cpa.client_id = ?
        "#,
    )
    .bind(client.id)
    .fetch_all(pool)
    .await?;

    let requested: HashSet<&str> = req.property_ids.iter().map(String::as_str).collect();
    let current: HashSet<&str> = assigned.iter().map(|(_, id)| id.as_str()).collect();
    if requested.len() != req.property_ids.len() || requested != current {
        return Err(ServiceError::bad_request(
            "property_ids must list every assigned property exactly once",
        ));
    }

    let mut tx = pool.begin().await?;
    for (position, property_id) in req.property_ids.iter().enumerate() {
        let assignment_id = assigned
            .iter()
            .find(|(_, id)| id == property_id)
            .map(|(assignment_id, _)| *assignment_id)
            .ok_or_else(|| ServiceError::internal("assignment vanished during reorder"))?;

        sqlx::query("UPDATE client_property_assignments SET position = ? WHERE id = ?")
            .bind(position as i64)
            .bind(assignment_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    info!(client = %client.public_id, count = assigned.len(), "reordered portfolio");
    list_assignments(pool, actor, client_public_id).await
}
