use concierge_auth::new_public_id;
use sqlx::SqlitePool;
use tracing::info;

use super::error::ServiceError;
use crate::routes::models::{CreateAgentRequest, ListingAgent, UpdateAgentRequest};

const AGENT_COLUMNS: &str =
    "id, public_id, full_name, email, phone, brokerage, created_at, updated_at";

pub async fn list_agents(pool: &SqlitePool) -> Result<Vec<ListingAgent>, ServiceError> {
    let agents = sqlx::query_as::<_, ListingAgent>(&format!(
        "SELECT {AGENT_COLUMNS} FROM listing_agents ORDER BY full_name COLLATE NOCASE, id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(agents)
}

pub async fn get_agent(pool: &SqlitePool, public_id: &str) -> Result<ListingAgent, ServiceError> {
    sqlx::query_as::<_, ListingAgent>(&format!(
        "SELECT {AGENT_COLUMNS} FROM listing_agents WHERE public_id = ?"
    ))
    .bind(public_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ServiceError::not_found("Listing agent not found"))
}

/// Row id of an agent referenced by public id in a request body.
pub(crate) async fn resolve_agent_id(
    pool: &SqlitePool,
    public_id: &str,
) -> Result<i64, ServiceError> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM listing_agents WHERE public_id = ?")
        .bind(public_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::bad_request("Listing agent not found"))
}

pub async fn create_agent(
    pool: &SqlitePool,
    req: CreateAgentRequest,
) -> Result<ListingAgent, ServiceError> {
    let full_name = req.full_name.trim();
    if full_name.is_empty() {
        return Err(ServiceError::bad_request("full_name is required"));
    }

    let public_id = new_public_id();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO listing_agents (public_id, full_name, email, phone, brokerage, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&public_id)
    .bind(full_name)
    .bind(&req.email)
    .bind(&req.phone)
    .bind(&req.brokerage)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    info!(agent = %public_id, "created listing agent");
    get_agent(pool, &public_id).await
}

pub async fn update_agent(
    pool: &SqlitePool,
    public_id: &str,
    req: UpdateAgentRequest,
) -> Result<ListingAgent, ServiceError> {
    let existing = get_agent(pool, public_id).await?;

    let full_name = match req.full_name.as_deref().map(str::trim) {
        Some("") => return Err(ServiceError::bad_request("full_name cannot be empty")),
        Some(name) => name.to_string(),
        None => existing.full_name,
    };
    let email = req.email.unwrap_or(existing.email);
    let phone = req.phone.unwrap_or(existing.phone);
    let brokerage = req.brokerage.unwrap_or(existing.brokerage);
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE listing_agents
        SET full_name = ?, email = ?, phone = ?, brokerage = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&full_name)
    .bind(&email)
    .bind(&phone)
    .bind(&brokerage)
    .bind(&now)
    .bind(existing.id)
    .execute(pool)
    .await?;

    get_agent(pool, public_id).await
}

pub async fn delete_agent(pool: &SqlitePool, public_id: &str) -> Result<(), ServiceError> {
    let result = sqlx::query("DELETE FROM listing_agents WHERE public_id = ?")
        .bind(public_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ServiceError::not_found("Listing agent not found"));
    }

    info!(agent = %public_id, "deleted listing agent");
    Ok(())
}
