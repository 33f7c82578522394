use concierge_auth::{new_public_id, ManagerProfile, ManagerRole, MANAGER_COLUMNS};
use sqlx::SqlitePool;
use tracing::info;

use super::access::Actor;
use super::error::ServiceError;
use crate::routes::models::{CreateManagerRequest, UpdateManagerRequest};

fn parse_role(raw: Option<&str>) -> Result<ManagerRole, ServiceError> {
    match raw {
        None => Ok(ManagerRole::Manager),
        Some(value) => ManagerRole::parse(value)
            .ok_or_else(|| ServiceError::bad_request("role must be 'admin' or 'manager'")),
    }
}

fn required(value: &str, field: &str) -> Result<String, ServiceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::bad_request(format!("{field} is required")));
    }
    Ok(value.to_string())
}

pub async fn list_managers(
    pool: &SqlitePool,
    actor: &Actor,
) -> Result<Vec<ManagerProfile>, ServiceError> {
    actor.require_admin()?;

    let managers = sqlx::query_as::<_, ManagerProfile>(&format!(
        "SELECT {MANAGER_COLUMNS} FROM property_managers ORDER BY full_name COLLATE NOCASE, id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(managers)
}

pub async fn get_manager(
    pool: &SqlitePool,
    actor: &Actor,
    public_id: &str,
) -> Result<ManagerProfile, ServiceError> {
    actor.require_admin()?;
    find_manager(pool, public_id).await
}

pub(crate) async fn find_manager(
    pool: &SqlitePool,
    public_id: &str,
) -> Result<ManagerProfile, ServiceError> {
    sqlx::query_as::<_, ManagerProfile>(&format!(
        "SELECT {MANAGER_COLUMNS} FROM property_managers WHERE public_id = ?"
    ))
    .bind(public_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ServiceError::not_found("Manager not found"))
}

pub async fn create_manager(
    pool: &SqlitePool,
    actor: &Actor,
    req: CreateManagerRequest,
) -> Result<ManagerProfile, ServiceError> {
    actor.require_admin()?;

    let email = required(&req.email, "email")?.to_lowercase();
    let full_name = required(&req.full_name, "full_name")?;
    let role = parse_role(req.role.as_deref())?;
    let public_id = new_public_id();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO property_managers (public_id, email, full_name, phone, company, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&public_id)
    .bind(&email)
    .bind(&full_name)
    .bind(&req.phone)
    .bind(&req.company)
    .bind(role.as_str())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .map_err(ServiceError::on_constraint("A manager with this email already exists"))?;

    info!(manager = %public_id, role = role.as_str(), "created property manager");
    find_manager(pool, &public_id).await
}

pub async fn update_manager(
    pool: &SqlitePool,
    actor: &Actor,
    public_id: &str,
    req: UpdateManagerRequest,
) -> Result<ManagerProfile, ServiceError> {
    actor.require_admin()?;
    let existing = find_manager(pool, public_id).await?;

    let email = match req.email.as_deref() {
        Some(email) => required(email, "email")?.to_lowercase(),
        None => existing.email,
    };
    let full_name = match req.full_name.as_deref() {
        Some(name) => required(name, "full_name")?,
        None => existing.full_name,
    };
    let role = match req.role.as_deref() {
        Some(role) => parse_role(Some(role))?,
        None => existing.role,
    };
    let phone = req.phone.unwrap_or(existing.phone);
    let company = req.company.unwrap_or(existing.company);
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE property_managers
        SET email = ?, full_name = ?, phone = ?, company = ?, role = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&email)
    .bind(&full_name)
    .bind(&phone)
    .bind(&company)
    .bind(role.as_str())
    .bind(&now)
    .bind(existing.id)
    .execute(pool)
    .await
    .map_err(ServiceError::on_constraint("A manager with this email already exists"))?;

    find_manager(pool, public_id).await
}

pub async fn delete_manager(
    pool: &SqlitePool,
    actor: &Actor,
    public_id: &str,
) -> Result<(), ServiceError> {
    actor.require_admin()?;

    if actor.manager.public_id == public_id {
        return Err(ServiceError::bad_request("You cannot delete your own manager account"));
    }

    let result = sqlx::query("DELETE FROM property_managers WHERE public_id = ?")
        .bind(public_id)
        .execute(pool)
        .await
        .map_err(ServiceError::on_constraint(
            "Manager still owns clients; reassign them first",
        ))?;

    if result.rows_affected() == 0 {
        return Err(ServiceError::not_found("Manager not found"));
    }

    info!(manager = %public_id, "deleted property manager");
    Ok(())
}
