use concierge_auth::new_public_id;
use sqlx::SqlitePool;
use tracing::info;

use super::access::Actor;
use super::error::ServiceError;
use super::managers::find_manager;
use crate::routes::models::{ClientRow, CreateClientRequest, UpdateClientRequest, CLIENT_COLUMNS};

const FALLBACK_SLUG: &str = "client";

/// Lower-case the name and collapse every run of non-alphanumerics into a single `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }

    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

/// First free slug among `base`, `base-2`, `base-3`, … ignoring the client being renamed.
async fn unique_slug(
    pool: &SqlitePool,
    base: &str,
    exclude_client_id: Option<i64>,
) -> Result<String, ServiceError> {
    let mut candidate = base.to_string();
    let mut suffix = 2;

    loop {
        let taken = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM clients WHERE slug = ? AND (? IS NULL OR id != ?)",
        )
        .bind(&candidate)
        .bind(exclude_client_id)
        .bind(exclude_client_id)
        .fetch_optional(pool)
        .await?;

        if taken.is_none() {
            return Ok(candidate);
        }
        candidate = format!("{base}-{suffix}");
        suffix += 1;
    }
}

fn normalize_email(email: &str) -> Result<String, ServiceError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(ServiceError::bad_request("a valid email is required"));
    }
    Ok(email)
}

fn select_client() -> String {
    format!(
        "SELECT {CLIENT_COLUMNS} FROM clients c JOIN property_managers m ON m.id = c.manager_id"
    )
}

pub async fn list_clients(pool: &SqlitePool, actor: &Actor) -> Result<Vec<ClientRow>, ServiceError> {
    let scope = if actor.is_admin() {
        None
    } else {
        Some(actor.manager_id())
    };

    let clients = sqlx::query_as::<_, ClientRow>(&format!(
        "{} WHERE (?1 IS NULL OR c.manager_id = ?1) ORDER BY c.full_name COLLATE NOCASE, c.id",
        select_client()
    ))
    .bind(scope)
    .fetch_all(pool)
    .await?;

    Ok(clients)
}

/// Load a client the actor may work with: their own, or any client for admins.
pub(crate) async fn load_accessible_client(
    pool: &SqlitePool,
    actor: &Actor,
    public_id: &str,
) -> Result<ClientRow, ServiceError> {
    let client = sqlx::query_as::<_, ClientRow>(&format!("{} WHERE c.public_id = ?", select_client()))
        .bind(public_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("Client not found"))?;

    if !actor.can_manage(Some(client.manager_id)) {
        return Err(ServiceError::forbidden("You do not manage this client"));
    }
    Ok(client)
}

pub async fn get_client(
    pool: &SqlitePool,
    actor: &Actor,
    public_id: &str,
) -> Result<ClientRow, ServiceError> {
    load_accessible_client(pool, actor, public_id).await
}

async fn owning_manager(
    pool: &SqlitePool,
    actor: &Actor,
    requested: Option<&str>,
) -> Result<i64, ServiceError> {
    match requested {
        None => Ok(actor.manager_id()),
        Some(public_id) if public_id == actor.manager.public_id => Ok(actor.manager_id()),
        Some(public_id) => {
            actor.require_admin()?;
            let manager = find_manager(pool, public_id)
                .await
                .map_err(|_| ServiceError::bad_request("Manager not found"))?;
            Ok(manager.id)
        }
    }
}

pub async fn create_client(
    pool: &SqlitePool,
    actor: &Actor,
    req: CreateClientRequest,
) -> Result<ClientRow, ServiceError> {
    let full_name = req.full_name.trim().to_string();
    if full_name.is_empty() {
        return Err(ServiceError::bad_request("full_name is required"));
    }
    let email = normalize_email(&req.email)?;
    let manager_id = owning_manager(pool, actor, req.manager_id.as_deref()).await?;
    let slug = unique_slug(pool, &slugify(&full_name), None).await?;
    let public_id = new_public_id();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO clients (public_id, manager_id, full_name, email, phone, notes, slug, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
        "#,
    )
    .bind(&public_id)
    .bind(manager_id)
    .bind(&full_name)
    .bind(&email)
    .bind(&req.phone)
    .bind(&req.notes)
    .bind(&slug)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .map_err(ServiceError::on_constraint("A client with this email already exists"))?;

    info!(client = %public_id, slug = %slug, "created client");
    load_accessible_client(pool, actor, &public_id).await
}

/// Slugs stay put on rename so shared portfolio links keep working; pass `slug` to change it.
pub async fn update_client(
    pool: &SqlitePool,
    actor: &Actor,
    public_id: &str,
    req: UpdateClientRequest,
) -> Result<ClientRow, ServiceError> {
    let existing = load_accessible_client(pool, actor, public_id).await?;

    let full_name = match req.full_name.as_deref().map(str::trim) {
        Some("") => return Err(ServiceError::bad_request("full_name cannot be empty")),
        Some(name) => name.to_string(),
        None => existing.full_name.clone(),
    };
    let email = match req.email.as_deref() {
        Some(email) => normalize_email(email)?,
        None => existing.email.clone(),
    };
    let slug = match req.slug.as_deref() {
        Some(requested) => {
            let requested = slugify(requested);
            if requested == existing.slug {
                requested
            } else {
                unique_slug(pool, &requested, Some(existing.id)).await?
            }
        }
        None => existing.slug.clone(),
    };
    let phone = req.phone.unwrap_or(existing.phone.clone());
    let notes = req.notes.unwrap_or(existing.notes.clone());
    let is_active = req.is_active.unwrap_or(existing.is_active);
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE clients
        SET full_name = ?, email = ?, phone = ?, notes = ?, slug = ?, is_active = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&full_name)
    .bind(&email)
    .bind(&phone)
    .bind(&notes)
    .bind(&slug)
    .bind(is_active)
    .bind(&now)
    .bind(existing.id)
    .execute(pool)
    .await
    .map_err(ServiceError::on_constraint("A client with this email already exists"))?;

    load_accessible_client(pool, actor, public_id).await
}

pub async fn delete_client(
    pool: &SqlitePool,
    actor: &Actor,
    public_id: &str,
) -> Result<(), ServiceError> {
    let existing = load_accessible_client(pool, actor, public_id).await?;

    sqlx::query("DELETE FROM clients WHERE id = ?")
        .bind(existing.id)
        .execute(pool)
        .await
        .map_err(ServiceError::on_constraint(
            "Client has invoices or quotes and cannot be deleted; archive it instead",
        ))?;

    info!(client = %public_id, "deleted client");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_utils::{create_test_db, TestFixtures};

    fn create_request(name: &str, email: &str) -> CreateClientRequest {
        CreateClientRequest {
            full_name: name.to_string(),
            email: email.to_string(),
            phone: None,
            notes: None,
            manager_id: None,
        }
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Jane Doe"), "jane-doe");
        assert_eq!(slugify("  O'Brien & Sons, LLC "), "o-brien-sons-llc");
        assert_eq!(slugify("José Núñez"), "jos-n-ez");
        assert_eq!(slugify("!!!"), "client");
        assert_eq!(slugify(""), "client");
    }

    #[tokio::test]
    async fn colliding_slugs_get_numeric_suffixes() {
        let (pool, _dir) = create_test_db().await;
        let manager = TestFixtures::new(&pool).manager("pm@example.com").await;

        let first = create_client(&pool, &manager, create_request("Jane Doe", "a@example.com"))
            .await
            .unwrap();
        let second = create_client(&pool, &manager, create_request("Jane  Doe!", "b@example.com"))
            .await
            .unwrap();
        let third = create_client(&pool, &manager, create_request("jane doe", "c@example.com"))
            .await
            .unwrap();

        assert_eq!(first.slug, "jane-doe");
        assert_eq!(second.slug, "jane-doe-2");
        assert_eq!(third.slug, "jane-doe-3");
    }

    #[tokio::test]
    async fn managers_only_see_their_own_clients() {
        let (pool, _dir) = create_test_db().await;
        let fixtures = TestFixtures::new(&pool);
        let alice = fixtures.manager("alice@example.com").await;
        let bob = fixtures.manager("bob@example.com").await;
        let admin = fixtures.admin("admin@example.com").await;

        let alices = create_client(&pool, &alice, create_request("Client A", "a@example.com"))
            .await
            .unwrap();
        create_client(&pool, &bob, create_request("Client B", "b@example.com"))
            .await
            .unwrap();

        assert_eq!(list_clients(&pool, &alice).await.unwrap().len(), 1);
        assert_eq!(list_clients(&pool, &admin).await.unwrap().len(), 2);

        let error = get_client(&pool, &bob, &alices.public_id).await.unwrap_err();
        assert!(matches!(error, ServiceError::Forbidden(_)));
        assert!(get_client(&pool, &admin, &alices.public_id).await.is_ok());
    }

    #[tokio::test]
    async fn only_admins_create_clients_for_other_managers() {
        let (pool, _dir) = create_test_db().await;
        let fixtures = TestFixtures::new(&pool);
        let alice = fixtures.manager("alice@example.com").await;
        let bob = fixtures.manager("bob@example.com").await;
        let admin = fixtures.admin("admin@example.com").await;

        let mut req = create_request("Client", "c@example.com");
        req.manager_id = Some(bob.manager.public_id.clone());
        let error = create_client(&pool, &alice, req).await.unwrap_err();
        assert!(matches!(error, ServiceError::Forbidden(_)));

        let mut req = create_request("Client", "c@example.com");
        req.manager_id = Some(bob.manager.public_id.clone());
        let client = create_client(&pool, &admin, req).await.unwrap();
        assert_eq!(client.manager_id, bob.manager_id());
    }

    #[tokio::test]
    async fn duplicate_emails_conflict_case_insensitively() {
        let (pool, _dir) = create_test_db().await;
        let manager = TestFixtures::new(&pool).manager("pm@example.com").await;

        create_client(&pool, &manager, create_request("A", "same@example.com"))
            .await
            .unwrap();
        let error = create_client(&pool, &manager, create_request("B", "SAME@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(error, ServiceError::Conflict(_)));

        let error = create_client(&pool, &manager, create_request("C", "not-an-email"))
            .await
            .unwrap_err();
        assert!(matches!(error, ServiceError::BadRequest(_)));
    }

    #[tokio::test]
    async fn rename_keeps_slug_unless_requested() {
        let (pool, _dir) = create_test_db().await;
        let manager = TestFixtures::new(&pool).manager("pm@example.com").await;
        let client = create_client(&pool, &manager, create_request("Jane Doe", "j@example.com"))
            .await
            .unwrap();
        create_client(&pool, &manager, create_request("Taken Name", "t@example.com"))
            .await
            .unwrap();

        let renamed = update_client(
            &pool,
            &manager,
            &client.public_id,
            UpdateClientRequest {
                full_name: Some("Jane Smith".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(renamed.full_name, "Jane Smith");
        assert_eq!(renamed.slug, "jane-doe");

        let reslugged = update_client(
            &pool,
            &manager,
            &client.public_id,
            UpdateClientRequest {
                slug: Some("Taken Name".into()),
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(reslugged.slug, "taken-name-2");
        assert!(!reslugged.is_active);
    }

    #[tokio::test]
    async fn delete_cascades_assignments_but_not_invoices() {
        let (pool, _dir) = create_test_db().await;
        let fixtures = TestFixtures::new(&pool);
        let manager = fixtures.manager("pm@example.com").await;
        let property = fixtures.property("1 Brickell Ave", "Miami", "33131").await;

        let client = create_client(&pool, &manager, create_request("Jane", "j@example.com"))
            .await
            .unwrap();
        fixtures.assign(client.id, property, 0).await;
        delete_client(&pool, &manager, &client.public_id).await.unwrap();
        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM client_property_assignments")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, 0);

        let billed = create_client(&pool, &manager, create_request("Billed", "b@example.com"))
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO invoices (public_id, number, client_id, issue_date, created_at, updated_at)
             VALUES ('inv', 'INV-2024-0001', ?, '2024-01-01', '', '')",
        )
        .bind(billed.id)
        .execute(&pool)
        .await
        .unwrap();

        let error = delete_client(&pool, &manager, &billed.public_id)
            .await
            .unwrap_err();
        assert!(matches!(error, ServiceError::Conflict(_)));
    }
}
