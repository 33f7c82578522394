//! Maintenance commands that read or populate the database directly.

use std::fmt;

use anyhow::Context;
use chrono::Utc;
use concierge_api::routes::models::{
    AssignPropertyRequest, CreateAgentRequest, CreateClientRequest, CreatePropertyRequest,
};
use concierge_api::services::pricing::{PricingVisibility, VisibilityOverrides};
use concierge_api::services::{agents, assignments, clients, properties};
use concierge_auth::{new_public_id, AuthError};
use concierge_runtime::BackendServices;
use sqlx::{Row, SqlitePool};
use tracing::info;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub account_created: bool,
    pub properties: usize,
    pub clients: usize,
    pub portfolio_slug: Option<String>,
}

impl fmt::Display for SeedSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Database seeded:")?;
        writeln!(
            f,
            "- admin account {}",
            if self.account_created { "created" } else { "already existed" }
        )?;
        writeln!(f, "- {} properties created", self.properties)?;
        writeln!(f, "- {} clients created", self.clients)?;
        match &self.portfolio_slug {
            Some(slug) => write!(f, "Sample portfolio: /api/portfolios/{slug}"),
            None => write!(f, "Sample data already present; nothing else to do"),
        }
    }
}

/// Register `email` as an admin manager and give it a sample client portfolio.
/// Running it again keeps existing rows untouched.
pub async fn seed(
    services: &BackendServices,
    email: &str,
    password: &str,
) -> anyhow::Result<SeedSummary> {
    let pool = &services.db_pool;
    let mut summary = SeedSummary::default();

    match services
        .authenticator
        .register_with_password(email, password, Some("Concierge Admin"))
        .await
    {
        Ok(_) => summary.account_created = true,
        Err(AuthError::UserExists) => info!(email, "seed account already registered"),
        Err(error) => return Err(error).context("failed to register seed account"),
    }

    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO property_managers (public_id, email, full_name, role, created_at, updated_at)
         VALUES (?, ?, 'Concierge Admin', 'admin', ?, ?)
         ON CONFLICT(email) DO NOTHING",
    )
    .bind(new_public_id())
    .bind(email.trim().to_lowercase())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .context("failed to insert seed manager")?;

    let actor = services.actor_for_email(email).await?;
    if !clients::list_clients(pool, &actor).await?.is_empty() {
        return Ok(summary);
    }

    let rules = services.state().regions();

    let agent = agents::create_agent(
        pool,
        CreateAgentRequest {
            full_name: "Marisol Vega".into(),
            email: Some("marisol@harborrealty.example".into()),
            phone: Some("305-555-0142".into()),
            brokerage: Some("Harbor Realty".into()),
        },
    )
    .await?;

    let samples = [
        ("1200 Brickell Bay Dr #2104", "Miami", "33131", 2, 1.0, 68_000_000, 420_000),
        ("455 Las Olas Blvd", "Fort Lauderdale", "33301", 3, 2.5, 89_500_000, 610_000),
    ];

    let mut property_ids = Vec::new();
    for (street, city, zip, bedrooms, bathrooms, price, rent) in samples {
        let property = properties::create_property(
            pool,
            &actor,
            rules,
            CreatePropertyRequest {
                street: street.into(),
                city: city.into(),
                state: "FL".into(),
                zip: zip.into(),
                bedrooms: Some(bedrooms),
                bathrooms: Some(bathrooms),
                description: Some(format!("Sample listing in {city}")),
                purchase_price: Some(price),
                monthly_rent: Some(rent),
                visibility: Some(PricingVisibility::default()),
                listing_agent_id: Some(agent.public_id.clone()),
                ..Default::default()
            },
        )
        .await?;
        property_ids.push(property.public_id);
    }
    summary.properties = property_ids.len();

    let client = clients::create_client(
        pool,
        &actor,
        CreateClientRequest {
            full_name: "Sample Client".into(),
            email: "sample.client@example.com".into(),
            phone: None,
            notes: Some("Created by seed-data".into()),
            manager_id: None,
        },
    )
    .await?;
    summary.clients = 1;

    for (index, property_id) in property_ids.into_iter().enumerate() {
        let overrides = if index == 0 {
            VisibilityOverrides {
                purchase_price: Some(false),
                ..Default::default()
            }
        } else {
            VisibilityOverrides::default()
        };
        assignments::assign_property(
            pool,
            &actor,
            &client.public_id,
            AssignPropertyRequest {
                property_id,
                overrides,
                notes: None,
            },
        )
        .await?;
    }

    summary.portfolio_slug = Some(client.slug);
    Ok(summary)
}

pub async fn dump(pool: &SqlitePool) -> anyhow::Result<()> {
    println!("=== MANAGERS ===");
    let managers = sqlx::query(
        "SELECT public_id, email, full_name, role, created_at FROM property_managers ORDER BY created_at",
    )
    .fetch_all(pool)
    .await
    .context("failed to fetch managers")?;

    if managers.is_empty() {
        println!("No managers found in database");
    } else {
        println!(
            "{:<26} {:<32} {:<24} {:<8} {:<25}",
            "Public ID", "Email", "Name", "Role", "Created At"
        );
        println!("{}", "-".repeat(118));
        for row in managers {
            println!(
                "{:<26} {:<32} {:<24} {:<8} {:<25}",
                row.get::<String, _>("public_id"),
                row.get::<String, _>("email"),
                row.get::<String, _>("full_name"),
                row.get::<String, _>("role"),
                row.get::<String, _>("created_at"),
            );
        }
    }

    println!("\n=== CLIENTS ===");
    let clients = sqlx::query(
        "SELECT c.public_id, c.full_name, c.slug, c.is_active, m.email AS manager_email
         FROM clients c JOIN property_managers m ON m.id = c.manager_id
         ORDER BY c.created_at",
    )
    .fetch_all(pool)
    .await
    .context("failed to fetch clients")?;

    if clients.is_empty() {
        println!("No clients found in database");
    } else {
        println!(
            "{:<26} {:<24} {:<24} {:<7} {:<32}",
            "Public ID", "Name", "Slug", "Active", "Manager"
        );
        println!("{}", "-".repeat(116));
        for row in clients {
            println!(
                "{:<26} {:<24} {:<24} {:<7} {:<32}",
                row.get::<String, _>("public_id"),
                row.get::<String, _>("full_name"),
                row.get::<String, _>("slug"),
                row.get::<bool, _>("is_active"),
                row.get::<String, _>("manager_email"),
            );
        }
    }

    println!("\n=== PROPERTIES ===");
    let properties = sqlx::query(
        "SELECT public_id, street, city, region, purchase_price, monthly_rent
         FROM properties ORDER BY created_at",
    )
    .fetch_all(pool)
    .await
    .context("failed to fetch properties")?;

    if properties.is_empty() {
        println!("No properties found in database");
    } else {
        println!(
            "{:<26} {:<32} {:<18} {:<16} {:>12} {:>10}",
            "Public ID", "Street", "City", "Region", "Price", "Rent"
        );
        println!("{}", "-".repeat(120));
        for row in properties {
            println!(
                "{:<26} {:<32} {:<18} {:<16} {:>12} {:>10}",
                row.get::<String, _>("public_id"),
                truncate(&row.get::<String, _>("street"), 32),
                row.get::<String, _>("city"),
                row.get::<String, _>("region"),
                format_cents(row.get("purchase_price")),
                format_cents(row.get("monthly_rent")),
            );
        }
    }

    println!("\n=== ASSIGNMENTS ===");
    let assignments = sqlx::query(
        "SELECT c.slug, a.position, p.street, a.show_purchase_price, a.show_monthly_rent
         FROM client_property_assignments a
         JOIN clients c ON c.id = a.client_id
         JOIN properties p ON p.id = a.property_id
         ORDER BY c.slug, a.position",
    )
    .fetch_all(pool)
    .await
    .context("failed to fetch assignments")?;

    if assignments.is_empty() {
        println!("No assignments found in database");
    } else {
        println!(
            "{:<24} {:<4} {:<32} {:<8} {:<8}",
            "Client", "Pos", "Street", "Price", "Rent"
        );
        println!("{}", "-".repeat(80));
        for row in assignments {
            println!(
                "{:<24} {:<4} {:<32} {:<8} {:<8}",
                row.get::<String, _>("slug"),
                row.get::<i64, _>("position"),
                truncate(&row.get::<String, _>("street"), 32),
                format_override(row.get("show_purchase_price")),
                format_override(row.get("show_monthly_rent")),
            );
        }
    }

    Ok(())
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let kept: String = value.chars().take(width.saturating_sub(3)).collect();
    format!("{kept}...")
}

fn format_cents(cents: Option<i64>) -> String {
    match cents {
        Some(cents) => format!("${}.{:02}", cents / 100, cents % 100),
        None => "-".to_string(),
    }
}

fn format_override(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "show",
        Some(false) => "hide",
        None => "inherit",
    }
}
