//! Public portfolio pages: what a client sees at `/portfolio/{slug}`.

use sqlx::SqlitePool;

use super::error::ServiceError;
use super::pricing::{resolve, ClientPricing};
use crate::routes::models::{
    AssignmentRow, Portfolio, PortfolioContact, PortfolioProperty, ASSIGNMENT_COLUMNS,
    PROPERTY_COLUMNS,
};

#[derive(sqlx::FromRow)]
struct PortfolioOwner {
    id: i64,
    full_name: String,
    slug: String,
    manager_name: String,
    manager_email: String,
    manager_phone: Option<String>,
    manager_company: Option<String>,
}

async fn load_owner(pool: &SqlitePool, slug: &str) -> Result<PortfolioOwner, ServiceError> {
    sqlx::query_as::<_, PortfolioOwner>(
        r#"
        SELECT c.id, c.full_name, c.slug,
               m.full_name AS manager_name, m.email AS manager_email,
               m.phone AS manager_phone, m.company AS manager_company
        FROM clients c
        JOIN property_managers m ON m.id = c.manager_id
        WHERE c.slug = ? AND c.is_active = 1
        "#,
    )
    .bind(slug)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ServiceError::not_found("Portfolio not found"))
}

fn portfolio_entry(row: AssignmentRow) -> PortfolioProperty {
    let visibility = resolve(row.property.visibility(), row.overrides());
    let pricing = ClientPricing::from_property(&row.property, visibility);
    let images = row.property.image_urls();
    let property = row.property;

    PortfolioProperty {
        id: property.public_id,
        position: row.position,
        street: property.street,
        city: property.city,
        state: property.state,
        zip: property.zip,
        region: property.region,
        bedrooms: property.bedrooms,
        bathrooms: property.bathrooms,
        square_feet: property.square_feet,
        description: property.description,
        images,
        pricing,
        notes: row.assignment_notes,
    }
}

pub async fn build_portfolio(pool: &SqlitePool, slug: &str) -> Result<Portfolio, ServiceError> {
    let owner = load_owner(pool, slug).await?;

    let rows = sqlx::query_as::<_, AssignmentRow>(&format!(
        r#"
        SELECT {PROPERTY_COLUMNS}, {ASSIGNMENT_COLUMNS}
        FROM client_property_assignments cpa
        JOIN properties p ON p.id = cpa.property_id
        LEFT JOIN listing_agents a ON a.id = p.listing_agent_id
        WHERE cpa.client_id = ?
        ORDER BY cpa.position ASC, cpa.id ASC
        "#
    ))
    .bind(owner.id)
    .fetch_all(pool)
    .await?;

    Ok(Portfolio {
        client_name: owner.full_name,
        slug: owner.slug,
        manager: PortfolioContact {
            full_name: owner.manager_name,
            email: owner.manager_email,
            phone: owner.manager_phone,
            company: owner.manager_company,
        },
        properties: rows.into_iter().map(portfolio_entry).collect(),
    })
}

pub async fn portfolio_property(
    pool: &SqlitePool,
    slug: &str,
    property_public_id: &str,
) -> Result<PortfolioProperty, ServiceError> {
    let owner = load_owner(pool, slug).await?;

    let row = sqlx::query_as::<_, AssignmentRow>(&format!(
        r#"
        SELECT {PROPERTY_COLUMNS}, {ASSIGNMENT_COLUMNS}
        FROM client_property_assignments cpa
        JOIN properties p ON p.id = cpa.property_id
        LEFT JOIN listing_agents a ON a.id = p.listing_agent_id
        WHERE cpa.client_id = ? AND p.public_id = ?
        "#
    ))
    .bind(owner.id)
    .bind(property_public_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ServiceError::not_found("Property not found in portfolio"))?;

    Ok(portfolio_entry(row))
}
