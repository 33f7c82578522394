use concierge_auth::new_public_id;
use concierge_config::RegionRule;
use concierge_integrations::{
    normalize_listing_url, validate_listing_url, IntegrationError, Integrations, ScrapedListing,
};
use sqlx::SqlitePool;
use tracing::{info, warn};

use super::access::Actor;
use super::agents::resolve_agent_id;
use super::error::ServiceError;
use super::pricing::{PricingFields, PricingVisibility};
use super::region::{categorize, PropertyAddress};
use crate::routes::models::{
    CreatePropertyRequest, ImportListingRequest, PropertyQuery, PropertyRow,
    UpdatePropertyRequest, PROPERTY_COLUMNS,
};

/// Imports keep at most this many photos.
pub const MAX_IMPORT_IMAGES: usize = 12;

/// Everything needed to insert a property row.
struct NewProperty {
    listing_url: Option<String>,
    address: PropertyAddress,
    bedrooms: Option<i64>,
    bathrooms: Option<f64>,
    square_feet: Option<i64>,
    description: Option<String>,
    images: Vec<String>,
    prices: PricingFields,
    visibility: PricingVisibility,
    listing_agent_id: Option<i64>,
}

fn ensure_non_negative(field: &str, value: Option<i64>) -> Result<(), ServiceError> {
    match value {
        Some(value) if value < 0 => Err(ServiceError::bad_request(format!(
            "{field} cannot be negative"
        ))),
        _ => Ok(()),
    }
}

fn validate_details(
    bedrooms: Option<i64>,
    bathrooms: Option<f64>,
    square_feet: Option<i64>,
    prices: &PricingFields,
) -> Result<(), ServiceError> {
    ensure_non_negative("bedrooms", bedrooms)?;
    ensure_non_negative("square_feet", square_feet)?;
    ensure_non_negative("purchase_price", prices.purchase_price)?;
    ensure_non_negative("monthly_rent", prices.monthly_rent)?;
    ensure_non_negative("hoa_fee", prices.hoa_fee)?;
    ensure_non_negative("property_tax", prices.property_tax)?;
    if bathrooms.is_some_and(|value| !value.is_finite() || value < 0.0) {
        return Err(ServiceError::bad_request("bathrooms must be a non-negative number"));
    }
    Ok(())
}

fn images_json(images: &[String]) -> Result<String, ServiceError> {
    serde_json::to_string(images)
        .map_err(|e| ServiceError::internal(format!("failed to encode images: {e}")))
}

fn select_property() -> String {
    format!(
        "SELECT {PROPERTY_COLUMNS} FROM properties p \
         LEFT JOIN listing_agents a ON a.id = p.listing_agent_id"
    )
}

pub async fn list_properties(
    pool: &SqlitePool,
    query: &PropertyQuery,
) -> Result<Vec<PropertyRow>, ServiceError> {
    let region = query
        .region
        .as_deref()
        .map(str::trim)
        .filter(|region| !region.is_empty());
    let pattern = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{q}%"));

    let properties = sqlx::query_as::<_, PropertyRow>(&format!(
        r#"
        {}
        WHERE (?1 IS NULL OR p.region = ?1)
          AND (?2 IS NULL OR p.street LIKE ?2 OR p.city LIKE ?2 OR p.zip LIKE ?2)
        ORDER BY p.created_at DESC, p.id DESC
        "#,
        select_property()
    ))
    .bind(region)
    .bind(pattern)
    .fetch_all(pool)
    .await?;

    Ok(properties)
}

pub async fn get_property(pool: &SqlitePool, public_id: &str) -> Result<PropertyRow, ServiceError> {
    sqlx::query_as::<_, PropertyRow>(&format!("{} WHERE p.public_id = ?", select_property()))
        .bind(public_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("Property not found"))
}

async fn insert_property(
    pool: &SqlitePool,
    actor: &Actor,
    rules: &[RegionRule],
    property: NewProperty,
) -> Result<PropertyRow, ServiceError> {
    let public_id = new_public_id();
    let now = chrono::Utc::now().to_rfc3339();
    let region = categorize(&property.address, rules);
    let images = images_json(&property.images)?;

    sqlx::query(
        r#"
        INSERT INTO properties (
            public_id, listing_url, street, city, state, zip, region, bedrooms, bathrooms,
            square_feet, description, images, purchase_price, monthly_rent, hoa_fee, property_tax,
            show_purchase_price, show_monthly_rent, show_hoa_fee, show_property_tax,
            listing_agent_id, created_by, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&public_id)
    .bind(&property.listing_url)
    .bind(&property.address.street)
    .bind(&property.address.city)
    .bind(&property.address.state)
    .bind(&property.address.zip)
    .bind(&region)
    .bind(property.bedrooms)
    .bind(property.bathrooms)
    .bind(property.square_feet)
    .bind(&property.description)
    .bind(&images)
    .bind(property.prices.purchase_price)
    .bind(property.prices.monthly_rent)
    .bind(property.prices.hoa_fee)
    .bind(property.prices.property_tax)
    .bind(property.visibility.purchase_price)
    .bind(property.visibility.monthly_rent)
    .bind(property.visibility.hoa_fee)
    .bind(property.visibility.property_tax)
    .bind(property.listing_agent_id)
    .bind(actor.manager_id())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .map_err(ServiceError::on_constraint(
        "A property with this listing URL already exists",
    ))?;

    info!(property = %public_id, region = %region, "created property");
    get_property(pool, &public_id).await
}

pub async fn create_property(
    pool: &SqlitePool,
    actor: &Actor,
    rules: &[RegionRule],
    req: CreatePropertyRequest,
) -> Result<PropertyRow, ServiceError> {
    let street = req.street.trim().to_string();
    if street.is_empty() {
        return Err(ServiceError::bad_request("street is required"));
    }

    let prices = PricingFields {
        purchase_price: req.purchase_price,
        monthly_rent: req.monthly_rent,
        hoa_fee: req.hoa_fee,
        property_tax: req.property_tax,
    };
    validate_details(req.bedrooms, req.bathrooms, req.square_feet, &prices)?;

    let listing_agent_id = match req.listing_agent_id.as_deref() {
        Some(agent) => Some(resolve_agent_id(pool, agent).await?),
        None => None,
    };

    let listing_url = match req.listing_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => Some(normalize_listing_url(url)?.to_string()),
        _ => None,
    };

    insert_property(
        pool,
        actor,
        rules,
        NewProperty {
            listing_url,
            address: PropertyAddress::new(street, req.city.trim(), req.state.trim(), req.zip.trim()),
            bedrooms: req.bedrooms,
            bathrooms: req.bathrooms,
            square_feet: req.square_feet,
            description: req.description,
            images: req.images,
            prices,
            visibility: req.visibility.unwrap_or_default(),
            listing_agent_id,
        },
    )
    .await
}

async fn load_editable(
    pool: &SqlitePool,
    actor: &Actor,
    public_id: &str,
) -> Result<PropertyRow, ServiceError> {
    let property = get_property(pool, public_id).await?;
    if !actor.can_manage(property.created_by) {
        return Err(ServiceError::forbidden(
            "Only the creator or an administrator can change this property",
        ));
    }
    Ok(property)
}

pub async fn update_property(
    pool: &SqlitePool,
    actor: &Actor,
    rules: &[RegionRule],
    public_id: &str,
    req: UpdatePropertyRequest,
) -> Result<PropertyRow, ServiceError> {
    let existing = load_editable(pool, actor, public_id).await?;

    let street = match req.street.as_deref().map(str::trim) {
        Some("") => return Err(ServiceError::bad_request("street cannot be empty")),
        Some(street) => street.to_string(),
        None => existing.street.clone(),
    };
    let address = PropertyAddress::new(
        street,
        req.city.as_deref().map(str::trim).unwrap_or(&existing.city),
        req.state.as_deref().map(str::trim).unwrap_or(&existing.state),
        req.zip.as_deref().map(str::trim).unwrap_or(&existing.zip),
    );
    let region = if address == existing.address() {
        existing.region.clone()
    } else {
        categorize(&address, rules)
    };

    let bedrooms = req.bedrooms.unwrap_or(existing.bedrooms);
    let bathrooms = req.bathrooms.unwrap_or(existing.bathrooms);
    let square_feet = req.square_feet.unwrap_or(existing.square_feet);
    let prices = PricingFields {
        purchase_price: req.purchase_price.unwrap_or(existing.purchase_price),
        monthly_rent: req.monthly_rent.unwrap_or(existing.monthly_rent),
        hoa_fee: req.hoa_fee.unwrap_or(existing.hoa_fee),
        property_tax: req.property_tax.unwrap_or(existing.property_tax),
    };
    validate_details(bedrooms, bathrooms, square_feet, &prices)?;

    let current = existing.visibility();
    let visibility = match req.visibility {
        Some(patch) => PricingVisibility {
            purchase_price: patch.purchase_price.unwrap_or(current.purchase_price),
            monthly_rent: patch.monthly_rent.unwrap_or(current.monthly_rent),
            hoa_fee: patch.hoa_fee.unwrap_or(current.hoa_fee),
            property_tax: patch.property_tax.unwrap_or(current.property_tax),
        },
        None => current,
    };

    let listing_agent_id = match req.listing_agent_id {
        Some(Some(agent)) => Some(resolve_agent_id(pool, &agent).await?),
        Some(None) => None,
        None => existing.listing_agent_id,
    };
    let description = req.description.unwrap_or(existing.description.clone());
    let images = match req.images {
        Some(images) => images_json(&images)?,
        None => existing.images.clone(),
    };
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE properties
        SET street = ?, city = ?, state = ?, zip = ?, region = ?, bedrooms = ?, bathrooms = ?,
            square_feet = ?, description = ?, images = ?, purchase_price = ?, monthly_rent = ?,
            hoa_fee = ?, property_tax = ?, show_purchase_price = ?, show_monthly_rent = ?,
            show_hoa_fee = ?, show_property_tax = ?, listing_agent_id = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&address.street)
    .bind(&address.city)
    .bind(&address.state)
    .bind(&address.zip)
    .bind(&region)
    .bind(bedrooms)
    .bind(bathrooms)
    .bind(square_feet)
    .bind(&description)
    .bind(&images)
    .bind(prices.purchase_price)
    .bind(prices.monthly_rent)
    .bind(prices.hoa_fee)
    .bind(prices.property_tax)
    .bind(visibility.purchase_price)
    .bind(visibility.monthly_rent)
    .bind(visibility.hoa_fee)
    .bind(visibility.property_tax)
    .bind(listing_agent_id)
    .bind(&now)
    .bind(existing.id)
    .execute(pool)
    .await?;

    get_property(pool, public_id).await
}

pub async fn delete_property(
    pool: &SqlitePool,
    actor: &Actor,
    public_id: &str,
) -> Result<(), ServiceError> {
    let existing = load_editable(pool, actor, public_id).await?;

    sqlx::query("DELETE FROM properties WHERE id = ?")
        .bind(existing.id)
        .execute(pool)
        .await?;

    info!(property = %public_id, "deleted property");
    Ok(())
}

/// Upload remote photos to the CDN, skipping the ones that fail. Without a CDN the original
/// URLs are kept.
async fn rehost_photos(integrations: &Integrations, photos: Vec<String>) -> Vec<String> {
    let photos: Vec<String> = photos.into_iter().take(MAX_IMPORT_IMAGES).collect();
    let Some(cloudinary) = integrations.cloudinary() else {
        return photos;
    };

    let mut hosted = Vec::with_capacity(photos.len());
    for photo in photos {
        match cloudinary.upload_remote(&photo).await {
            Ok(image) => hosted.push(image.secure_url),
            Err(error) => warn!(photo = %photo, %error, "skipping photo that failed to upload"),
        }
    }
    hosted
}

fn new_property_from_listing(
    listing: ScrapedListing,
    images: Vec<String>,
    listing_agent_id: Option<i64>,
) -> Result<NewProperty, ServiceError> {
    let street = listing
        .street
        .ok_or_else(|| IntegrationError::Decode("listing has no street address".into()))?;

    Ok(NewProperty {
        listing_url: Some(listing.listing_url),
        address: PropertyAddress::new(
            street,
            listing.city.unwrap_or_default(),
            listing.state.unwrap_or_default(),
            listing.zip.unwrap_or_default(),
        ),
        bedrooms: listing.bedrooms,
        bathrooms: listing.bathrooms,
        square_feet: listing.square_feet,
        description: listing.description,
        images,
        prices: PricingFields {
            purchase_price: listing.purchase_price,
            monthly_rent: listing.monthly_rent,
            hoa_fee: listing.hoa_fee,
            property_tax: listing.property_tax,
        },
        visibility: PricingVisibility::default(),
        listing_agent_id,
    })
}

/// Scrape a listing page and store it as a new property.
pub async fn import_from_listing(
    pool: &SqlitePool,
    actor: &Actor,
    integrations: &Integrations,
    rules: &[RegionRule],
    req: ImportListingRequest,
) -> Result<PropertyRow, ServiceError> {
    let listing_url = validate_listing_url(&req.listing_url)?.to_string();

    let duplicate = sqlx::query_scalar::<_, i64>("SELECT id FROM properties WHERE listing_url = ?")
        .bind(&listing_url)
        .fetch_optional(pool)
        .await?;
    if duplicate.is_some() {
        return Err(ServiceError::conflict(
            "A property with this listing URL already exists",
        ));
    }

    let listing_agent_id = match req.listing_agent_id.as_deref() {
        Some(agent) => Some(resolve_agent_id(pool, agent).await?),
        None => None,
    };

    let mut listing = integrations.listings()?.fetch(&listing_url).await?;
    let photos = std::mem::take(&mut listing.photos);
    let scraped_photos = photos.len();
    let images = rehost_photos(integrations, photos).await;
    info!(
        listing_url = %listing_url,
        scraped_photos,
        stored_images = images.len(),
        "imported listing"
    );

    let property = new_property_from_listing(listing, images, listing_agent_id)?;
    insert_property(pool, actor, rules, property).await
}

/// Upload a remote image to the CDN and append it to the property's gallery.
pub async fn add_image(
    pool: &SqlitePool,
    actor: &Actor,
    integrations: &Integrations,
    public_id: &str,
    image_url: &str,
) -> Result<PropertyRow, ServiceError> {
    let existing = load_editable(pool, actor, public_id).await?;
    let uploaded = integrations
        .require_cloudinary()?
        .upload_remote(image_url)
        .await?;

    let mut images = existing.image_urls();
    images.push(uploaded.secure_url);
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query("UPDATE properties SET images = ?, updated_at = ? WHERE id = ?")
        .bind(images_json(&images)?)
        .bind(&now)
        .bind(existing.id)
        .execute(pool)
        .await?;

    info!(property = %public_id, image = %uploaded.public_id, "added property image");
    get_property(pool, public_id).await
}
