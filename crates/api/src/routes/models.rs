use concierge_auth::{ManagerProfile, User};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use crate::services::pricing::{
    ClientPricing, PricingFields, PricingVisibility, VisibilityOverrides,
};
use crate::services::region::PropertyAddress;

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// Auth

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl From<User> for UserResponse {
    fn from(value: User) -> Self {
        Self {
            id: value.public_id,
            email: value.email,
            display_name: value.display_name,
        }
    }
}

// Managers

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Manager {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    #[schema(example = "manager")]
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ManagerProfile> for Manager {
    fn from(value: ManagerProfile) -> Self {
        Self {
            id: value.public_id,
            email: value.email,
            full_name: value.full_name,
            phone: value.phone,
            company: value.company,
            role: value.role.as_str().to_string(),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateManagerRequest {
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    /// `admin` or `manager`; defaults to `manager`.
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateManagerRequest {
    pub email: Option<String>,
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub company: Option<Option<String>>,
    pub role: Option<String>,
}

// Listing agents

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct ListingAgent {
    #[serde(skip)]
    pub id: i64,
    #[serde(rename = "id")]
    pub public_id: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub brokerage: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAgentRequest {
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub brokerage: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateAgentRequest {
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub brokerage: Option<Option<String>>,
}

// Properties

/// A `properties` row joined with its listing agent's public id.
#[derive(Debug, Clone, FromRow)]
pub struct PropertyRow {
    pub id: i64,
    pub public_id: String,
    pub listing_url: Option<String>,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub region: String,
    pub bedrooms: Option<i64>,
    pub bathrooms: Option<f64>,
    pub square_feet: Option<i64>,
    pub description: Option<String>,
    pub images: String,
    pub purchase_price: Option<i64>,
    pub monthly_rent: Option<i64>,
    pub hoa_fee: Option<i64>,
    pub property_tax: Option<i64>,
    pub show_purchase_price: bool,
    pub show_monthly_rent: bool,
    pub show_hoa_fee: bool,
    pub show_property_tax: bool,
    pub listing_agent_id: Option<i64>,
    pub listing_agent_public_id: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

pub const PROPERTY_COLUMNS: &str = "p.id, p.public_id, p.listing_url, p.street, p.city, p.state, \
    p.zip, p.region, p.bedrooms, p.bathrooms, p.square_feet, p.description, p.images, \
    p.purchase_price, p.monthly_rent, p.hoa_fee, p.property_tax, p.show_purchase_price, \
    p.show_monthly_rent, p.show_hoa_fee, p.show_property_tax, p.listing_agent_id, \
    a.public_id AS listing_agent_public_id, p.created_by, p.created_at, p.updated_at";

impl PropertyRow {
    pub fn prices(&self) -> PricingFields {
        PricingFields {
            purchase_price: self.purchase_price,
            monthly_rent: self.monthly_rent,
            hoa_fee: self.hoa_fee,
            property_tax: self.property_tax,
        }
    }

    pub fn visibility(&self) -> PricingVisibility {
        PricingVisibility {
            purchase_price: self.show_purchase_price,
            monthly_rent: self.show_monthly_rent,
            hoa_fee: self.show_hoa_fee,
            property_tax: self.show_property_tax,
        }
    }

    pub fn address(&self) -> PropertyAddress {
        PropertyAddress::new(&self.street, &self.city, &self.state, &self.zip)
    }

    /// Stored image URLs; a malformed column reads as no images.
    pub fn image_urls(&self) -> Vec<String> {
        serde_json::from_str(&self.images).unwrap_or_else(|error| {
            tracing::warn!(property = %self.public_id, %error, "unreadable images column");
            Vec::new()
        })
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Property {
    pub id: String,
    pub listing_url: Option<String>,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub region: String,
    pub bedrooms: Option<i64>,
    pub bathrooms: Option<f64>,
    pub square_feet: Option<i64>,
    pub description: Option<String>,
    pub images: Vec<String>,
    pub pricing: PricingFields,
    pub visibility: PricingVisibility,
    pub listing_agent_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<PropertyRow> for Property {
    fn from(row: PropertyRow) -> Self {
        Self {
            images: row.image_urls(),
            pricing: row.prices(),
            visibility: row.visibility(),
            id: row.public_id,
            listing_url: row.listing_url,
            street: row.street,
            city: row.city,
            state: row.state,
            zip: row.zip,
            region: row.region,
            bedrooms: row.bedrooms,
            bathrooms: row.bathrooms,
            square_feet: row.square_feet,
            description: row.description,
            listing_agent_id: row.listing_agent_public_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PropertyQuery {
    /// Exact region name.
    pub region: Option<String>,
    /// Free text matched against street, city and zip.
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreatePropertyRequest {
    pub listing_url: Option<String>,
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip: String,
    pub bedrooms: Option<i64>,
    pub bathrooms: Option<f64>,
    pub square_feet: Option<i64>,
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub purchase_price: Option<i64>,
    pub monthly_rent: Option<i64>,
    pub hoa_fee: Option<i64>,
    pub property_tax: Option<i64>,
    pub visibility: Option<PricingVisibility>,
    /// Listing agent public id.
    pub listing_agent_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdatePropertyRequest {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i64>)]
    pub bedrooms: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<f64>)]
    pub bathrooms: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i64>)]
    pub square_feet: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub images: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i64>)]
    pub purchase_price: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i64>)]
    pub monthly_rent: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i64>)]
    pub hoa_fee: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i64>)]
    pub property_tax: Option<Option<i64>>,
    /// Flags to change; omitted flags keep their value.
    pub visibility: Option<VisibilityOverrides>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub listing_agent_id: Option<Option<String>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ImportListingRequest {
    pub listing_url: String,
    /// Listing agent public id to attach to the imported property.
    pub listing_agent_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddImageRequest {
    pub image_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegionSummary {
    pub name: String,
    pub property_count: i64,
}

// Clients

#[derive(Debug, Clone, FromRow)]
pub struct ClientRow {
    pub id: i64,
    pub public_id: String,
    pub manager_id: i64,
    pub manager_public_id: String,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub slug: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub const CLIENT_COLUMNS: &str = "c.id, c.public_id, c.manager_id, m.public_id AS manager_public_id, \
    c.full_name, c.email, c.phone, c.notes, c.slug, c.is_active, c.created_at, c.updated_at";

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Client {
    pub id: String,
    pub manager_id: String,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub slug: String,
    pub is_active: bool,
    pub portfolio_url: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Client {
    pub fn from_row(row: ClientRow, public_base_url: &str) -> Self {
        Self {
            portfolio_url: portfolio_url(public_base_url, &row.slug),
            id: row.public_id,
            manager_id: row.manager_public_id,
            full_name: row.full_name,
            email: row.email,
            phone: row.phone,
            notes: row.notes,
            slug: row.slug,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub fn portfolio_url(public_base_url: &str, slug: &str) -> String {
    format!("{}/portfolio/{}", public_base_url.trim_end_matches('/'), slug)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateClientRequest {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
    /// Owning manager public id; admins only, defaults to the caller.
    pub manager_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateClientRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub notes: Option<Option<String>>,
    /// New portfolio slug; normalized the same way generated slugs are.
    pub slug: Option<String>,
    pub is_active: Option<bool>,
}

// Assignments

/// An assignment joined with its property.
#[derive(Debug, Clone, FromRow)]
pub struct AssignmentRow {
    #[sqlx(flatten)]
    pub property: PropertyRow,
    pub assignment_id: i64,
    pub position: i64,
    pub override_purchase_price: Option<bool>,
    pub override_monthly_rent: Option<bool>,
    pub override_hoa_fee: Option<bool>,
    pub override_property_tax: Option<bool>,
    pub assignment_notes: Option<String>,
    pub assigned_at: String,
}

pub const ASSIGNMENT_COLUMNS: &str = "cpa.id AS assignment_id, cpa.position, \
    cpa.show_purchase_price AS override_purchase_price, \
    cpa.show_monthly_rent AS override_monthly_rent, cpa.show_hoa_fee AS override_hoa_fee, \
    cpa.show_property_tax AS override_property_tax, cpa.notes AS assignment_notes, \
    cpa.created_at AS assigned_at";

impl AssignmentRow {
    pub fn overrides(&self) -> VisibilityOverrides {
        VisibilityOverrides {
            purchase_price: self.override_purchase_price,
            monthly_rent: self.override_monthly_rent,
            hoa_fee: self.override_hoa_fee,
            property_tax: self.override_property_tax,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Assignment {
    pub property: Property,
    pub position: i64,
    pub overrides: VisibilityOverrides,
    /// Flags after merging the property's with the overrides.
    pub visibility: PricingVisibility,
    /// What the client sees.
    pub client_pricing: ClientPricing,
    pub notes: Option<String>,
    pub assigned_at: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignPropertyRequest {
    /// Property public id.
    pub property_id: String,
    #[serde(default)]
    pub overrides: VisibilityOverrides,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateAssignmentRequest {
    /// Replaces all four overrides when present.
    pub overrides: Option<VisibilityOverrides>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReorderAssignmentsRequest {
    /// Every assigned property public id, in the new order.
    pub property_ids: Vec<String>,
}

// Portfolios

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PortfolioProperty {
    pub id: String,
    pub position: i64,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub region: String,
    pub bedrooms: Option<i64>,
    pub bathrooms: Option<f64>,
    pub square_feet: Option<i64>,
    pub description: Option<String>,
    pub images: Vec<String>,
    pub pricing: ClientPricing,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PortfolioContact {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Portfolio {
    pub client_name: String,
    pub slug: String,
    pub manager: PortfolioContact,
    pub properties: Vec<PortfolioProperty>,
}

// Billing

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LineItem {
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl LineItem {
    pub fn amount_cents(&self) -> i64 {
        self.quantity.saturating_mul(self.unit_price_cents)
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BillingQuery {
    /// Client public id.
    pub client_id: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateInvoiceRequest {
    /// Client public id.
    pub client_id: String,
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub tax_rate_bps: i64,
    pub notes: Option<String>,
    /// `YYYY-MM-DD`; defaults to today.
    pub issue_date: Option<String>,
    pub due_date: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateInvoiceRequest {
    pub line_items: Option<Vec<LineItem>>,
    pub tax_rate_bps: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub notes: Option<Option<String>>,
    pub issue_date: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub due_date: Option<Option<String>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateQuoteRequest {
    pub client_id: String,
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub tax_rate_bps: i64,
    pub notes: Option<String>,
    pub issue_date: Option<String>,
    pub valid_until: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateQuoteRequest {
    pub line_items: Option<Vec<LineItem>>,
    pub tax_rate_bps: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub notes: Option<Option<String>>,
    pub issue_date: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub valid_until: Option<Option<String>>,
}

// Payments

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePaymentIntentRequest {
    /// Invoice public id.
    pub invoice_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentIntentResponse {
    pub client_secret: Option<String>,
    pub payment_intent_id: String,
    pub amount_cents: i64,
    pub currency: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_option_separates_null_from_missing() {
        let missing: UpdateAgentRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.phone, None);

        let cleared: UpdateAgentRequest = serde_json::from_str(r#"{"phone": null}"#).unwrap();
        assert_eq!(cleared.phone, Some(None));

        let set: UpdateAgentRequest = serde_json::from_str(r#"{"phone": "555"}"#).unwrap();
        assert_eq!(set.phone, Some(Some("555".into())));
    }

    #[test]
    fn portfolio_url_joins_without_double_slash() {
        assert_eq!(
            portfolio_url("https://example.com/", "jane-doe"),
            "https://example.com/portfolio/jane-doe"
        );
    }

    #[test]
    fn listing_agent_serializes_public_id_as_id() {
        let agent = ListingAgent {
            id: 4,
            public_id: "agent-1".into(),
            full_name: "Ana".into(),
            email: None,
            phone: None,
            brokerage: None,
            created_at: String::new(),
            updated_at: String::new(),
        };
        let json = serde_json::to_value(agent).unwrap();
        assert_eq!(json["id"], "agent-1");
    }

    #[test]
    fn line_item_amount_is_quantity_times_price() {
        let item = LineItem {
            description: "Staging".into(),
            quantity: 3,
            unit_price_cents: 12_50,
        };
        assert_eq!(item.amount_cents(), 3750);
    }
}
