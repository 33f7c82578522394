//! Which prices a client gets to see.
//!
//! A property carries one visibility flag per price field. Each assignment of that property to
//! a client may override a flag, but an override can only narrow: the effective flag is the
//! property flag AND the override, with a missing override counting as `true`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::routes::models::PropertyRow;

/// Prices in cents, each optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PricingFields {
    pub purchase_price: Option<i64>,
    pub monthly_rent: Option<i64>,
    pub hoa_fee: Option<i64>,
    pub property_tax: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PricingVisibility {
    pub purchase_price: bool,
    pub monthly_rent: bool,
    pub hoa_fee: bool,
    pub property_tax: bool,
}

impl Default for PricingVisibility {
    fn default() -> Self {
        Self {
            purchase_price: true,
            monthly_rent: true,
            hoa_fee: true,
            property_tax: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct VisibilityOverrides {
    pub purchase_price: Option<bool>,
    pub monthly_rent: Option<bool>,
    pub hoa_fee: Option<bool>,
    pub property_tax: Option<bool>,
}

pub fn resolve(property: PricingVisibility, overrides: VisibilityOverrides) -> PricingVisibility {
    PricingVisibility {
        purchase_price: property.purchase_price && overrides.purchase_price.unwrap_or(true),
        monthly_rent: property.monthly_rent && overrides.monthly_rent.unwrap_or(true),
        hoa_fee: property.hoa_fee && overrides.hoa_fee.unwrap_or(true),
        property_tax: property.property_tax && overrides.property_tax.unwrap_or(true),
    }
}

/// Prices as shown to a client: hidden fields serialize as `null`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ClientPricing {
    pub purchase_price: Option<i64>,
    pub monthly_rent: Option<i64>,
    pub hoa_fee: Option<i64>,
    pub property_tax: Option<i64>,
}

impl ClientPricing {
    pub fn from_prices(prices: PricingFields, visibility: PricingVisibility) -> Self {
        Self {
            purchase_price: prices.purchase_price.filter(|_| visibility.purchase_price),
            monthly_rent: prices.monthly_rent.filter(|_| visibility.monthly_rent),
            hoa_fee: prices.hoa_fee.filter(|_| visibility.hoa_fee),
            property_tax: prices.property_tax.filter(|_| visibility.property_tax),
        }
    }

    pub fn from_property(property: &PropertyRow, visibility: PricingVisibility) -> Self {
        Self::from_prices(property.prices(), visibility)
    }
}
