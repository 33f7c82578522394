//! Listing-scrape client.
//!
//! Talks to a RapidAPI-hosted scraper that returns a Zillow listing as JSON and maps the
//! parts we store onto [`ScrapedListing`]. Dollar amounts come back as cents.

use std::time::Duration;

use concierge_config::ListingApiConfig;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::{ensure_success, IntegrationError};

/// Hosts we accept listing URLs from.
const LISTING_HOST: &str = "zillow.com";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScrapedListing {
    pub listing_url: String,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub bedrooms: Option<i64>,
    pub bathrooms: Option<f64>,
    pub square_feet: Option<i64>,
    pub description: Option<String>,
    pub purchase_price: Option<i64>,
    pub monthly_rent: Option<i64>,
    pub hoa_fee: Option<i64>,
    pub property_tax: Option<i64>,
    pub photos: Vec<String>,
}

#[derive(Clone)]
pub struct ListingClient {
    http: Client,
    api_key: String,
    base_url: String,
    host: String,
}

impl ListingClient {
    /// Build a client, or `None` when no API key is configured.
    pub fn from_config(config: &ListingApiConfig) -> Result<Option<Self>, IntegrationError> {
        let Some(api_key) = config.api_key.clone().filter(|key| !key.trim().is_empty()) else {
            return Ok(None);
        };

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Some(Self {
            http,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            host: config.host.clone(),
        }))
    }

    pub async fn fetch(&self, listing_url: &str) -> Result<ScrapedListing, IntegrationError> {
        let url = format!("{}/property", self.base_url);
        debug!(target_url = %url, listing_url, "fetching listing");

        let response = self
            .http
            .get(url)
            .query(&[("url", listing_url)])
            .header("x-rapidapi-key", &self.api_key)
            .header("x-rapidapi-host", &self.host)
            .send()
            .await?;

        let body: Value = ensure_success(response).await?.json().await?;
        map_listing(listing_url, &body)
    }
}

/// Parse an http(s) listing link into the canonical form stored on properties.
pub fn normalize_listing_url(raw: &str) -> Result<Url, IntegrationError> {
    let url = Url::parse(raw.trim())
        .map_err(|_| IntegrationError::InvalidInput(format!("not a valid URL: {raw}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(IntegrationError::InvalidInput(
            "listing URL must use http or https".into(),
        ));
    }
    Ok(url)
}

/// Check that a URL is an http(s) link to a listing site we can scrape.
pub fn validate_listing_url(raw: &str) -> Result<Url, IntegrationError> {
    let url = normalize_listing_url(raw)?;

    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    if !host.contains(LISTING_HOST) {
        return Err(IntegrationError::InvalidInput(format!(
            "listing URL must point at {LISTING_HOST}"
        )));
    }

    Ok(url)
}

fn map_listing(listing_url: &str, body: &Value) -> Result<ScrapedListing, IntegrationError> {
    if !body.is_object() {
        return Err(IntegrationError::Decode(
            "listing response is not a JSON object".into(),
        ));
    }

    let monthly_tax =
        number_at(body, "/taxAnnualAmount").map(|annual| (annual * 100.0 / 12.0).round() as i64);

    Ok(ScrapedListing {
        listing_url: listing_url.to_string(),
        street: text_at(body, "/address/streetAddress"),
        city: text_at(body, "/address/city"),
        state: text_at(body, "/address/state"),
        zip: text_at(body, "/address/zipcode"),
        bedrooms: number_at(body, "/bedrooms").map(|value| value.round() as i64),
        bathrooms: number_at(body, "/bathrooms"),
        square_feet: number_at(body, "/livingArea").map(|value| value.round() as i64),
        description: text_at(body, "/description"),
        purchase_price: number_at(body, "/price").map(dollars_to_cents),
        monthly_rent: number_at(body, "/rentZestimate").map(dollars_to_cents),
        hoa_fee: number_at(body, "/monthlyHoaFee").map(dollars_to_cents),
        property_tax: monthly_tax,
        photos: photos(body),
    })
}

fn photos(body: &Value) -> Vec<String> {
    for key in ["photos", "responsivePhotos"] {
        let urls: Vec<String> = body
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("url").and_then(Value::as_str))
                    .filter(|url| !url.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        if !urls.is_empty() {
            return urls;
        }
    }

    text_at(body, "/imgSrc").into_iter().collect()
}

fn text_at(body: &Value, pointer: &str) -> Option<String> {
    match body.pointer(pointer)? {
        Value::String(value) => {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        }
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    }
}

fn number_at(body: &Value, pointer: &str) -> Option<f64> {
    match body.pointer(pointer)? {
        Value::Number(value) => value.as_f64(),
        Value::String(value) => value.replace([',', '$'], "").trim().parse().ok(),
        _ => None,
    }
}

pub fn dollars_to_cents(dollars: f64) -> i64 {
    (dollars * 100.0).round() as i64
}
