//! Outbound HTTP clients used by the Concierge backend.
//!
//! Each client is optional: it is only built when its credentials are configured, and callers
//! get [`IntegrationError::NotConfigured`] when they reach for a missing one.

pub mod cloudinary;
pub mod error;
pub mod listing;
pub mod stripe;

use concierge_config::{IntegrationsConfig, StripeConfig};
use tracing::info;

pub use cloudinary::{CloudinaryClient, UploadedImage};
pub use error::IntegrationError;
pub use listing::{normalize_listing_url, validate_listing_url, ListingClient, ScrapedListing};
pub use stripe::{
    sign_webhook_payload, verify_webhook_signature, PaymentIntent, StripeClient, StripeEvent,
};

#[derive(Clone)]
pub struct Integrations {
    listings: Option<ListingClient>,
    cloudinary: Option<CloudinaryClient>,
    stripe: Option<StripeClient>,
    stripe_settings: StripeConfig,
}

impl Integrations {
    pub fn from_config(config: &IntegrationsConfig) -> Result<Self, IntegrationError> {
        let integrations = Self {
            listings: ListingClient::from_config(&config.listings)?,
            cloudinary: CloudinaryClient::from_config(&config.cloudinary)?,
            stripe: StripeClient::from_config(&config.stripe)?,
            stripe_settings: config.stripe.clone(),
        };

        info!(
            listings = integrations.listings.is_some(),
            cloudinary = integrations.cloudinary.is_some(),
            stripe = integrations.stripe.is_some(),
            "integrations initialised"
        );
        Ok(integrations)
    }

    /// No clients at all; every call reports `NotConfigured`.
    pub fn disabled() -> Self {
        Self {
            listings: None,
            cloudinary: None,
            stripe: None,
            stripe_settings: StripeConfig::default(),
        }
    }

    pub fn listings(&self) -> Result<&ListingClient, IntegrationError> {
        self.listings
            .as_ref()
            .ok_or(IntegrationError::NotConfigured("listing scraper"))
    }

    pub fn cloudinary(&self) -> Option<&CloudinaryClient> {
        self.cloudinary.as_ref()
    }

    pub fn require_cloudinary(&self) -> Result<&CloudinaryClient, IntegrationError> {
        self.cloudinary
            .as_ref()
            .ok_or(IntegrationError::NotConfigured("cloudinary"))
    }

    pub fn stripe(&self) -> Result<&StripeClient, IntegrationError> {
        self.stripe
            .as_ref()
            .ok_or(IntegrationError::NotConfigured("stripe"))
    }

    pub fn currency(&self) -> &str {
        &self.stripe_settings.currency
    }

    /// Verify a webhook delivery against the configured endpoint secret.
    pub fn verify_stripe_webhook(
        &self,
        payload: &[u8],
        header: &str,
        now: i64,
    ) -> Result<(), IntegrationError> {
        let secret = self
            .stripe_settings
            .webhook_secret
            .as_deref()
            .filter(|secret| !secret.trim().is_empty())
            .ok_or(IntegrationError::NotConfigured("stripe webhook secret"))?;

        verify_webhook_signature(
            payload,
            header,
            secret,
            self.stripe_settings.webhook_tolerance_seconds,
            now,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_integrations_report_not_configured() {
        let integrations = Integrations::disabled();
        assert!(matches!(
            integrations.listings(),
            Err(IntegrationError::NotConfigured("listing scraper"))
        ));
        assert!(integrations.cloudinary().is_none());
        assert!(matches!(
            integrations.stripe(),
            Err(IntegrationError::NotConfigured("stripe"))
        ));
        assert!(matches!(
            integrations.verify_stripe_webhook(b"{}", "t=0,v1=00", 0),
            Err(IntegrationError::NotConfigured(_))
        ));
        assert_eq!(integrations.currency(), "usd");
    }

    #[test]
    fn from_config_builds_only_configured_clients() {
        let mut config = IntegrationsConfig::default();
        config.stripe.secret_key = Some("sk_test".into());

        let integrations = Integrations::from_config(&config).unwrap();
        assert!(integrations.stripe().is_ok());
        assert!(integrations.listings().is_err());
        assert!(integrations.cloudinary().is_none());
    }
}
