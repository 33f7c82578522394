//! Stripe payment intents and webhook signature checks.

use std::collections::BTreeMap;
use std::time::Duration;

use concierge_config::StripeConfig;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, info};

use crate::error::{ensure_success, IntegrationError};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// The subset of a Stripe event we act on.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

impl StripeEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, IntegrationError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// `id` of the embedded object, e.g. the payment intent id.
    pub fn object_id(&self) -> Option<&str> {
        self.data.object.get("id").and_then(|value| value.as_str())
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.data
            .object
            .get("metadata")
            .and_then(|metadata| metadata.get(key))
            .and_then(|value| value.as_str())
    }
}

#[derive(Clone)]
pub struct StripeClient {
    http: Client,
    secret_key: String,
    base_url: String,
}

impl StripeClient {
    /// Build a client, or `None` when no secret key is configured.
    pub fn from_config(config: &StripeConfig) -> Result<Option<Self>, IntegrationError> {
        let Some(secret_key) = config
            .secret_key
            .clone()
            .filter(|key| !key.trim().is_empty())
        else {
            return Ok(None);
        };

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Some(Self {
            http,
            secret_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }))
    }

    pub async fn create_payment_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<PaymentIntent, IntegrationError> {
        if amount_cents <= 0 {
            return Err(IntegrationError::InvalidInput(
                "payment amount must be positive".into(),
            ));
        }

        let mut form = vec![
            ("amount".to_string(), amount_cents.to_string()),
            ("currency".to_string(), currency.to_ascii_lowercase()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        form.extend(
            metadata
                .iter()
                .map(|(key, value)| (format!("metadata[{key}]"), value.clone())),
        );

        let url = format!("{}/v1/payment_intents", self.base_url);
        debug!(target_url = %url, amount_cents, currency, "creating payment intent");

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;

        let intent: PaymentIntent = ensure_success(response).await?.json().await?;
        info!(payment_intent = %intent.id, amount_cents, "payment intent created");
        Ok(intent)
    }
}

/// Verify a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=…]`) against the raw body.
///
/// The signed payload is `"{t}.{body}"` under HMAC-SHA256 with the endpoint secret, and the
/// timestamp must be within `tolerance_seconds` of `now`.
pub fn verify_webhook_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_seconds: u64,
    now: i64,
) -> Result<(), IntegrationError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| IntegrationError::Signature("missing timestamp".into()))?;
    if signatures.is_empty() {
        return Err(IntegrationError::Signature("missing v1 signature".into()));
    }

    if now.abs_diff(timestamp) > tolerance_seconds {
        return Err(IntegrationError::Signature(
            "timestamp outside tolerance".into(),
        ));
    }

    for signature in signatures {
        let Ok(expected) = hex::decode(signature) else {
            continue;
        };
        let mac = signed_payload_mac(secret, timestamp, payload)?;
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }

    Err(IntegrationError::Signature("no matching signature".into()))
}

/// Build a header value the way Stripe signs webhook deliveries.
pub fn sign_webhook_payload(
    payload: &[u8],
    secret: &str,
    timestamp: i64,
) -> Result<String, IntegrationError> {
    let mac = signed_payload_mac(secret, timestamp, payload)?;
    let signature = hex::encode(mac.finalize().into_bytes());
    Ok(format!("t={timestamp},v1={signature}"))
}

fn signed_payload_mac(
    secret: &str,
    timestamp: i64,
    payload: &[u8],
) -> Result<HmacSha256, IntegrationError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|error| IntegrationError::Signature(error.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}
