//! Signed uploads to Cloudinary.

use std::time::Duration;

use chrono::Utc;
use concierge_config::CloudinaryConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tracing::debug;

use crate::error::{ensure_success, IntegrationError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedImage {
    pub secure_url: String,
    pub public_id: String,
}

#[derive(Clone)]
pub struct CloudinaryClient {
    http: Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    folder: String,
    base_url: String,
}

impl CloudinaryClient {
    /// Build a client, or `None` unless cloud name, key and secret are all set.
    pub fn from_config(config: &CloudinaryConfig) -> Result<Option<Self>, IntegrationError> {
        let (Some(cloud_name), Some(api_key), Some(api_secret)) = (
            non_blank(&config.cloud_name),
            non_blank(&config.api_key),
            non_blank(&config.api_secret),
        ) else {
            return Ok(None);
        };

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Some(Self {
            http,
            cloud_name,
            api_key,
            api_secret,
            folder: config.folder.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }))
    }

    /// Ask Cloudinary to fetch a remote image into our folder.
    pub async fn upload_remote(&self, image_url: &str) -> Result<UploadedImage, IntegrationError> {
        if image_url.trim().is_empty() {
            return Err(IntegrationError::InvalidInput("image URL is empty".into()));
        }

        let timestamp = Utc::now().timestamp().to_string();
        let mut params = vec![("timestamp", timestamp.clone())];
        if !self.folder.is_empty() {
            params.push(("folder", self.folder.clone()));
        }
        let signature = sign_params(&params, &self.api_secret);

        let mut form = vec![
            ("file", image_url.to_string()),
            ("api_key", self.api_key.clone()),
            ("signature", signature),
        ];
        form.extend(params.into_iter());

        let url = format!("{}/{}/image/upload", self.base_url, self.cloud_name);
        debug!(target_url = %url, image_url, "uploading image");

        let response = self.http.post(url).form(&form).send().await?;
        let uploaded: UploadedImage = ensure_success(response).await?.json().await?;
        Ok(uploaded)
    }
}

/// Cloudinary signature: SHA-1 hex of `k1=v1&k2=v2…` (keys sorted) followed by the secret.
pub fn sign_params(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<_> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let joined = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}
