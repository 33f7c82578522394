use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("unexpected upstream response: {0}")]
    Decode(String),
    #[error("signature verification failed: {0}")]
    Signature(String),
}

impl From<serde_json::Error> for IntegrationError {
    fn from(error: serde_json::Error) -> Self {
        IntegrationError::Decode(error.to_string())
    }
}

/// Turn a non-success response into `Upstream`, keeping the body for diagnostics.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, IntegrationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(IntegrationError::Upstream {
        status: status.as_u16(),
        body,
    })
}
