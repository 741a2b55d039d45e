//! Resolution of a record hash to a short-lived file URL.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

use super::error::DeliveryError;
use crate::http;

/// Path of the archive's fast-download endpoint.
pub const FAST_DOWNLOAD_PATH: &str = "/dyn/api/fast_download.json";

/// Turns a record hash into a downloadable URL.
#[async_trait]
pub trait LinkResolver: Send + Sync {
    /// Resolves `hash` using the caller's `secret_key`.
    ///
    /// # Errors
    ///
    /// Returns a [`DeliveryError`] when the API rejects the request or the
    /// transport fails.
    async fn resolve(&self, hash: &str, secret_key: &str) -> Result<String, DeliveryError>;
}

#[derive(Debug, Default, Deserialize)]
struct FastDownloadResponse {
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// [`LinkResolver`] backed by the archive's fast-download JSON API.
#[derive(Debug, Clone)]
pub struct ApiLinkResolver {
    client: Client,
    endpoint: Url,
}

impl ApiLinkResolver {
    /// Creates a resolver for the archive at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::InvalidUrl`] for a bad base URL and
    /// [`DeliveryError::Client`] when the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, DeliveryError> {
        let client = http::build_archive_client().map_err(|source| DeliveryError::Client { source })?;
        Self::with_client(client, base_url)
    }

    /// Creates a resolver that reuses an existing client.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::InvalidUrl`] for a bad base URL.
    pub fn with_client(client: Client, base_url: &str) -> Result<Self, DeliveryError> {
        let endpoint = Url::parse(base_url)
            .and_then(|base| base.join(FAST_DOWNLOAD_PATH))
            .map_err(|_| DeliveryError::invalid_url(base_url))?;
        Ok(Self { client, endpoint })
    }

    fn request_url(&self, hash: &str, secret_key: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair("md5", hash)
            .append_pair("key", secret_key);
        url
    }
}

#[async_trait]
impl LinkResolver for ApiLinkResolver {
    #[instrument(skip(self, secret_key), fields(hash = %hash))]
    async fn resolve(&self, hash: &str, secret_key: &str) -> Result<String, DeliveryError> {
        let url = self.request_url(hash, secret_key);
        // The query carries the secret key; log only the endpoint.
        let endpoint = self.endpoint.as_str();

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DeliveryError::from_reqwest(endpoint, e.without_url()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DeliveryError::from_reqwest(endpoint, e.without_url()))?;
        debug!(status = status.as_u16(), body_len = body.len(), "resolve API answered");

        interpret_response(status, &body)
    }
}

/// Maps an API status and body to a download URL or a typed error.
fn interpret_response(status: StatusCode, body: &str) -> Result<String, DeliveryError> {
    let accepted = status == StatusCode::OK || status == StatusCode::NO_CONTENT;

    if !accepted {
        let message = serde_json::from_str::<FastDownloadResponse>(body)
            .ok()
            .and_then(|parsed| parsed.error)
            .filter(|message| !message.is_empty());
        warn!(status = status.as_u16(), "resolve API rejected request");
        return Err(match message {
            Some(message) => DeliveryError::ApiStatus {
                status: status.as_u16(),
                message,
            },
            None => DeliveryError::ApiRequestFailed {
                status: status.as_u16(),
            },
        });
    }

    let parsed = if body.trim().is_empty() {
        FastDownloadResponse::default()
    } else {
        serde_json::from_str::<FastDownloadResponse>(body)
            .map_err(|source| DeliveryError::InvalidApiResponse { source })?
    };

    match (parsed.download_url, parsed.error) {
        (Some(url), _) if !url.is_empty() => Ok(url),
        (_, Some(message)) if !message.is_empty() => Err(DeliveryError::ApiRejected { message }),
        _ => Err(DeliveryError::MissingDownloadUrl),
    }
}
