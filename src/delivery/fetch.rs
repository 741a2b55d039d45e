//! Retrieval of a resolved file into memory.

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use super::error::DeliveryError;

/// Upper bound on buffer preallocation from a declared `Content-Length`.
const MAX_PREALLOC_BYTES: usize = 64 * 1024 * 1024;

/// A fetched file and the content type its host declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    /// File contents.
    pub bytes: Vec<u8>,
    /// `Content-Type` header value, if present.
    pub content_type: Option<String>,
}

/// Downloads `url` fully into memory.
///
/// # Errors
///
/// Returns [`DeliveryError::FetchStatus`] for anything but 200, and
/// [`DeliveryError::Timeout`] or [`DeliveryError::Network`] on transport failure.
#[instrument(skip(client), fields(url = %url))]
pub async fn fetch_file(client: &Client, url: &str) -> Result<FetchedFile, DeliveryError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| DeliveryError::from_reqwest(url, e))?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(DeliveryError::FetchStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let capacity = response
        .content_length()
        .and_then(|len| usize::try_from(len).ok())
        .unwrap_or_default()
        .min(MAX_PREALLOC_BYTES);

    let mut bytes = Vec::with_capacity(capacity);
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| DeliveryError::from_reqwest(url, e))?;
        bytes.extend_from_slice(&chunk);
    }

    debug!(bytes = bytes.len(), content_type = ?content_type, "fetched file");
    Ok(FetchedFile {
        bytes,
        content_type,
    })
}
