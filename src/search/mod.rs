//! Archive search: fetch a results page and extract book records from it.
//!
//! [`SearchClient`] issues `GET <base>/search?q=<term>` with browser-like
//! headers and hands the body to [`extract_records`]. A non-success status
//! is not an error: the archive answers blocked or overloaded requests with
//! 4xx/5xx pages, and those are reported as an empty result list.

mod document;
mod extract;
mod title;

use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::book::BookRecord;
use crate::http;
use crate::user_agent::BROWSER_USER_AGENT;

pub use document::MarkupNode;
pub use extract::{extract_from_root, extract_records, hash_from_href};
pub use title::clean_title;

/// Default archive mirror.
pub const DEFAULT_BASE_URL: &str = "https://annas-archive.se";

const SEARCH_PATH: &str = "/search";
const SEARCH_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const SEARCH_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

/// Errors raised while fetching a search page.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The configured base URL cannot be parsed or joined.
    #[error("invalid archive base URL: {url}")]
    InvalidBaseUrl {
        /// The rejected base URL.
        url: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    Client {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },

    /// The search request timed out.
    #[error("timeout searching {url}")]
    Timeout {
        /// The search URL.
        url: String,
    },

    /// Connection-level failure or unreadable body.
    #[error("network error searching {url}: {source}")]
    Network {
        /// The search URL.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },
}

impl SearchError {
    fn from_reqwest(url: &Url, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Network {
                url: url.to_string(),
                source,
            }
        }
    }
}

/// Client for the archive's search page.
#[derive(Debug, Clone)]
pub struct SearchClient {
    client: Client,
    base_url: Url,
}

impl SearchClient {
    /// Creates a client against a specific mirror, e.g. [`DEFAULT_BASE_URL`].
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidBaseUrl`] for an unparsable URL and
    /// [`SearchError::Client`] if the HTTP client cannot be built.
    pub fn with_base_url(base_url: &str) -> Result<Self, SearchError> {
        let base_url = Url::parse(base_url).map_err(|_| SearchError::InvalidBaseUrl {
            url: base_url.to_string(),
        })?;
        let client = http::build_archive_client().map_err(|source| SearchError::Client { source })?;
        Ok(Self { client, base_url })
    }

    /// Searches for `query` and returns records in page order.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Timeout`] or [`SearchError::Network`] on
    /// transport failure. A non-success status yields `Ok(vec![])`.
    #[instrument(skip(self), fields(base = %self.base_url))]
    pub async fn search(&self, query: &str) -> Result<Vec<BookRecord>, SearchError> {
        let url = self.search_url(query)?;
        debug!(url = %url, "requesting search page");

        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .header(ACCEPT, SEARCH_ACCEPT)
            .header(ACCEPT_LANGUAGE, SEARCH_ACCEPT_LANGUAGE)
            .send()
            .await
            .map_err(|e| SearchError::from_reqwest(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "search page returned non-success status");
            return Ok(Vec::new());
        }

        let body = response
            .text()
            .await
            .map_err(|e| SearchError::from_reqwest(&url, e))?;
        let records = extract_records(&body, &self.base_url);
        info!(count = records.len(), "search completed");
        Ok(records)
    }

    /// Searches and moves records whose format equals `preferred` to the front.
    ///
    /// # Errors
    ///
    /// Same as [`search`](Self::search).
    pub async fn search_with_format(
        &self,
        query: &str,
        preferred: &str,
    ) -> Result<Vec<BookRecord>, SearchError> {
        let mut records = self.search(query).await?;
        sort_by_preferred_format(&mut records, preferred);
        Ok(records)
    }

    fn search_url(&self, query: &str) -> Result<Url, SearchError> {
        let mut url = self
            .base_url
            .join(SEARCH_PATH)
            .map_err(|_| SearchError::InvalidBaseUrl {
                url: self.base_url.to_string(),
            })?;
        url.query_pairs_mut().clear().append_pair("q", query);
        Ok(url)
    }
}

/// Stable-sorts records so those with format `preferred` come first.
///
/// An empty `preferred` leaves the order untouched. Matching ignores case.
pub fn sort_by_preferred_format(records: &mut [BookRecord], preferred: &str) {
    let preferred = preferred.trim();
    if preferred.is_empty() {
        return;
    }
    records.sort_by_key(|record| !record.format.eq_ignore_ascii_case(preferred));
}
