//! The book record shared by search results and delivery requests.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A book discovered on the search page.
///
/// Every field except `hash` is best-effort and may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    /// Human-readable, sanitized title.
    pub title: String,
    /// Free-text author line.
    pub authors: String,
    /// Free-text publisher line.
    pub publisher: String,
    /// Canonical language name when recognized.
    pub language: String,
    /// Lowercase format tag such as `epub` or `pdf`.
    pub format: String,
    /// Size text as shown on the page, e.g. `2.5 MB`.
    pub size: String,
    /// Absolute link to the record's detail page.
    #[serde(rename = "url")]
    pub source_url: String,
    /// Content hash used as the API lookup and dedup key.
    pub hash: String,
}

impl BookRecord {
    /// Serializes the record as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns the [`serde_json::Error`] if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for BookRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Title: {}\nAuthors: {}\nPublisher: {}\nLanguage: {}\nFormat: {}\nSize: {}\nURL: {}\nHash: {}",
            self.title,
            self.authors,
            self.publisher,
            self.language,
            self.format,
            self.size,
            self.source_url,
            self.hash
        )
    }
}
