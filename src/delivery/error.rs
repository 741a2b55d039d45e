//! Error types for the delivery pipeline.
//!
//! Every failure carries a [`DeliveryErrorKind`] so the fallback policy can
//! decide on a local save without inspecting message text.

use thiserror::Error;

/// Stable text of the incomplete-SMTP-configuration error.
pub const EMAIL_CONFIG_INCOMPLETE: &str = "email configuration incomplete: SMTP_HOST, SMTP_USER, SMTP_PASSWORD, and FROM_EMAIL must be set";

/// Closed classification of delivery failures used by the fallback policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryErrorKind {
    /// Required SMTP settings are missing.
    ConfigIncomplete,
    /// The attachment is over the configured or server-side size limit.
    SizeExceeded,
    /// The SMTP connection broke or could not be established.
    ConnectionFailed,
    /// Anything else; never triggers a fallback.
    Other,
}

impl DeliveryErrorKind {
    /// Returns true if a failed email attempt of this kind should be retried as a local save.
    #[must_use]
    pub fn triggers_local_fallback(self) -> bool {
        !matches!(self, Self::Other)
    }
}

/// Errors that can occur while resolving, fetching or dispatching a book.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// SMTP host, user, password or sender address is missing.
    #[error("{}", EMAIL_CONFIG_INCOMPLETE)]
    ConfigIncomplete,

    /// The resolve API answered with a status outside 200/204.
    #[error("API error (status {status}): {message}")]
    ApiStatus {
        /// HTTP status code.
        status: u16,
        /// Error text supplied by the API.
        message: String,
    },

    /// The resolve API answered with an unexpected status and no message.
    #[error("API request failed with status code: {status}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
    },

    /// The API accepted the request but reported an error instead of a URL.
    #[error("archive API error: {message} (the hash is likely invalid or the book is unavailable)")]
    ApiRejected {
        /// Error text supplied by the API, verbatim.
        message: String,
    },

    /// The API accepted the request but returned neither a URL nor a message.
    #[error("failed to get download URL from API")]
    MissingDownloadUrl,

    /// The API body could not be decoded.
    #[error("failed to decode API response: {source}")]
    InvalidApiResponse {
        /// The JSON decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The file host answered with a non-200 status.
    #[error("failed to download file from {url}: HTTP {status}")]
    FetchStatus {
        /// The resolved file URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// A URL could not be parsed or joined.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    Client {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },

    /// A request timed out.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Connection-level failure or unreadable body.
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The requested URL.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The attachment is larger than the configured limit.
    #[error(
        "file too large for email: {size_bytes} bytes ({size_mb:.2} MB) exceeds the {limit_mb} MB limit"
    )]
    AttachmentTooLarge {
        /// Attachment size in bytes.
        size_bytes: usize,
        /// Attachment size in megabytes.
        size_mb: f64,
        /// Configured limit in megabytes.
        limit_mb: u64,
    },

    /// The SMTP exchange failed.
    #[error("failed to send email via {host}: {message}")]
    Smtp {
        /// SMTP relay host.
        host: String,
        /// Description of the failure.
        message: String,
        /// Classification of the failure.
        kind: DeliveryErrorKind,
    },
}

impl DeliveryError {
    /// Returns the fallback classification of this error.
    #[must_use]
    pub fn kind(&self) -> DeliveryErrorKind {
        match self {
            Self::ConfigIncomplete => DeliveryErrorKind::ConfigIncomplete,
            Self::AttachmentTooLarge { .. } => DeliveryErrorKind::SizeExceeded,
            Self::Smtp { kind, .. } => *kind,
            _ => DeliveryErrorKind::Other,
        }
    }

    /// Creates an error from a transport failure, separating timeouts.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an SMTP error, classifying it from the reply code and wording.
    pub fn smtp(host: impl Into<String>, message: impl Into<String>, code: Option<u16>) -> Self {
        let message = message.into();
        let kind = classify_smtp_failure(&message, code);
        Self::Smtp {
            host: host.into(),
            message,
            kind,
        }
    }
}

/// Classifies an SMTP failure description.
///
/// Reply code 552 and size wording mean the message was too big; timeout,
/// broken-pipe and connection wording mean the link dropped.
#[must_use]
pub fn classify_smtp_failure(message: &str, code: Option<u16>) -> DeliveryErrorKind {
    let lower = message.to_lowercase();
    if code == Some(552)
        || ["file too large", "size limit", "exceeded", "too big"]
            .iter()
            .any(|needle| lower.contains(needle))
    {
        return DeliveryErrorKind::SizeExceeded;
    }
    if ["connection", "broken pipe", "timed out", "timeout", "eof"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        return DeliveryErrorKind::ConnectionFailed;
    }
    DeliveryErrorKind::Other
}
