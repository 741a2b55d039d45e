//! Book delivery: resolve a record hash, fetch the file, classify it, and
//! hand it to a local directory or an e-reader inbox.
//!
//! # Architecture
//!
//! - [`Courier`] - Orchestrates one delivery per call behind a dedup gate
//! - [`SuppressionTable`] - Recent `(hash, target)` attempts, injected into the courier
//! - [`LinkResolver`] / [`ApiLinkResolver`] - Hash to short-lived file URL
//! - [`Mailer`] / [`SmtpMailer`] - Raw message submission
//! - [`deliver_with_fallback`] - Caller-level policy that retries recoverable
//!   email failures as a local save
//!
//! # Example
//!
//! ```no_run
//! use bookcourier_core::delivery::{Courier, DeliveryConfig, DeliveryRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let courier = Courier::new(DeliveryConfig::default(), "https://annas-archive.se")?;
//! let request = DeliveryRequest::new("d41d8cd98f00b204e9800998ecf8427e", "Dune", "epub");
//! let outcome = courier.deliver(&request).await?;
//! println!("{outcome}");
//! # Ok(())
//! # }
//! ```

mod error;
mod fallback;
mod fetch;
mod filename;
mod local;
mod mail;
mod resolve;
mod suppression;

pub use error::{DeliveryError, DeliveryErrorKind, EMAIL_CONFIG_INCOMPLETE, classify_smtp_failure};
pub use fallback::{FallbackOutcome, deliver_with_fallback, fallback_reason};
pub use fetch::{FetchedFile, fetch_file};
pub use filename::{MAX_FILENAME_CHARS, sanitize_filename};
pub use local::{SaveStatus, local_filename, save_if_absent};
pub use mail::{
    BookEmail, DEFAULT_MAX_ATTACHMENT_MB, DEFAULT_SMTP_PORT, Mailer, SmtpMailer, SmtpSettings,
    build_mime_message, check_attachment_size, wrap_base64,
};
pub use resolve::{ApiLinkResolver, FAST_DOWNLOAD_PATH, LinkResolver};
pub use suppression::{
    Clock, ManualClock, SUPPRESSION_WINDOW, SuppressionTable, SystemClock, suppression_key,
};

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;
use tracing::{info, instrument, warn};

use crate::http;
use crate::sniff::{FileFormat, detect_file_format};

/// Extension used when neither sniffing nor the caller names a format.
const FALLBACK_EXTENSION: &str = "bin";

/// Configuration consumed by [`Courier`].
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Archive API secret key.
    pub secret_key: String,
    /// Directory for saved files. `None` skips the email backup copy and
    /// makes local-only delivery use the system temp directory.
    pub download_dir: Option<PathBuf>,
    /// Target used when a request names none.
    pub default_target: Option<String>,
    /// SMTP relay settings.
    pub smtp: SmtpSettings,
    /// Attachment limit in megabytes; zero disables the check.
    pub max_attachment_mb: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            download_dir: None,
            default_target: None,
            smtp: SmtpSettings::default(),
            max_attachment_mb: DEFAULT_MAX_ATTACHMENT_MB,
        }
    }
}

/// One request to deliver a book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRequest {
    /// Record hash.
    pub hash: String,
    /// Caller-declared title, used for the filename.
    pub title: String,
    /// Caller-declared format; may not match the real file.
    pub format: String,
    /// Destination inbox; falls back to the configured default.
    pub target_email: Option<String>,
}

impl DeliveryRequest {
    /// Creates a request without an explicit target.
    pub fn new(hash: impl Into<String>, title: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            title: title.into(),
            format: format.into(),
            target_email: None,
        }
    }

    /// Sets the destination inbox. Blank values are ignored.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        let target = target.into();
        self.target_email = (!target.trim().is_empty()).then_some(target);
        self
    }
}

/// Successful result of one delivery call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The file was accepted by the SMTP relay for `target`.
    Emailed {
        /// Destination inbox.
        target: String,
        /// Local backup copy, when a download directory is configured.
        backup: Option<PathBuf>,
    },
    /// The file was persisted (or already present) at `path`.
    SavedLocally {
        /// Destination path.
        path: PathBuf,
        /// What the save did.
        status: SaveStatus,
    },
    /// An identical request was attempted within the suppression window.
    SkippedDuplicate,
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Emailed { target, .. } => write!(f, "Book sent successfully to: {target}"),
            Self::SavedLocally { path, .. } => {
                write!(f, "Book downloaded successfully to path: {}", path.display())
            }
            Self::SkippedDuplicate => f.write_str(
                "Download already in progress or recently completed. Please wait before retrying.",
            ),
        }
    }
}

/// A fetched file with its classified format.
struct ClassifiedFile {
    bytes: Vec<u8>,
    extension: String,
    mime_type: &'static str,
}

/// Delivery orchestrator.
///
/// Cheap to clone; clones share the HTTP client, resolver, mailer and
/// suppression table.
#[derive(Clone)]
pub struct Courier {
    config: Arc<DeliveryConfig>,
    client: Client,
    resolver: Arc<dyn LinkResolver>,
    mailer: Arc<dyn Mailer>,
    suppression: Arc<SuppressionTable>,
}

impl fmt::Debug for Courier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Courier")
            .field("config", &self.config)
            .field("suppression", &self.suppression)
            .finish_non_exhaustive()
    }
}

impl Courier {
    /// Creates a courier talking to the archive at `base_url` over SMTP.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Client`] if the HTTP client cannot be built
    /// and [`DeliveryError::InvalidUrl`] for a bad base URL.
    pub fn new(config: DeliveryConfig, base_url: &str) -> Result<Self, DeliveryError> {
        let client = http::build_archive_client().map_err(|source| DeliveryError::Client { source })?;
        let resolver = ApiLinkResolver::with_client(client.clone(), base_url)?;
        Ok(Self::with_parts(
            config,
            client,
            Arc::new(resolver),
            Arc::new(SmtpMailer),
            Arc::new(SuppressionTable::new()),
        ))
    }

    /// Assembles a courier from explicit collaborators.
    #[must_use]
    pub fn with_parts(
        config: DeliveryConfig,
        client: Client,
        resolver: Arc<dyn LinkResolver>,
        mailer: Arc<dyn Mailer>,
        suppression: Arc<SuppressionTable>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            client,
            resolver,
            mailer,
            suppression,
        }
    }

    /// Returns the shared suppression table.
    #[must_use]
    pub fn suppression(&self) -> &Arc<SuppressionTable> {
        &self.suppression
    }

    /// Returns the request's target, else the configured default, else `""`.
    #[must_use]
    pub fn resolved_target(&self, request: &DeliveryRequest) -> String {
        request
            .target_email
            .as_deref()
            .or(self.config.default_target.as_deref())
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    }

    /// Delivers one book.
    ///
    /// A repeat of the same `(hash, target)` inside the suppression window
    /// returns [`DeliveryOutcome::SkippedDuplicate`] without any network call.
    /// With a target the email path is taken; with none the file is saved
    /// locally.
    ///
    /// # Errors
    ///
    /// Resolution, fetch and email failures. On the email path,
    /// [`DeliveryError::kind`] tells whether [`deliver_with_fallback`] may
    /// retry it as a local save.
    #[instrument(skip(self, request), fields(hash = %request.hash, title = %request.title))]
    pub async fn deliver(&self, request: &DeliveryRequest) -> Result<DeliveryOutcome, DeliveryError> {
        let target = self.resolved_target(request);
        let key = suppression_key(&request.hash, &target);
        if self.suppression.check_and_record(&key) {
            info!(recipient = %target, "duplicate delivery within suppression window, skipping");
            return Ok(DeliveryOutcome::SkippedDuplicate);
        }

        if target.is_empty() {
            return self.save_locally(request).await;
        }
        self.email(request, &target).await
    }

    /// Resolves, fetches and saves without consulting the dedup gate.
    ///
    /// The file goes to the download directory, or the system temp
    /// directory when none is configured. Write failures are logged and
    /// reported through [`SaveStatus::WriteFailed`].
    ///
    /// # Errors
    ///
    /// Resolution and fetch failures.
    pub async fn save_locally(&self, request: &DeliveryRequest) -> Result<DeliveryOutcome, DeliveryError> {
        let file = self.retrieve(request).await?;
        let dir = self
            .config
            .download_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let filename = local_filename(&request.title, &file.extension);
        let (path, status) = save_if_absent(&dir, &filename, &file.bytes).await;
        Ok(DeliveryOutcome::SavedLocally { path, status })
    }

    async fn email(&self, request: &DeliveryRequest, target: &str) -> Result<DeliveryOutcome, DeliveryError> {
        let smtp = &self.config.smtp;
        if !smtp.is_complete() {
            return Err(DeliveryError::ConfigIncomplete);
        }

        let file = self.retrieve(request).await?;
        check_attachment_size(file.bytes.len(), self.config.max_attachment_mb)?;

        let filename = local_filename(&request.title, &file.extension);
        let backup = match &self.config.download_dir {
            Some(dir) => Some(save_if_absent(dir, &filename, &file.bytes).await.0),
            None => {
                info!("no download directory configured, skipping local backup");
                None
            }
        };

        if file.extension == FileFormat::Mobi.tag() {
            warn!(
                title = %request.title,
                "MOBI files are usually rejected by e-reader email ingestion; sending anyway"
            );
        }

        let message = build_mime_message(&BookEmail {
            from: &smtp.from,
            to: target,
            filename: &filename,
            title: &request.title,
            mime_type: file.mime_type,
            attachment: &file.bytes,
        });
        self.mailer.send(smtp, target, &message).await?;

        info!(recipient = target, filename = %filename, "book emailed");
        Ok(DeliveryOutcome::Emailed {
            target: target.to_string(),
            backup,
        })
    }

    /// Resolve, fetch and classify.
    async fn retrieve(&self, request: &DeliveryRequest) -> Result<ClassifiedFile, DeliveryError> {
        if self.config.secret_key.is_empty() {
            warn!("archive secret key is not set; the API will likely reject the request");
        }
        let url = self
            .resolver
            .resolve(&request.hash, &self.config.secret_key)
            .await?;
        let fetched = fetch_file(&self.client, &url).await?;
        Ok(classify(request, fetched))
    }
}

fn classify(request: &DeliveryRequest, fetched: FetchedFile) -> ClassifiedFile {
    let declared = request.format.trim().to_lowercase();
    let detected = detect_file_format(fetched.content_type.as_deref(), &fetched.bytes);

    if !detected.is_unknown() && detected.tag() != declared {
        info!(
            expected_format = %declared,
            actual_format = %detected,
            content_type = fetched.content_type.as_deref().unwrap_or_default(),
            "file format mismatch detected"
        );
    }

    let (extension, mime_type) = if detected.is_unknown() {
        let extension = if declared.is_empty() {
            FALLBACK_EXTENSION.to_string()
        } else {
            declared.clone()
        };
        (extension, FileFormat::from_declared(&declared).mime_type())
    } else {
        (detected.tag().to_string(), detected.mime_type())
    };

    ClassifiedFile {
        bytes: fetched.bytes,
        extension,
        mime_type,
    }
}
