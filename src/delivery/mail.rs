//! Email delivery: MIME assembly and SMTP submission.
//!
//! The message is a fixed-layout `multipart/mixed` document with a text part
//! naming the book and one base64 attachment. It is built here and handed to
//! the SMTP transport as raw bytes.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use lettre::address::{Address, Envelope};
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::{debug, info, instrument};

use super::error::DeliveryError;
use crate::http::DEFAULT_TIMEOUT_SECS;

/// Multipart boundary literal.
pub const MIME_BOUNDARY: &str = "boundary123";

/// Base64 line width (RFC 2045).
pub const BASE64_LINE_WIDTH: usize = 76;

/// Port that selects implicit TLS instead of STARTTLS.
pub const IMPLICIT_TLS_PORT: u16 = 465;

/// Default submission port.
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Default attachment limit in megabytes.
pub const DEFAULT_MAX_ATTACHMENT_MB: u64 = 18;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// SMTP relay settings. Empty strings count as missing.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SmtpSettings {
    /// Relay host name.
    pub host: String,
    /// Relay port.
    pub port: u16,
    /// Login user.
    pub user: String,
    /// Login password.
    pub password: String,
    /// Sender address.
    pub from: String,
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("from", &self.from)
            .finish()
    }
}

impl SmtpSettings {
    /// Returns true when host, user, password and sender are all set.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        [&self.host, &self.user, &self.password, &self.from]
            .iter()
            .all(|value| !value.trim().is_empty())
    }

    /// Port to connect to, substituting the default for zero.
    #[must_use]
    pub fn effective_port(&self) -> u16 {
        if self.port == 0 {
            DEFAULT_SMTP_PORT
        } else {
            self.port
        }
    }
}

/// Fails with [`DeliveryError::AttachmentTooLarge`] if `len` exceeds `limit_mb`.
///
/// A limit of zero disables the check.
///
/// # Errors
///
/// See above.
pub fn check_attachment_size(len: usize, limit_mb: u64) -> Result<(), DeliveryError> {
    if limit_mb == 0 {
        return Ok(());
    }
    let limit_bytes = limit_mb.saturating_mul(1024 * 1024);
    if u64::try_from(len).unwrap_or(u64::MAX) > limit_bytes {
        #[allow(clippy::cast_precision_loss)]
        let size_mb = len as f64 / BYTES_PER_MB;
        return Err(DeliveryError::AttachmentTooLarge {
            size_bytes: len,
            size_mb,
            limit_mb,
        });
    }
    Ok(())
}

/// Parts of an outgoing book email.
#[derive(Debug, Clone, Copy)]
pub struct BookEmail<'a> {
    /// Sender address.
    pub from: &'a str,
    /// Recipient address.
    pub to: &'a str,
    /// Attachment filename, also used as the subject.
    pub filename: &'a str,
    /// Book title shown in the text part.
    pub title: &'a str,
    /// Attachment MIME type.
    pub mime_type: &'a str,
    /// Attachment bytes.
    pub attachment: &'a [u8],
}

/// Renders the complete RFC 5322 message with CRLF line endings.
#[must_use]
pub fn build_mime_message(email: &BookEmail<'_>) -> Vec<u8> {
    let BookEmail {
        from,
        to,
        filename,
        title,
        mime_type,
        attachment,
    } = *email;

    let mut message = String::new();
    message.push_str(&format!("From: {from}\r\n"));
    message.push_str(&format!("To: {to}\r\n"));
    message.push_str(&format!("Subject: {filename}\r\n"));
    message.push_str("MIME-Version: 1.0\r\n");
    message.push_str(&format!(
        "Content-Type: multipart/mixed; boundary={MIME_BOUNDARY}\r\n\r\n"
    ));

    message.push_str(&format!("--{MIME_BOUNDARY}\r\n"));
    message.push_str("Content-Type: text/plain; charset=utf-8\r\n\r\n");
    message.push_str(&format!("Book: {title}\r\n\r\n"));

    message.push_str(&format!("--{MIME_BOUNDARY}\r\n"));
    message.push_str(&format!("Content-Type: {mime_type}; name=\"{filename}\"\r\n"));
    message.push_str("Content-Transfer-Encoding: base64\r\n");
    message.push_str(&format!(
        "Content-Disposition: attachment; filename=\"{filename}\"\r\n\r\n"
    ));
    message.push_str(&wrap_base64(attachment));
    message.push_str(&format!("\r\n--{MIME_BOUNDARY}--\r\n"));

    message.into_bytes()
}

/// Base64-encodes `bytes` as CRLF-terminated lines of at most 76 characters.
#[must_use]
pub fn wrap_base64(bytes: &[u8]) -> String {
    let encoded = STANDARD.encode(bytes);
    let mut wrapped = String::with_capacity(encoded.len() + encoded.len() / BASE64_LINE_WIDTH * 2 + 2);
    // Base64 output is ASCII, so byte chunks are valid UTF-8.
    for line in encoded.as_bytes().chunks(BASE64_LINE_WIDTH) {
        wrapped.push_str(&String::from_utf8_lossy(line));
        wrapped.push_str("\r\n");
    }
    wrapped
}

/// Submits a prepared message.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends `message` from `settings.from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Smtp`] classified by
    /// [`classify_smtp_failure`](super::error::classify_smtp_failure).
    async fn send(
        &self,
        settings: &SmtpSettings,
        to: &str,
        message: &[u8],
    ) -> Result<(), DeliveryError>;
}

/// [`Mailer`] that submits through an SMTP relay with PLAIN authentication.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmtpMailer;

impl SmtpMailer {
    fn transport(
        settings: &SmtpSettings,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, DeliveryError> {
        let port = settings.effective_port();
        let builder = if port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
        }
        .map_err(|e| DeliveryError::smtp(&settings.host, e.to_string(), smtp_code(&e)))?;

        Ok(builder
            .port(port)
            .credentials(Credentials::new(
                settings.user.clone(),
                settings.password.clone(),
            ))
            .authentication(vec![Mechanism::Plain])
            .timeout(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)))
            .build())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip(self, settings, message), fields(host = %settings.host, to = %to))]
    async fn send(
        &self,
        settings: &SmtpSettings,
        to: &str,
        message: &[u8],
    ) -> Result<(), DeliveryError> {
        let envelope = envelope(&settings.from, to)
            .map_err(|message| DeliveryError::smtp(&settings.host, message, None))?;
        let transport = Self::transport(settings)?;

        debug!(bytes = message.len(), port = settings.effective_port(), "submitting message");
        transport
            .send_raw(&envelope, message)
            .await
            .map_err(|e| DeliveryError::smtp(&settings.host, e.to_string(), smtp_code(&e)))?;
        info!("message accepted by relay");
        Ok(())
    }
}

fn envelope(from: &str, to: &str) -> Result<Envelope, String> {
    let from: Address = from
        .trim()
        .parse()
        .map_err(|e| format!("invalid sender address {from:?}: {e}"))?;
    let to: Address = to
        .trim()
        .parse()
        .map_err(|e| format!("invalid recipient address {to:?}: {e}"))?;
    Envelope::new(Some(from), vec![to]).map_err(|e| e.to_string())
}

fn smtp_code(error: &lettre::transport::smtp::Error) -> Option<u16> {
    error
        .status()
        .and_then(|code| code.to_string().parse::<u16>().ok())
}
