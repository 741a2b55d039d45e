//! Caller-level fallback from email delivery to a local save.

use tracing::{info, instrument};

use super::error::{DeliveryError, DeliveryErrorKind};
use super::{Courier, DeliveryOutcome, DeliveryRequest};

/// Outcome of [`deliver_with_fallback`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackOutcome {
    /// What finally happened.
    pub outcome: DeliveryOutcome,
    /// Why the email path was replaced by a local save, if it was.
    pub fallback_reason: Option<String>,
}

impl FallbackOutcome {
    fn direct(outcome: DeliveryOutcome) -> Self {
        Self {
            outcome,
            fallback_reason: None,
        }
    }
}

/// Returns the user-facing reason a failure is recoverable by saving locally,
/// or `None` when it is terminal.
#[must_use]
pub fn fallback_reason(error: &DeliveryError) -> Option<String> {
    let kind = error.kind();
    kind.triggers_local_fallback().then(|| match (kind, error) {
        (_, DeliveryError::AttachmentTooLarge { size_mb, limit_mb, .. }) => format!(
            "File too large for email - {size_mb:.2} MB exceeds the {limit_mb} MB attachment limit."
        ),
        (DeliveryErrorKind::ConfigIncomplete, _) => "Email not configured".to_string(),
        (DeliveryErrorKind::SizeExceeded, _) => {
            "File too large for email (rejected by the mail server).".to_string()
        }
        _ => "SMTP connection failed (likely due to file size)".to_string(),
    })
}

/// Delivers `request`, saving locally when email fails for a recoverable reason.
///
/// The local save bypasses the dedup gate, since the email attempt already
/// recorded the key.
///
/// # Errors
///
/// Terminal email failures, and any failure of the substituted local save.
#[instrument(skip(courier, request), fields(hash = %request.hash))]
pub async fn deliver_with_fallback(
    courier: &Courier,
    request: &DeliveryRequest,
) -> Result<FallbackOutcome, DeliveryError> {
    match courier.deliver(request).await {
        Ok(outcome) => Ok(FallbackOutcome::direct(outcome)),
        Err(error) if error.kind().triggers_local_fallback() => {
            let reason = fallback_reason(&error).unwrap_or_default();
            info!(reason = %reason, original_error = %error, "falling back to local save");
            let outcome = courier.save_locally(request).await?;
            Ok(FallbackOutcome {
                outcome,
                fallback_reason: Some(reason),
            })
        }
        Err(error) => Err(error),
    }
}
