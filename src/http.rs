//! Shared HTTP client construction policy.
//!
//! Search, resolve and file fetches all go through a client built here so
//! timeout, TLS and protocol settings stay consistent.
//!
//! The archive's mirrors frequently serve certificate chains that cannot be
//! verified, so certificate validation is disabled for these clients.

use std::time::Duration;

use reqwest::{Client, ClientBuilder};
use tracing::debug;

use crate::user_agent;

/// Default whole-request timeout for archive traffic (30 seconds).
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connect timeout applied on top of the request timeout.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Builds the shared archive HTTP client with the default timeout.
///
/// # Errors
///
/// Returns the underlying [`reqwest::Error`] when the TLS backend cannot be
/// initialized.
pub fn build_archive_client() -> Result<Client, reqwest::Error> {
    build_archive_client_with_timeout(DEFAULT_TIMEOUT_SECS)
}

fn build_archive_client_with_timeout(timeout_secs: u64) -> Result<Client, reqwest::Error> {
    debug!(timeout_secs, "building archive HTTP client");
    ClientBuilder::new()
        .user_agent(user_agent::default_delivery_user_agent())
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS.min(timeout_secs)))
        .timeout(Duration::from_secs(timeout_secs))
        .danger_accept_invalid_certs(true)
        .http1_only()
        .gzip(true)
        .build()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_build_archive_client_succeeds() {
        assert!(build_archive_client().is_ok());
    }

    #[test]
    fn test_build_archive_client_with_short_timeout_succeeds() {
        assert!(build_archive_client_with_timeout(1).is_ok());
    }
}
