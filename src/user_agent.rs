//! Shared User-Agent strings for search and download HTTP clients.
//!
//! The archive blocks obvious bot traffic on the search page, so search
//! requests present a browser User-Agent. API and file requests identify
//! the tool.

/// Browser User-Agent sent with search page requests.
pub(crate) const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Default User-Agent for API and file requests (identifies the tool).
#[must_use]
pub(crate) fn default_delivery_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("bookcourier/{version} (personal-library-tool)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_ua_contains_crate_version() {
        let ua = default_delivery_user_agent();
        assert_eq!(
            env!("CARGO_PKG_VERSION"),
            ua.strip_prefix("bookcourier/")
                .and_then(|s| s.split(' ').next())
                .unwrap_or_default(),
            "delivery UA must contain crate version"
        );
    }

    #[test]
    fn test_browser_ua_looks_like_browser() {
        assert!(BROWSER_USER_AGENT.starts_with("Mozilla/5.0"));
        assert!(!BROWSER_USER_AGENT.contains("bookcourier"));
    }
}
