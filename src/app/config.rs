//! Runtime settings loaded from the process environment and a `.env` file.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use bookcourier_core::DEFAULT_BASE_URL;
use bookcourier_core::delivery::{
    DEFAULT_MAX_ATTACHMENT_MB, DEFAULT_SMTP_PORT, DeliveryConfig, SmtpSettings,
};

const ENV_FILE_NAME: &str = ".env";

/// Older key names still honoured when the current name is unset.
const LEGACY_KEYS: [(&str, &str); 2] = [
    ("ARCHIVE_SECRET_KEY", "ANNAS_SECRET_KEY"),
    ("ARCHIVE_DOWNLOAD_PATH", "ANNAS_DOWNLOAD_PATH"),
];

/// Settings consumed by the command handlers.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) secret_key: String,
    pub(crate) download_dir: Option<PathBuf>,
    pub(crate) base_url: String,
    pub(crate) smtp: SmtpSettings,
    pub(crate) default_target: Option<String>,
    pub(crate) max_attachment_mb: u64,
}

impl Settings {
    /// Loads settings from the process environment, then the first readable
    /// `.env` file (working directory, then next to the executable).
    pub(crate) fn load() -> Result<Self> {
        let file_values = env_file_candidates()
            .iter()
            .find_map(|path| match load_env_file(path) {
                Ok(Some(values)) => {
                    info!(path = %path.display(), "loaded settings from .env file");
                    Some(values)
                }
                Ok(None) => None,
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "failed to load .env file");
                    None
                }
            })
            .unwrap_or_default();

        Self::from_lookup(|key| {
            env::var(key)
                .ok()
                .filter(|value| !value.is_empty())
                .or_else(|| file_values.get(key).cloned())
        })
    }

    /// Builds settings from a key lookup. Empty values count as unset.
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let get = |key: &str| {
            read(key).or_else(|| {
                LEGACY_KEYS
                    .iter()
                    .find(|(current, _)| *current == key)
                    .and_then(|(_, legacy)| read(legacy))
            })
        };

        let secret_key = get("ARCHIVE_SECRET_KEY").unwrap_or_default();
        if secret_key.is_empty() {
            warn!("ARCHIVE_SECRET_KEY not set - downloads from the archive will fail");
        }

        let port = match get("SMTP_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("Invalid `SMTP_PORT` value '{raw}'"))?,
            None => DEFAULT_SMTP_PORT,
        };
        let max_attachment_mb = match get("EMAIL_MAX_ATTACHMENT_MB") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("Invalid `EMAIL_MAX_ATTACHMENT_MB` value '{raw}'"))?,
            None => DEFAULT_MAX_ATTACHMENT_MB,
        };

        Ok(Self {
            secret_key,
            download_dir: get("ARCHIVE_DOWNLOAD_PATH").map(PathBuf::from),
            base_url: get("ARCHIVE_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            smtp: SmtpSettings {
                host: get("SMTP_HOST").unwrap_or_default(),
                port,
                user: get("SMTP_USER").unwrap_or_default(),
                password: get("SMTP_PASSWORD").unwrap_or_default(),
                from: get("FROM_EMAIL").unwrap_or_default(),
            },
            default_target: get("KINDLE_EMAIL"),
            max_attachment_mb,
        })
    }

    /// Library-side delivery configuration.
    pub(crate) fn delivery_config(&self) -> DeliveryConfig {
        DeliveryConfig {
            secret_key: self.secret_key.clone(),
            download_dir: self.download_dir.clone(),
            default_target: self.default_target.clone(),
            smtp: self.smtp.clone(),
            max_attachment_mb: self.max_attachment_mb,
        }
    }
}

fn env_file_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from(ENV_FILE_NAME)];
    if let Ok(exe) = env::current_exe()
        && let Some(dir) = exe.parent()
    {
        candidates.push(dir.join(ENV_FILE_NAME));
    }
    candidates
}

/// Reads a `.env` file. Returns `Ok(None)` when it does not exist.
fn load_env_file(path: &Path) -> Result<Option<HashMap<String, String>>> {
    if !path.is_file() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read env file '{}'", path.display()))?;
    Ok(Some(parse_env_str(&raw)))
}

/// Parses `KEY=value` lines. Blank lines, `#` comments and lines without
/// `=` are skipped; one pair of matching outer quotes is removed.
pub(crate) fn parse_env_str(raw: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for raw_line in raw.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((raw_key, raw_value)) = line.split_once('=') else {
            continue;
        };
        let key = raw_key.trim();
        if key.is_empty() {
            continue;
        }
        values.insert(key.to_string(), unquote(raw_value.trim()).to_string());
    }
    values
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2
            && let Some(inner) = value
                .strip_prefix(quote)
                .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn settings_from(pairs: &[(&str, &str)]) -> Result<Settings> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_parse_env_str_handles_comments_and_quotes() {
        let values = parse_env_str(
            "# comment\n\nSMTP_HOST = smtp.example.com\nFROM_EMAIL=\"me@example.com\"\nSMTP_PASSWORD='p=ss'\nbroken line\n=novalue\n",
        );
        assert_eq!(values.get("SMTP_HOST").unwrap(), "smtp.example.com");
        assert_eq!(values.get("FROM_EMAIL").unwrap(), "me@example.com");
        assert_eq!(values.get("SMTP_PASSWORD").unwrap(), "p=ss");
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn test_unquote_requires_matching_pair() {
        assert_eq!(unquote("\"x\""), "x");
        assert_eq!(unquote("'x'"), "x");
        assert_eq!(unquote("\"x'"), "\"x'");
        assert_eq!(unquote("\""), "\"");
        assert_eq!(unquote("\"\""), "");
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = settings_from(&[]).unwrap();
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.smtp.port, 587);
        assert_eq!(settings.max_attachment_mb, 18);
        assert!(settings.download_dir.is_none());
        assert!(settings.default_target.is_none());
        assert!(!settings.smtp.is_complete());
    }

    #[test]
    fn test_values_are_read_and_trimmed() {
        let settings = settings_from(&[
            ("ARCHIVE_SECRET_KEY", "key"),
            ("ARCHIVE_DOWNLOAD_PATH", "/tmp/books"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PORT", "465"),
            ("SMTP_USER", "user"),
            ("SMTP_PASSWORD", "pw"),
            ("FROM_EMAIL", "me@example.com"),
            ("KINDLE_EMAIL", "  reader@kindle.com "),
            ("EMAIL_MAX_ATTACHMENT_MB", "10"),
        ])
        .unwrap();
        assert_eq!(settings.secret_key, "key");
        assert_eq!(settings.download_dir, Some(PathBuf::from("/tmp/books")));
        assert_eq!(settings.smtp.port, 465);
        assert!(settings.smtp.is_complete());
        assert_eq!(settings.default_target.as_deref(), Some("reader@kindle.com"));
        assert_eq!(settings.delivery_config().max_attachment_mb, 10);
    }

    #[test]
    fn test_blank_values_count_as_unset() {
        let settings = settings_from(&[("KINDLE_EMAIL", "   "), ("SMTP_PORT", "")]).unwrap();
        assert!(settings.default_target.is_none());
        assert_eq!(settings.smtp.port, 587);
    }

    #[test]
    fn test_legacy_key_names_are_fallbacks() {
        let settings = settings_from(&[
            ("ANNAS_SECRET_KEY", "old-key"),
            ("ANNAS_DOWNLOAD_PATH", "/srv/books"),
        ])
        .unwrap();
        assert_eq!(settings.secret_key, "old-key");
        assert_eq!(settings.download_dir, Some(PathBuf::from("/srv/books")));

        let settings = settings_from(&[
            ("ARCHIVE_SECRET_KEY", "new-key"),
            ("ANNAS_SECRET_KEY", "old-key"),
        ])
        .unwrap();
        assert_eq!(settings.secret_key, "new-key");
    }

    #[test]
    fn test_invalid_port_is_error() {
        let err = settings_from(&[("SMTP_PORT", "smtp")]).unwrap_err();
        assert!(err.to_string().contains("SMTP_PORT"));
    }

    #[test]
    fn test_load_env_file_missing_is_none() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(load_env_file(&dir.path().join(".env")).unwrap().is_none());

        let path = dir.path().join(".env");
        fs::write(&path, "KINDLE_EMAIL=reader@kindle.com\n").unwrap();
        let values = load_env_file(&path).unwrap().unwrap();
        assert_eq!(values.get("KINDLE_EMAIL").unwrap(), "reader@kindle.com");
    }
}
