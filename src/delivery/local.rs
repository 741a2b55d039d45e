//! Best-effort local persistence of delivered files.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::filename::sanitize_filename;

/// What happened when a file was persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    /// The file was written.
    Written,
    /// A file with the same name already existed; nothing was written.
    AlreadyPresent,
    /// The write failed; the failure was logged and swallowed.
    WriteFailed,
}

/// Builds `<sanitized title>.<format>`.
#[must_use]
pub fn local_filename(title: &str, format: &str) -> String {
    format!("{}.{}", sanitize_filename(title), format)
}

/// Writes `bytes` to `dir/filename` unless that file already exists.
///
/// Never fails: IO errors are logged and reported as [`SaveStatus::WriteFailed`].
pub async fn save_if_absent(dir: &Path, filename: &str, bytes: &[u8]) -> (PathBuf, SaveStatus) {
    let path = dir.join(filename);

    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        info!(path = %path.display(), "file already exists, skipping save");
        return (path, SaveStatus::AlreadyPresent);
    }

    match tokio::fs::write(&path, bytes).await {
        Ok(()) => {
            info!(path = %path.display(), bytes = bytes.len(), "saved file");
            (path, SaveStatus::Written)
        }
        Err(error) => {
            warn!(path = %path.display(), error = %error, "failed to save file to disk");
            (path, SaveStatus::WriteFailed)
        }
    }
}
