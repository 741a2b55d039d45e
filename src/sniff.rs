//! File format detection from the declared content type and magic bytes.
//!
//! The declared `Content-Type` wins when it names a known e-book type;
//! otherwise the leading bytes decide. Any archive (`PK`) signature is taken
//! to be an EPUB without looking inside the archive.

use std::fmt;

/// A detected or declared e-book file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Pdf,
    Epub,
    Mobi,
    Azw3,
    Unknown,
}

/// Minimum buffer length before any magic-byte check is attempted.
const MIN_SNIFF_LEN: usize = 4;

/// Offset of the alternate `BOOKMOBI` header used by some files.
const ALT_MOBI_OFFSET: usize = 60;

impl FileFormat {
    /// Returns the lowercase tag used for filenames and display.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Epub => "epub",
            Self::Mobi => "mobi",
            Self::Azw3 => "azw3",
            Self::Unknown => "unknown",
        }
    }

    /// Returns the MIME type used for attachments.
    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Epub => "application/epub+zip",
            Self::Mobi => "application/x-mobipocket-ebook",
            Self::Azw3 => "application/vnd.amazon.ebook",
            Self::Unknown => "application/octet-stream",
        }
    }

    /// Maps a caller-declared format tag (e.g. `"EPUB"`, `"azw"`) to a format.
    #[must_use]
    pub fn from_declared(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "epub" => Self::Epub,
            "mobi" => Self::Mobi,
            "azw" | "azw3" => Self::Azw3,
            _ => Self::Unknown,
        }
    }

    /// Maps a `Content-Type` header value to a format by substring.
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Self {
        let lower = content_type.to_ascii_lowercase();
        if lower.contains("pdf") {
            Self::Pdf
        } else if lower.contains("epub") {
            Self::Epub
        } else if lower.contains("mobi") {
            Self::Mobi
        } else if lower.contains("azw") {
            Self::Azw3
        } else {
            Self::Unknown
        }
    }

    /// Classifies a buffer by its leading bytes.
    #[must_use]
    pub fn from_magic_bytes(bytes: &[u8]) -> Self {
        if bytes.len() < MIN_SNIFF_LEN {
            return Self::Unknown;
        }
        if bytes.starts_with(b"%PDF") {
            return Self::Pdf;
        }
        if bytes.starts_with(b"PK") {
            return Self::Epub;
        }

        let header = bytes.get(..8);
        if matches!(header, Some(b"BOOKMOBI" | b"MOBI    ")) {
            return Self::Mobi;
        }
        if bytes.get(ALT_MOBI_OFFSET..ALT_MOBI_OFFSET + 8) == Some(b"BOOKMOBI".as_slice()) {
            return Self::Mobi;
        }
        if matches!(header, Some(b"ITZEBX01" | b"ITZEBX02")) {
            return Self::Azw3;
        }

        Self::Unknown
    }

    /// Returns true for [`FileFormat::Unknown`].
    #[must_use]
    pub fn is_unknown(self) -> bool {
        self == Self::Unknown
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Detects the format of a fetched file.
///
/// Never fails: a short or unrecognized buffer yields [`FileFormat::Unknown`].
///
/// # Example
///
/// ```
/// use bookcourier_core::sniff::{FileFormat, detect_file_format};
///
/// assert_eq!(detect_file_format(None, b"%PDF-1.7"), FileFormat::Pdf);
/// assert_eq!(detect_file_format(Some("application/epub+zip"), b""), FileFormat::Epub);
/// ```
#[must_use]
pub fn detect_file_format(declared_content_type: Option<&str>, bytes: &[u8]) -> FileFormat {
    if let Some(content_type) = declared_content_type.filter(|value| !value.is_empty()) {
        let declared = FileFormat::from_content_type(content_type);
        if !declared.is_unknown() {
            return declared;
        }
    }
    FileFormat::from_magic_bytes(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_magic_without_content_type() {
        let format = detect_file_format(None, b"%PDF-1.4\n...");
        assert_eq!(format, FileFormat::Pdf);
        assert_eq!(format.mime_type(), "application/pdf");
    }

    #[test]
    fn test_zip_signature_is_assumed_epub() {
        let format = detect_file_format(None, b"PK\x03\x04rest-of-archive");
        assert_eq!(
            (format.tag(), format.mime_type()),
            ("epub", "application/epub+zip")
        );
    }

    #[test]
    fn test_three_byte_buffer_is_unknown() {
        let format = detect_file_format(None, b"%PD");
        assert_eq!(
            (format.tag(), format.mime_type()),
            ("unknown", "application/octet-stream")
        );
        assert_eq!(detect_file_format(None, b"PK\x03"), FileFormat::Unknown);
        assert_eq!(detect_file_format(None, b""), FileFormat::Unknown);
    }

    #[test]
    fn test_declared_content_type_wins_over_bytes() {
        assert_eq!(
            detect_file_format(Some("application/pdf"), b"PK\x03\x04"),
            FileFormat::Pdf
        );
        assert_eq!(
            detect_file_format(Some("application/x-mobipocket-ebook"), b"%PDF"),
            FileFormat::Mobi
        );
        assert_eq!(
            detect_file_format(Some("application/vnd.amazon.azw3"), b""),
            FileFormat::Azw3
        );
    }

    #[test]
    fn test_unrecognized_content_type_falls_through_to_bytes() {
        assert_eq!(
            detect_file_format(Some("application/octet-stream"), b"%PDF-1.7"),
            FileFormat::Pdf
        );
        assert_eq!(detect_file_format(Some(""), b"PK\x03\x04"), FileFormat::Epub);
    }

    #[test]
    fn test_mobi_headers() {
        assert_eq!(detect_file_format(None, b"BOOKMOBI...."), FileFormat::Mobi);
        assert_eq!(detect_file_format(None, b"MOBI    ...."), FileFormat::Mobi);

        let mut palm = vec![0_u8; 80];
        palm[60..68].copy_from_slice(b"BOOKMOBI");
        assert_eq!(detect_file_format(None, &palm), FileFormat::Mobi);
    }

    #[test]
    fn test_alternate_mobi_offset_needs_full_header() {
        let mut short = vec![0_u8; 66];
        short[60..66].copy_from_slice(b"BOOKMO");
        assert_eq!(detect_file_format(None, &short), FileFormat::Unknown);
    }

    #[test]
    fn test_azw3_headers() {
        assert_eq!(detect_file_format(None, b"ITZEBX01abc"), FileFormat::Azw3);
        assert_eq!(detect_file_format(None, b"ITZEBX02abc"), FileFormat::Azw3);
        assert_eq!(detect_file_format(None, b"ITZEBX03abc"), FileFormat::Unknown);
    }

    #[test]
    fn test_from_declared_maps_aliases() {
        assert_eq!(FileFormat::from_declared("EPUB"), FileFormat::Epub);
        assert_eq!(FileFormat::from_declared("azw"), FileFormat::Azw3);
        assert_eq!(FileFormat::from_declared("djvu"), FileFormat::Unknown);
    }
}
