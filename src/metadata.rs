//! Parsing of the free-text metadata line shown under each search result.
//!
//! The archive renders a line such as `English, epub, 2.5 MB, upload/...`.
//! [`parse_meta_information`] pulls language, format and size out of that
//! line. It is total: any input, including the empty string, yields a
//! [`BookMeta`] with some fields possibly empty.

/// Format tags recognized as exact comma-separated parts.
pub const FORMAT_VOCABULARY: [&str; 6] = ["epub", "pdf", "mobi", "azw", "azw3", "zip"];

/// Format tags searched as substrings of the whole line, most specific first.
const FORMAT_SUBSTRING_PRIORITY: [&str; 5] = ["epub", "pdf", "mobi", "azw3", "azw"];

/// Size unit substrings (matched case-insensitively).
pub const SIZE_UNITS: [&str; 5] = ["mb", "kb", "gb", "bytes", "byte"];

/// Language names and two-letter codes mapped to canonical names.
const LANGUAGE_TABLE: [(&str, &str); 23] = [
    ("english", "English"),
    ("spanish", "Spanish"),
    ("french", "French"),
    ("german", "German"),
    ("italian", "Italian"),
    ("portuguese", "Portuguese"),
    ("russian", "Russian"),
    ("chinese", "Chinese"),
    ("japanese", "Japanese"),
    ("korean", "Korean"),
    ("arabic", "Arabic"),
    ("dutch", "Dutch"),
    ("polish", "Polish"),
    ("turkish", "Turkish"),
    ("en", "English"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
    ("it", "Italian"),
    ("pt", "Portuguese"),
    ("ru", "Russian"),
    ("zh", "Chinese"),
    ("ja", "Japanese"),
];

/// Language keywords used to spot metadata lines in markup (lowercase).
pub const LANGUAGE_KEYWORDS: [&str; 14] = [
    "english",
    "spanish",
    "french",
    "german",
    "italian",
    "portuguese",
    "russian",
    "chinese",
    "japanese",
    "korean",
    "arabic",
    "dutch",
    "polish",
    "turkish",
];

/// Language, format and size parsed from a metadata line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookMeta {
    /// Canonical language name, or the raw first part when it looks like one.
    pub language: String,
    /// Lowercase format tag.
    pub format: String,
    /// Size text, e.g. `2.5 MB`.
    pub size: String,
}

/// Returns true if `text` mentions a size unit (case-insensitive).
#[must_use]
pub fn mentions_size_unit(text: &str) -> bool {
    let lower = text.to_lowercase();
    SIZE_UNITS.iter().any(|unit| lower.contains(unit))
}

/// Maps a language name or two-letter code to its canonical name.
#[must_use]
pub fn canonical_language(candidate: &str) -> Option<&'static str> {
    let lower = candidate.trim().to_lowercase();
    LANGUAGE_TABLE
        .iter()
        .find(|(key, _)| *key == lower)
        .map(|(_, name)| *name)
}

/// Parses a metadata line into language, format and size.
///
/// # Example
///
/// ```
/// use bookcourier_core::metadata::parse_meta_information;
///
/// let meta = parse_meta_information("English, epub, 2.5 MB");
/// assert_eq!(meta.language, "English");
/// assert_eq!(meta.format, "epub");
/// assert_eq!(meta.size, "2.5 MB");
/// ```
#[must_use]
pub fn parse_meta_information(blob: &str) -> BookMeta {
    let mut meta = BookMeta::default();
    if blob.is_empty() {
        return meta;
    }

    let parts: Vec<&str> = blob.split(", ").collect();
    if parts.len() >= 2 {
        let candidate = parts[0].trim();
        if let Some(name) = canonical_language(candidate) {
            meta.language = name.to_string();
        } else if (2..20).contains(&candidate.len()) {
            meta.language = candidate.to_string();
        }

        if let Some(format) = parts.iter().find_map(|part| {
            let lower = part.trim().to_lowercase();
            FORMAT_VOCABULARY
                .iter()
                .find(|tag| **tag == lower)
                .map(|tag| (*tag).to_string())
        }) {
            meta.format = format;
        }

        if let Some(size) = parts.iter().find(|part| mentions_size_unit(part)) {
            meta.size = size.trim().to_string();
        }
    }

    if meta.format.is_empty() {
        let lower = blob.to_lowercase();
        if let Some(tag) = FORMAT_SUBSTRING_PRIORITY
            .iter()
            .find(|tag| lower.contains(*tag))
        {
            meta.format = (*tag).to_string();
        }
    }

    if meta.size.is_empty() {
        let words: Vec<&str> = blob.split_whitespace().collect();
        if let Some(index) = words.iter().position(|word| mentions_size_unit(word)) {
            meta.size = if index > 0 {
                format!("{} {}", words[index - 1], words[index])
            } else {
                words[index].to_string()
            };
        }
    }

    meta
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_structured_line() {
        let meta = parse_meta_information("English, epub, 2.5 MB");
        assert_eq!(meta.language, "English");
        assert_eq!(meta.format, "epub");
        assert_eq!(meta.size, "2.5 MB");
    }

    #[test]
    fn test_parse_empty_blob_yields_empty_fields() {
        assert_eq!(parse_meta_information(""), BookMeta::default());
    }

    #[test]
    fn test_parse_maps_language_code() {
        let meta = parse_meta_information("de, pdf, 10.1 MB");
        assert_eq!(meta.language, "German");
        assert_eq!(meta.format, "pdf");
    }

    #[test]
    fn test_parse_accepts_unmapped_short_language_verbatim() {
        let meta = parse_meta_information("Esperanto, mobi, 300 KB");
        assert_eq!(meta.language, "Esperanto");
        assert_eq!(meta.format, "mobi");
        assert_eq!(meta.size, "300 KB");
    }

    #[test]
    fn test_parse_rejects_long_first_part_as_language() {
        let meta = parse_meta_information("A very long first segment here, epub");
        assert_eq!(meta.language, "");
        assert_eq!(meta.format, "epub");
    }

    #[test]
    fn test_parse_format_from_substring_when_no_exact_part() {
        let meta = parse_meta_information("English [en], .pdf, 1 MB");
        assert_eq!(meta.format, "pdf");
    }

    #[test]
    fn test_parse_substring_priority_prefers_epub_over_pdf() {
        let meta = parse_meta_information("converted from pdf to epub");
        assert_eq!(meta.format, "epub");
    }

    #[test]
    fn test_parse_size_recombines_split_number_and_unit() {
        let meta = parse_meta_information("epub file of 2.5 MB total");
        assert_eq!(meta.size, "2.5 MB");
        assert_eq!(meta.language, "");
    }

    #[test]
    fn test_parse_size_as_first_word_stands_alone() {
        let meta = parse_meta_information("12MB epub");
        assert_eq!(meta.size, "12MB");
    }

    #[test]
    fn test_parse_is_deterministic() {
        let blob = "French, azw3, 900 KB, lgli/Les Miserables.azw3";
        let first = parse_meta_information(blob);
        for _ in 0..10 {
            assert_eq!(parse_meta_information(blob), first);
        }
    }

    #[test]
    fn test_parse_total_over_odd_input() {
        for blob in [", ", ",,,,", "   ", "\u{1F4DA}, \u{1F4D6}", "MB"] {
            let _ = parse_meta_information(blob);
        }
    }

    #[test]
    fn test_mentions_size_unit_is_case_insensitive() {
        assert!(mentions_size_unit("2.5 Mb"));
        assert!(mentions_size_unit("1024 Bytes"));
        assert!(!mentions_size_unit("English"));
    }
}
