//! Filename sanitization for saved and attached books.

/// Characters that are never allowed in an emitted filename.
const RESERVED_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Maximum filename stem length in characters.
pub const MAX_FILENAME_CHARS: usize = 200;

/// Turns a title into a filesystem-safe filename stem.
///
/// Reserved characters become `_`, whitespace runs become a single `_`, and
/// leading or trailing `.`/`_` are dropped. The result is at most
/// [`MAX_FILENAME_CHARS`] characters and may be empty.
///
/// # Example
///
/// ```
/// use bookcourier_core::sanitize_filename;
///
/// assert_eq!(sanitize_filename("Dune: Part 1 / 2"), "Dune__Part_1___2");
/// ```
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if RESERVED_CHARS.contains(&c) { '_' } else { c })
        .collect();

    let joined = replaced.split_whitespace().collect::<Vec<_>>().join("_");
    let trimmed = trim_edges(&joined);

    let truncated: String = trimmed.chars().take(MAX_FILENAME_CHARS).collect();
    trim_edges(&truncated).to_string()
}

fn trim_edges(value: &str) -> &str {
    value.trim_matches(|c| c == '.' || c == '_')
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn assert_safe(output: &str) {
        assert!(!output.contains(RESERVED_CHARS), "reserved char in {output:?}");
        assert!(output.chars().count() <= MAX_FILENAME_CHARS);
        assert!(!output.starts_with(['.', '_']), "bad start in {output:?}");
        assert!(!output.ends_with(['.', '_']), "bad end in {output:?}");
    }

    #[test]
    fn test_reserved_characters_replaced() {
        let output = sanitize_filename(r#"a/b\c:d*e?f"g<h>i|j"#);
        assert_eq!(output, "a_b_c_d_e_f_g_h_i_j");
        assert_safe(&output);
    }

    #[test]
    fn test_whitespace_collapsed_to_single_underscore() {
        assert_eq!(sanitize_filename("The   Left Hand\tof\nDarkness"), "The_Left_Hand_of_Darkness");
    }

    #[test]
    fn test_edges_trimmed() {
        assert_eq!(sanitize_filename("..._Hidden Title_..."), "Hidden_Title");
        assert_eq!(sanitize_filename("/leading slash"), "leading_slash");
        assert_eq!(sanitize_filename("..."), "");
    }

    #[test]
    fn test_long_title_truncated_and_retrimmed() {
        let mut title = "a".repeat(MAX_FILENAME_CHARS - 1);
        title.push_str(" tail");
        let output = sanitize_filename(&title);
        assert_eq!(output, "a".repeat(MAX_FILENAME_CHARS - 1));
        assert_safe(&output);
    }

    #[test]
    fn test_truncation_counts_characters_not_bytes() {
        let title = "é".repeat(MAX_FILENAME_CHARS + 50);
        let output = sanitize_filename(&title);
        assert_eq!(output.chars().count(), MAX_FILENAME_CHARS);
    }

    #[test]
    fn test_output_always_safe() {
        for input in ["", "  ", "?*?", "_._", "Dune: Messiah", "x".repeat(500).as_str(), "a . b"] {
            assert_safe(&sanitize_filename(input));
        }
    }
}
