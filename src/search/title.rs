//! Title cleanup for scraped result text.
//!
//! Result titles on the archive are often raw upload paths such as
//! `lgli/R:\Library\Some_Book.epub`. [`clean_title`] reduces them to a
//! readable title and is idempotent: cleaning a cleaned title is a no-op.

/// Maximum number of leading path segments stripped in one pass.
const MAX_PATH_STRIPS: usize = 5;

/// Minimum length (exclusive) of the remainder for a path strip to be accepted.
const MIN_STRIPPED_TITLE_LEN: usize = 5;

/// Archive-internal marker that blocks a path strip.
const ARCHIVE_MARKER: &str = "!!";

/// Collection prefixes removed from the start of a title.
const PATH_PREFIXES: [&str; 5] = ["lgli/", "upload/", "nexusstc/", "!!1", "!!"];

/// File extensions removed from the end of a title (case-insensitive).
const TITLE_EXTENSIONS: [&str; 6] = [".epub", ".mobi", ".pdf", ".azw3", ".zip", ".nodrm"];

/// Cleans a raw scraped title into a human-readable one.
///
/// # Example
///
/// ```
/// use bookcourier_core::search::clean_title;
///
/// assert_eq!(clean_title("upload/My_Book_Title.epub"), "My Book Title");
/// ```
#[must_use]
pub fn clean_title(raw: &str) -> String {
    // A changing pass either shortens the title or replaces a backslash or
    // underscore, and neither is ever reintroduced.
    let mut current = clean_title_once(raw);
    loop {
        let next = clean_title_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn clean_title_once(raw: &str) -> String {
    let mut title = strip_leading_paths(raw.trim());

    title = title.replace('\\', " ");

    for prefix in PATH_PREFIXES {
        if let Some(rest) = title.strip_prefix(prefix) {
            title = rest.trim().to_string();
        }
    }

    if let Some(stem) = strip_extension(&title) {
        title = stem.to_string();
    }

    title = title.replace('_', " ");

    // Collapsing whitespace also folds newlines, so the result is one line.
    title = title.split_whitespace().collect::<Vec<_>>().join(" ");

    if let Some(colon) = title.find(':')
        && colon < 3
    {
        title = title[colon + 1..].trim().to_string();
    }

    title
}

/// Repeatedly drops `dir/` prefixes while the remainder still looks like a title.
fn strip_leading_paths(title: &str) -> String {
    let mut title = title.to_string();
    for _ in 0..MAX_PATH_STRIPS {
        let Some(slash) = title.rfind('/') else {
            break;
        };
        if slash + 1 >= title.len() {
            break;
        }
        let candidate = title[slash + 1..].trim();
        if candidate.len() > MIN_STRIPPED_TITLE_LEN && !candidate.starts_with(ARCHIVE_MARKER) {
            title = candidate.to_string();
        } else {
            break;
        }
    }
    title
}

fn strip_extension(title: &str) -> Option<&str> {
    TITLE_EXTENSIONS.iter().find_map(|ext| {
        let cut = title.len().checked_sub(ext.len())?;
        if !title.is_char_boundary(cut) {
            return None;
        }
        title[cut..]
            .eq_ignore_ascii_case(ext)
            .then(|| &title[..cut])
    })
}
