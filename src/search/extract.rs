//! Best-effort extraction of book records from a search results page.
//!
//! The results page has no stable structure, so each field is located by a
//! small heuristic over the candidate's enclosing container. Every function
//! here is total: malformed markup degrades to empty fields, never errors.

use std::collections::HashSet;

use scraper::Html;
use tracing::debug;
use url::Url;

use crate::book::BookRecord;
use crate::metadata::{LANGUAGE_KEYWORDS, mentions_size_unit, parse_meta_information};

use super::document::MarkupNode;
use super::title::clean_title;

/// Path fragment that identifies a record detail link.
pub const DETAIL_PATH: &str = "/md5/";

const DETAIL_LINK_SELECTOR: &str = "a[href*='/md5/']";
const RESULT_CONTAINER_SELECTOR: &str = "[class*='book'], [class*='item'], [class*='result']";
const CONTAINER_TAGS: [&str; 4] = ["div", "article", "section", "li"];
const HEADING_SELECTORS: [&str; 4] = ["h1", "h2", "h3", "h4"];
const META_SELECTOR: &str = "div, span";
const AUTHOR_SELECTOR: &str = "div, span, p";

/// Format words that make a container worth scanning for a metadata line.
const META_FORMAT_KEYWORDS: [&str; 4] = ["epub", "pdf", "mobi", "azw"];

const MAX_META_LEN: usize = 500;
const MAX_LANGUAGE_META_LEN: usize = 200;
const MIN_TITLE_LEN: usize = 3;
const FALLBACK_TITLE_LEN: std::ops::Range<usize> = 6..200;
const AUTHOR_LEN: std::ops::Range<usize> = 3..300;
const AUTHOR_STOP_WORDS: [&str; 2] = ["download", "view"];

/// Parses `html` and extracts records, resolving links against `base_url`.
#[must_use]
pub fn extract_records(html: &str, base_url: &Url) -> Vec<BookRecord> {
    let document = Html::parse_document(html);
    extract_from_root(&document.root_element(), base_url)
}

/// Extracts records from an already-parsed document tree.
///
/// Candidates are collected by two overlapping strategies (detail links,
/// then result-like containers) and deduplicated by hash; later repeats of
/// a hash are dropped.
#[must_use]
pub fn extract_from_root<N: MarkupNode>(root: &N, base_url: &Url) -> Vec<BookRecord> {
    let mut candidates = root.find_all(DETAIL_LINK_SELECTOR);
    let direct = candidates.len();

    for container in root.find_all(RESULT_CONTAINER_SELECTOR) {
        if let Some(link) = container
            .find_all(DETAIL_LINK_SELECTOR)
            .into_iter()
            .find(|link| link.attribute("href").is_some_and(|href| !href.is_empty()))
        {
            candidates.push(link);
        }
    }
    debug!(
        direct,
        from_containers = candidates.len() - direct,
        "collected result candidates"
    );

    let mut seen = HashSet::new();
    let mut records = Vec::new();
    for anchor in candidates {
        let href = anchor.attribute("href").unwrap_or_default();
        let Some(hash) = hash_from_href(&href) else {
            continue;
        };
        if !seen.insert(hash.clone()) {
            continue;
        }

        let container = anchor
            .closest(&CONTAINER_TAGS)
            .or_else(|| anchor.parent_node())
            .unwrap_or_else(|| anchor.clone());

        let record = build_record(&anchor, &container, hash, &href, base_url);
        debug!(hash = %record.hash, title = %record.title, "extracted record");
        records.push(record);
    }
    records
}

fn build_record<N: MarkupNode>(
    anchor: &N,
    container: &N,
    hash: String,
    href: &str,
    base_url: &Url,
) -> BookRecord {
    let title = extract_title(anchor, container);
    let meta_text = extract_meta_text(container);
    let authors = extract_authors(container, &title);

    let meta = parse_meta_information(&meta_text);
    let mut format = meta.format;
    if format.is_empty() {
        format = format_from_title(&title).unwrap_or_default().to_string();
    }

    BookRecord {
        title,
        authors,
        publisher: String::new(),
        language: meta.language.trim().to_string(),
        format: clean_format(&format),
        size: meta.size.trim().to_string(),
        source_url: base_url
            .join(href)
            .map_or_else(|_| href.to_string(), |url| url.to_string()),
        hash,
    }
}

/// Returns the trailing path segment of a detail link (query and fragment removed).
#[must_use]
pub fn hash_from_href(href: &str) -> Option<String> {
    let path = href.split(['?', '#']).next().unwrap_or_default();
    if !path.contains(DETAIL_PATH) {
        return None;
    }
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .map(str::trim)
        .filter(|segment| !segment.is_empty() && *segment != DETAIL_PATH.trim_matches('/'))
        .map(str::to_string)
}

fn extract_title<N: MarkupNode>(anchor: &N, container: &N) -> String {
    let mut title = HEADING_SELECTORS
        .iter()
        .filter_map(|selector| container.find_first(selector))
        .map(|heading| heading.inner_text().trim().to_string())
        .find(|text| !text.is_empty())
        .unwrap_or_default();

    if title.is_empty() {
        title = container
            .attribute("data-title")
            .map(|value| value.trim().to_string())
            .unwrap_or_default();
    }
    if title.is_empty() {
        title = anchor.inner_text().trim().to_string();
    }
    if title.len() < MIN_TITLE_LEN
        && let Some(line) = first_title_like_line(&container.inner_text())
    {
        title = line;
    }

    if title.is_empty() {
        title
    } else {
        clean_title(&title)
    }
}

fn first_title_like_line(text: &str) -> Option<String> {
    text.trim()
        .lines()
        .map(str::trim)
        .find(|line| FALLBACK_TITLE_LEN.contains(&line.len()) && !line.starts_with("http"))
        .map(str::to_string)
}

fn extract_meta_text<N: MarkupNode>(container: &N) -> String {
    let container_lower = container.inner_text().to_lowercase();
    let mut meta_text = String::new();

    if META_FORMAT_KEYWORDS
        .iter()
        .any(|keyword| container_lower.contains(keyword))
    {
        for node in container.find_all(META_SELECTOR) {
            let raw = node.inner_text().trim().to_string();
            if raw.len() >= MAX_META_LEN || !looks_like_meta(&raw) {
                continue;
            }
            if meta_text.is_empty() || (raw.len() < meta_text.len() && raw.contains(',')) {
                meta_text = raw;
            }
        }
    }

    if meta_text.is_empty() {
        for language in LANGUAGE_KEYWORDS {
            if !container_lower.contains(language) {
                continue;
            }
            for node in container.find_all(META_SELECTOR) {
                let raw = node.inner_text().trim().to_string();
                if raw.len() < MAX_LANGUAGE_META_LEN && raw.to_lowercase().contains(language) {
                    meta_text = raw;
                }
            }
            if !meta_text.is_empty() {
                break;
            }
        }
    }

    meta_text
}

fn looks_like_meta(text: &str) -> bool {
    let lower = text.to_lowercase();
    META_FORMAT_KEYWORDS.iter().any(|k| lower.contains(k))
        || LANGUAGE_KEYWORDS.iter().any(|k| lower.contains(k))
        || mentions_size_unit(&lower)
}

fn extract_authors<N: MarkupNode>(container: &N, title: &str) -> String {
    container
        .find_all(AUTHOR_SELECTOR)
        .into_iter()
        .map(|node| node.inner_text().trim().to_string())
        .find(|text| looks_like_author(text, title))
        .unwrap_or_default()
}

fn looks_like_author(text: &str, title: &str) -> bool {
    if !AUTHOR_LEN.contains(&text.len()) || text.starts_with("http") || text == title {
        return false;
    }
    let lower = text.to_lowercase();
    if mentions_size_unit(&lower) || AUTHOR_STOP_WORDS.iter().any(|w| lower.contains(w)) {
        return false;
    }
    let has_upper = text.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = text.chars().any(|c| c.is_ascii_lowercase());
    has_upper && has_lower
}

fn format_from_title(title: &str) -> Option<&'static str> {
    let lower = title.to_lowercase();
    [(".epub", "epub"), (".pdf", "pdf"), (".mobi", "mobi"), (".azw3", "azw3")]
        .into_iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, tag)| tag)
}

/// Drops punctuation left in front of a format tag (e.g. `.epub`, `-pdf`).
fn clean_format(format: &str) -> String {
    let mut trimmed = format.trim();
    for prefix in ['.', '-', ':'] {
        trimmed = trimmed.strip_prefix(prefix).unwrap_or(trimmed);
    }
    let mut chars = trimmed.chars();
    if let Some(first) = chars.next()
        && !first.is_ascii_alphanumeric()
        && trimmed.len() > first.len_utf8()
    {
        return chars.as_str().trim().to_string();
    }
    trimmed.to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://archive.example/").unwrap()
    }

    #[test]
    fn test_hash_from_href_variants() {
        assert_eq!(hash_from_href("/md5/abc123").as_deref(), Some("abc123"));
        assert_eq!(hash_from_href("/md5/abc123/").as_deref(), Some("abc123"));
        assert_eq!(
            hash_from_href("https://archive.example/md5/ff00?ref=x#top").as_deref(),
            Some("ff00")
        );
        assert_eq!(hash_from_href("/md5/"), None);
        assert_eq!(hash_from_href("/search?q=md5"), None);
    }

    #[test]
    fn test_extracts_full_record_from_result_card() {
        let html = r#"<html><body>
            <div class="result-row">
              <a href="/md5/aaa111"><h3>upload/Dune_Messiah.epub</h3></a>
              <div>Frank Herbert</div>
              <div>English, epub, 2.5 MB</div>
            </div>
        </body></html>"#;
        let records = extract_records(html, &base());
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.hash, "aaa111");
        assert_eq!(record.title, "Dune Messiah");
        assert_eq!(record.authors, "Frank Herbert");
        assert_eq!(record.language, "English");
        assert_eq!(record.format, "epub");
        assert_eq!(record.size, "2.5 MB");
        assert_eq!(record.source_url, "https://archive.example/md5/aaa111");
    }

    #[test]
    fn test_duplicate_hash_emits_one_record() {
        let html = r#"<html><body>
            <div class="item"><a href="/md5/dup"><h2>First Copy Title</h2></a></div>
            <div class="item"><a href="/md5/dup">Second Copy Title</a></div>
            <div><a href="/md5/other">Another Book Title</a></div>
        </body></html>"#;
        let records = extract_records(html, &base());
        let dup_count = records.iter().filter(|r| r.hash == "dup").count();
        assert_eq!(dup_count, 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "First Copy Title");
    }

    #[test]
    fn test_title_falls_back_to_data_title_then_anchor_text() {
        let html = r#"<html><body>
            <div data-title="Data Attribute Title"><a href="/md5/one">ignored anchor</a></div>
            <div><a href="/md5/two">Anchor Text Title</a></div>
        </body></html>"#;
        let records = extract_records(html, &base());
        assert_eq!(records[0].title, "Data Attribute Title");
        assert_eq!(records[1].title, "Anchor Text Title");
    }

    #[test]
    fn test_short_title_falls_back_to_container_line() {
        let html = "<html><body><div><a href=\"/md5/img\"></a>\nhttps://mirror.example/file\nThe Long Fallback Title\n</div></body></html>";
        let records = extract_records(html, &base());
        assert_eq!(records[0].title, "The Long Fallback Title");
    }

    #[test]
    fn test_meta_prefers_shorter_comma_line() {
        let html = r#"<html><body><div>
            <a href="/md5/m1">Some Book Title</a>
            <span>English epub download from mirror number two</span>
            <span>English, pdf, 4 MB</span>
        </div></body></html>"#;
        let records = extract_records(html, &base());
        assert_eq!(records[0].format, "pdf");
        assert_eq!(records[0].size, "4 MB");
        assert_eq!(records[0].language, "English");
    }

    #[test]
    fn test_meta_language_only_fallback() {
        let html = r#"<html><body><div>
            <a href="/md5/l1">Some Book Title</a>
            <span>Russian, 2 MB</span>
        </div></body></html>"#;
        let records = extract_records(html, &base());
        assert_eq!(records[0].language, "Russian");
        assert_eq!(records[0].size, "2 MB");
        assert_eq!(records[0].format, "");
        assert_eq!(records[0].authors, "");
    }

    #[test]
    fn test_author_heuristic_skips_labels_and_sizes() {
        let html = r#"<html><body><div>
            <a href="/md5/au"><h3>Title Of Book</h3></a>
            <span>DOWNLOAD</span>
            <span>View details</span>
            <span>1.2 MB</span>
            <span>Ursula K. Le Guin</span>
        </div></body></html>"#;
        let records = extract_records(html, &base());
        assert_eq!(records[0].authors, "Ursula K. Le Guin");
    }

    #[test]
    fn test_format_from_title_as_last_resort() {
        assert_eq!(format_from_title("notes.pdf copy"), Some("pdf"));
        assert_eq!(format_from_title("no format"), None);
    }

    #[test]
    fn test_clean_format_strips_leading_punctuation() {
        assert_eq!(clean_format(".epub"), "epub");
        assert_eq!(clean_format("-pdf"), "pdf");
        assert_eq!(clean_format("[mobi"), "mobi");
        assert_eq!(clean_format("epub"), "epub");
        assert_eq!(clean_format("."), "");
        assert_eq!(clean_format(""), "");
    }

    #[test]
    fn test_malformed_markup_degrades_gracefully() {
        let html = r#"<div><a href="/md5/broken"><h3>Unclosed <b>Tags <span>English, epub"#;
        let records = extract_records(html, &base());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].hash, "broken");
        assert!(extract_records("", &base()).is_empty());
        assert!(extract_records("<<<>>>", &base()).is_empty());
    }

    #[test]
    fn test_anchor_without_hash_is_skipped() {
        let html = r#"<html><body><div><a href="/md5/">Empty Hash Link</a></div></body></html>"#;
        assert!(extract_records(html, &base()).is_empty());
    }
}
