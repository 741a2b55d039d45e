//! Minimal document-tree capability used by the result extractor.
//!
//! Extraction heuristics only need to find descendants by CSS selector,
//! read text and attributes, and walk to ancestors. [`MarkupNode`] captures
//! exactly that, and is implemented for [`scraper::ElementRef`].

use scraper::{ElementRef, Selector};

/// Read-only view of an element in a parsed document.
///
/// All methods are total. An unparsable selector matches nothing.
pub trait MarkupNode: Sized + Clone {
    /// Returns descendants (excluding `self`) matching `selector`, in document order.
    fn find_all(&self, selector: &str) -> Vec<Self>;

    /// Returns the concatenated text content of the element and its descendants.
    fn inner_text(&self) -> String;

    /// Returns an attribute value, if present.
    fn attribute(&self, name: &str) -> Option<String>;

    /// Returns the parent element, if any.
    fn parent_node(&self) -> Option<Self>;

    /// Returns the lowercase tag name.
    fn tag(&self) -> String;

    /// Returns the first descendant matching `selector`.
    fn find_first(&self, selector: &str) -> Option<Self> {
        self.find_all(selector).into_iter().next()
    }

    /// Returns the nearest element, starting with `self`, whose tag is in `tags`.
    fn closest(&self, tags: &[&str]) -> Option<Self> {
        let mut current = Some(self.clone());
        while let Some(node) = current {
            if tags.contains(&node.tag().as_str()) {
                return Some(node);
            }
            current = node.parent_node();
        }
        None
    }
}

impl MarkupNode for ElementRef<'_> {
    fn find_all(&self, selector: &str) -> Vec<Self> {
        let Ok(selector) = Selector::parse(selector) else {
            return Vec::new();
        };
        let scope = self.id();
        self.select(&selector)
            .filter(|element| element.id() != scope)
            .collect()
    }

    fn inner_text(&self) -> String {
        self.text().collect()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.value().attr(name).map(str::to_string)
    }

    fn parent_node(&self) -> Option<Self> {
        self.parent().and_then(ElementRef::wrap)
    }

    fn tag(&self) -> String {
        self.value().name().to_ascii_lowercase()
    }
}
