//! HTML parsing and read-only DOM queries.
//!
//! This module provides the [`Document`] and [`Element`] types used by every
//! component to inspect the rendered page before rewriting it.
//!
//! # Example
//!
//! ```rust
//! use marginalia_core::parse::Document;
//!
//! let html = r#"
//!     <html>
//!         <body>
//!             <main><h1>Title</h1><p class="content">Paragraph</p></main>
//!         </body>
//!     </html>
//! "#;
//!
//! let doc = Document::parse(html).unwrap();
//! let paragraphs = doc.select("p.content").unwrap();
//! assert_eq!(paragraphs.len(), 1);
//! ```

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};

use crate::{MarginaliaError, Result};

/// Parses a CSS selector, mapping failures to [`MarginaliaError::HtmlParseError`].
pub fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| MarginaliaError::HtmlParseError(format!("Invalid selector: {}", e)))
}

/// Represents a parsed HTML document.
///
/// A Document wraps a rendered page and provides CSS-selector queries in
/// document order.
pub struct Document {
    html: Html,
}

impl Document {
    /// Parses HTML from a string.
    ///
    /// Parsing is lenient: malformed markup is repaired the way browsers do,
    /// so this only fails for inputs the caller should never see in practice.
    pub fn parse(html: &str) -> Result<Self> {
        let html = Html::parse_document(html);
        Ok(Self { html })
    }

    /// Selects elements using a CSS selector, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`MarginaliaError::HtmlParseError`] if the selector is invalid.
    ///
    /// # Example
    ///
    /// ```rust
    /// use marginalia_core::parse::Document;
    ///
    /// let html = r#"<p class="content">First</p><p class="content">Second</p>"#;
    /// let doc = Document::parse(html).unwrap();
    /// let elements = doc.select("p.content").unwrap();
    /// assert_eq!(elements.len(), 2);
    /// ```
    pub fn select(&'_ self, selector: &str) -> Result<Vec<Element<'_>>> {
        let sel = parse_selector(selector)?;
        Ok(self.html.select(&sel).map(|el| Element { element: el }).collect())
    }

    /// Selects the first element matching a CSS selector.
    pub fn select_first(&'_ self, selector: &str) -> Result<Option<Element<'_>>> {
        let sel = parse_selector(selector)?;
        Ok(self.html.select(&sel).next().map(|el| Element { element: el }))
    }

    /// Gets the title of the document.
    pub fn title(&self) -> Option<String> {
        let selector = Selector::parse("title").ok()?;
        self.html
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>())
    }

    /// Collects every `id` attribute value present in the document.
    pub fn ids(&self) -> HashSet<String> {
        self.html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter_map(|el| el.value().id())
            .map(str::to_string)
            .collect()
    }
}

/// A wrapper around scraper's ElementRef.
///
/// # Example
///
/// ```rust
/// use marginalia_core::parse::Document;
///
/// let html = r#"<a href="https://example.com">Link text</a>"#;
/// let doc = Document::parse(html).unwrap();
/// let link = &doc.select("a").unwrap()[0];
///
/// assert_eq!(link.text(), "Link text");
/// assert_eq!(link.attr("href"), Some("https://example.com"));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Element<'a> {
    element: ElementRef<'a>,
}

impl<'a> Element<'a> {
    /// Gets the text content of this element.
    pub fn text(&self) -> String {
        self.element.text().collect()
    }

    /// Gets the text content with whitespace runs collapsed to single spaces.
    pub fn normalized_text(&self) -> String {
        self.text().split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Gets the value of an attribute.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element.value().attr(name)
    }

    /// Gets the lowercase tag name of this element.
    pub fn tag_name(&self) -> String {
        self.element.value().name().to_lowercase()
    }

    /// Returns the heading level for `h1`..`h6`, `None` for any other tag.
    pub fn heading_level(&self) -> Option<u8> {
        heading_level(self.element.value().name())
    }

    /// True if `self` is nested (at any depth) inside `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &Element<'_>) -> bool {
        let target = ancestor.element.id();
        self.element.ancestors().any(|node| node.id() == target)
    }

    /// Gets the underlying scraper element for tree traversal.
    pub fn element_ref(&self) -> ElementRef<'a> {
        self.element
    }
}

/// Maps a tag name to its heading level.
pub fn heading_level(tag_name: &str) -> Option<u8> {
    match tag_name.to_ascii_lowercase().as_str() {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_HTML: &str = r#"
        <!DOCTYPE html>
        <html lang="en">
        <head>
            <meta charset="UTF-8">
            <title>Test Page</title>
        </head>
        <body>
            <main id="content">
                <h1>Heading</h1>
                <p class="content">Paragraph 1</p>
                <p class="content">Paragraph   2
                   continued</p>
            </main>
            <a id="home" href="https://example.com">Link</a>
        </body>
        </html>
    "#;

    #[test]
    fn test_parse_document() {
        let doc = Document::parse(SAMPLE_HTML).unwrap();
        assert_eq!(doc.title(), Some("Test Page".to_string()));
    }

    #[test]
    fn test_select_elements() {
        let doc = Document::parse(SAMPLE_HTML).unwrap();
        let elements = doc.select("p.content").unwrap();

        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].text(), "Paragraph 1");
        assert_eq!(elements[1].normalized_text(), "Paragraph 2 continued");
    }

    #[test]
    fn test_select_first_missing() {
        let doc = Document::parse(SAMPLE_HTML).unwrap();
        assert!(doc.select_first("aside").unwrap().is_none());
        assert!(doc.select_first("main").unwrap().is_some());
    }

    #[test]
    fn test_invalid_selector() {
        let doc = Document::parse(SAMPLE_HTML).unwrap();
        let result = doc.select("[[invalid");

        assert!(matches!(result, Err(MarginaliaError::HtmlParseError(_))));
    }

    #[test]
    fn test_ids() {
        let doc = Document::parse(SAMPLE_HTML).unwrap();
        let ids = doc.ids();
        assert!(ids.contains("content"));
        assert!(ids.contains("home"));
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_is_descendant_of() {
        let doc = Document::parse(SAMPLE_HTML).unwrap();
        let main = doc.select_first("main").unwrap().unwrap();
        let heading = doc.select_first("h1").unwrap().unwrap();
        let link = doc.select_first("a").unwrap().unwrap();

        assert!(heading.is_descendant_of(&main));
        assert!(!link.is_descendant_of(&main));
        assert_eq!(heading.heading_level(), Some(1));
        assert_eq!(link.heading_level(), None);
    }
}
