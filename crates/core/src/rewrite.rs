//! Streaming HTML rewriting.
//!
//! Components read the page through [`crate::parse::Document`] and write
//! their results back through `lol_html`. This module holds the shared
//! rewriter driver and selector validation.

use lol_html::{HtmlRewriter, Selector, Settings};

use crate::{MarginaliaError, Result};

/// Runs a rewriter over `html` with the given handlers.
///
/// A rewriting error leaves the document unmodified.
pub(crate) fn rewrite(html: &str, settings: Settings<'_, '_>) -> String {
    let mut output = String::with_capacity(html.len());
    let mut rewriter = HtmlRewriter::new(settings, |c: &[u8]| {
        output.push_str(&String::from_utf8_lossy(c));
    });

    if let Err(err) = rewriter.write(html.as_bytes()) {
        tracing::warn!(error = %err, "html rewrite failed; leaving document unmodified");
        return html.to_string();
    }

    if let Err(err) = rewriter.end() {
        tracing::warn!(error = %err, "html rewrite failed; leaving document unmodified");
        return html.to_string();
    }

    if output.is_empty() { html.to_string() } else { output }
}

/// Checks that a selector is usable by both the query and the rewrite side.
///
/// The rewriter supports a subset of CSS, so a selector that `scraper`
/// accepts may still be rejected here.
pub fn validate_selector(selector: &str) -> Result<()> {
    if selector.trim().is_empty() {
        return Err(MarginaliaError::ConfigError("selector must not be empty".to_string()));
    }

    crate::parse::parse_selector(selector)?;
    selector
        .parse::<Selector>()
        .map_err(|e| MarginaliaError::HtmlParseError(format!("Unsupported selector `{}`: {}", selector, e)))?;

    Ok(())
}

/// Escapes text for inclusion in HTML content or a quoted attribute.
pub(crate) fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use lol_html::element;

    #[test]
    fn test_rewrite_sets_attribute() {
        let html = r#"<div><p>one</p><p>two</p></div>"#;
        let output = rewrite(
            html,
            Settings {
                element_content_handlers: vec![element!("p", |el| {
                    el.set_attribute("data-seen", "1")?;
                    Ok(())
                })],
                ..Default::default()
            },
        );

        assert_eq!(output.matches(r#"data-seen="1""#).count(), 2);
    }

    #[test]
    fn test_validate_selector() {
        assert!(validate_selector("main").is_ok());
        assert!(validate_selector("[data-toc]").is_ok());
        assert!(validate_selector("#content .toc").is_ok());
        assert!(matches!(validate_selector(""), Err(MarginaliaError::ConfigError(_))));
        assert!(matches!(validate_selector("[[bad"), Err(MarginaliaError::HtmlParseError(_))));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">&</a>"#), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
        assert_eq!(escape_html("plain"), "plain");
    }
}
