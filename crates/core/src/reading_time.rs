//! Word count and reading-time estimation.
//!
//! Counts the visible words inside a content container and writes a
//! "N minutes" label into a display element.
//!
//! # Example
//!
//! ```rust
//! use marginalia_core::reading_time::{ReadingTimeAnalyzer, ReadingTimeConfig};
//!
//! let words = "word ".repeat(500);
//! let html = format!(r#"<span data-reading-time></span><main><p>{}</p></main>"#, words);
//! let config = ReadingTimeConfig { words_per_minute: 250, ..Default::default() };
//! let (output, stats) = ReadingTimeAnalyzer::new(config).run(&html).unwrap();
//!
//! let stats = stats.unwrap();
//! assert_eq!(stats.estimated_minutes, 2);
//! assert!(output.contains(">2 minutes</span>"));
//! ```

use lol_html::html_content::ContentType;
use lol_html::{Settings, element};
use regex::Regex;
use scraper::{ElementRef, Node};
use serde::{Deserialize, Serialize};

use crate::parse::Document;
use crate::rewrite::{rewrite, validate_selector};
use crate::{MarginaliaError, Result};

/// Elements whose text never counts toward reading time.
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// What to display when the container has no words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyPolicy {
    /// Report a minimum of one minute.
    #[default]
    MinimumOne,
    /// Remove the display element.
    Omit,
}

/// Configuration for reading-time estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadingTimeConfig {
    /// Selector for the element whose text is counted (default: `main`).
    pub container: String,
    /// Selector for the element that displays the estimate (default: `[data-reading-time]`).
    pub display_target: String,
    /// Reading speed (default: 200).
    pub words_per_minute: u32,
    /// Behavior for an empty container (default: minimum one minute).
    pub empty: EmptyPolicy,
    /// Unit label for exactly one minute (default: `minute`).
    pub singular: String,
    /// Unit label for any other count (default: `minutes`).
    pub plural: String,
}

impl Default for ReadingTimeConfig {
    fn default() -> Self {
        Self {
            container: "main".to_string(),
            display_target: "[data-reading-time]".to_string(),
            words_per_minute: 200,
            empty: EmptyPolicy::MinimumOne,
            singular: "minute".to_string(),
            plural: "minutes".to_string(),
        }
    }
}

impl ReadingTimeConfig {
    pub fn validate(&self) -> Result<()> {
        validate_selector(&self.container)?;
        validate_selector(&self.display_target)?;
        if self.words_per_minute == 0 {
            return Err(MarginaliaError::ConfigError("words_per_minute must be positive".to_string()));
        }
        Ok(())
    }
}

/// Word count and reading time for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReadabilityStats {
    pub word_count: usize,
    pub estimated_minutes: u32,
    pub words_per_minute: u32,
}

impl ReadabilityStats {
    /// Computes `ceil(word_count / words_per_minute)`, floored at one minute.
    pub fn new(word_count: usize, words_per_minute: u32) -> Self {
        let wpm = words_per_minute.max(1) as usize;
        let minutes = word_count.div_ceil(wpm).max(1);
        Self {
            word_count,
            estimated_minutes: u32::try_from(minutes).unwrap_or(u32::MAX),
            words_per_minute: wpm as u32,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.word_count == 0
    }

    /// Formats the estimate, e.g. "1 minute" or "7 minutes".
    pub fn label(&self, singular: &str, plural: &str) -> String {
        let unit = if self.estimated_minutes == 1 { singular } else { plural };
        format!("{} {}", self.estimated_minutes, unit)
    }
}

/// Collects the text of `root` that a reader would actually see.
pub fn visible_text(root: ElementRef<'_>) -> String {
    let hidden_style = Regex::new(r"(?i)(display\s*:\s*none|visibility\s*:\s*hidden)").unwrap();
    let mut chunks = Vec::new();
    collect_visible(root, &hidden_style, &mut chunks);
    chunks.join(" ")
}

fn collect_visible<'a>(element: ElementRef<'a>, hidden_style: &Regex, chunks: &mut Vec<&'a str>) {
    if is_hidden(element, hidden_style) {
        return;
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => chunks.push(text),
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    collect_visible(child_element, hidden_style, chunks);
                }
            }
            _ => {}
        }
    }
}

fn is_hidden(element: ElementRef<'_>, hidden_style: &Regex) -> bool {
    let value = element.value();
    if SKIPPED_TAGS.contains(&value.name()) {
        return true;
    }
    if value.attr("hidden").is_some() {
        return true;
    }
    if value.attr("aria-hidden").is_some_and(|v| v.trim().eq_ignore_ascii_case("true")) {
        return true;
    }
    value.attr("style").is_some_and(|style| hidden_style.is_match(style))
}

/// Counts whitespace-separated words.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Computes reading statistics, or `None` when the container is absent.
pub fn analyze(doc: &Document, config: &ReadingTimeConfig) -> Result<Option<ReadabilityStats>> {
    let Some(container) = doc.select_first(&config.container)? else {
        tracing::debug!(container = %config.container, "reading-time container not found");
        return Ok(None);
    };

    let word_count = count_words(&visible_text(container.element_ref()));
    let stats = ReadabilityStats::new(word_count, config.words_per_minute);
    tracing::debug!(words = stats.word_count, minutes = stats.estimated_minutes, "estimated reading time");
    Ok(Some(stats))
}

/// Writes the estimate into the first display element.
pub fn apply_reading_time(html: &str, stats: &ReadabilityStats, config: &ReadingTimeConfig) -> Result<String> {
    validate_selector(&config.display_target)?;

    let omit = stats.is_empty() && config.empty == EmptyPolicy::Omit;
    let label = stats.label(&config.singular, &config.plural);
    let word_count = stats.word_count.to_string();
    let mut written = false;

    let output = rewrite(
        html,
        Settings {
            element_content_handlers: vec![element!(config.display_target.as_str(), |el| {
                if written {
                    return Ok(());
                }
                written = true;
                if omit {
                    el.remove();
                    return Ok(());
                }
                el.set_attribute("data-word-count", &word_count)?;
                el.set_inner_content(&label, ContentType::Text);
                Ok(())
            })],
            ..Default::default()
        },
    );

    Ok(output)
}

/// Runs the analysis and the rewrite in one step.
pub struct ReadingTimeAnalyzer {
    config: ReadingTimeConfig,
}

impl ReadingTimeAnalyzer {
    pub fn new(config: ReadingTimeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReadingTimeConfig {
        &self.config
    }

    /// Returns the rewritten page and the statistics, if the container exists.
    pub fn run(&self, html: &str) -> Result<(String, Option<ReadabilityStats>)> {
        let doc = Document::parse(html)?;
        match analyze(&doc, &self.config)? {
            Some(stats) => Ok((apply_reading_time(html, &stats, &self.config)?, Some(stats))),
            None => Ok((html.to_string(), None)),
        }
    }
}
