//! Table-of-contents construction from heading structure.
//!
//! The builder scans `h1`..`h6` inside a content container, assigns every
//! heading a unique anchor id, nests the headings into a forest by relative
//! level, and renders that forest as a navigation list.
//!
//! # Example
//!
//! ```rust
//! use marginalia_core::index::{IndexBuilder, IndexConfig};
//!
//! let html = r#"<nav data-toc></nav><main><h1>Intro</h1><h2>Setup</h2><h1>Usage</h1></main>"#;
//! let (output, toc) = IndexBuilder::new(IndexConfig::default()).run(html).unwrap();
//!
//! assert_eq!(toc.entries.len(), 2);
//! assert_eq!(toc.entries[0].children[0].id, "setup");
//! assert!(output.contains(r##"<a href="#usage">Usage</a>"##));
//! ```

use std::cell::Cell;
use std::collections::HashSet;

use lol_html::html_content::ContentType;
use lol_html::{Settings, element};
use serde::{Deserialize, Serialize};

use crate::parse::{Document, heading_level};
use crate::rewrite::{escape_html, rewrite, validate_selector};
use crate::{MarginaliaError, Result};

const HEADING_SELECTOR: &str = "h1, h2, h3, h4, h5, h6";

/// Configuration for table-of-contents generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Selector for the element whose headings are indexed (default: `main`).
    pub container: String,
    /// Selector for the element that receives the navigation list (default: `[data-toc]`).
    pub nav_target: String,
    /// Shallowest heading level indexed (default: 1).
    pub min_level: u8,
    /// Deepest heading level indexed (default: 6).
    pub max_level: u8,
    /// Separator used inside slugs and before collision suffixes (default: `-`).
    pub separator: char,
    /// Maximum slug length in characters, before any collision suffix (default: 64).
    pub max_slug_len: usize,
    /// Slug base for headings without any alphanumeric text (default: `section`).
    pub placeholder: String,
    /// Class of the rendered root list (default: `toc`).
    pub list_class: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            container: "main".to_string(),
            nav_target: "[data-toc]".to_string(),
            min_level: 1,
            max_level: 6,
            separator: '-',
            max_slug_len: 64,
            placeholder: "section".to_string(),
            list_class: "toc".to_string(),
        }
    }
}

impl IndexConfig {
    /// Checks selectors and ranges.
    pub fn validate(&self) -> Result<()> {
        validate_selector(&self.container)?;
        validate_selector(&self.nav_target)?;

        if !(1..=6).contains(&self.min_level) || !(1..=6).contains(&self.max_level) {
            return Err(MarginaliaError::ConfigError("heading levels must be within 1..=6".to_string()));
        }
        if self.min_level > self.max_level {
            return Err(MarginaliaError::ConfigError(format!(
                "min_level {} is greater than max_level {}",
                self.min_level, self.max_level
            )));
        }
        if self.max_slug_len == 0 {
            return Err(MarginaliaError::ConfigError("max_slug_len must be positive".to_string()));
        }
        if self.separator.is_alphanumeric() || self.separator.is_whitespace() {
            return Err(MarginaliaError::ConfigError(format!(
                "slug separator {:?} must be a non-alphanumeric, non-whitespace character",
                self.separator
            )));
        }
        Ok(())
    }
}

/// One heading and the headings nested beneath it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeadingNode {
    pub level: u8,
    pub text: String,
    pub id: String,
    pub children: Vec<HeadingNode>,
}

impl HeadingNode {
    fn new(level: u8, text: String, id: String) -> Self {
        Self { level, text, id, children: Vec::new() }
    }

    fn collect_preorder<'a>(&'a self, out: &mut Vec<&'a HeadingNode>) {
        out.push(self);
        for child in &self.children {
            child.collect_preorder(out);
        }
    }
}

/// The heading forest of one page plus the id assignments to write back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableOfContents {
    /// Root headings in document order.
    pub entries: Vec<HeadingNode>,
    /// For every heading element in the document (in document order), the id
    /// to assign, or `None` when the heading is left as is.
    #[serde(skip)]
    assignments: Vec<Option<String>>,
}

impl TableOfContents {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All headings in pre-order, which is document order.
    pub fn preorder(&self) -> Vec<&HeadingNode> {
        let mut out = Vec::new();
        for entry in &self.entries {
            entry.collect_preorder(&mut out);
        }
        out
    }

    /// Number of headings in the forest.
    pub fn len(&self) -> usize {
        self.preorder().len()
    }

    /// Renders the forest as nested `<ul>` lists. Empty for an empty forest.
    pub fn render(&self, list_class: &str) -> String {
        if self.entries.is_empty() {
            return String::new();
        }
        let mut html = String::new();
        render_list(&self.entries, Some(list_class), &mut html);
        html
    }
}

fn render_list(nodes: &[HeadingNode], class: Option<&str>, html: &mut String) {
    match class {
        Some(class) if !class.is_empty() => html.push_str(&format!(r#"<ul class="{}">"#, escape_html(class))),
        _ => html.push_str("<ul>"),
    }
    for node in nodes {
        html.push_str(&format!(
            r##"<li><a href="#{}">{}</a>"##,
            escape_html(&node.id),
            escape_html(&node.text)
        ));
        if !node.children.is_empty() {
            render_list(&node.children, None, html);
        }
        html.push_str("</li>");
    }
    html.push_str("</ul>");
}

/// Converts heading text to an anchor-safe slug.
///
/// Lowercases, collapses every run of non-alphanumeric characters into one
/// `separator`, trims separators from both ends, and truncates to `max_len`
/// characters. Returns an empty string when `text` has no alphanumerics.
pub fn slugify(text: &str, separator: char, max_len: usize) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_separator = false;

    for ch in text.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push(separator);
            }
            pending_separator = false;
            slug.push(ch);
        } else {
            pending_separator = true;
        }
    }

    let truncated: String = slug.chars().take(max_len).collect();
    truncated.trim_end_matches(separator).to_string()
}

/// Hands out unique ids, seeded with the ids already taken in the document.
#[derive(Debug, Clone)]
pub struct Slugger {
    taken: HashSet<String>,
    separator: char,
    max_len: usize,
    placeholder: String,
}

impl Slugger {
    pub fn new(taken: HashSet<String>, config: &IndexConfig) -> Self {
        Self {
            taken,
            separator: config.separator,
            max_len: config.max_slug_len,
            placeholder: config.placeholder.clone(),
        }
    }

    /// Returns a fresh id for a heading with `text` at 1-based `position`.
    pub fn unique(&mut self, text: &str, position: usize) -> String {
        let mut base = slugify(text, self.separator, self.max_len);
        if base.is_empty() {
            base = format!("{}{}{}", self.placeholder, self.separator, position);
        }

        let mut candidate = base.clone();
        let mut suffix = 1;
        while self.taken.contains(&candidate) {
            candidate = format!("{}{}{}", base, self.separator, suffix);
            suffix += 1;
        }

        self.taken.insert(candidate.clone());
        candidate
    }
}

/// Nests headings into a forest by relative level.
///
/// Headings may skip levels: an `h3` directly after an `h1` becomes its child.
pub fn build_forest<I>(headings: I) -> Vec<HeadingNode>
where
    I: IntoIterator<Item = HeadingNode>,
{
    let mut roots = Vec::new();
    let mut stack: Vec<HeadingNode> = Vec::new();

    fn attach(node: HeadingNode, stack: &mut [HeadingNode], roots: &mut Vec<HeadingNode>) {
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => roots.push(node),
        }
    }

    for heading in headings {
        while stack.last().is_some_and(|top| top.level >= heading.level) {
            if let Some(done) = stack.pop() {
                attach(done, &mut stack, &mut roots);
            }
        }
        stack.push(heading);
    }

    while let Some(done) = stack.pop() {
        attach(done, &mut stack, &mut roots);
    }

    roots
}

/// Scans the document and computes the table of contents without modifying it.
///
/// An absent container yields an empty table.
pub fn build_index(doc: &Document, config: &IndexConfig) -> Result<TableOfContents> {
    let Some(container) = doc.select_first(&config.container)? else {
        tracing::debug!(container = %config.container, "index container not found");
        return Ok(TableOfContents::default());
    };

    let taken = doc.ids().iter().map(|id| id.trim().to_string()).collect();
    let mut slugger = Slugger::new(taken, config);
    let mut assignments = Vec::new();
    let mut flat = Vec::new();

    for heading in doc.select(HEADING_SELECTOR)? {
        let level = heading.heading_level().unwrap_or(6);
        let indexed = heading.is_descendant_of(&container) && (config.min_level..=config.max_level).contains(&level);

        if !indexed {
            assignments.push(None);
            continue;
        }

        let text = heading.normalized_text();
        let (id, assigned) = match heading.attr("id") {
            Some(raw) if !raw.trim().is_empty() => {
                let existing = raw.trim();
                // Surrounding whitespace would break the `#id` link.
                let rewritten = (existing != raw).then(|| existing.to_string());
                (existing.to_string(), rewritten)
            }
            _ => {
                let id = slugger.unique(&text, flat.len() + 1);
                (id.clone(), Some(id))
            }
        };

        assignments.push(assigned);
        flat.push(HeadingNode::new(level, text, id));
    }

    tracing::debug!(headings = flat.len(), "indexed headings");
    Ok(TableOfContents { entries: build_forest(flat), assignments })
}

/// Writes heading ids and the navigation list into `html`.
pub fn apply_index(html: &str, toc: &TableOfContents, config: &IndexConfig) -> Result<String> {
    validate_selector(&config.nav_target)?;

    if toc.assignments.iter().all(Option::is_none) && toc.is_empty() {
        return Ok(html.to_string());
    }

    let nav = toc.render(&config.list_class);
    let position = Cell::new(0usize);
    let nav_written = Cell::new(false);

    let output = rewrite(
        html,
        Settings {
            element_content_handlers: vec![
                element!("*", |el| {
                    if heading_level(&el.tag_name()).is_none() {
                        return Ok(());
                    }
                    let index = position.get();
                    position.set(index + 1);
                    if let Some(Some(id)) = toc.assignments.get(index) {
                        el.set_attribute("id", id)?;
                    }
                    Ok(())
                }),
                element!(config.nav_target.as_str(), |el| {
                    if !nav.is_empty() && !nav_written.get() {
                        el.set_inner_content(&nav, ContentType::Html);
                        nav_written.set(true);
                    }
                    Ok(())
                }),
            ],
            ..Default::default()
        },
    );

    Ok(output)
}

/// Runs the scan and the rewrite in one step.
pub struct IndexBuilder {
    config: IndexConfig,
}

impl IndexBuilder {
    pub fn new(config: IndexConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Returns the rewritten page and its table of contents.
    pub fn run(&self, html: &str) -> Result<(String, TableOfContents)> {
        let doc = Document::parse(html)?;
        let toc = build_index(&doc, &self.config)?;
        let output = apply_index(html, &toc, &self.config)?;
        Ok((output, toc))
    }
}
