//! One-shot augmentation.
//!
//! [`Augmenter`] runs the page-ready steps and metadata resolution in one
//! call and returns the rewritten page together with a report of what was
//! found. Use [`Page`] directly to drive scroll or toggle state.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::MarginaliaConfig;
use crate::index::HeadingNode;
use crate::metadata::{MetadataClient, MetadataEntry, MetadataSource};
use crate::page::Page;
use crate::reading_time::ReadabilityStats;
use crate::scroll::ScrollState;
use crate::toggle::ToggleState;
use crate::Result;

/// Augmented page plus what each step produced.
#[derive(Debug, Clone, Serialize)]
pub struct Augmented {
    pub html: String,
    pub title: Option<String>,
    pub toc: Vec<HeadingNode>,
    pub reading: Option<ReadabilityStats>,
    pub metadata: Vec<MetadataEntry>,
    pub scroll: ScrollState,
    pub toggles: BTreeMap<String, ToggleState>,
}

impl Augmented {
    /// Snapshot of a page view, rendered with its current scroll and toggle
    /// state.
    pub fn from_page(page: &Page) -> Result<Self> {
        Ok(Self {
            html: page.render()?,
            title: page.title().map(str::to_string),
            toc: page.toc().entries.clone(),
            reading: page.reading().copied(),
            metadata: page.cache().iter().cloned().collect(),
            scroll: page.scroll_state().clone(),
            toggles: page.toggles().iter().map(|c| (c.id().to_string(), c.state())).collect(),
        })
    }

    /// Serializes the report (without the HTML body) as JSON.
    pub fn report_json(&self) -> Result<serde_json::Value> {
        let mut value = serde_json::to_value(self)?;
        if let Some(object) = value.as_object_mut() {
            object.remove("html");
        }
        Ok(value)
    }
}

/// Runs every augmentation step over a page.
///
/// # Example
///
/// ```rust
/// use marginalia_core::{Augmenter, MarginaliaConfig};
///
/// let html = "<main><h2>Usage</h2><p>one two three</p></main><span data-reading-time></span>";
/// let augmented = Augmenter::new(MarginaliaConfig::default()).augment_static(html).unwrap();
///
/// assert_eq!(augmented.toc[0].id, "usage");
/// assert_eq!(augmented.reading.unwrap().word_count, 4);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Augmenter {
    config: MarginaliaConfig,
}

impl Augmenter {
    pub fn new(config: MarginaliaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MarginaliaConfig {
        &self.config
    }

    /// Index and reading time only; metadata targets are left as they are.
    pub fn augment_static(&self, html: &str) -> Result<Augmented> {
        let mut config = self.config.clone();
        config.metadata.enabled = false;
        let page = Page::ready(html, config)?;
        Augmented::from_page(&page)
    }

    /// Every step, resolving metadata through `client`.
    pub async fn augment<S: MetadataSource>(&self, html: &str, client: &MetadataClient<S>) -> Result<Augmented> {
        let mut page = Page::ready(html, self.config.clone())?;
        page.resolve_metadata(client).await?;
        Augmented::from_page(&page)
    }

    /// Every step, resolving metadata against the configured GitHub API.
    #[cfg(feature = "fetch")]
    pub async fn augment_with_github(&self, html: &str) -> Result<Augmented> {
        if !self.config.metadata.enabled {
            return self.augment_static(html);
        }
        let client = MetadataClient::github(self.config.metadata.clone())?;
        self.augment(html, &client).await
    }
}

/// Index and reading time with default settings.
pub fn augment_static(html: &str) -> Result<Augmented> {
    Augmenter::default().augment_static(html)
}

/// Every step with default settings, resolving metadata from GitHub.
#[cfg(feature = "fetch")]
pub async fn augment(html: &str) -> Result<Augmented> {
    Augmenter::default().augment_with_github(html).await
}
