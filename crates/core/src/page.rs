//! One page view.
//!
//! A [`Page`] is created when the document is ready and lives until the
//! page is left. Creating it runs the synchronous steps (index, reading
//! time) and discovers metadata targets, the scroll target, and toggles.
//! Everything stateful for the view hangs off it: the metadata cache, the
//! scroll monitor, and the toggle registry. Dropping it is the unload.
//!
//! ```rust
//! use std::time::Instant;
//! use marginalia_core::{MarginaliaConfig, Page};
//! use marginalia_core::scroll::ScrollSample;
//! use marginalia_core::toggle::ToggleEvent;
//!
//! let html = r#"<body><button data-toggle="menu">Menu</button><ul id="menu"></ul>
//! <main><h2>Install</h2><p>cargo add marginalia</p></main></body>"#;
//!
//! let mut page = Page::ready(html, MarginaliaConfig::default()).unwrap();
//! page.scroll(ScrollSample::at(240), Instant::now());
//! page.frame();
//! page.toggle("menu", ToggleEvent::Activate);
//!
//! let rendered = page.render().unwrap();
//! assert!(rendered.contains(r#"<h2 id="install">"#));
//! assert!(rendered.contains("is-sticky"));
//! assert!(rendered.contains(r#"<ul id="menu" class="is-open">"#));
//! ```

use std::time::Instant;

use crate::classify::ClassList;
use crate::config::MarginaliaConfig;
use crate::index::{TableOfContents, apply_index, build_index};
use crate::metadata::{
    MetadataCache, MetadataClient, MetadataSource, MetadataTarget, Resolution, apply_resolutions, collect_targets,
};
use crate::parse::Document;
use crate::reading_time::{ReadabilityStats, analyze, apply_reading_time};
use crate::scroll::{ClassChange, ScrollMonitor, ScrollSample, ScrollState};
use crate::toggle::{ToggleEffect, ToggleEvent, ToggleRegistry, ToggleState};
use crate::Result;

/// State of one page view.
#[derive(Debug, Clone)]
pub struct Page {
    config: MarginaliaConfig,
    html: String,
    title: Option<String>,
    toc: TableOfContents,
    reading: Option<ReadabilityStats>,
    targets: Vec<MetadataTarget>,
    resolutions: Vec<Resolution>,
    cache: MetadataCache,
    scroll: ScrollMonitor,
    toggles: ToggleRegistry,
}

impl Page {
    /// Runs the page-ready steps.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration or a malformed metadata target. Absent
    /// containers, navigation targets, and displays are not errors.
    pub fn ready(html: &str, config: MarginaliaConfig) -> Result<Self> {
        config.validate()?;

        // Index and reading time both read the page as delivered, so neither
        // sees the other's output.
        let source = Document::parse(html)?;
        let toc = build_index(&source, &config.index)?;
        let reading = analyze(&source, &config.reading)?;

        let mut html = apply_index(html, &toc, &config.index)?;
        if let Some(stats) = &reading {
            html = apply_reading_time(&html, stats, &config.reading)?;
        }

        let doc = Document::parse(&html)?;
        let title = doc.title().map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        let targets = if config.metadata.enabled { collect_targets(&doc, &config.metadata)? } else { Vec::new() };
        let toggles = ToggleRegistry::from_document(&doc, config.toggle.clone())?;

        let target_classes = doc
            .select_first(&config.scroll.target)?
            .and_then(|el| el.attr("class"))
            .map(ClassList::parse)
            .unwrap_or_default();
        let scroll = ScrollMonitor::from_config(&config.scroll, target_classes);

        tracing::debug!(
            headings = toc.len(),
            words = reading.as_ref().map(|r| r.word_count),
            metadata_targets = targets.len(),
            toggles = toggles.len(),
            "page ready"
        );

        Ok(Self {
            config,
            html,
            title,
            toc,
            reading,
            targets,
            resolutions: Vec::new(),
            cache: MetadataCache::new(),
            scroll,
            toggles,
        })
    }

    /// Resolves the page's metadata targets and writes the values in.
    ///
    /// The page HTML is only updated once every request has finished, so
    /// dropping the returned future leaves the document untouched. Keys
    /// settled by an earlier call are served from the page cache.
    pub async fn resolve_metadata<S: MetadataSource>(&mut self, client: &MetadataClient<S>) -> Result<&[Resolution]> {
        if self.targets.is_empty() {
            return Ok(&[]);
        }

        let resolutions = client.resolve(&mut self.cache, &self.targets).await;
        self.html = apply_resolutions(&self.html, &resolutions, &self.config.metadata)?;
        self.resolutions = resolutions;
        Ok(&self.resolutions)
    }

    /// Records a scroll event; see [`ScrollMonitor::observe`].
    pub fn scroll(&mut self, sample: ScrollSample, now: Instant) -> Vec<ClassChange> {
        self.scroll.observe(sample, now)
    }

    /// Animation-frame tick.
    pub fn frame(&mut self) -> Vec<ClassChange> {
        self.scroll.on_frame()
    }

    /// Evaluates any pending scroll sample, e.g. when scrolling stops.
    pub fn settle_scroll(&mut self) -> Vec<ClassChange> {
        self.scroll.flush()
    }

    pub fn toggle(&mut self, id: &str, event: ToggleEvent) -> Option<ToggleEffect> {
        self.toggles.dispatch(id, event)
    }

    /// Page-wide outside click or escape.
    pub fn dismiss(&mut self, event: ToggleEvent) -> Vec<ToggleEffect> {
        self.toggles.dismiss_all(event)
    }

    /// The document with scroll classes and toggle state applied.
    pub fn render(&self) -> Result<String> {
        let html = self.scroll.render(&self.html, &self.config.scroll.target)?;
        self.toggles.render(&html)
    }

    pub fn config(&self) -> &MarginaliaConfig {
        &self.config
    }

    /// The document after index, reading time, and metadata write-back,
    /// without scroll or toggle state.
    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn toc(&self) -> &TableOfContents {
        &self.toc
    }

    pub fn reading(&self) -> Option<&ReadabilityStats> {
        self.reading.as_ref()
    }

    pub fn targets(&self) -> &[MetadataTarget] {
        &self.targets
    }

    pub fn resolutions(&self) -> &[Resolution] {
        &self.resolutions
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    pub fn scroll_state(&self) -> &ScrollState {
        self.scroll.state()
    }

    pub fn toggles(&self) -> &ToggleRegistry {
        &self.toggles
    }

    pub fn toggle_state(&self, id: &str) -> Option<ToggleState> {
        self.toggles.state(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureReason;
    use crate::metadata::{MetadataKey, MetadataKind, MetadataValue};
    use crate::MarginaliaError;
    use std::cell::Cell;

    const PAGE: &str = r#"<html><head><title> Widgets </title></head><body class="docs">
        <button data-toggle="menu">Menu</button>
        <ul id="menu"><li>Home</li></ul>
        <nav data-toc></nav>
        <span data-reading-time></span>
        <main>
            <h1>Marginalia</h1>
            <p>Stars: <span data-gh-kind="stars" data-gh-owner="acme" data-gh-repo="widgets">0</span></p>
            <h2>Install</h2>
            <p>Release <span data-gh-kind="version" data-gh-owner="acme" data-gh-repo="widgets">?</span></p>
            <p>Also <span data-gh-kind="stars" data-gh-owner="acme" data-gh-repo="widgets">0</span></p>
        </main>
    </body></html>"#;

    struct CountingSource {
        calls: Cell<usize>,
    }

    impl MetadataSource for CountingSource {
        async fn fetch(&self, key: &MetadataKey) -> std::result::Result<MetadataValue, FailureReason> {
            self.calls.set(self.calls.get() + 1);
            match key.kind {
                MetadataKind::Stargazers => Ok(MetadataValue::Count(1_024)),
                _ => Err(FailureReason::Http { status: 404 }),
            }
        }
    }

    fn client() -> MetadataClient<CountingSource> {
        MetadataClient::new(CountingSource { calls: Cell::new(0) }, Default::default())
    }

    #[test]
    fn test_ready_runs_synchronous_steps() {
        let page = Page::ready(PAGE, MarginaliaConfig::default()).unwrap();

        assert_eq!(page.title(), Some("Widgets"));
        assert_eq!(page.toc().len(), 2);
        assert!(page.html().contains(r#"<h1 id="marginalia">"#));
        assert!(page.html().contains(r##"<a href="#install">Install</a>"##));
        assert!(page.reading().is_some());
        assert_eq!(page.targets().len(), 3);
        assert_eq!(page.toggles().len(), 1);
        assert!(page.cache().is_empty());
        assert_eq!(page.scroll_state().current_offset, 0);
    }

    #[test]
    fn test_table_of_contents_is_not_read_as_prose() {
        let html = format!(
            "<main><nav data-toc></nav><h2>Alpha beta gamma</h2><h2>Delta epsilon</h2><p>{}</p></main>\
             <span data-reading-time></span>",
            "word ".repeat(10)
        );
        let page = Page::ready(&html, MarginaliaConfig::default()).unwrap();

        assert!(page.html().contains(r##"<a href="#delta-epsilon">Delta epsilon</a>"##));
        assert_eq!(page.reading().unwrap().word_count, 15);
        assert!(page.html().contains(r#"data-word-count="15""#));
    }

    #[test]
    fn test_ready_rejects_bad_target() {
        let html = r#"<main><span data-gh-kind="stars" data-gh-owner="acme"></span></main>"#;
        let err = Page::ready(html, MarginaliaConfig::default()).unwrap_err();
        assert!(matches!(err, MarginaliaError::InvalidTarget { index: 0, .. }));
    }

    #[test]
    fn test_metadata_disabled_skips_targets() {
        let config = MarginaliaConfig::builder().metadata_enabled(false).build();
        let page = Page::ready(PAGE, config).unwrap();
        assert!(page.targets().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_metadata_writes_values() {
        let mut page = Page::ready(PAGE, MarginaliaConfig::default()).unwrap();
        let client = client();

        let resolutions = page.resolve_metadata(&client).await.unwrap();
        assert_eq!(resolutions.len(), 3);
        assert_eq!(client.source().calls.get(), 2);

        assert_eq!(page.html().matches(r#"data-gh-state="resolved">1,024</span>"#).count(), 2);
        assert!(page.html().contains("data-gh-state=\"failed\">\u{2014}</span>"));
        assert_eq!(page.cache().len(), 2);
    }

    #[tokio::test]
    async fn test_second_resolve_uses_cache() {
        let mut page = Page::ready(PAGE, MarginaliaConfig::default()).unwrap();
        let client = client();

        page.resolve_metadata(&client).await.unwrap();
        page.resolve_metadata(&client).await.unwrap();
        assert_eq!(client.source().calls.get(), 2);
    }

    #[test]
    fn test_scroll_and_toggle_render() {
        let mut page = Page::ready(PAGE, MarginaliaConfig::default()).unwrap();
        let now = Instant::now();

        page.scroll(ScrollSample::at(50), now);
        assert!(page.frame().is_empty());
        page.scroll(ScrollSample::at(180), now);
        assert_eq!(page.frame().len(), 1);
        assert!(page.toggle("menu", ToggleEvent::Activate).is_some());

        let html = page.render().unwrap();
        assert!(html.contains(r#"<body class="docs is-sticky">"#));
        assert!(html.contains(r#"<ul id="menu" class="is-open">"#));
        assert!(html.contains(r#"aria-expanded="true""#));

        assert_eq!(page.dismiss(ToggleEvent::DismissOutside).len(), 1);
        assert_eq!(page.toggle_state("menu"), Some(ToggleState::Closed));
    }
}
