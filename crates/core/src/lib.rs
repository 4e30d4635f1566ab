//! Page augmentation for static documentation sites.
//!
//! Marginalia takes a rendered HTML page and adds what a static site
//! usually does with client-side scripts:
//!
//! - a table of contents built from the page headings ([`index`]);
//! - an estimated reading time ([`reading_time`]);
//! - live repository facts such as stars or the latest release, fetched
//!   from the GitHub API ([`metadata`]);
//! - scroll-threshold classes ([`scroll`]) and expand/collapse toggles
//!   ([`toggle`]), modeled as state machines and written back as classes
//!   and ARIA attributes.
//!
//! # Example
//!
//! ```rust
//! use marginalia_core::augment_static;
//!
//! let html = r#"<nav data-toc></nav><main><h2>Intro</h2><h3>Setup</h3><h2>Usage</h2></main>"#;
//! let augmented = augment_static(html).unwrap();
//!
//! assert_eq!(augmented.toc.len(), 2);
//! assert_eq!(augmented.toc[0].children[0].id, "setup");
//! assert!(augmented.html.contains(r##"<a href="#usage">Usage</a>"##));
//! ```

pub mod augment;
pub mod classify;
pub mod config;
pub mod error;
pub mod fetch;
pub mod index;
pub mod metadata;
pub mod page;
pub mod parse;
pub mod reading_time;
mod rewrite;
pub mod scroll;
pub mod toggle;

#[cfg(feature = "fetch")]
pub use augment::augment;
pub use augment::{Augmented, Augmenter, augment_static};
pub use classify::ClassList;
pub use config::{MarginaliaConfig, MarginaliaConfigBuilder};
pub use error::{FailureReason, MarginaliaError, Result};
pub use fetch::{FetchConfig, PageSource, fetch_file, fetch_stdin};
#[cfg(feature = "fetch")]
pub use fetch::{fetch_input, fetch_url};
pub use index::{HeadingNode, IndexBuilder, IndexConfig, TableOfContents};
#[cfg(feature = "fetch")]
pub use metadata::GithubSource;
pub use metadata::{
    FailurePolicy, MetadataCache, MetadataClient, MetadataConfig, MetadataKind, MetadataSource, MetadataValue,
};
pub use page::Page;
pub use parse::Document;
pub use reading_time::{EmptyPolicy, ReadabilityStats, ReadingTimeAnalyzer, ReadingTimeConfig};
pub use rewrite::validate_selector;
pub use scroll::{Coalesce, ScrollConfig, ScrollMonitor, ScrollSample, Threshold};
pub use toggle::{ToggleConfig, ToggleEvent, ToggleRegistry, ToggleState};
