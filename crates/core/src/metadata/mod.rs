//! Live repository metadata.
//!
//! Elements such as `<span data-gh-kind="stars" data-gh-owner="rust-lang"
//! data-gh-repo="rust"></span>` are resolved against the GitHub REST API and
//! their text replaced by the fetched value.
//!
//! The flow is split into four steps:
//!
//! 1. [`descriptor`] parses every target element into a typed
//!    [`MetadataTarget`] before any request is issued;
//! 2. [`cache`] de-duplicates requests per [`MetadataKey`];
//! 3. [`source`] performs the lookups;
//! 4. [`client`] drives the requests and writes the results back.

pub mod cache;
pub mod client;
pub mod descriptor;
pub mod source;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::rewrite::validate_selector;
use crate::{MarginaliaError, Result};

pub use cache::{Claim, EntryState, MetadataCache, MetadataEntry};
pub use client::{MetadataClient, Resolution, apply_resolutions};
pub use descriptor::{MetadataTarget, collect_targets};
#[cfg(feature = "fetch")]
pub use source::GithubSource;
pub use source::MetadataSource;

/// The fact a target displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataKind {
    Contributors,
    RepoCount,
    Stargazers,
    LatestVersion,
    Watchers,
}

impl MetadataKind {
    /// True for kinds that need a repository, not just an owner.
    pub fn is_repo_scoped(self) -> bool {
        !matches!(self, MetadataKind::RepoCount)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MetadataKind::Contributors => "contributors",
            MetadataKind::RepoCount => "repos",
            MetadataKind::Stargazers => "stars",
            MetadataKind::LatestVersion => "version",
            MetadataKind::Watchers => "watchers",
        }
    }
}

impl FromStr for MetadataKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "contributors" => Ok(Self::Contributors),
            "repos" | "repo-count" | "repo_count" => Ok(Self::RepoCount),
            "stars" | "stargazers" => Ok(Self::Stargazers),
            "version" | "latest-version" | "latest_version" | "release" => Ok(Self::LatestVersion),
            "watchers" => Ok(Self::Watchers),
            other => Err(format!(
                "unknown metadata kind `{}`. Valid options: contributors, repos, stars, version, watchers",
                other
            )),
        }
    }
}

impl fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who or what a lookup is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum Identifier {
    Owner { owner: String },
    Repo { owner: String, repo: String },
}

impl Identifier {
    pub fn owner(&self) -> &str {
        match self {
            Identifier::Owner { owner } | Identifier::Repo { owner, .. } => owner,
        }
    }

    pub fn repo(&self) -> Option<&str> {
        match self {
            Identifier::Owner { .. } => None,
            Identifier::Repo { repo, .. } => Some(repo),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Owner { owner } => write!(f, "{}", owner),
            Identifier::Repo { owner, repo } => write!(f, "{}/{}", owner, repo),
        }
    }
}

/// Cache key: one request per distinct key and page view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MetadataKey {
    pub kind: MetadataKind,
    pub identifier: Identifier,
}

impl MetadataKey {
    pub fn new(kind: MetadataKind, identifier: Identifier) -> Self {
        Self { kind, identifier }
    }

    pub fn repo(kind: MetadataKind, owner: &str, repo: &str) -> Self {
        Self::new(kind, Identifier::Repo { owner: owner.to_string(), repo: repo.to_string() })
    }

    pub fn owner(kind: MetadataKind, owner: &str) -> Self {
        Self::new(kind, Identifier::Owner { owner: owner.to_string() })
    }
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.identifier)
    }
}

/// A fetched value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Count(u64),
    Text(String),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Count(n) => f.write_str(&format_count(*n)),
            MetadataValue::Text(text) => f.write_str(text),
        }
    }
}

/// Formats a count with thousands separators, e.g. `12,345`.
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// What a target shows when its lookup fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Replace the text with the configured placeholder.
    #[default]
    Placeholder,
    /// Add the `hidden` attribute and leave the text alone.
    Hide,
}

/// Configuration for metadata lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Whether metadata targets are resolved at all (default: true).
    pub enabled: bool,
    /// API root (default: `https://api.github.com`).
    pub api_base: String,
    /// Optional bearer token.
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// User-Agent header; GitHub rejects requests without one.
    pub user_agent: String,
    /// Per-request timeout in milliseconds (default: 10000).
    pub timeout_ms: u64,
    /// Text shown on failure (default: an em dash).
    pub placeholder: String,
    /// Failure display policy (default: placeholder).
    pub failure: FailurePolicy,
    /// Attribute naming the kind (default: `data-gh-kind`).
    pub kind_attr: String,
    /// Attribute naming the owner (default: `data-gh-owner`).
    pub owner_attr: String,
    /// Attribute naming the repository (default: `data-gh-repo`).
    pub repo_attr: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base: "https://api.github.com".to_string(),
            token: None,
            user_agent: concat!("marginalia/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_ms: 10_000,
            placeholder: "\u{2014}".to_string(),
            failure: FailurePolicy::Placeholder,
            kind_attr: "data-gh-kind".to_string(),
            owner_attr: "data-gh-owner".to_string(),
            repo_attr: "data-gh-repo".to_string(),
        }
    }
}

impl MetadataConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Selector matching every metadata target.
    pub fn target_selector(&self) -> String {
        format!("[{}]", self.kind_attr)
    }

    pub fn validate(&self) -> Result<()> {
        validate_selector(&self.target_selector())?;
        if self.timeout_ms == 0 {
            return Err(MarginaliaError::ConfigError("metadata timeout must be positive".to_string()));
        }
        url::Url::parse(&self.api_base).map_err(|e| MarginaliaError::InvalidUrl(format!("{}: {}", self.api_base, e)))?;
        Ok(())
    }
}
