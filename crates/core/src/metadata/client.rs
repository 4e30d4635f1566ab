//! Request orchestration and write-back.

use std::cell::Cell;
use std::collections::{HashMap, HashSet};

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use lol_html::html_content::ContentType;
use lol_html::{Settings, element};
use serde::Serialize;

use super::cache::{Claim, MetadataCache, MetadataEntry};
use super::descriptor::MetadataTarget;
use super::source::MetadataSource;
use super::{FailurePolicy, MetadataConfig, MetadataKey};
use crate::error::FailureReason;
use crate::rewrite::{rewrite, validate_selector};
use crate::Result;

/// The outcome for one target, ready to be written into the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub ordinal: usize,
    pub key: MetadataKey,
    /// Text to display; `None` when the target should be hidden.
    pub display: Option<String>,
    pub failed: bool,
}

/// Resolves metadata targets through a [`MetadataSource`].
pub struct MetadataClient<S> {
    source: S,
    config: MetadataConfig,
}

#[cfg(feature = "fetch")]
impl MetadataClient<super::GithubSource> {
    /// A client backed by the GitHub REST API.
    pub fn github(config: MetadataConfig) -> Result<Self> {
        let source = super::GithubSource::new(&config)?;
        Ok(Self::new(source, config))
    }
}

impl<S: MetadataSource> MetadataClient<S> {
    pub fn new(source: S, config: MetadataConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &MetadataConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Resolves every target, returning one resolution per target in the
    /// order their requests completed.
    ///
    /// Keys already settled in `cache` are answered without a request.
    /// Failures never escape: they are recorded on the cache entry and the
    /// affected targets get the placeholder.
    pub async fn resolve(&self, cache: &mut MetadataCache, targets: &[MetadataTarget]) -> Vec<Resolution> {
        let mut resolutions = Vec::with_capacity(targets.len());
        let mut subscribers: HashMap<MetadataKey, Vec<usize>> = HashMap::new();
        let mut claims = Claims { cache, held: HashSet::new() };

        for target in targets {
            match claims.cache.claim(&target.key) {
                Claim::Fetch => {
                    claims.held.insert(target.key.clone());
                    subscribers.entry(target.key.clone()).or_default().push(target.ordinal);
                }
                Claim::InFlight => {
                    subscribers.entry(target.key.clone()).or_default().push(target.ordinal);
                }
                Claim::Settled(entry) => resolutions.push(self.resolution(target.ordinal, &entry)),
            }
        }

        tracing::debug!(
            targets = targets.len(),
            requests = claims.held.len(),
            cached = resolutions.len(),
            "resolving metadata"
        );

        let timeout = self.config.timeout();
        let mut in_flight: FuturesUnordered<_> = claims
            .held
            .iter()
            .cloned()
            .map(|key| async move {
                let outcome = match tokio::time::timeout(timeout, self.source.fetch(&key)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(FailureReason::Timeout),
                };
                (key, outcome)
            })
            .collect();

        while let Some((key, outcome)) = in_flight.next().await {
            if let Err(failure) = &outcome {
                log_failure(&key, failure);
            }

            claims.held.remove(&key);
            let Some(entry) = claims.cache.settle(&key, outcome) else {
                continue;
            };
            let entry = entry.clone();

            for ordinal in subscribers.remove(&key).unwrap_or_default() {
                resolutions.push(self.resolution(ordinal, &entry));
            }
        }

        resolutions
    }

    fn resolution(&self, ordinal: usize, entry: &MetadataEntry) -> Resolution {
        let display = match (&entry.value, entry.failure()) {
            (Some(value), None) => Some(value.to_string()),
            _ => match self.config.failure {
                FailurePolicy::Placeholder => Some(self.config.placeholder.clone()),
                FailurePolicy::Hide => None,
            },
        };

        Resolution { ordinal, key: entry.key.clone(), display, failed: entry.failure().is_some() }
    }
}

/// Keys claimed by one `resolve` call and not yet settled.
///
/// If the call is dropped mid-flight, its pending entries are released so
/// a later call fetches them instead of waiting on a request that no
/// longer exists.
struct Claims<'a> {
    cache: &'a mut MetadataCache,
    held: HashSet<MetadataKey>,
}

impl Drop for Claims<'_> {
    fn drop(&mut self) {
        for key in self.held.drain() {
            if self.cache.release(&key) {
                tracing::debug!(key = %key, "released abandoned metadata claim");
            }
        }
    }
}

fn log_failure(key: &MetadataKey, failure: &FailureReason) {
    if failure.is_rate_limit() {
        tracing::warn!(key = %key, reason = %failure, "metadata request rate limited");
    } else {
        tracing::debug!(key = %key, reason = %failure, "metadata request failed");
    }
}

/// Writes resolutions into the matching target elements.
///
/// Targets are matched by their ordinal among all metadata targets, the
/// same order [`super::collect_targets`] produced.
pub fn apply_resolutions(html: &str, resolutions: &[Resolution], config: &MetadataConfig) -> Result<String> {
    if resolutions.is_empty() {
        return Ok(html.to_string());
    }

    let selector = config.target_selector();
    validate_selector(&selector)?;

    let by_ordinal: HashMap<usize, &Resolution> = resolutions.iter().map(|r| (r.ordinal, r)).collect();
    let position = Cell::new(0usize);

    let output = rewrite(
        html,
        Settings {
            element_content_handlers: vec![element!(selector.as_str(), |el| {
                let ordinal = position.get();
                position.set(ordinal + 1);

                let Some(resolution) = by_ordinal.get(&ordinal) else {
                    return Ok(());
                };

                el.set_attribute("data-gh-state", if resolution.failed { "failed" } else { "resolved" })?;
                match &resolution.display {
                    Some(text) => el.set_inner_content(text, ContentType::Text),
                    None => el.set_attribute("hidden", "")?,
                }
                Ok(())
            })],
            ..Default::default()
        },
    );

    Ok(output)
}
