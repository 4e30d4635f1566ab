//! Typed parsing of metadata target elements.

use serde::Serialize;

use super::{Identifier, MetadataConfig, MetadataKey, MetadataKind};
use crate::parse::Document;
use crate::{MarginaliaError, Result};

/// One element that displays a fetched value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataTarget {
    /// Position among all metadata targets in document order.
    pub ordinal: usize,
    pub key: MetadataKey,
}

/// Parses every metadata target in the document.
///
/// Fails on the first malformed element, before any request is issued,
/// so a broken template is caught during development rather than showing
/// placeholders in production.
pub fn collect_targets(doc: &Document, config: &MetadataConfig) -> Result<Vec<MetadataTarget>> {
    let elements = doc.select(&config.target_selector())?;
    let mut targets = Vec::with_capacity(elements.len());

    for (ordinal, element) in elements.iter().enumerate() {
        let invalid = |reason: String| MarginaliaError::InvalidTarget { index: ordinal, reason };

        let kind = element
            .attr(&config.kind_attr)
            .unwrap_or_default()
            .parse::<MetadataKind>()
            .map_err(invalid)?;

        let owner = element
            .attr(&config.owner_attr)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| invalid(format!("missing `{}` attribute", config.owner_attr)))?;
        validate_name(owner).map_err(invalid)?;

        let repo = element.attr(&config.repo_attr).map(str::trim).filter(|v| !v.is_empty());

        let identifier = match (kind.is_repo_scoped(), repo) {
            (true, Some(repo)) => {
                validate_name(repo).map_err(invalid)?;
                Identifier::Repo { owner: owner.to_string(), repo: repo.to_string() }
            }
            (true, None) => {
                return Err(invalid(format!("kind `{}` requires a `{}` attribute", kind, config.repo_attr)));
            }
            (false, _) => Identifier::Owner { owner: owner.to_string() },
        };

        targets.push(MetadataTarget { ordinal, key: MetadataKey::new(kind, identifier) });
    }

    tracing::debug!(targets = targets.len(), "collected metadata targets");
    Ok(targets)
}

/// Owner and repository names end up in request paths; only GitHub's own
/// character set is accepted.
fn validate_name(name: &str) -> std::result::Result<(), String> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid { Ok(()) } else { Err(format!("invalid owner or repository name `{}`", name)) }
}
