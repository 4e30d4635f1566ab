//! Per-page metadata cache with request de-duplication.
//!
//! The cache is created when the page becomes ready and dropped with it.
//! An entry is created `Pending` by the first target that asks for its key
//! and settles exactly once; every other target sharing the key reads the
//! same outcome.

use std::collections::BTreeMap;
use std::time::SystemTime;

use serde::Serialize;

use super::{MetadataKey, MetadataValue};
use crate::error::FailureReason;

/// Lifecycle of one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EntryState {
    Pending,
    Resolved,
    Failed { failure: FailureReason },
}

/// One cached lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataEntry {
    pub key: MetadataKey,
    pub value: Option<MetadataValue>,
    pub fetched_at: Option<SystemTime>,
    #[serde(flatten)]
    pub state: EntryState,
}

impl MetadataEntry {
    fn pending(key: MetadataKey) -> Self {
        Self { key, value: None, fetched_at: None, state: EntryState::Pending }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, EntryState::Pending)
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match &self.state {
            EntryState::Failed { failure } => Some(failure),
            _ => None,
        }
    }
}

/// Result of asking the cache for a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// The key was unknown; the caller now owns the one request for it.
    Fetch,
    /// A request for the key is already in flight.
    InFlight,
    /// The key has settled; no request is needed.
    Settled(MetadataEntry),
}

/// Mapping from key to entry for one page view.
#[derive(Debug, Clone, Default)]
pub struct MetadataCache {
    entries: BTreeMap<MetadataKey, MetadataEntry>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up `key`, inserting a pending entry if it is unknown.
    ///
    /// Check and insert happen in one call, so claiming every key before
    /// the first await guarantees a single request per key.
    pub fn claim(&mut self, key: &MetadataKey) -> Claim {
        match self.entries.get(key) {
            Some(entry) if entry.is_pending() => Claim::InFlight,
            Some(entry) => Claim::Settled(entry.clone()),
            None => {
                self.entries.insert(key.clone(), MetadataEntry::pending(key.clone()));
                Claim::Fetch
            }
        }
    }

    /// Records the outcome of the request for `key`.
    ///
    /// Only a pending entry transitions; settling twice keeps the first
    /// outcome. Returns the entry as it stands afterwards.
    pub fn settle(
        &mut self, key: &MetadataKey, outcome: std::result::Result<MetadataValue, FailureReason>,
    ) -> Option<&MetadataEntry> {
        let entry = self.entries.get_mut(key)?;
        if !entry.is_pending() {
            tracing::debug!(key = %key, "ignoring second outcome for settled metadata entry");
            return Some(&*entry);
        }

        entry.fetched_at = Some(SystemTime::now());
        match outcome {
            Ok(value) => {
                entry.value = Some(value);
                entry.state = EntryState::Resolved;
            }
            Err(failure) => {
                entry.state = EntryState::Failed { failure };
            }
        }
        Some(&*entry)
    }

    /// Drops a pending entry whose request was abandoned, so the next
    /// claim fetches it again. Settled entries are kept.
    pub fn release(&mut self, key: &MetadataKey) -> bool {
        if self.entries.get(key).is_some_and(MetadataEntry::is_pending) {
            self.entries.remove(key);
            return true;
        }
        false
    }

    pub fn get(&self, key: &MetadataKey) -> Option<&MetadataEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by key.
    pub fn iter(&self) -> impl Iterator<Item = &MetadataEntry> {
        self.entries.values()
    }
}
