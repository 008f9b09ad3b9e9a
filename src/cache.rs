//! Run-scoped lookup cache.
//!
//! Each audit run owns one [`LookupCache`]. It remembers the outcome of
//! every registry and vulnerability lookup by [`PluginKey`], so a plugin
//! found on many sites is looked up once. Failed lookups are cached too.
//! Entries are written once and never replaced; the cache is dropped with
//! the run and nothing is persisted.
//!
//! # Example
//!
//! ```
//! use wpaudit::cache::LookupCache;
//! use wpaudit::model::PluginKey;
//!
//! let mut cache = LookupCache::new();
//! let key = PluginKey::normalize("akismet");
//!
//! cache.store_version(key.clone(), Ok("5.3".to_string()));
//! assert_eq!(cache.version(&key), Some(&Ok("5.3".to_string())));
//! ```

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::error::LookupError;
use crate::model::{PluginKey, VulnerabilityRecord};

pub type VersionLookup = Result<String, LookupError>;
pub type VulnerabilityLookup = Result<Vec<VulnerabilityRecord>, LookupError>;

/// Lookup outcomes keyed by plugin.
#[derive(Debug, Default)]
pub struct LookupCache {
    versions: HashMap<PluginKey, VersionLookup>,
    vulnerabilities: HashMap<PluginKey, VulnerabilityLookup>,
    hits: usize,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached registry outcome for `key`, if any.
    pub fn version(&self, key: &PluginKey) -> Option<&VersionLookup> {
        self.versions.get(key)
    }

    /// Cached vulnerability outcome for `key`, if any.
    pub fn vulnerabilities(&self, key: &PluginKey) -> Option<&VulnerabilityLookup> {
        self.vulnerabilities.get(key)
    }

    /// Records the registry outcome for `key`. A second store for the same
    /// key is ignored; the stored value is returned either way.
    pub fn store_version(&mut self, key: PluginKey, outcome: VersionLookup) -> &VersionLookup {
        match self.versions.entry(key) {
            Entry::Occupied(existing) => existing.into_mut(),
            Entry::Vacant(slot) => slot.insert(outcome),
        }
    }

    /// Records the vulnerability outcome for `key`, write-once like
    /// [`store_version`](Self::store_version).
    pub fn store_vulnerabilities(
        &mut self,
        key: PluginKey,
        outcome: VulnerabilityLookup,
    ) -> &VulnerabilityLookup {
        match self.vulnerabilities.entry(key) {
            Entry::Occupied(existing) => existing.into_mut(),
            Entry::Vacant(slot) => slot.insert(outcome),
        }
    }

    pub(crate) fn record_hit(&mut self) {
        self.hits += 1;
    }

    /// Number of lookups answered from the cache.
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Number of distinct plugins with a cached registry outcome.
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty() && self.vulnerabilities.is_empty()
    }
}
