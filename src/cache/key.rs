//! Tiered cache keys with fallback chains
//!
//! A cache key is an ordered list of facet values (epoch, arch, branch,
//! lockfile hash, ...) joined into one opaque string. Restores try the full
//! key first and fall back to progressively shorter prefixes, so a branch
//! with no exact cache entry can still reuse a sibling's dependencies.

use crate::error::{StagehandError, StagehandResult};
use std::collections::BTreeMap;
use std::fmt;

/// Separator between key components
const SEPARATOR: char = '-';

/// An ordered, non-empty sequence of facet values forming one cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    components: Vec<String>,
}

impl CacheKey {
    /// Build a key from its components. Empty component lists are rejected
    /// by `KeyTemplate::resolve`, the only production constructor.
    pub fn new(components: Vec<String>) -> Self {
        debug_assert!(!components.is_empty());
        Self { components }
    }

    /// Number of components in this key
    pub fn specificity(&self) -> usize {
        self.components.len()
    }

    /// The joined string form used to address the cache store
    pub fn as_string(&self) -> String {
        self.components.join(&SEPARATOR.to_string())
    }

    /// Produce the fallback chain: this key first, then the key with the
    /// trailing component dropped, recursively, down to `base_len`
    /// components. `base_len` is clamped to at least 1.
    pub fn fallback_chain(&self, base_len: usize) -> Vec<CacheKey> {
        let base_len = base_len.clamp(1, self.components.len());
        (base_len..=self.components.len())
            .rev()
            .map(|len| CacheKey {
                components: self.components[..len].to_vec(),
            })
            .collect()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

/// An ordered list of facet names to include in a key
#[derive(Debug, Clone)]
pub struct KeyTemplate {
    facets: Vec<String>,
}

impl KeyTemplate {
    pub fn new(facets: Vec<String>) -> Self {
        Self { facets }
    }

    /// Facet names referenced by this template, in key order
    pub fn facets(&self) -> &[String] {
        &self.facets
    }

    /// Resolve the template against run metadata, producing the most
    /// specific key. Every referenced facet must be present; a facet the
    /// metadata lacks is a configuration error, not a cache miss.
    pub fn resolve(&self, metadata: &BTreeMap<String, String>) -> StagehandResult<CacheKey> {
        if self.facets.is_empty() {
            return Err(StagehandError::Internal(
                "cache key template has no facets".to_string(),
            ));
        }

        let components = self
            .facets
            .iter()
            .map(|facet| {
                metadata
                    .get(facet)
                    .cloned()
                    .ok_or_else(|| StagehandError::MissingFacet {
                        facet: facet.clone(),
                    })
            })
            .collect::<StagehandResult<Vec<_>>>()?;

        Ok(CacheKey::new(components))
    }
}
