//! The listing tree: domains, entities and the shared description cache.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::description::{DecoratedDescription, EntityDescription};

/// An entity's slot in the tree: either its own description, or the key of a
/// description in the tree's cache shared with other entities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum DescriptionRef<D> {
    Shared(String),
    Inline(D),
}

/// Domain name -> entity property list -> description slot, plus the cache
/// that shared slots point into.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(bound(
    serialize = "D: Serialize",
    deserialize = "D: Deserialize<'de>"
))]
pub struct EntityTree<D = EntityDescription> {
    #[serde(default)]
    pub domains: BTreeMap<String, BTreeMap<String, DescriptionRef<D>>>,
    #[serde(default)]
    pub cache: BTreeMap<String, D>,
}

impl<D> Default for EntityTree<D> {
    fn default() -> Self {
        Self {
            domains: BTreeMap::new(),
            cache: BTreeMap::new(),
        }
    }
}

impl<D> EntityTree<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity owning its description.
    pub fn with_inline(mut self, domain: &str, name: &str, description: D) -> Self {
        self.domains
            .entry(domain.to_string())
            .or_default()
            .insert(name.to_string(), DescriptionRef::Inline(description));
        self
    }

    /// Insert an entity referencing a cached description by key.
    pub fn with_shared(mut self, domain: &str, name: &str, key: &str) -> Self {
        self.domains
            .entry(domain.to_string())
            .or_default()
            .insert(name.to_string(), DescriptionRef::Shared(key.to_string()));
        self
    }

    pub fn with_cached(mut self, key: &str, description: D) -> Self {
        self.cache.insert(key.to_string(), description);
        self
    }

    pub fn entity(&self, domain: &str, name: &str) -> Option<&DescriptionRef<D>> {
        self.domains.get(domain).and_then(|d| d.get(name))
    }

    /// Look up an entity's description, following a shared reference into the cache.
    pub fn description(&self, domain: &str, name: &str) -> Option<&D> {
        match self.entity(domain, name)? {
            DescriptionRef::Inline(d) => Some(d),
            DescriptionRef::Shared(key) => self.cache.get(key),
        }
    }

    pub fn entity_count(&self) -> usize {
        self.domains.values().map(|d| d.len()).sum()
    }
}

/// The result of a decoration call: the caller's tree when nothing was
/// decorated, or the newly built decorated tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Listing {
    Decorated(EntityTree<DecoratedDescription>),
    Plain(EntityTree<EntityDescription>),
}

impl Listing {
    pub fn is_decorated(&self) -> bool {
        matches!(self, Listing::Decorated(_))
    }

    pub fn decorated(&self) -> Option<&EntityTree<DecoratedDescription>> {
        match self {
            Listing::Decorated(tree) => Some(tree),
            Listing::Plain(_) => None,
        }
    }
}
