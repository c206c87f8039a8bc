//! Policy chain resolution.
//!
//! An entity `org.foo:type=Bar,name=X` is governed, most specific first, by
//! `acl.org.foo.Bar.X`, `acl.org.foo.Bar`, `acl.org.foo` and `acl`. Each of
//! these candidates resolves to the most specific *existing* policy of the
//! same component count, where a `_` component matches anything.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DecoratorConfig;
use crate::error::DecorationError;
use crate::ranker;
use crate::segments::name_segments;
use crate::types::EntityId;

/// Dot-separated identifier without empty components.
static POLICY_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^.]+(\.[^.]+)*$").unwrap());

/// The best existing policy per candidate, most specific first. An empty
/// string marks a level without any matching policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedChain(Vec<String>);

impl ResolvedChain {
    /// Wrap resolved levels, most specific first.
    pub fn new(levels: Vec<String>) -> Self {
        Self(levels)
    }

    /// Every level, including unresolved `""` ones.
    pub fn levels(&self) -> &[String] {
        &self.0
    }

    /// Number of levels, one more than the entity's name segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Levels that resolved to a policy, in chain order.
    pub fn defined(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str).filter(|s| !s.is_empty())
    }

    /// Whether both chains resolve to the same policies in the same order.
    /// Chains of entities at different name depths can be equivalent.
    pub fn same_policies(&self, other: &ResolvedChain) -> bool {
        self.defined().eq(other.defined())
    }
}

/// The policies currently defined, indexed by component count.
#[derive(Debug, Clone, Default)]
pub struct ExistingPolicies {
    by_len: HashMap<usize, Vec<Vec<String>>>,
    count: usize,
}

impl ExistingPolicies {
    /// Index the identifiers rooted at `prefix`. Anything else is skipped.
    pub fn new<I, S>(prefix: &str, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut existing = ExistingPolicies::default();
        for id in ids {
            let id = id.as_ref();
            let rooted = id == prefix
                || id
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('.'));
            if !rooted || !POLICY_ID.is_match(id) {
                debug!(event = "Resolve", phase = "Index", policy = id, "skipping policy id");
                continue;
            }
            let components: Vec<String> = id.split('.').map(str::to_string).collect();
            let bucket = existing.by_len.entry(components.len()).or_default();
            if !bucket.contains(&components) {
                bucket.push(components);
                existing.count += 1;
            }
        }
        existing
    }

    /// Number of distinct indexed policies.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn with_len(&self, len: usize) -> &[Vec<String>] {
        self.by_len.get(&len).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Maps entities to their resolved policy chains under one prefix and wildcard.
#[derive(Debug, Clone)]
pub struct PolicyChainResolver {
    prefix: String,
    wildcard: String,
}

impl Default for PolicyChainResolver {
    fn default() -> Self {
        Self::new(&DecoratorConfig::default())
    }
}

impl PolicyChainResolver {
    pub fn new(config: &DecoratorConfig) -> Self {
        Self {
            prefix: config.prefix.clone(),
            wildcard: config.wildcard.clone(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Candidate policy ids from most specific to the bare prefix.
    /// Always `segments.len() + 1` long.
    pub fn candidates<S: AsRef<str>>(&self, segments: &[S]) -> Vec<String> {
        let mut chain = Vec::with_capacity(segments.len() + 1);
        for depth in (1..=segments.len()).rev() {
            let mut pid = self.prefix.clone();
            for segment in &segments[..depth] {
                pid.push('.');
                pid.push_str(segment.as_ref());
            }
            chain.push(pid);
        }
        chain.push(self.prefix.clone());
        chain
    }

    /// The most specific existing policy matching `candidate`, or `""`.
    pub fn resolve(&self, existing: &ExistingPolicies, candidate: &str) -> String {
        let wanted: Vec<&str> = candidate.split('.').collect();
        let matches = existing.with_len(wanted.len()).iter().filter(|policy| {
            policy
                .iter()
                .zip(&wanted)
                .all(|(have, want)| have == want || *have == self.wildcard)
        });
        ranker::best(matches.map(Vec::as_slice), &self.wildcard)
            .map(|components| components.join("."))
            .unwrap_or_default()
    }

    /// Resolve every candidate of `id`.
    pub fn resolved_chain(&self, existing: &ExistingPolicies, id: &EntityId) -> ResolvedChain {
        let candidates = self.candidates(name_segments(id).as_slice());
        ResolvedChain(
            candidates
                .iter()
                .map(|candidate| self.resolve(existing, candidate))
                .collect(),
        )
    }

    /// Parse `id` and resolve its chain.
    pub fn resolved_chain_for(
        &self,
        existing: &ExistingPolicies,
        id: &str,
    ) -> Result<ResolvedChain, DecorationError> {
        Ok(self.resolved_chain(existing, &id.parse()?))
    }

    /// Whether two entities resolve to identical chains, and so may share one
    /// permission result.
    pub fn may_share(&self, existing: &ExistingPolicies, a: &EntityId, b: &EntityId) -> bool {
        self.resolved_chain(existing, a) == self.resolved_chain(existing, b)
    }
}

/// Per-call memo of candidate resolutions. Entities of one listing share most
/// of their candidates, so each distinct candidate is resolved once.
pub(crate) struct MemoizedResolver<'a> {
    resolver: &'a PolicyChainResolver,
    existing: &'a ExistingPolicies,
    memo: HashMap<String, String>,
}

impl<'a> MemoizedResolver<'a> {
    pub(crate) fn new(resolver: &'a PolicyChainResolver, existing: &'a ExistingPolicies) -> Self {
        Self {
            resolver,
            existing,
            memo: HashMap::new(),
        }
    }

    pub(crate) fn resolved_chain(&mut self, id: &EntityId) -> ResolvedChain {
        let candidates = self.resolver.candidates(name_segments(id).as_slice());
        let mut levels = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let resolved = match self.memo.get(&candidate) {
                Some(resolved) => resolved.clone(),
                None => {
                    let resolved = self.resolver.resolve(self.existing, &candidate);
                    self.memo.insert(candidate, resolved.clone());
                    resolved
                }
            };
            levels.push(resolved);
        }
        ResolvedChain(levels)
    }

    pub(crate) fn distinct_candidates(&self) -> usize {
        self.memo.len()
    }
}
