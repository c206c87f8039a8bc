use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use crate::error::DecorationError;
use crate::traits::PolicyStore;

/// In-memory policy id store. Cloneable; clones share the same set.
#[derive(Debug, Clone, Default)]
pub struct StaticPolicyStore {
    inner: Arc<RwLock<BTreeSet<String>>>,
}

impl StaticPolicyStore {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: Arc::new(RwLock::new(ids.into_iter().map(Into::into).collect())),
        }
    }

    /// Replace the defined policy ids.
    pub fn replace<I, S>(&self, ids: I) -> Result<(), DecorationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut guard = self
            .inner
            .write()
            .map_err(|e| DecorationError::BackendUnavailable(e.to_string()))?;
        *guard = ids.into_iter().map(Into::into).collect();
        Ok(())
    }
}

/// `*` at the end of a filter matches any suffix; otherwise the match is exact.
fn matches_filter(filter: &str, id: &str) -> bool {
    match filter.strip_suffix('*') {
        Some(prefix) => id.starts_with(prefix),
        None => id == filter,
    }
}

impl PolicyStore for StaticPolicyStore {
    fn list_policy_ids(&self, filter: &str) -> Result<Vec<String>, DecorationError> {
        let guard = self
            .inner
            .read()
            .map_err(|e| DecorationError::BackendUnavailable(e.to_string()))?;
        Ok(guard
            .iter()
            .filter(|id| matches_filter(filter, id))
            .cloned()
            .collect())
    }
}
