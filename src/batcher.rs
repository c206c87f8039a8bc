//! Thin adapter over [`PermissionBackend`] issuing one request per query kind
//! and indexing the rows by entity identifier.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::error::DecorationError;
use crate::traits::PermissionBackend;

pub struct PermissionBatcher<'a> {
    backend: &'a dyn PermissionBackend,
}

impl<'a> PermissionBatcher<'a> {
    pub fn new(backend: &'a dyn PermissionBackend) -> Self {
        Self { backend }
    }

    /// Whole-entity checks. Every queried entity gets an entry; entities
    /// without a row are denied.
    pub fn check_entities(
        &self,
        query: &BTreeMap<String, Vec<String>>,
    ) -> Result<HashMap<String, bool>, DecorationError> {
        let mut result: HashMap<String, bool> =
            query.keys().map(|entity| (entity.clone(), false)).collect();
        if query.is_empty() {
            return Ok(result);
        }

        for row in self.backend.can_invoke(query)? {
            match result.get_mut(&row.entity) {
                Some(slot) => *slot = row.allowed(),
                None => debug!(
                    event = "Batch",
                    phase = "Entities",
                    entity = row.entity,
                    "ignoring row for entity that was not queried"
                ),
            }
        }
        Ok(result)
    }

    /// Per-operation checks keyed by `(entity, signature)`. Every queried
    /// pair gets an entry; pairs without a row are denied.
    pub fn check_operations(
        &self,
        query: &BTreeMap<String, Vec<String>>,
    ) -> Result<HashMap<(String, String), bool>, DecorationError> {
        let mut result: HashMap<(String, String), bool> = query
            .iter()
            .flat_map(|(entity, ops)| ops.iter().map(move |op| ((entity.clone(), op.clone()), false)))
            .collect();
        if query.is_empty() {
            return Ok(result);
        }

        for row in self.backend.can_invoke(query)? {
            let allowed = row.allowed();
            let Some(operation) = row.operation else {
                debug!(
                    event = "Batch",
                    phase = "Operations",
                    entity = row.entity,
                    "ignoring row without operation"
                );
                continue;
            };
            match result.get_mut(&(row.entity, operation)) {
                Some(slot) => *slot = allowed,
                None => debug!(
                    event = "Batch",
                    phase = "Operations",
                    "ignoring row for operation that was not queried"
                ),
            }
        }
        Ok(result)
    }
}
