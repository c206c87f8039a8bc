use std::collections::BTreeMap;

use crate::error::DecorationError;
use crate::types::PermissionRow;

/// Read-only enumeration of the policy identifiers currently defined.
pub trait PolicyStore: Send + Sync {
    /// List policy ids matching `filter`, e.g. `acl*` for everything under `acl`.
    fn list_policy_ids(&self, filter: &str) -> Result<Vec<String>, DecorationError>;
}

/// Batched permission checks.
///
/// The query maps entity identifiers to operation signatures. An empty list
/// asks about the entity as a whole, otherwise one row per signature is
/// expected. Rows may be missing; callers treat that as deny.
pub trait PermissionBackend: Send + Sync {
    fn can_invoke(
        &self,
        query: &BTreeMap<String, Vec<String>>,
    ) -> Result<Vec<PermissionRow>, DecorationError>;
}
