//! Rows returned by a permission backend.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One row of a batched `canInvoke` response.
///
/// Whole-entity rows carry no operation. An absent flag means deny.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRow {
    pub entity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default)]
    pub can_invoke: Option<bool>,
}

impl PermissionRow {
    pub fn entity(entity: impl Into<String>, can_invoke: bool) -> Self {
        Self {
            entity: entity.into(),
            operation: None,
            can_invoke: Some(can_invoke),
        }
    }

    pub fn operation(
        entity: impl Into<String>,
        operation: impl Into<String>,
        can_invoke: bool,
    ) -> Self {
        Self {
            entity: entity.into(),
            operation: Some(operation.into()),
            can_invoke: Some(can_invoke),
        }
    }

    /// The effective flag; a missing value denies.
    pub fn allowed(&self) -> bool {
        self.can_invoke.unwrap_or(false)
    }
}
