//! A [`PermissionBackend`] evaluating `canInvoke` queries against a Cedar
//! policy set for one principal.
//!
//! Each check is the Cedar request
//! `(User::"<principal>", Action::"invoke", Entity::"<entity id>")` with the
//! context `{ operation: "<signature>" }`; whole-entity checks use an empty
//! operation. The resource carries `domain` and `type` attributes.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use cedar_policy::{
    Authorizer, Context, Decision, Entities, Entity, EntityId as CedarEntityId, EntityTypeName,
    EntityUid, PolicySet, Request as CedarRequest, RestrictedExpression,
};
use tracing::debug;

use crate::error::DecorationError;
use crate::loader;
use crate::traits::PermissionBackend;
use crate::types::{EntityId, PermissionRow};

pub const PRINCIPAL_TYPE: &str = "User";
pub const GROUP_TYPE: &str = "Group";
pub const RESOURCE_TYPE: &str = "Entity";
pub const INVOKE_ACTION: &str = "invoke";

/// Cloneable and thread-safe; clones share the policy set.
#[derive(Clone)]
pub struct CedarPermissionBackend {
    inner: Arc<RwLock<PolicySet>>,
    principal: EntityUid,
    groups: HashSet<EntityUid>,
}

fn uid(type_name: &str, id: &str) -> Result<EntityUid, DecorationError> {
    let type_name = EntityTypeName::from_str(type_name)?;
    let id = CedarEntityId::from_str(id).map_err(|e| DecorationError::Evaluation(e.to_string()))?;
    Ok(EntityUid::from_type_name_and_id(type_name, id))
}

impl CedarPermissionBackend {
    pub fn new_from_str(policy_text: &str, principal: &str) -> Result<Self, DecorationError> {
        let set = loader::compile_policy(policy_text)?;
        Ok(Self {
            inner: Arc::new(RwLock::new(set)),
            principal: uid(PRINCIPAL_TYPE, principal)?,
            groups: HashSet::new(),
        })
    }

    /// Make the principal a member of `groups`.
    pub fn with_groups(mut self, groups: &[&str]) -> Result<Self, DecorationError> {
        for group in groups {
            self.groups.insert(uid(GROUP_TYPE, group)?);
        }
        Ok(self)
    }

    pub fn reload_from_str(&self, policy_text: &str) -> Result<(), DecorationError> {
        let new_set = loader::compile_policy(policy_text)?;
        let mut guard = self
            .inner
            .write()
            .map_err(|e| DecorationError::BackendUnavailable(e.to_string()))?;
        *guard = new_set;
        Ok(())
    }

    fn entities(&self, entity: &str, resource: &EntityUid) -> Result<Entities, DecorationError> {
        let schema: Option<&cedar_policy::Schema> = None;
        let id: EntityId = entity.parse()?;

        let mut attrs = HashMap::new();
        attrs.insert(
            "domain".to_string(),
            RestrictedExpression::new_string(id.domain().to_string()),
        );
        attrs.insert(
            "type".to_string(),
            RestrictedExpression::new_string(id.kind().unwrap_or_default().to_string()),
        );
        let resource_entity = Entity::new(resource.clone(), attrs, HashSet::new())?;
        let principal_entity =
            Entity::new(self.principal.clone(), HashMap::new(), self.groups.clone())?;
        let group_entities: Vec<Entity> = self.groups.iter().cloned().map(Entity::with_uid).collect();

        Ok(Entities::empty()
            .add_entities(vec![resource_entity, principal_entity], schema)?
            .add_entities(group_entities, schema)?)
    }

    fn is_authorized(
        &self,
        policies: &PolicySet,
        entity: &str,
        operation: &str,
    ) -> Result<bool, DecorationError> {
        let resource = uid(RESOURCE_TYPE, entity)?;
        let action = uid("Action", INVOKE_ACTION)?;
        let context = Context::from_pairs(vec![(
            "operation".to_string(),
            RestrictedExpression::new_string(operation.to_string()),
        )])?;
        let entities = self.entities(entity, &resource)?;
        let request = CedarRequest::new(self.principal.clone(), action, resource, context, None)?;

        let response = Authorizer::new().is_authorized(&request, policies, &entities);
        debug!(
            event = "Authorize",
            entity = entity,
            operation = operation,
            result = ?response.decision()
        );
        Ok(response.decision() == Decision::Allow)
    }
}

impl PermissionBackend for CedarPermissionBackend {
    fn can_invoke(
        &self,
        query: &BTreeMap<String, Vec<String>>,
    ) -> Result<Vec<PermissionRow>, DecorationError> {
        let guard = self
            .inner
            .read()
            .map_err(|e| DecorationError::BackendUnavailable(e.to_string()))?;

        let mut rows = Vec::new();
        for (entity, operations) in query {
            if operations.is_empty() {
                let allowed = self.is_authorized(&guard, entity, "")?;
                rows.push(PermissionRow::entity(entity.clone(), allowed));
                continue;
            }
            for operation in operations {
                let allowed = self.is_authorized(&guard, entity, operation)?;
                rows.push(PermissionRow::operation(entity.clone(), operation.clone(), allowed));
            }
        }
        Ok(rows)
    }
}
