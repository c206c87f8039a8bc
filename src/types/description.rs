//! Structural entity descriptions and their permission-decorated counterparts.

use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One argument of an operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
pub struct ArgInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub r#type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub desc: String,
}

impl ArgInfo {
    pub fn new(name: impl Into<String>, r#type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            r#type: r#type.into(),
            desc: String::new(),
        }
    }
}

/// A single operation signature with its return type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default, ToSchema)]
pub struct OperationInfo {
    #[serde(default)]
    pub args: Vec<ArgInfo>,
    #[serde(default = "void")]
    pub ret: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub desc: String,
}

fn void() -> String {
    "void".to_string()
}

impl OperationInfo {
    pub fn new(args: Vec<ArgInfo>, ret: impl Into<String>) -> Self {
        Self {
            args,
            ret: ret.into(),
            desc: String::new(),
        }
    }

    /// Render as `name(type1,type2)`, or `name()` without arguments.
    pub fn signature(&self, name: &str) -> String {
        format!("{name}({})", self.args.iter().map(|a| &a.r#type).join(","))
    }
}

/// An operation name maps to one signature, or to a list when overloaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(untagged)]
pub enum Operations {
    Overloaded(Vec<OperationInfo>),
    Single(OperationInfo),
}

impl Operations {
    pub fn iter(&self) -> impl Iterator<Item = &OperationInfo> {
        match self {
            Operations::Overloaded(ops) => ops.as_slice().iter(),
            Operations::Single(op) => std::slice::from_ref(op).iter(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
pub struct AttributeInfo {
    #[serde(rename = "type")]
    pub r#type: String,
    #[serde(default)]
    pub rw: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub desc: String,
}

/// The management shape of an entity: its attributes and operations.
///
/// Several entities may reference one description through the listing
/// tree's description cache when their shapes are identical.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default, ToSchema)]
pub struct EntityDescription {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub desc: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attr: BTreeMap<String, AttributeInfo>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub op: BTreeMap<String, Operations>,
}

impl EntityDescription {
    pub fn with_attr(mut self, name: impl Into<String>, r#type: impl Into<String>, rw: bool) -> Self {
        self.attr.insert(
            name.into(),
            AttributeInfo {
                r#type: r#type.into(),
                rw,
                desc: String::new(),
            },
        );
        self
    }

    /// Add an operation; a second operation with the same name becomes an overload.
    pub fn with_op(mut self, name: impl Into<String>, op: OperationInfo) -> Self {
        let name = name.into();
        let merged = match self.op.remove(&name) {
            None => Operations::Single(op),
            Some(Operations::Single(existing)) => Operations::Overloaded(vec![existing, op]),
            Some(Operations::Overloaded(mut existing)) => {
                existing.push(op);
                Operations::Overloaded(existing)
            }
        };
        self.op.insert(name, merged);
        self
    }

    /// All operation signatures, ordered by operation name then overload order.
    pub fn signatures(&self) -> Vec<String> {
        self.op
            .iter()
            .flat_map(|(name, ops)| ops.iter().map(move |op| op.signature(name)))
            .collect()
    }
}

/// Permission flag attached to one operation signature.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperationAccess {
    pub can_invoke: bool,
}

/// An [`EntityDescription`] with entity-level and per-operation `canInvoke` flags.
///
/// Flags start out denied and are only raised by backend rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DecoratedDescription {
    #[serde(flatten)]
    pub description: EntityDescription,
    pub can_invoke: bool,
    pub op_by_string: BTreeMap<String, OperationAccess>,
}

impl DecoratedDescription {
    pub fn new(description: &EntityDescription) -> Self {
        let op_by_string = description
            .signatures()
            .into_iter()
            .map(|sig| (sig, OperationAccess::default()))
            .collect();
        Self {
            description: description.clone(),
            can_invoke: false,
            op_by_string,
        }
    }

    /// Set the flag of one signature. Returns false if the signature is unknown.
    pub fn set_operation(&mut self, signature: &str, can_invoke: bool) -> bool {
        match self.op_by_string.get_mut(signature) {
            Some(access) => {
                access.can_invoke = can_invoke;
                true
            }
            None => false,
        }
    }

    pub fn can_invoke_operation(&self, signature: &str) -> Option<bool> {
        self.op_by_string.get(signature).map(|a| a.can_invoke)
    }
}
