//! Data model types for entity listings and permission results.
//!
//! Canonical string forms:
//! - EntityId: `org.foo:type=Bar,name=X`
//! - PolicyId: `acl.org.foo.Bar` with `_` matching any component
//! - Operation signature: `install(java.lang.String,boolean)` or `stop()`

mod description;
mod entity_id;
mod permission;
mod tree;

pub use description::{
    ArgInfo, AttributeInfo, DecoratedDescription, EntityDescription, OperationAccess,
    OperationInfo, Operations,
};
pub use entity_id::{EntityId, TYPE_PROPERTY};
pub use permission::PermissionRow;
pub use tree::{DescriptionRef, EntityTree, Listing};
