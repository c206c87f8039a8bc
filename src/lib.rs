// src/lib.rs
pub use batcher::PermissionBatcher;
pub use cedar_backend::CedarPermissionBackend;
pub use config::DecoratorConfig;
pub use decorator::{RbacDecorator, RbacDecoratorBuilder};
pub use digest::{ChainDigest, ChainKey, DigestAlgorithm};
pub use error::DecorationError;
pub use loader::compile_policy;
pub use resolver::{ExistingPolicies, PolicyChainResolver, ResolvedChain};
pub use segments::name_segments;
pub use store::StaticPolicyStore;
pub use traits::{PermissionBackend, PolicyStore};
pub use types::*;

mod batcher;
mod cedar_backend;
mod config;
mod decorator;
mod digest;
mod error;
mod loader;
pub mod metrics;
pub mod ranker;
mod resolver;
mod segments;
mod store;
mod timers;
mod traits;
mod types;
