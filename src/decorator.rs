//! Decoration of entity listings with `canInvoke` flags.
//!
//! Entities owning their description are always decorated individually.
//! Entities referencing a shared description are grouped by
//! `(shape key, chain key)`: only the first entity of a group is sent to the
//! permission backend, and every member is pointed at the group's decorated
//! description in the output cache under `"{shape}:{chain key}"`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use crate::batcher::PermissionBatcher;
use crate::config::DecoratorConfig;
use crate::digest::{ChainDigest, ChainKey};
use crate::error::DecorationError;
use crate::metrics::{self, DecorationPhases, DecorationStats};
use crate::resolver::{ExistingPolicies, MemoizedResolver, PolicyChainResolver, ResolvedChain};
use crate::timers::{PhaseTimer, as_ms};
use crate::traits::{PermissionBackend, PolicyStore};
use crate::types::{DecoratedDescription, DescriptionRef, EntityId, EntityTree, Listing};

/// The decorator handle. Cloneable and thread-safe; every call works on its
/// own state, so concurrent calls do not contend.
#[derive(Clone)]
pub struct RbacDecorator {
    config: DecoratorConfig,
    resolver: PolicyChainResolver,
    store: Option<Arc<dyn PolicyStore>>,
    backend: Option<Arc<dyn PermissionBackend>>,
}

#[derive(Default)]
pub struct RbacDecoratorBuilder {
    config: DecoratorConfig,
    store: Option<Arc<dyn PolicyStore>>,
    backend: Option<Arc<dyn PermissionBackend>>,
}

impl RbacDecoratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: DecoratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_policy_store(mut self, store: Arc<dyn PolicyStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_permission_backend(mut self, backend: Arc<dyn PermissionBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Validate the configuration and build the decorator. Missing
    /// collaborators are allowed here; calls then leave listings untouched.
    pub fn build(self) -> Result<RbacDecorator, DecorationError> {
        self.config.validate()?;
        Ok(RbacDecorator {
            resolver: PolicyChainResolver::new(&self.config),
            config: self.config,
            store: self.store,
            backend: self.backend,
        })
    }
}

/// Where a queried entity's results are written.
enum Target {
    Inline { domain: String, name: String },
    Shared(String),
}

/// Per-call working state.
#[derive(Default)]
struct Plan {
    output: EntityTree<DecoratedDescription>,
    targets: HashMap<String, Target>,
    groups: HashMap<(String, ChainKey), Vec<(ResolvedChain, String)>>,
    entity_query: BTreeMap<String, Vec<String>>,
    operation_query: BTreeMap<String, Vec<String>>,
}

impl Plan {
    fn enqueue(&mut self, entity: String, description: &DecoratedDescription, target: Target) {
        self.entity_query.insert(entity.clone(), Vec::new());
        if !description.op_by_string.is_empty() {
            self.operation_query
                .insert(entity.clone(), description.op_by_string.keys().cloned().collect());
        }
        self.targets.insert(entity, target);
    }

    /// The output cache key for a shared shape resolving to `chain`, and
    /// whether this call is the first to see the group. With `verify`, a
    /// chain only joins a group resolving to the same policies.
    fn group_key(
        &mut self,
        shape: &str,
        chain_key: ChainKey,
        chain: ResolvedChain,
        verify: bool,
    ) -> (String, bool) {
        let members = self
            .groups
            .entry((shape.to_string(), chain_key.clone()))
            .or_default();

        let existing = if verify {
            members.iter().find(|(c, _)| c.same_policies(&chain))
        } else {
            members.first()
        };
        if let Some((_, key)) = existing {
            return (key.clone(), false);
        }

        let key = if members.is_empty() {
            format!("{shape}:{chain_key}")
        } else {
            warn!(
                event = "Decorate",
                phase = "Group",
                shape = shape,
                chain_key = chain_key.as_str(),
                "chain key collision between different policies"
            );
            format!("{shape}:{chain_key}~{}", members.len())
        };
        members.push((chain, key.clone()));
        (key, true)
    }
}

impl RbacDecorator {
    pub fn builder() -> RbacDecoratorBuilder {
        RbacDecoratorBuilder::new()
    }

    pub fn config(&self) -> &DecoratorConfig {
        &self.config
    }

    pub fn resolver(&self) -> &PolicyChainResolver {
        &self.resolver
    }

    /// Decorate `tree`, or hand it back unchanged if there is nothing to do
    /// or anything fails. Failures are logged, never returned.
    pub fn decorate(&self, tree: EntityTree) -> Listing {
        match self.try_decorate(&tree) {
            Ok(Some(decorated)) => Listing::Decorated(decorated),
            Ok(None) => {
                metrics::record_skipped("no policies defined");
                Listing::Plain(tree)
            }
            Err(err) => {
                if err.is_backend() {
                    warn!(event = "Decorate", phase = "Abort", error = %err, "listing left undecorated");
                } else {
                    error!(event = "Decorate", phase = "Abort", error = %err, "listing left undecorated");
                }
                metrics::record_skipped(&err.to_string());
                Listing::Plain(tree)
            }
        }
    }

    /// Decorate `tree` into a new tree. `Ok(None)` means no policies are
    /// defined and the listing needs no decoration.
    pub fn try_decorate(
        &self,
        tree: &EntityTree,
    ) -> Result<Option<EntityTree<DecoratedDescription>>, DecorationError> {
        let started = Instant::now();
        let mut list_time = Duration::ZERO;
        let mut resolve_time = Duration::ZERO;
        let mut query_time = Duration::ZERO;
        let mut write_back_time = Duration::ZERO;

        let store = self.store.as_deref().ok_or_else(|| {
            DecorationError::BackendUnavailable("no policy store configured".to_string())
        })?;
        let backend = self.backend.as_deref().ok_or_else(|| {
            DecorationError::BackendUnavailable("no permission backend configured".to_string())
        })?;
        let digest = ChainDigest::new(&self.config.digest_algorithm)?;

        let existing = {
            let _timer = PhaseTimer::new(&mut list_time);
            let ids = store.list_policy_ids(&self.config.store_filter())?;
            ExistingPolicies::new(&self.config.prefix, ids)
        };
        if existing.is_empty() {
            debug!(event = "Decorate", phase = "Policies", "no policies defined");
            return Ok(None);
        }
        debug!(
            event = "Decorate",
            phase = "Policies",
            policies = existing.len(),
            entities = tree.entity_count()
        );

        let mut plan = Plan::default();
        {
            let _timer = PhaseTimer::new(&mut resolve_time);
            self.plan(tree, &existing, &digest, &mut plan)?;
        }

        let entity_count = plan.entity_query.len();
        let operation_count: usize = plan.operation_query.values().map(Vec::len).sum();
        let backend_calls = usize::from(!plan.entity_query.is_empty())
            + usize::from(!plan.operation_query.is_empty());
        debug!(
            event = "Decorate",
            phase = "Query",
            entities = entity_count,
            operations = operation_count
        );

        let (entity_flags, operation_flags) = {
            let _timer = PhaseTimer::new(&mut query_time);
            let batcher = PermissionBatcher::new(backend);
            let (entities, operations) = thread::scope(|s| {
                let entities = s.spawn(|| batcher.check_entities(&plan.entity_query));
                let operations = batcher.check_operations(&plan.operation_query);
                (entities.join(), operations)
            });
            let entities = entities.map_err(|_| {
                DecorationError::BackendUnavailable("whole-entity permission query panicked".to_string())
            })??;
            (entities, operations?)
        };

        {
            let _timer = PhaseTimer::new(&mut write_back_time);
            for (entity, allowed) in entity_flags {
                let slot = plan
                    .targets
                    .get(&entity)
                    .and_then(|target| slot_mut(&mut plan.output, target));
                match slot {
                    Some(description) => description.can_invoke = allowed,
                    None => debug!(event = "Decorate", phase = "WriteBack", entity = entity, "no slot"),
                }
            }
            for ((entity, signature), allowed) in operation_flags {
                let applied = plan
                    .targets
                    .get(&entity)
                    .and_then(|target| slot_mut(&mut plan.output, target))
                    .is_some_and(|description| description.set_operation(&signature, allowed));
                if !applied {
                    debug!(
                        event = "Decorate",
                        phase = "WriteBack",
                        entity = entity,
                        operation = signature,
                        "no slot"
                    );
                }
            }
        }

        let total = started.elapsed();
        let stats = DecorationStats {
            duration: total,
            entities: tree.entity_count(),
            descriptions: plan.targets.len(),
            shared_groups: plan.groups.values().map(Vec::len).sum(),
            entity_queries: entity_count,
            operation_queries: operation_count,
            backend_calls,
            policies: existing.len(),
        };
        info!(
            event = "Decorate",
            phase = "Result",
            entities = stats.entities,
            descriptions = stats.descriptions,
            shared_groups = stats.shared_groups,
            backend_calls = stats.backend_calls
        );
        metrics::record_decoration(
            &stats,
            &DecorationPhases {
                list_policies_ms: as_ms(list_time),
                resolve_ms: as_ms(resolve_time),
                query_ms: as_ms(query_time),
                write_back_ms: as_ms(write_back_time),
                total_ms: as_ms(total),
            },
        );

        Ok(Some(plan.output))
    }

    /// Resolve every entity, build the undecided output tree and collect the
    /// two backend queries.
    fn plan(
        &self,
        tree: &EntityTree,
        existing: &ExistingPolicies,
        digest: &ChainDigest,
        plan: &mut Plan,
    ) -> Result<(), DecorationError> {
        let mut memo = MemoizedResolver::new(&self.resolver, existing);

        for (domain, entities) in &tree.domains {
            let mut out_entities = BTreeMap::new();
            for (name, slot) in entities {
                let id = EntityId::from_parts(domain, name)?;
                let chain = memo.resolved_chain(&id);
                let full_name = id.to_string();

                match slot {
                    DescriptionRef::Inline(description) => {
                        trace!(event = "Decorate", phase = "Resolve", entity = full_name, chain = ?chain.levels());
                        let decorated = DecoratedDescription::new(description);
                        plan.enqueue(
                            full_name,
                            &decorated,
                            Target::Inline {
                                domain: domain.clone(),
                                name: name.clone(),
                            },
                        );
                        out_entities.insert(name.clone(), DescriptionRef::Inline(decorated));
                    }
                    DescriptionRef::Shared(shape) => {
                        let description = tree
                            .cache
                            .get(shape)
                            .ok_or_else(|| DecorationError::MissingDescription(shape.clone()))?;
                        let chain_key = digest.key(&chain);
                        trace!(
                            event = "Decorate",
                            phase = "Resolve",
                            entity = full_name,
                            chain = ?chain.levels(),
                            chain_key = chain_key.as_str()
                        );
                        let (key, first) =
                            plan.group_key(shape, chain_key, chain, self.config.verify_chains);
                        if first {
                            let decorated = DecoratedDescription::new(description);
                            plan.enqueue(full_name, &decorated, Target::Shared(key.clone()));
                            plan.output.cache.insert(key.clone(), decorated);
                        }
                        out_entities.insert(name.clone(), DescriptionRef::Shared(key));
                    }
                }
            }
            plan.output.domains.insert(domain.clone(), out_entities);
        }

        debug!(
            event = "Decorate",
            phase = "Resolve",
            candidates = memo.distinct_candidates(),
            descriptions = plan.targets.len()
        );
        Ok(())
    }
}

fn slot_mut<'a>(
    output: &'a mut EntityTree<DecoratedDescription>,
    target: &Target,
) -> Option<&'a mut DecoratedDescription> {
    match target {
        Target::Inline { domain, name } => match output.domains.get_mut(domain)?.get_mut(name)? {
            DescriptionRef::Inline(description) => Some(description),
            DescriptionRef::Shared(_) => None,
        },
        Target::Shared(key) => output.cache.get_mut(key),
    }
}

#[cfg(test)]
mod tests;
