use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use itertools::Itertools;

use super::*;
use crate::store::StaticPolicyStore;
use crate::types::{ArgInfo, EntityDescription, OperationInfo, PermissionRow};


/// Answers every query with a fixed rule and remembers what was asked.
struct RecordingBackend {
    rule: fn(&str, Option<&str>) -> Option<bool>,
    calls: AtomicUsize,
    queries: Mutex<Vec<BTreeMap<String, Vec<String>>>>,
}

impl RecordingBackend {
    fn new(rule: fn(&str, Option<&str>) -> Option<bool>) -> Arc<Self> {
        Arc::new(Self {
            rule,
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        })
    }

    fn allow_all() -> Arc<Self> {
        Self::new(|_, _| Some(true))
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn queried_entities(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .filter(|q| q.values().all(Vec::is_empty))
            .flat_map(|q| q.keys().cloned())
            .sorted()
            .collect()
    }
}

impl PermissionBackend for RecordingBackend {
    fn can_invoke(
        &self,
        query: &BTreeMap<String, Vec<String>>,
    ) -> Result<Vec<PermissionRow>, DecorationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.clone());

        let mut rows = Vec::new();
        for (entity, operations) in query {
            if operations.is_empty() {
                if let Some(allowed) = (self.rule)(entity, None) {
                    rows.push(PermissionRow::entity(entity.clone(), allowed));
                }
            }
            for operation in operations {
                if let Some(allowed) = (self.rule)(entity, Some(operation)) {
                    rows.push(PermissionRow::operation(entity.clone(), operation.clone(), allowed));
                }
            }
        }
        Ok(rows)
    }
}

fn bundle_shape() -> EntityDescription {
    EntityDescription {
        desc: "bundle".to_string(),
        ..Default::default()
    }
    .with_attr("State", "java.lang.String", false)
    .with_op("start", OperationInfo::new(vec![], "void"))
    .with_op("stop", OperationInfo::new(vec![], "void"))
    .with_op(
        "update",
        OperationInfo::new(vec![ArgInfo::new("location", "java.lang.String")], "void"),
    )
}

fn memory_shape() -> EntityDescription {
    EntityDescription {
        desc: "memory".to_string(),
        ..Default::default()
    }
    .with_attr("HeapMemoryUsage", "javax.management.openmbean.CompositeData", false)
}

fn decorator(
    policies: &[&str],
    backend: Arc<dyn PermissionBackend>,
) -> RbacDecorator {
    RbacDecorator::builder()
        .with_policy_store(Arc::new(StaticPolicyStore::new(policies.iter().copied())))
        .with_permission_backend(backend)
        .build()
        .unwrap()
}

/// The output cache key the decorator assigns to `entity` sharing `shape`.
fn group_key_for(decorator: &RbacDecorator, policies: &[&str], shape: &str, entity: &str) -> String {
    let existing = ExistingPolicies::new(&decorator.config().prefix, policies.iter().copied());
    let chain = decorator
        .resolver()
        .resolved_chain_for(&existing, entity)
        .unwrap();
    format!("{shape}:{}", ChainDigest::default().key(&chain))
}

#[test]
fn test_no_policies_is_a_no_op() {
    let backend = RecordingBackend::allow_all();
    let decorator = decorator(&[], backend.clone());
    let tree = EntityTree::new()
        .with_cached("bundle", bundle_shape())
        .with_shared("org.foo", "type=Bundle,id=1", "bundle")
        .with_inline("java.lang", "type=Memory", memory_shape());

    let listing = decorator.decorate(tree.clone());

    assert_eq!(listing, Listing::Plain(tree.clone()));
    assert_eq!(decorator.try_decorate(&tree).unwrap(), None);
    assert_eq!(backend.calls(), 0);
}

#[test]
fn test_policies_outside_prefix_count_as_none() {
    let backend = RecordingBackend::allow_all();
    let decorator = decorator(&["jmx.acl", "other"], backend.clone());
    let tree = EntityTree::new().with_inline("java.lang", "type=Memory", memory_shape());

    assert_eq!(decorator.decorate(tree.clone()), Listing::Plain(tree));
    assert_eq!(backend.calls(), 0);
}

#[test]
fn test_inline_entities_are_decorated_in_place() {
    let backend = RecordingBackend::new(|entity, operation| match (entity, operation) {
        ("java.lang:type=Memory", None) => Some(true),
        ("org.foo:type=Bundle,id=1", None) => Some(false),
        ("org.foo:type=Bundle,id=1", Some("stop()")) => Some(true),
        ("org.foo:type=Bundle,id=1", Some(_)) => Some(false),
        _ => None,
    });
    let decorator = decorator(&["acl"], backend.clone());
    let tree = EntityTree::new()
        .with_inline("java.lang", "type=Memory", memory_shape())
        .with_inline("org.foo", "type=Bundle,id=1", bundle_shape());

    let decorated = decorator.try_decorate(&tree).unwrap().unwrap();

    let memory = decorated.description("java.lang", "type=Memory").unwrap();
    assert!(memory.can_invoke);
    assert!(memory.op_by_string.is_empty());
    assert_eq!(memory.description, memory_shape());

    let bundle = decorated.description("org.foo", "type=Bundle,id=1").unwrap();
    assert!(!bundle.can_invoke);
    assert_eq!(bundle.can_invoke_operation("stop()"), Some(true));
    assert_eq!(bundle.can_invoke_operation("start()"), Some(false));
    assert_eq!(bundle.can_invoke_operation("update(java.lang.String)"), Some(false));
    assert!(decorated.cache.is_empty());
}

#[test]
fn test_quoted_names_are_decorated() {
    let name = r#"context=c1,type=routes,name="a,b""#;
    let backend = RecordingBackend::allow_all();
    let decorator = decorator(&["acl"], backend.clone());
    let tree = EntityTree::new()
        .with_inline("org.apache.camel", name, bundle_shape())
        .with_inline("java.lang", "type=Memory", memory_shape());

    let listing = decorator.decorate(tree);

    let decorated = listing.decorated().unwrap();
    let routes = decorated.description("org.apache.camel", name).unwrap();
    assert!(routes.can_invoke);
    assert_eq!(routes.can_invoke_operation("stop()"), Some(true));
    assert!(decorated.description("java.lang", "type=Memory").unwrap().can_invoke);
    assert_eq!(backend.calls(), 2);
    assert!(
        backend
            .queried_entities()
            .contains(&format!("org.apache.camel:{name}"))
    );
}

#[test]
fn test_exactly_one_call_per_query_kind() {
    let backend = RecordingBackend::allow_all();
    let decorator = decorator(&["acl", "acl.org.foo"], backend.clone());
    let mut tree = EntityTree::new()
        .with_cached("bundle", bundle_shape())
        .with_inline("java.lang", "type=Memory", memory_shape());
    for i in 0..500 {
        tree = tree.with_shared("org.foo", &format!("type=Bundle,id={i}"), "bundle");
    }

    let decorated = decorator.try_decorate(&tree).unwrap().unwrap();

    assert_eq!(backend.calls(), 2);
    assert_eq!(decorated.entity_count(), 501);
    assert_eq!(decorated.cache.len(), 1);
    // one shared group representative plus the inline entity
    assert_eq!(backend.queried_entities().len(), 2);
}

#[test]
fn test_entities_without_operations_skip_operation_query() {
    let backend = RecordingBackend::allow_all();
    let decorator = decorator(&["acl"], backend.clone());
    let tree = EntityTree::new().with_inline("java.lang", "type=Memory", memory_shape());

    let decorated = decorator.try_decorate(&tree).unwrap().unwrap();

    assert_eq!(backend.calls(), 1);
    assert!(decorated.description("java.lang", "type=Memory").unwrap().can_invoke);
}

#[test]
fn test_missing_row_denies() {
    let backend = RecordingBackend::new(|entity, _| {
        (entity == "org.foo:type=Bundle,id=1").then_some(true)
    });
    let decorator = decorator(&["acl"], backend);
    let tree = EntityTree::new()
        .with_inline("org.foo", "type=Bundle,id=1", bundle_shape())
        .with_inline("org.foo", "type=Bundle,id=2", bundle_shape());

    let decorated = decorator.try_decorate(&tree).unwrap().unwrap();

    let first = decorated.description("org.foo", "type=Bundle,id=1").unwrap();
    let second = decorated.description("org.foo", "type=Bundle,id=2").unwrap();
    assert!(first.can_invoke);
    assert!(first.op_by_string.values().all(|a| a.can_invoke));
    assert!(!second.can_invoke);
    assert!(second.op_by_string.values().all(|a| !a.can_invoke));
}

#[test]
fn test_input_tree_is_not_modified() {
    let backend = RecordingBackend::allow_all();
    let decorator = decorator(&["acl"], backend);
    let tree = EntityTree::new()
        .with_cached("bundle", bundle_shape())
        .with_shared("org.foo", "type=Bundle,id=1", "bundle");
    let before = tree.clone();

    let listing = decorator.decorate(tree);

    assert!(listing.is_decorated());
    let decorated = decorator.try_decorate(&before).unwrap().unwrap();
    assert_eq!(listing.decorated(), Some(&decorated));
    assert_eq!(
        before.entity("org.foo", "type=Bundle,id=1"),
        Some(&DescriptionRef::Shared("bundle".to_string()))
    );
}

#[test]
fn test_decorated_listing_serialization() {
    let backend = RecordingBackend::allow_all();
    let decorator = decorator(&["acl"], backend);
    let tree = EntityTree::new().with_inline("java.lang", "type=Memory", memory_shape());

    let listing = decorator.decorate(tree);

    let json = serde_json::to_value(&listing).unwrap();
    assert_eq!(json["domains"]["java.lang"]["type=Memory"]["canInvoke"], true);
    assert_eq!(json["domains"]["java.lang"]["type=Memory"]["desc"], "memory");
    assert!(json["cache"].as_object().unwrap().is_empty());
}

#[test]
fn test_concurrent_decoration() {
    use std::thread;

    let backend = RecordingBackend::allow_all();
    let decorator = decorator(&["acl", "acl.org.foo._"], backend.clone());
    let mut tree = EntityTree::new().with_cached("bundle", bundle_shape());
    for i in 0..20 {
        tree = tree.with_shared("org.foo", &format!("type=Bundle,id={i}"), "bundle");
    }
    let tree = Arc::new(tree);

    let mut handles = vec![];
    for _ in 0..8 {
        let decorator = decorator.clone();
        let tree = Arc::clone(&tree);
        handles.push(thread::spawn(move || decorator.try_decorate(&tree).unwrap().unwrap()));
    }
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(backend.calls(), 16);
}
