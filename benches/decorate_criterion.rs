use std::collections::BTreeMap;
use std::hint::black_box;
use std::sync::Arc;

use acl_decorator::{
    ArgInfo, DecorationError, EntityDescription, EntityTree, OperationInfo, PermissionBackend,
    PermissionRow, RbacDecorator, StaticPolicyStore,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

struct AllowAll;

impl PermissionBackend for AllowAll {
    fn can_invoke(
        &self,
        query: &BTreeMap<String, Vec<String>>,
    ) -> Result<Vec<PermissionRow>, DecorationError> {
        let mut rows = Vec::new();
        for (entity, ops) in query {
            rows.push(PermissionRow::entity(entity.clone(), true));
            for op in ops {
                rows.push(PermissionRow::operation(entity.clone(), op.clone(), true));
            }
        }
        Ok(rows)
    }
}

struct Scenario {
    name: String,
    decorator: RbacDecorator,
    tree: EntityTree,
}

fn shape() -> EntityDescription {
    EntityDescription::default()
        .with_attr("State", "java.lang.String", false)
        .with_op("start", OperationInfo::new(vec![], "void"))
        .with_op("stop", OperationInfo::new(vec![], "void"))
        .with_op(
            "update",
            OperationInfo::new(vec![ArgInfo::new("location", "java.lang.String")], "void"),
        )
}

/// `entities` shared bundles spread over `chains` distinct policy chains.
fn build_scenario(entities: usize, chains: usize) -> Scenario {
    let mut policies = vec!["acl".to_string(), "acl.org.foo".to_string()];
    policies.extend((0..chains.saturating_sub(1)).map(|i| format!("acl.org.foo.Bundle.{i}")));

    let decorator = RbacDecorator::builder()
        .with_policy_store(Arc::new(StaticPolicyStore::new(policies)))
        .with_permission_backend(Arc::new(AllowAll))
        .build()
        .expect("benchmark config is valid");

    let mut tree = EntityTree::new().with_cached("bundle", shape());
    for i in 0..entities {
        tree = tree.with_shared("org.foo", &format!("type=Bundle,id={i}"), "bundle");
    }

    Scenario {
        name: format!("{entities}x{chains}"),
        decorator,
        tree,
    }
}

fn benchmark_decorate(c: &mut Criterion) {
    let mut group = c.benchmark_group("decorate");
    group.sample_size(40);

    let scenarios: Vec<_> = [(100, 1), (1_000, 1), (1_000, 10), (1_000, 100), (5_000, 10)]
        .into_iter()
        .map(|(entities, chains)| build_scenario(entities, chains))
        .collect();

    for scenario in &scenarios {
        group.bench_with_input(
            BenchmarkId::from_parameter(&scenario.name),
            scenario,
            |b, s| {
                b.iter(|| {
                    let decorated = s
                        .decorator
                        .try_decorate(black_box(&s.tree))
                        .expect("benchmark listings are valid");
                    black_box(decorated);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_decorate);
criterion_main!(benches);
