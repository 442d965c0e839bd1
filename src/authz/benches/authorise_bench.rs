/// Benchmarks for the authorisation engine
///
/// Measures performance of:
/// - Ancestor traversal over deep and wide hierarchies
/// - Rule lookups with and without the cache
/// - Full authorise_action decisions
/// - Concurrent decisions

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use roleaction_authz::{
    AuthorisationEngine, DomainGraph, Entity, EntityId, EntityType, InMemoryDomainGraph, Role,
    RuleConfig, RuleConfigResolver, ScopeRuleResolver, User,
};
use roleaction_authz::types::Action;
use std::sync::Arc;
use std::thread;

const RULES: &str = r#"
[[mapping]]
projects = ["EGI"]

[[mapping.rule]]
roles = ["Site Administrator", "Site Security Officer"]
over = "Site"
actions = ["editSite", "deleteSite"]
targets = ["Site"]

[[mapping.rule]]
roles = ["NGI Operations Manager"]
over = "Ngi"
actions = ["editSite", "deleteSite"]
targets = ["Site"]

[[mapping]]

[[mapping.rule]]
roles = ["Service Group Administrator"]
over = "ServiceGroup"
actions = ["editServiceGroup"]
targets = ["ServiceGroup"]
"#;

/// Project → `ngis` NGIs → `sites` sites each; the NGI manager role sits on
/// the first NGI
fn hierarchy(ngis: usize, sites: usize) -> (InMemoryDomainGraph, Entity, User) {
    let mut graph = InMemoryDomainGraph::new();
    graph.add_entity(Entity::new("egi", "Project", "EGI")).unwrap();

    for n in 0..ngis {
        let ngi = format!("ngi{}", n);
        graph.add_entity(Entity::new(ngi.as_str(), "Ngi", ngi.to_uppercase())).unwrap();
        graph.add_parent(&EntityId::new(ngi.as_str()), &EntityId::new("egi")).unwrap();

        for s in 0..sites {
            let site = format!("{}-site{}", ngi, s);
            graph.add_entity(Entity::new(site.as_str(), "Site", site.to_uppercase())).unwrap();
            graph.add_parent(&EntityId::new(site.as_str()), &EntityId::new(ngi.as_str())).unwrap();
        }
    }

    let user = User::new("manager");
    let ngi = graph.entity(&EntityId::new("ngi0")).unwrap();
    graph.add_role(Role::new(&user, "NGI Operations Manager", &ngi)).unwrap();

    let target = graph.entity(&EntityId::new("ngi0-site0")).unwrap();
    (graph, target, user)
}

/// A chain of `depth` NGI-like entities under a single project
fn chain(depth: usize) -> (InMemoryDomainGraph, Entity) {
    let mut graph = InMemoryDomainGraph::new();
    graph.add_entity(Entity::new("n0", "Project", "EGI")).unwrap();
    for d in 1..=depth {
        let id = format!("n{}", d);
        graph.add_entity(Entity::new(id.as_str(), "Ngi", id.as_str())).unwrap();
        graph
            .add_parent(&EntityId::new(id.as_str()), &EntityId::new(format!("n{}", d - 1)))
            .unwrap();
    }
    let leaf = graph.entity(&EntityId::new(format!("n{}", depth))).unwrap();
    (graph, leaf)
}

fn resolver(cache: bool) -> RuleConfigResolver {
    RuleConfigResolver::with_cache(&RuleConfig::from_toml(RULES).unwrap(), cache).unwrap()
}

fn bench_traversal(c: &mut Criterion) {
    let mut group = c.benchmark_group("ancestor_traversal");

    for depth in [4, 16, 64] {
        let (graph, leaf) = chain(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &leaf, |b, leaf| {
            b.iter(|| graph.reachable_scopes_ascending(black_box(leaf)).unwrap());
        });
    }

    group.finish();
}

fn bench_rule_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("rule_lookup");
    let action = Action::parse("editSite").unwrap();
    let site = EntityType::new("Site");

    for (name, cache) in [("cached", true), ("uncached", false)] {
        let rules = resolver(cache);
        group.bench_function(name, |b| {
            b.iter(|| {
                rules
                    .required_role_types(black_box(&action), &site, Some("EGI"))
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_authorise_action(c: &mut Criterion) {
    let mut group = c.benchmark_group("authorise_action");

    for (ngis, sites) in [(1, 10), (10, 100), (50, 200)] {
        let (graph, target, user) = hierarchy(ngis, sites);
        let engine = AuthorisationEngine::new(Arc::new(graph), Arc::new(resolver(true)));
        let label = format!("{}x{}", ngis, sites);

        group.bench_with_input(BenchmarkId::new("granted", &label), &target, |b, target| {
            b.iter(|| engine.authorise_action(black_box("editSite"), target, &user).unwrap());
        });

        let stranger = User::new("stranger");
        group.bench_with_input(BenchmarkId::new("denied", &label), &target, |b, target| {
            b.iter(|| engine.authorise_action(black_box("editSite"), target, &stranger).unwrap());
        });
    }

    group.finish();
}

fn bench_concurrent(c: &mut Criterion) {
    let (graph, target, user) = hierarchy(10, 100);
    let engine = Arc::new(AuthorisationEngine::new(Arc::new(graph), Arc::new(resolver(true))));

    c.bench_function("concurrent_decisions_8_threads", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let engine = Arc::clone(&engine);
                    let target = target.clone();
                    let user = user.clone();
                    thread::spawn(move || {
                        for _ in 0..100 {
                            engine.authorise_action("editSite", &target, &user).unwrap();
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }
        });
    });
}

criterion_group!(
    benches,
    bench_traversal,
    bench_rule_lookup,
    bench_authorise_action,
    bench_concurrent
);
criterion_main!(benches);
