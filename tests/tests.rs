// SPDX-License-Identifier: MPL-2.0

use std::cell::{Cell, RefCell};
use std::time::Duration;

use proptest::prelude::*;
use spindle::{
    resolve, DefaultUi, DependencyGraph, GraphError, NoSuchDependencyError,
    OfflineSpecificationProvider, Ranges, ResolutionGraph, ResolverError, SpecificationProvider,
    Ui,
};

type Provider = OfflineSpecificationProvider<&'static str, u32>;
type Req = (&'static str, Ranges<u32>);
type Spec = (&'static str, u32);

fn no_base() -> DependencyGraph<Spec, Req> {
    DependencyGraph::new()
}

#[test]
fn resolves_a_single_requirement() {
    let mut provider = Provider::new();
    provider.add_dependencies("a", 1u32, []);

    let solution = resolve(
        &provider,
        &DefaultUi,
        [("a", Ranges::higher_than(1u32))],
        &no_base(),
    )
    .unwrap();

    assert_eq!(solution.vertex_count(), 1);
    let a = solution.vertex_named("a").unwrap();
    assert!(a.is_root());
    assert_eq!(a.payload(), Some(&("a", 1)));
    assert!(solution.is_frozen());
}

#[test]
fn resolves_nested_dependencies() {
    let mut provider = Provider::new();
    provider.add_dependencies("a", 1u32, [("b", Ranges::higher_than(2u32))]);
    provider.add_dependencies("b", 2u32, []);

    let solution = resolve(&provider, &DefaultUi, [("a", Ranges::full())], &no_base()).unwrap();

    assert_eq!(solution.vertex_named("a").unwrap().payload(), Some(&("a", 1)));
    let b = solution.vertex_named("b").unwrap();
    assert_eq!(b.payload(), Some(&("b", 2)));
    assert!(!b.is_root());

    let b_id = solution.vertex_id("b").unwrap();
    let incoming: Vec<_> = solution.incoming_edges(b_id).collect();
    assert_eq!(incoming.len(), 1);
    assert_eq!(solution.vertex(incoming[0].origin()).name(), "a");
    assert_eq!(
        incoming[0].requirements(),
        &[("b", Ranges::higher_than(2u32))]
    );
}

#[test]
fn backtracks_over_an_unsatisfiable_candidate() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut provider = Provider::new();
    // a@2 is preferred but pins b below the only available version.
    provider.add_dependencies("a", 1u32, [("b", Ranges::between(0u32, 3u32))]);
    provider.add_dependencies("a", 2u32, [("b", Ranges::between(0u32, 2u32))]);
    provider.add_dependencies("b", 2u32, []);

    let requested = [("a", Ranges::full()), ("b", Ranges::full())];
    let solution = resolve(&provider, &DefaultUi, requested, &no_base()).unwrap();

    assert_eq!(solution.vertex_named("a").unwrap().payload(), Some(&("a", 1)));
    assert_eq!(solution.vertex_named("b").unwrap().payload(), Some(&("b", 2)));
}

/// Forwards to an [OfflineSpecificationProvider] while counting calls, so
/// tests can observe how often the resolver consulted the provider.
struct CountingProvider {
    inner: Provider,
    searches: Cell<usize>,
    activations: Cell<usize>,
}

impl CountingProvider {
    fn new(inner: Provider) -> Self {
        Self {
            inner,
            searches: Cell::new(0),
            activations: Cell::new(0),
        }
    }
}

impl SpecificationProvider for CountingProvider {
    type Requirement = Req;
    type Spec = Spec;

    fn name_for(&self, requirement: &Req) -> String {
        self.inner.name_for(requirement)
    }

    fn name_for_spec(&self, spec: &Spec) -> String {
        self.inner.name_for_spec(spec)
    }

    fn requirement_for_locked_spec(&self, spec: &Spec) -> Req {
        self.inner.requirement_for_locked_spec(spec)
    }

    fn search_for(&self, requirement: &Req) -> Result<Vec<Spec>, NoSuchDependencyError<Req>> {
        self.searches.set(self.searches.get() + 1);
        self.inner.search_for(requirement)
    }

    fn dependencies_for(&self, spec: &Spec) -> Result<Vec<Req>, NoSuchDependencyError<Req>> {
        self.activations.set(self.activations.get() + 1);
        self.inner.dependencies_for(spec)
    }

    fn requirement_satisfied_by(
        &self,
        requirement: &Req,
        activated: &ResolutionGraph<Self>,
        spec: &Spec,
    ) -> bool {
        self.inner.requirement_satisfied_by(requirement, activated, spec)
    }

    fn sort_dependencies(
        &self,
        requirements: Vec<Req>,
        activated: &ResolutionGraph<Self>,
        conflicts: &spindle::ConflictMap<Req, Spec>,
    ) -> Vec<Req> {
        self.inner.sort_dependencies(requirements, activated, conflicts)
    }
}

#[test]
fn reuses_an_existing_activation_for_a_duplicate_name() {
    let mut inner = Provider::new();
    inner.add_dependencies("a", 1u32, []);
    let provider = CountingProvider::new(inner);

    let requested = [("a", Ranges::full()), ("a", Ranges::higher_than(1u32))];
    let solution = resolve(&provider, &DefaultUi, requested, &no_base()).unwrap();

    assert_eq!(solution.vertex_count(), 1);
    let a = solution.vertex_named("a").unwrap();
    assert_eq!(a.payload(), Some(&("a", 1)));
    assert_eq!(
        a.explicit_requirements(),
        &[("a", Ranges::full()), ("a", Ranges::higher_than(1u32))]
    );
    // The second requirement was served by the existing activation.
    assert_eq!(provider.activations.get(), 1);
}

#[test]
fn reports_grouped_requirements_when_unresolvable() {
    let mut provider = Provider::new();
    provider.add_dependencies("a", 1u32, [("b", Ranges::higher_than(5u32))]);
    provider.add_dependencies("b", 1u32, []);

    let requested = [("a", Ranges::full()), ("b", Ranges::full())];
    let err = resolve(&provider, &DefaultUi, requested, &no_base()).unwrap_err();

    let ResolverError::VersionConflict(conflicts) = err else {
        panic!("expected a version conflict, got {err:?}");
    };
    let conflict = &conflicts["b"];
    assert_eq!(conflict.requirement, ("b", Ranges::higher_than(5u32)));
    assert_eq!(conflict.existing, None);
    assert_eq!(conflict.possibility, None);
    assert_eq!(
        conflict.requirements["user-specified dependency"],
        vec![("b", Ranges::full())]
    );
    assert_eq!(
        conflict.requirements["a"],
        vec![("b", Ranges::higher_than(5u32))]
    );
    assert!(!conflict.requirements.contains_key("lockfile"));
}

#[test]
fn conflicts_record_the_existing_activation() {
    let mut provider = Provider::new();
    provider.add_dependencies("a", 1u32, [("b", Ranges::between(0u32, 2u32))]);
    provider.add_dependencies("b", 2u32, []);

    let requested = [("b", Ranges::higher_than(2u32)), ("a", Ranges::full())];
    let err = resolve(&provider, &DefaultUi, requested, &no_base()).unwrap_err();

    let ResolverError::VersionConflict(conflicts) = err else {
        panic!("expected a version conflict, got {err:?}");
    };
    let conflict = &conflicts["b"];
    assert_eq!(conflict.existing, Some(("b", 2)));
    assert_eq!(conflict.requirements["a"], vec![("b", Ranges::between(0u32, 2u32))]);
}

#[test]
fn falls_back_to_the_locked_version() {
    let mut provider = Provider::new();
    provider.add_dependencies("a", 1u32, []);
    provider.add_dependencies("a", 2u32, []);

    let mut base = no_base();
    base.add_vertex("a", Some(("a", 1)), true).unwrap();

    let solution = resolve(
        &provider,
        &DefaultUi,
        [("a", Ranges::higher_than(1u32))],
        &base,
    )
    .unwrap();

    // a@2 satisfies the request but not the lock.
    assert_eq!(solution.vertex_named("a").unwrap().payload(), Some(&("a", 1)));
}

#[test]
fn lock_requirements_appear_in_conflicts() {
    let mut provider = Provider::new();
    provider.add_dependencies("a", 2u32, []);

    let mut base = no_base();
    base.add_vertex("a", Some(("a", 1)), true).unwrap();

    let err = resolve(
        &provider,
        &DefaultUi,
        [("a", Ranges::higher_than(2u32))],
        &base,
    )
    .unwrap_err();

    let ResolverError::VersionConflict(conflicts) = err else {
        panic!("expected a version conflict, got {err:?}");
    };
    let conflict = &conflicts["a"];
    assert_eq!(conflict.possibility, Some(("a", 2)));
    assert_eq!(
        conflict.requirements["lockfile"],
        vec![("a", Ranges::singleton(1u32))]
    );
}

#[test]
fn empty_requests_produce_an_empty_frozen_graph() {
    let provider = CountingProvider::new(Provider::new());

    let solution = resolve(&provider, &DefaultUi, [], &no_base()).unwrap();

    assert_eq!(solution.vertex_count(), 0);
    assert!(solution.is_frozen());
    assert_eq!(provider.searches.get(), 0);
}

#[test]
fn a_base_that_satisfies_everything_is_returned_unchanged() {
    let mut provider = Provider::new();
    provider.add_dependencies("a", 1u32, []);

    let mut base = no_base();
    base.add_root_vertex("a", ("a", Ranges::full())).unwrap();
    let id = base.vertex_id("a").unwrap();
    base.set_payload(id, ("a", 1)).unwrap();

    let solution = resolve(&provider, &DefaultUi, [("a", Ranges::full())], &base).unwrap();

    assert_eq!(solution, base);
    assert!(solution.is_frozen());
    assert!(!base.is_frozen());
}

#[test]
fn an_empty_candidate_list_surfaces_as_a_version_conflict() {
    let mut provider = Provider::new();
    provider.add_dependencies("a", 1u32, []);

    let err = resolve(
        &provider,
        &DefaultUi,
        [("a", Ranges::higher_than(5u32))],
        &no_base(),
    )
    .unwrap_err();

    let ResolverError::VersionConflict(conflicts) = err else {
        panic!("expected a version conflict, got {err:?}");
    };
    assert_eq!(
        conflicts["a"].requirements["user-specified dependency"],
        vec![("a", Ranges::higher_than(5u32))]
    );
}

#[test]
fn tolerated_missing_packages_are_dropped_from_the_graph() {
    let mut provider = Provider::new();
    provider.add_dependencies("a", 1u32, [("plugin", Ranges::full())]);
    OfflineSpecificationProvider::allow_missing(&mut provider, "plugin");

    let solution = resolve(&provider, &DefaultUi, [("a", Ranges::full())], &no_base()).unwrap();

    assert_eq!(solution.vertex_named("a").unwrap().payload(), Some(&("a", 1)));
    assert!(solution.vertex_named("plugin").is_none());
    assert_eq!(solution.vertex_count(), 1);
}

#[test]
fn missing_packages_report_who_required_them() {
    let mut provider = Provider::new();
    provider.add_dependencies("a", 1u32, [("ghost", Ranges::full())]);

    let err = resolve(&provider, &DefaultUi, [("a", Ranges::full())], &no_base()).unwrap_err();

    let ResolverError::NoSuchDependency(error) = err else {
        panic!("expected a missing dependency, got {err:?}");
    };
    assert_eq!(error.dependency, ("ghost", Ranges::full()));
    assert_eq!(error.required_by, vec!["a".to_owned()]);
}

#[test]
fn unknown_requested_packages_fail_fast() {
    let provider = Provider::new();

    let err = resolve(&provider, &DefaultUi, [("nope", Ranges::full())], &no_base()).unwrap_err();

    let ResolverError::NoSuchDependency(error) = err else {
        panic!("expected a missing dependency, got {err:?}");
    };
    assert_eq!(error.dependency, ("nope", Ranges::full()));
    assert!(error.required_by.is_empty());
}

#[test]
fn circular_dependencies_are_reported() {
    let mut provider = Provider::new();
    provider.add_dependencies("a", 1u32, [("b", Ranges::full())]);
    provider.add_dependencies("b", 1u32, [("a", Ranges::full())]);

    let err = resolve(&provider, &DefaultUi, [("a", Ranges::full())], &no_base()).unwrap_err();

    assert!(matches!(
        err,
        ResolverError::Graph(GraphError::WouldCreateCycle { .. })
    ));
}

#[test]
fn the_returned_graph_is_frozen() {
    let mut provider = Provider::new();
    provider.add_dependencies("a", 1u32, []);

    let mut solution =
        resolve(&provider, &DefaultUi, [("a", Ranges::full())], &no_base()).unwrap();

    assert_eq!(
        solution.add_vertex("x", None, false),
        Err(GraphError::Frozen)
    );
    let a = solution.vertex_id("a").unwrap();
    assert_eq!(solution.set_payload(a, ("a", 9)), Err(GraphError::Frozen));
}

#[test]
fn repeated_runs_return_identical_graphs() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut provider = Provider::new();
    provider.add_dependencies("c", 0u32, []);
    provider.add_dependencies("c", 2u32, []);
    provider.add_dependencies("b", 0u32, []);
    provider.add_dependencies("b", 1u32, [("c", Ranges::between(0u32, 1u32))]);
    provider.add_dependencies("a", 0u32, [("b", Ranges::full()), ("c", Ranges::full())]);

    let requested = [("a", Ranges::full())];
    let first = resolve(&provider, &DefaultUi, requested.clone(), &no_base()).unwrap();
    for _ in 0..10 {
        let again = resolve(&provider, &DefaultUi, requested.clone(), &no_base()).unwrap();
        assert_eq!(first, again);
    }
}

/// Records hook invocations; a zero progress rate latches the reporting
/// period on the first iteration.
#[derive(Default)]
struct RecordingUi {
    events: RefCell<Vec<&'static str>>,
}

impl Ui for RecordingUi {
    fn before_resolution(&self) {
        self.events.borrow_mut().push("before");
    }

    fn after_resolution(&self) {
        self.events.borrow_mut().push("after");
    }

    fn indicate_progress(&self) {
        self.events.borrow_mut().push("progress");
    }

    fn progress_rate(&self) -> Duration {
        Duration::ZERO
    }

    fn debug(&self, _depth: usize, _message: &dyn Fn() -> String) {}
}

#[test]
fn ui_hooks_fire_in_order() {
    let mut provider = Provider::new();
    provider.add_dependencies("a", 1u32, [("b", Ranges::full())]);
    provider.add_dependencies("b", 1u32, []);

    let ui = RecordingUi::default();
    resolve(&provider, &ui, [("a", Ranges::full())], &no_base()).unwrap();

    let events = ui.events.borrow();
    assert_eq!(events.first(), Some(&"before"));
    assert_eq!(events.last(), Some(&"after"));
    assert!(events.contains(&"progress"));
}

#[test]
fn the_after_hook_fires_on_failure_too() {
    let mut provider = Provider::new();
    provider.add_dependencies("a", 1u32, [("ghost", Ranges::full())]);

    let ui = RecordingUi::default();
    let _ = resolve(&provider, &ui, [("a", Ranges::full())], &no_base()).unwrap_err();

    assert_eq!(ui.events.borrow().last(), Some(&"after"));
}

type RegistryEntry = (u8, u8, Vec<(u8, Ranges<u8>)>);

/// Random registries in which package `i` only ever depends on packages
/// numbered above `i`, so no registry asks for a cyclic graph. Package 0
/// always exists at version 0 with no dependencies.
fn registry_strategy() -> impl Strategy<Value = Vec<RegistryEntry>> {
    const PACKAGES: u8 = 4;
    let entry = (0u8..PACKAGES, 0u8..3u8).prop_flat_map(|(package, version)| {
        let dependency = ((package + 1)..=PACKAGES, 0u8..3u8, 1u8..4u8).prop_map(
            |(target, low, width)| (target, Ranges::between(low, low.saturating_add(width))),
        );
        proptest::collection::vec(dependency, 0..3)
            .prop_map(move |dependencies| (package, version, dependencies))
    });
    proptest::collection::vec(entry, 1..12).prop_map(|mut entries| {
        entries.push((0, 0, Vec::new()));
        entries
    })
}

proptest! {
    #[test]
    fn resolution_is_deterministic_and_sound(registry in registry_strategy()) {
        let mut provider = OfflineSpecificationProvider::<u8, u8>::new();
        for (package, version, dependencies) in &registry {
            provider.add_dependencies(*package, *version, dependencies.clone());
        }
        let requested = vec![(0u8, Ranges::full())];
        let base = DependencyGraph::new();

        let first = resolve(&provider, &DefaultUi, requested.clone(), &base);
        let second = resolve(&provider, &DefaultUi, requested, &base);
        match (&first, &second) {
            (Ok(left), Ok(right)) => prop_assert_eq!(left, right),
            (Err(_), Err(_)) => {}
            _ => prop_assert!(false, "two runs over the same registry disagreed"),
        }

        if let Ok(solution) = &first {
            for vertex in solution.vertices() {
                let payload = vertex.payload();
                prop_assert!(payload.is_some(), "{} has no payload", vertex.name());
                let payload = payload.unwrap();
                for requirement in vertex.explicit_requirements() {
                    prop_assert!(provider.requirement_satisfied_by(requirement, solution, payload));
                }
                let id = solution.vertex_id(vertex.name()).unwrap();
                for edge in solution.incoming_edges(id) {
                    for requirement in edge.requirements() {
                        prop_assert!(provider.requirement_satisfied_by(requirement, solution, payload));
                    }
                }
            }
        }
    }
}
