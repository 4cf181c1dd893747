// SPDX-License-Identifier: MPL-2.0

//! Backtracking dependency resolution.
//!
//! Given a set of requested requirements and a provider that knows the
//! domain's packages, [resolve] searches for an activated dependency graph in
//! which every requirement imposed on an activated package is satisfied. The
//! search keeps a stack of partial-solution states: a *dependency state* is an
//! uncommitted choice point holding every remaining candidate for one
//! requirement, and trialing a candidate happens in a derived *possibility
//! state*, so a failed trial is discarded without losing the untried
//! alternatives. When a candidate conflicts, the resolver records which
//! sources imposed the competing requirements and rewinds the stack to the
//! deepest choice point that can still change the outcome.
//!
//! The engine is domain-agnostic: it never parses constraints, compares
//! versions, or performs I/O. All such knowledge lives behind
//! [SpecificationProvider].
//!
//! ## API
//!
//! ```
//! use spindle::{resolve, DefaultUi, DependencyGraph, OfflineSpecificationProvider, Ranges};
//!
//! let mut provider = OfflineSpecificationProvider::<&str, u32>::new();
//! provider.add_dependencies("root", 1u32, [("leaf", Ranges::higher_than(1u32))]);
//! provider.add_dependencies("leaf", 2u32, []);
//!
//! let base = DependencyGraph::new();
//! let solution = resolve(&provider, &DefaultUi, [("root", Ranges::full())], &base).unwrap();
//!
//! assert_eq!(solution.vertex_named("root").unwrap().payload(), Some(&("root", 1)));
//! assert_eq!(solution.vertex_named("leaf").unwrap().payload(), Some(&("leaf", 2)));
//! ```
//!
//! `base` may carry previously locked activations; a candidate is only
//! activated if it also satisfies the requirement derived from the locked
//! specification of the same name, which is how a lock file pins resolution.

use std::fmt::Debug;

use crate::error::{NoSuchDependencyError, ResolverError};
use crate::internal::Resolution;
use crate::type_aliases::{ConflictMap, GroupedRequirements, ResolutionGraph};
use crate::ui::Ui;

/// Main function of the library. Finds an activated dependency graph
/// satisfying `requested` (and any locked specification in `base`), or
/// reports why none exists.
///
/// The returned graph is frozen. Given a deterministic provider, the result
/// is deterministic.
#[cold]
pub fn resolve<P: SpecificationProvider, U: Ui>(
    provider: &P,
    ui: &U,
    requested: impl IntoIterator<Item = P::Requirement>,
    base: &ResolutionGraph<P>,
) -> Result<ResolutionGraph<P>, ResolverError<P::Requirement, P::Spec>> {
    Resolution::new(provider, ui, requested.into_iter().collect(), base).resolve()
}

/// A record of one failed activation: the requirement that failed, what stood
/// in its way, and who imposed each of the competing requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict<R, S> {
    /// The requirement that could not be satisfied.
    pub requirement: R,
    /// Every requirement imposed on the package, grouped by the name of the
    /// source that contributed it. Two reserved names mark requirements that
    /// came from the user and from the lock (see
    /// [SpecificationProvider::name_for_explicit_dependency_source] and
    /// [SpecificationProvider::name_for_locking_dependency_source]); all
    /// other keys are names of activated packages.
    pub requirements: GroupedRequirements<R>,
    /// The specification already activated for the package, if any.
    pub existing: Option<S>,
    /// The candidate that failed, if one was being trialed.
    pub possibility: Option<S>,
}

/// Trait through which the resolver asks domain questions: which candidates
/// could satisfy a requirement, what a candidate requires in turn, and
/// whether a candidate satisfies a requirement in the context of the graph
/// activated so far.
///
/// An implementor is handed to [resolve]. Outputs must be deterministic;
/// resolution order, and therefore the shape of the result, follows them.
pub trait SpecificationProvider {
    /// How the provider describes a constraint on a single package.
    /// Requirements are compared by value equality and otherwise opaque to
    /// the resolver.
    type Requirement: Clone + Eq + Debug;

    /// How the provider describes one concrete candidate. Specifications
    /// become vertex payloads and are otherwise opaque to the resolver.
    type Spec: Clone + Eq + Debug;

    /// The name of the package `requirement` constrains.
    fn name_for(&self, requirement: &Self::Requirement) -> String;

    /// The name of the package `spec` instantiates.
    fn name_for_spec(&self, spec: &Self::Spec) -> String;

    /// Reserved source name under which user-requested requirements are
    /// grouped in a [Conflict]. Must differ from every real package name.
    fn name_for_explicit_dependency_source(&self) -> String {
        "user-specified dependency".to_owned()
    }

    /// Reserved source name under which requirements derived from the locked
    /// `base` graph are grouped in a [Conflict]. Must differ from every real
    /// package name.
    fn name_for_locking_dependency_source(&self) -> String {
        "lockfile".to_owned()
    }

    /// The requirement a locked specification from `base` imposes on
    /// candidates for the same package, typically "exactly this version".
    fn requirement_for_locked_spec(&self, spec: &Self::Spec) -> Self::Requirement;

    /// Candidates that may satisfy `requirement`, ordered by preference with
    /// the **last** element tried first.
    fn search_for(
        &self,
        requirement: &Self::Requirement,
    ) -> Result<Vec<Self::Spec>, NoSuchDependencyError<Self::Requirement>>;

    /// The nested requirements `spec` carries.
    fn dependencies_for(
        &self,
        spec: &Self::Spec,
    ) -> Result<Vec<Self::Requirement>, NoSuchDependencyError<Self::Requirement>>;

    /// Whether `spec` satisfies `requirement`, given everything activated so
    /// far.
    fn requirement_satisfied_by(
        &self,
        requirement: &Self::Requirement,
        activated: &ResolutionGraph<Self>,
        spec: &Self::Spec,
    ) -> bool;

    /// Orders outstanding requirements, most preferred first. A common
    /// heuristic puts already-activated packages first, then conflicted
    /// ones, then those with the fewest candidates, so dead ends surface
    /// early. The sort must be stable and deterministic.
    fn sort_dependencies(
        &self,
        requirements: Vec<Self::Requirement>,
        activated: &ResolutionGraph<Self>,
        conflicts: &ConflictMap<Self::Requirement, Self::Spec>,
    ) -> Vec<Self::Requirement>;

    /// Whether resolution may proceed with `requirement` left unsatisfied
    /// when no candidate for it exists. When this returns true the package is
    /// dropped from the graph instead of producing a conflict.
    fn allow_missing(&self, requirement: &Self::Requirement) -> bool {
        let _ = requirement;
        false
    }
}
