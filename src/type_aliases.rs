// SPDX-License-Identifier: MPL-2.0

//! Publicly exported type aliases.

use std::hash::BuildHasherDefault;

use crate::graph::DependencyGraph;
use crate::solver::{Conflict, SpecificationProvider};

/// Map implementation used by the library.
pub type Map<K, V> = rustc_hash::FxHashMap<K, V>;

/// Set implementation used by the library.
pub type Set<V> = rustc_hash::FxHashSet<V>;

/// Insertion-ordered map used by the library wherever iteration order is
/// observable, so that identical runs produce identical output.
pub type OrderedMap<K, V> = indexmap::IndexMap<K, V, BuildHasherDefault<rustc_hash::FxHasher>>;

/// Requirements on one package, grouped by the name of the source that
/// contributed each of them.
pub type GroupedRequirements<R> = OrderedMap<String, Vec<R>>;

/// The most recent [Conflict] recorded for each package name during
/// [resolve](crate::resolve).
pub type ConflictMap<R, S> = OrderedMap<String, Conflict<R, S>>;

/// The activated dependency graph built by [resolve](crate::resolve) for a
/// given provider: payloads are the provider's specifications, edges carry the
/// provider's requirements.
pub type ResolutionGraph<P> = DependencyGraph<
    <P as SpecificationProvider>::Spec,
    <P as SpecificationProvider>::Requirement,
>;
