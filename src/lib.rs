// SPDX-License-Identifier: MPL-2.0

//! Spindle is a generic dependency resolver: a backtracking search engine
//! that, given a set of requested requirements and a
//! [SpecificationProvider] supplying domain knowledge about packages,
//! produces a locked [DependencyGraph] in which every activated package
//! satisfies every requirement imposed on it.
//!
//! The engine is domain-agnostic. It never inspects version strings, parses
//! constraints, or performs I/O: requirements and specifications are opaque
//! values it only names, compares, and hands back to the provider. That
//! makes the same core usable for language package managers, plugin systems,
//! or anything else with named things, candidate versions, and nested
//! requirements.
//!
//! Resolution walks a stack of partial-solution states. Each *dependency
//! state* is a choice point holding the untried candidates for one
//! requirement; trialing a candidate happens in a derived *possibility
//! state* so that a failed trial is dropped without forgetting the
//! alternatives. A candidate that fits is *activated* into the graph and
//! its nested requirements are queued; one that does not produces a
//! [Conflict] attributing the failure to the sources involved, and the
//! stack is rewound to the deepest choice point that can still change the
//! outcome. When no such point exists, resolution fails with
//! [ResolverError::VersionConflict] carrying the conflicts.
//!
//! See [resolve] for the entry point and [OfflineSpecificationProvider] for
//! a ready-made in-memory provider:
//!
//! ```
//! use spindle::{resolve, DefaultUi, DependencyGraph, OfflineSpecificationProvider, Ranges};
//!
//! let mut provider = OfflineSpecificationProvider::<&str, u32>::new();
//! provider.add_dependencies("app", 1u32, [("lib", Ranges::higher_than(2u32))]);
//! provider.add_dependencies("lib", 2u32, []);
//! provider.add_dependencies("lib", 3u32, []);
//!
//! let solution = resolve(
//!     &provider,
//!     &DefaultUi,
//!     [("app", Ranges::full())],
//!     &DependencyGraph::new(),
//! )
//! .unwrap();
//!
//! // The newest matching version of each package wins.
//! assert_eq!(solution.vertex_named("lib").unwrap().payload(), Some(&("lib", 3)));
//! assert!(solution.is_frozen());
//! ```

#![warn(missing_docs)]

mod error;
mod graph;
mod internal;
mod package;
mod provider;
mod solver;
mod type_aliases;
mod ui;

pub use error::{GraphError, NoSuchDependencyError, ResolverError};
pub use graph::{DependencyGraph, Edge, EdgeId, Vertex, VertexId};
pub use package::Package;
pub use provider::OfflineSpecificationProvider;
pub use solver::{resolve, Conflict, SpecificationProvider};
pub use type_aliases::{
    ConflictMap, GroupedRequirements, Map, OrderedMap, ResolutionGraph, Set,
};
pub use ui::{DefaultUi, Ui};
pub use version_ranges::Ranges;
