// SPDX-License-Identifier: MPL-2.0

//! Errors surfaced by resolution.

use std::fmt::Debug;

use thiserror::Error;

use crate::type_aliases::ConflictMap;

/// Returned by a [SpecificationProvider](crate::SpecificationProvider) when a
/// requirement references a package the provider cannot locate at all.
///
/// The resolver fills in `required_by` with the names of the activated
/// packages (and, where applicable, the reserved explicit source) whose edges
/// point at the missing package before propagating the error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unable to find a specification for {dependency:?}{}", required_by_clause(.required_by))]
pub struct NoSuchDependencyError<R: Debug> {
    /// The requirement that could not be resolved to any specification.
    pub dependency: R,
    /// Names of the sources that demanded the missing package.
    pub required_by: Vec<String>,
}

impl<R: Debug> NoSuchDependencyError<R> {
    /// A missing-dependency error with an empty `required_by` trail.
    pub fn new(dependency: R) -> Self {
        Self {
            dependency,
            required_by: Vec::new(),
        }
    }
}

fn required_by_clause(required_by: &[String]) -> String {
    if required_by.is_empty() {
        String::new()
    } else {
        format!(" (required by {})", required_by.join(", "))
    }
}

/// A mutation rejected by a [DependencyGraph](crate::DependencyGraph).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The graph was frozen and no longer accepts mutations.
    #[error("the dependency graph is frozen")]
    Frozen,
    /// The edge would have made the graph cyclic.
    #[error("an edge from {origin} to {destination} would create a circular dependency")]
    WouldCreateCycle {
        /// Name of the edge's origin vertex.
        origin: String,
        /// Name of the edge's destination vertex.
        destination: String,
    },
    /// An operation referenced a vertex name that is not in the graph.
    #[error("no vertex is named {name}")]
    UnknownVertex {
        /// The name that failed to resolve to a vertex.
        name: String,
    },
}

/// Errors returned by [resolve](crate::resolve).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolverError<R: Debug, S: Debug> {
    /// The search space was exhausted without finding an assignment that
    /// satisfies every requirement. Carries the most recent [Conflict]
    /// recorded for each package involved.
    ///
    /// [Conflict]: crate::Conflict
    #[error("version solving failed for {}", conflicting_names(.0))]
    VersionConflict(ConflictMap<R, S>),
    /// A referenced package does not exist as far as the provider is
    /// concerned.
    #[error(transparent)]
    NoSuchDependency(#[from] NoSuchDependencyError<R>),
    /// The activated graph rejected a mutation, e.g. because nested
    /// dependencies closed a cycle.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

fn conflicting_names<R, S>(conflicts: &ConflictMap<R, S>) -> String {
    conflicts.keys().cloned().collect::<Vec<_>>().join(", ")
}
