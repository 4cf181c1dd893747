// SPDX-License-Identifier: MPL-2.0

//! Snapshots of the search frontier.

use crate::solver::SpecificationProvider;
use crate::type_aliases::{ConflictMap, ResolutionGraph};

/// One snapshot of the search: the partial graph, outstanding requirements,
/// the requirement currently being worked on, its remaining candidates, and
/// the conflicts accumulated so far. Each state owns its graph; snapshots are
/// independent after creation.
pub(crate) struct State<P: SpecificationProvider> {
    /// Name of the package under consideration; empty when `requirement` is
    /// absent, i.e. nothing is left to do.
    pub(crate) name: String,
    /// Still-pending requirements, most preferred first.
    pub(crate) requirements: Vec<P::Requirement>,
    pub(crate) graph: ResolutionGraph<P>,
    pub(crate) requirement: Option<P::Requirement>,
    /// Candidates for `requirement`, lowest preference first: the next one to
    /// try is popped off the back.
    pub(crate) possibilities: Vec<P::Spec>,
    /// Logical depth, for debug indentation.
    pub(crate) depth: usize,
    pub(crate) conflicts: ConflictMap<P::Requirement, P::Spec>,
}

impl<P: SpecificationProvider> State<P> {
    /// Splits off a trial of the next candidate, consuming it from this
    /// state's alternatives. Returns [None] once every candidate has been
    /// tried.
    pub(crate) fn pop_possibility_state(&mut self) -> Option<ResolutionState<P>> {
        let possibility = self.possibilities.pop()?;
        Some(ResolutionState::Possibility(State {
            name: self.name.clone(),
            requirements: self.requirements.clone(),
            graph: self.graph.clone(),
            requirement: self.requirement.clone(),
            possibilities: vec![possibility],
            depth: self.depth + 1,
            conflicts: self.conflicts.clone(),
        }))
    }
}

/// A [State] tagged by its role on the stack.
pub(crate) enum ResolutionState<P: SpecificationProvider> {
    /// An uncommitted choice point still holding every untried alternative
    /// for its requirement.
    Dependency(State<P>),
    /// A trial of one specific candidate, derived from a choice point, so
    /// that discarding a failed trial preserves the remaining alternatives.
    Possibility(State<P>),
}

impl<P: SpecificationProvider> ResolutionState<P> {
    pub(crate) fn get(&self) -> &State<P> {
        match self {
            ResolutionState::Dependency(state) | ResolutionState::Possibility(state) => state,
        }
    }

    pub(crate) fn get_mut(&mut self) -> &mut State<P> {
        match self {
            ResolutionState::Dependency(state) | ResolutionState::Possibility(state) => state,
        }
    }

    pub(crate) fn into_inner(self) -> State<P> {
        match self {
            ResolutionState::Dependency(state) | ResolutionState::Possibility(state) => state,
        }
    }

    pub(crate) fn is_dependency(&self) -> bool {
        matches!(self, ResolutionState::Dependency(_))
    }
}
