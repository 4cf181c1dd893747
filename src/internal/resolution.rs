// SPDX-License-Identifier: MPL-2.0

//! The resolution state machine: a stack of partial-solution states advanced
//! by a sort/pick/activate protocol and rewound when a candidate conflicts.

use std::time::Instant;

use crate::error::{NoSuchDependencyError, ResolverError};
use crate::internal::{ResolutionState, State};
use crate::solver::{Conflict, SpecificationProvider};
use crate::type_aliases::{ConflictMap, GroupedRequirements, ResolutionGraph};
use crate::ui::Ui;

type RError<P> = ResolverError<
    <P as SpecificationProvider>::Requirement,
    <P as SpecificationProvider>::Spec,
>;

/// One run of the resolution algorithm. Owns the state stack; the provider,
/// ui and locked `base` graph are borrowed for the duration.
pub(crate) struct Resolution<'a, P: SpecificationProvider, U: Ui> {
    provider: &'a P,
    ui: &'a U,
    base: &'a ResolutionGraph<P>,
    requested: Vec<P::Requirement>,
    states: Vec<ResolutionState<P>>,
    iteration_counter: u64,
    /// Latched once `progress_rate` has elapsed: how many iterations fit in
    /// that interval, used as the progress reporting period from then on.
    iteration_rate: Option<u64>,
    started_at: Instant,
}

impl<'a, P: SpecificationProvider, U: Ui> Resolution<'a, P, U> {
    pub(crate) fn new(
        provider: &'a P,
        ui: &'a U,
        requested: Vec<P::Requirement>,
        base: &'a ResolutionGraph<P>,
    ) -> Self {
        Self {
            provider,
            ui,
            base,
            requested,
            states: Vec::new(),
            iteration_counter: 0,
            iteration_rate: None,
            started_at: Instant::now(),
        }
    }

    /// Runs the search to completion. The `after_resolution` hook fires on
    /// every exit path.
    pub(crate) fn resolve(mut self) -> Result<ResolutionGraph<P>, RError<P>> {
        let result = self
            .start_resolution()
            .and_then(|()| self.run_state_machine());
        self.end_resolution();
        result
    }

    fn start_resolution(&mut self) -> Result<(), RError<P>> {
        self.started_at = Instant::now();
        let initial = self.initial_state()?;
        self.handle_missing_or_push_dependency_state(initial)?;
        self.ui.debug(0, &|| "starting resolution".to_owned());
        self.ui.before_resolution();
        Ok(())
    }

    fn end_resolution(&self) {
        self.ui.after_resolution();
        self.ui.debug(0, &|| {
            format!(
                "finished resolution ({} steps, took {:?})",
                self.iteration_counter,
                self.started_at.elapsed()
            )
        });
    }

    fn run_state_machine(&mut self) -> Result<ResolutionGraph<P>, RError<P>> {
        while self.has_work() {
            self.indicate_progress();
            self.split_topmost_state();
            self.process_topmost_state()?;
        }
        let mut graph = self
            .states
            .pop()
            .expect("the state machine always terminates with a state")
            .into_inner()
            .graph;
        graph.freeze();
        Ok(graph)
    }

    /// There is work as long as the top state has a requirement in hand or
    /// requirements still queued.
    fn has_work(&self) -> bool {
        self.state().is_some_and(|state| {
            state.requirement.is_some() || !state.requirements.is_empty()
        })
    }

    /// If the top state is an uncommitted choice point, pops its next
    /// candidate into a fresh possibility state. A choice point with nothing
    /// left to try stays on top as a conflict-to-be.
    fn split_topmost_state(&mut self) {
        let depth = self.depth();
        let Some(top) = self.states.last() else { return };
        if !top.is_dependency() {
            return;
        }
        {
            let state = top.get();
            let message = || {
                format!(
                    "creating a possibility state for {:?} ({} candidates left)",
                    state.requirement,
                    state.possibilities.len()
                )
            };
            self.ui.debug(depth, &message);
        }
        let trial = self
            .states
            .last_mut()
            .expect("the top state was just inspected")
            .get_mut()
            .pop_possibility_state();
        if let Some(state) = trial {
            self.states.push(state);
        }
    }

    fn process_topmost_state(&mut self) -> Result<(), RError<P>> {
        if self.possibility().is_some() {
            self.attempt_to_activate()
        } else {
            self.create_conflict();
            loop {
                self.unwind_for_conflict()?;
                let ready = self.states.last().is_some_and(|top| {
                    top.is_dependency() && !top.get().possibilities.is_empty()
                });
                if ready {
                    return Ok(());
                }
            }
        }
    }

    fn attempt_to_activate(&mut self) -> Result<(), RError<P>> {
        let depth = self.depth();
        let name = self.current_name();
        {
            let possibility = self.possibility().expect("a candidate is being trialed");
            let message = || format!("attempting to activate {possibility:?}");
            self.ui.debug(depth, &message);
        }
        let existing = self
            .state()
            .expect("a state is being processed")
            .graph
            .vertex_named(&name)
            .expect("the current requirement's package is always in the graph")
            .payload()
            .cloned();
        match existing {
            Some(spec) => self.attempt_to_activate_existing_spec(&name, spec),
            None => self.attempt_to_activate_new_spec(&name),
        }
    }

    /// The package is already activated: either the existing specification
    /// also serves the current requirement, or the trial conflicts with it.
    fn attempt_to_activate_existing_spec(
        &mut self,
        name: &str,
        existing: P::Spec,
    ) -> Result<(), RError<P>> {
        let depth = self.depth();
        let requirement = self
            .requirement()
            .cloned()
            .expect("a requirement is being processed");
        let state = self.state().expect("a state is being processed");
        let satisfied = self
            .provider
            .requirement_satisfied_by(&requirement, &state.graph, &existing);
        if satisfied {
            {
                let message =
                    || format!("found an existing specification for {name}: {existing:?}");
                self.ui.debug(depth, &message);
            }
            let remaining = state.requirements.clone();
            let snapshot = state.graph.clone();
            self.push_state_for_requirements(remaining, snapshot)
        } else {
            self.create_conflict();
            {
                let message = || format!("unsatisfied by the existing specification {existing:?}");
                self.ui.debug(depth, &message);
            }
            self.unwind_for_conflict()
        }
    }

    /// The package has no activation yet: the candidate must satisfy both the
    /// current requirement and, when `base` locks this package, the
    /// requirement derived from the locked specification.
    fn attempt_to_activate_new_spec(&mut self, name: &str) -> Result<(), RError<P>> {
        let depth = self.depth();
        let requirement = self
            .requirement()
            .cloned()
            .expect("a requirement is being processed");
        let possibility = self
            .possibility()
            .cloned()
            .expect("a candidate is being trialed");
        let locked = self.locked_requirement_named(name);
        let graph = &self.state().expect("a state is being processed").graph;
        let requested_satisfied = self
            .provider
            .requirement_satisfied_by(&requirement, graph, &possibility);
        let locked_satisfied = locked.as_ref().map_or(true, |lock| {
            self.provider.requirement_satisfied_by(lock, graph, &possibility)
        });
        if !requested_satisfied {
            self.ui
                .debug(depth, &|| "unsatisfied by the requested requirement".to_owned());
        }
        if !locked_satisfied {
            self.ui
                .debug(depth, &|| "unsatisfied by the locked requirement".to_owned());
        }
        if requested_satisfied && locked_satisfied {
            self.activate_spec(name, possibility)
        } else {
            self.create_conflict();
            self.unwind_for_conflict()
        }
    }

    /// Commits the candidate: clears the package's conflict, writes the
    /// payload, records an edge per nested dependency, and moves on to the
    /// next requirement.
    fn activate_spec(&mut self, name: &str, possibility: P::Spec) -> Result<(), RError<P>> {
        let depth = self.depth();
        {
            let message = || format!("activated {name} at {possibility:?}");
            self.ui.debug(depth, &message);
        }
        let state = self
            .states
            .last_mut()
            .expect("a state is being processed")
            .get_mut();
        state.conflicts.shift_remove(name);
        let id = state
            .graph
            .vertex_id(name)
            .expect("the current requirement's package is always in the graph");
        state.graph.set_payload(id, possibility.clone())?;
        self.require_nested_dependencies_for(possibility)
    }

    fn require_nested_dependencies_for(&mut self, spec: P::Spec) -> Result<(), RError<P>> {
        let depth = self.depth();
        let nested = self.enrich(self.provider.dependencies_for(&spec))?;
        {
            let message = || format!("requiring nested dependencies {nested:?}");
            self.ui.debug(depth, &message);
        }
        let provider = self.provider;
        let spec_name = provider.name_for_spec(&spec);
        let state = self
            .states
            .last_mut()
            .expect("a state is being processed")
            .get_mut();
        for dependency in &nested {
            let dependency_name = provider.name_for(dependency);
            state
                .graph
                .add_child_vertex(&dependency_name, None, &[spec_name.as_str()], dependency)?;
        }
        let mut new_requirements = state.requirements.clone();
        new_requirements.extend(nested);
        let snapshot = state.graph.clone();
        self.push_state_for_requirements(new_requirements, snapshot)
    }

    /// Sorts the pending requirements, takes the most preferred one, and
    /// pushes a choice point for it on top of `graph`.
    fn push_state_for_requirements(
        &mut self,
        requirements: Vec<P::Requirement>,
        graph: ResolutionGraph<P>,
    ) -> Result<(), RError<P>> {
        let depth = self.depth();
        let conflicts = self
            .state()
            .map(|state| state.conflicts.clone())
            .unwrap_or_default();
        let mut sorted = self
            .provider
            .sort_dependencies(requirements, &graph, &conflicts);
        let requirement = if sorted.is_empty() {
            None
        } else {
            Some(sorted.remove(0))
        };
        let name = requirement
            .as_ref()
            .map(|r| self.provider.name_for(r))
            .unwrap_or_default();
        let possibilities = match &requirement {
            Some(r) => self.search_for(r)?,
            None => Vec::new(),
        };
        self.handle_missing_or_push_dependency_state(State {
            name,
            requirements: sorted,
            graph,
            requirement,
            possibilities,
            depth,
            conflicts,
        })
    }

    /// Pushes the choice point, unless its requirement has no candidates and
    /// the provider tolerates its absence, in which case the package is
    /// dropped from the graph and resolution continues with the remaining
    /// requirements.
    fn handle_missing_or_push_dependency_state(
        &mut self,
        mut state: State<P>,
    ) -> Result<(), RError<P>> {
        let missing_allowed = state
            .requirement
            .as_ref()
            .is_some_and(|r| self.provider.allow_missing(r));
        if state.requirement.is_some() && state.possibilities.is_empty() && missing_allowed {
            state.graph.detach_vertex_named(&state.name)?;
            self.push_state_for_requirements(std::mem::take(&mut state.requirements), state.graph)
        } else {
            self.states.push(ResolutionState::Dependency(state));
            Ok(())
        }
    }

    /// Builds the conflict record for the package under consideration and
    /// stores it in the top state, replacing any earlier conflict for the
    /// same name.
    fn create_conflict(&mut self) {
        let provider = self.provider;
        let name = self.current_name();
        let requirement = self
            .requirement()
            .cloned()
            .expect("a conflict always involves a requirement");
        let possibility = self.possibility().cloned();
        let locked = self.locked_requirement_named(&name);
        let state = self
            .states
            .last_mut()
            .expect("a conflict always involves a state")
            .get_mut();
        let vertex_id = state
            .graph
            .vertex_id(&name)
            .expect("the conflicting package is always in the graph");
        let vertex = state.graph.vertex(vertex_id);

        let mut grouped = GroupedRequirements::<P::Requirement>::default();
        if !vertex.explicit_requirements().is_empty() {
            grouped.insert(
                provider.name_for_explicit_dependency_source(),
                vertex.explicit_requirements().to_vec(),
            );
        }
        if let Some(lock) = locked {
            grouped.insert(provider.name_for_locking_dependency_source(), vec![lock]);
        }
        for edge in state.graph.incoming_edges(vertex_id) {
            let origin = state.graph.vertex(edge.origin()).name().to_owned();
            let bucket = grouped.entry(origin).or_default();
            for (i, r) in edge.requirements().iter().enumerate() {
                bucket.insert(i, r.clone());
            }
        }
        grouped.retain(|_, bucket| !bucket.is_empty());

        let existing = vertex.payload().cloned();
        state.conflicts.insert(
            name,
            Conflict {
                requirement,
                requirements: grouped,
                existing,
                possibility,
            },
        );
    }

    /// Rewinds the stack so a different choice is still possible, carrying
    /// the accumulated conflicts onto the new top state. Fails with
    /// [ResolverError::VersionConflict] when no state can change the outcome.
    fn unwind_for_conflict(&mut self) -> Result<(), RError<P>> {
        let depth = self.depth();
        {
            let requirement = self.requirement();
            let message = || format!("unwinding for conflict: {requirement:?}");
            self.ui.debug(depth, &message);
        }
        let conflicts = self
            .state()
            .map(|state| state.conflicts.clone())
            .unwrap_or_default();
        let keep = match self.state_index_for_unwind() {
            Some(index) => index + 2,
            None => 1,
        };
        self.states.truncate(keep);
        self.states.pop();
        match self.states.last_mut() {
            Some(state) => {
                state.get_mut().conflicts = conflicts;
                Ok(())
            }
            None => Err(ResolverError::VersionConflict(conflicts)),
        }
    }

    /// The deepest choice point that can still change the outcome for the
    /// failing requirement: one where the conflicting package is not yet
    /// activated, or where the failing requirement was not yet under
    /// consideration. A state with no vertex for the package at all means
    /// nothing below can help either.
    fn state_index_for_unwind(&self) -> Option<usize> {
        let state = self.state()?;
        let name = &state.name;
        let requirement = state.requirement.as_ref()?;
        for index in (0..self.states.len()).rev() {
            let candidate = &self.states[index];
            let data = candidate.get();
            let vertex = data.graph.vertex_named(name)?;
            if !candidate.is_dependency() {
                continue;
            }
            if vertex.payload().is_none() {
                return Some(index);
            }
            if data.requirement.as_ref() != Some(requirement)
                && !data.requirements.contains(requirement)
            {
                return Some(index);
            }
        }
        None
    }

    /// The requirement a locked specification in `base` imposes on the named
    /// package, if the base graph pins one.
    fn locked_requirement_named(&self, name: &str) -> Option<P::Requirement> {
        let payload = self.base.vertex_named(name)?.payload()?;
        Some(self.provider.requirement_for_locked_spec(payload))
    }

    fn initial_state(&mut self) -> Result<State<P>, RError<P>> {
        let mut graph = ResolutionGraph::<P>::new();
        for requirement in &self.requested {
            let name = self.provider.name_for(requirement);
            graph.add_root_vertex(&name, requirement.clone())?;
        }
        let mut sorted =
            self.provider
                .sort_dependencies(self.requested.clone(), &graph, &ConflictMap::default());
        let requirement = if sorted.is_empty() {
            None
        } else {
            Some(sorted.remove(0))
        };
        let name = requirement
            .as_ref()
            .map(|r| self.provider.name_for(r))
            .unwrap_or_default();
        let possibilities = match &requirement {
            // No state exists yet, so a missing dependency here propagates
            // without a `required_by` trail.
            Some(r) => self.search_for(r)?,
            None => Vec::new(),
        };
        Ok(State {
            name,
            requirements: sorted,
            graph,
            requirement,
            possibilities,
            depth: 0,
            conflicts: ConflictMap::default(),
        })
    }

    /// Counts an iteration and reports progress once the latched rate is
    /// known. The first `progress_rate` of wall time only counts; the counter
    /// value at that moment becomes the reporting period.
    fn indicate_progress(&mut self) {
        self.iteration_counter += 1;
        if self.iteration_rate.is_none() && self.started_at.elapsed() >= self.ui.progress_rate() {
            self.iteration_rate = Some(self.iteration_counter);
        }
        if let Some(rate) = self.iteration_rate {
            if self.iteration_counter % rate == 0 {
                self.ui.indicate_progress();
            }
        }
    }

    fn search_for(&self, requirement: &P::Requirement) -> Result<Vec<P::Spec>, RError<P>> {
        self.enrich(self.provider.search_for(requirement))
    }

    /// Every fallible provider call is routed through here so that a missing
    /// dependency is annotated with the names of everything that required it,
    /// per the activated graph of the current state.
    fn enrich<T>(
        &self,
        result: Result<T, NoSuchDependencyError<P::Requirement>>,
    ) -> Result<T, RError<P>> {
        result.map_err(|mut error| {
            if let Some(state) = self.state() {
                let name = self.provider.name_for(&error.dependency);
                if let Some(id) = state.graph.vertex_id(&name) {
                    error.required_by.extend(
                        state
                            .graph
                            .incoming_edges(id)
                            .map(|edge| state.graph.vertex(edge.origin()).name().to_owned()),
                    );
                    if !state.graph.vertex(id).explicit_requirements().is_empty() {
                        error
                            .required_by
                            .push(self.provider.name_for_explicit_dependency_source());
                    }
                }
            }
            ResolverError::NoSuchDependency(error)
        })
    }

    fn state(&self) -> Option<&State<P>> {
        self.states.last().map(ResolutionState::get)
    }

    fn depth(&self) -> usize {
        self.state().map_or(0, |state| state.depth)
    }

    fn current_name(&self) -> String {
        self.state()
            .map(|state| state.name.clone())
            .unwrap_or_default()
    }

    fn requirement(&self) -> Option<&P::Requirement> {
        self.state().and_then(|state| state.requirement.as_ref())
    }

    fn possibility(&self) -> Option<&P::Spec> {
        self.state().and_then(|state| state.possibilities.last())
    }
}
