// SPDX-License-Identifier: MPL-2.0

use std::collections::BTreeMap;
use std::fmt::{Debug, Display};

use version_ranges::Ranges;

use crate::error::NoSuchDependencyError;
use crate::package::Package;
use crate::solver::SpecificationProvider;
use crate::type_aliases::{ConflictMap, Map, ResolutionGraph, Set};

/// A basic implementation of [SpecificationProvider] backed by dependency
/// data held in memory.
///
/// Requirements are `(name, version set)` pairs and specifications are
/// `(name, version)` pairs.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(bound(
        serialize = "N: serde::Serialize, V: serde::Serialize",
        deserialize = "N: serde::Deserialize<'de>, V: serde::Deserialize<'de>"
    ))
)]
pub struct OfflineSpecificationProvider<N: Package, V: Ord> {
    dependencies: Map<N, BTreeMap<V, Vec<(N, Ranges<V>)>>>,
    missing_allowed: Set<N>,
}

impl<N: Package, V: Debug + Display + Clone + Ord> OfflineSpecificationProvider<N, V> {
    /// Creates an empty provider with no package data.
    pub fn new() -> Self {
        Self {
            dependencies: Map::default(),
            missing_allowed: Set::default(),
        }
    }

    /// Registers the dependencies of a package and version pair, replacing
    /// any previous registration of that pair.
    ///
    /// The provider assumes one call supplies *all* dependencies of the pair;
    /// there is no API for adding them one at a time.
    pub fn add_dependencies<I: IntoIterator<Item = (N, Ranges<V>)>>(
        &mut self,
        package: N,
        version: impl Into<V>,
        dependencies: I,
    ) {
        let package_deps = dependencies.into_iter().collect();
        let v = version.into();
        *self
            .dependencies
            .entry(package)
            .or_default()
            .entry(v)
            .or_default() = package_deps;
    }

    /// Tolerates the absence of `package`: searching for it yields no
    /// candidates instead of a missing-dependency error, and the resolver
    /// drops it from the graph.
    pub fn allow_missing(&mut self, package: N) {
        self.missing_allowed.insert(package);
    }

    /// Lists the packages that have been saved.
    pub fn packages(&self) -> impl Iterator<Item = &N> {
        self.dependencies.keys()
    }

    /// Lists the saved versions of `package` in ascending order, or [None]
    /// if nothing is known about it.
    pub fn versions(&self, package: &N) -> Option<impl Iterator<Item = &V>> {
        self.dependencies.get(package).map(|versions| versions.keys())
    }

    fn matching_version_count(&self, package: &N, range: &Ranges<V>) -> usize {
        self.dependencies
            .get(package)
            .map_or(0, |versions| versions.keys().filter(|v| range.contains(v)).count())
    }
}

/// Candidates are returned in ascending version order, so the newest matching
/// version is trialed first. Outstanding requirements are sorted
/// already-activated first, then conflicted, then fewest matching candidates,
/// which tends to surface dead ends early.
impl<N: Package, V: Debug + Display + Clone + Ord> SpecificationProvider
    for OfflineSpecificationProvider<N, V>
{
    type Requirement = (N, Ranges<V>);
    type Spec = (N, V);

    fn name_for(&self, (name, _): &Self::Requirement) -> String {
        name.to_string()
    }

    fn name_for_spec(&self, (name, _): &Self::Spec) -> String {
        name.to_string()
    }

    fn requirement_for_locked_spec(&self, (name, version): &Self::Spec) -> Self::Requirement {
        (name.clone(), Ranges::singleton(version.clone()))
    }

    fn search_for(
        &self,
        requirement: &Self::Requirement,
    ) -> Result<Vec<Self::Spec>, NoSuchDependencyError<Self::Requirement>> {
        let (name, range) = requirement;
        let Some(versions) = self.dependencies.get(name) else {
            return if self.missing_allowed.contains(name) {
                Ok(Vec::new())
            } else {
                Err(NoSuchDependencyError::new(requirement.clone()))
            };
        };
        Ok(versions
            .keys()
            .filter(|v| range.contains(v))
            .map(|v| (name.clone(), v.clone()))
            .collect())
    }

    fn dependencies_for(
        &self,
        (name, version): &Self::Spec,
    ) -> Result<Vec<Self::Requirement>, NoSuchDependencyError<Self::Requirement>> {
        match self
            .dependencies
            .get(name)
            .and_then(|versions| versions.get(version))
        {
            Some(dependencies) => Ok(dependencies.clone()),
            None => Err(NoSuchDependencyError::new((
                name.clone(),
                Ranges::singleton(version.clone()),
            ))),
        }
    }

    fn requirement_satisfied_by(
        &self,
        (name, range): &Self::Requirement,
        _activated: &ResolutionGraph<Self>,
        (spec_name, version): &Self::Spec,
    ) -> bool {
        name == spec_name && range.contains(version)
    }

    fn sort_dependencies(
        &self,
        mut requirements: Vec<Self::Requirement>,
        activated: &ResolutionGraph<Self>,
        conflicts: &ConflictMap<Self::Requirement, Self::Spec>,
    ) -> Vec<Self::Requirement> {
        requirements.sort_by_key(|(name, range)| {
            let key = name.to_string();
            let activated_already = activated
                .vertex_named(&key)
                .is_some_and(|vertex| vertex.payload().is_some());
            (
                u8::from(!activated_already),
                u8::from(!conflicts.contains_key(&key)),
                self.matching_version_count(name, range),
            )
        });
        requirements
    }

    fn allow_missing(&self, (name, _): &Self::Requirement) -> bool {
        self.missing_allowed.contains(name)
    }
}
