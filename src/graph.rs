// SPDX-License-Identifier: MPL-2.0

//! A directed acyclic graph of packages, tracking which specification each
//! package was activated at and which requirements pulled it in.
//!
//! The graph is the value produced by [resolve](crate::resolve): roots are the
//! packages the caller asked for, every other vertex is reachable from a root,
//! and every edge records the requirements its origin contributed. Vertices
//! and edges live in index-addressed arenas so that a snapshot is a plain
//! [Clone] and parent links never form an ownership cycle.

use crate::error::GraphError;
use crate::type_aliases::Map;

/// Identifier of a vertex within one [DependencyGraph].
///
/// Ids are only meaningful for the graph (or a clone of the graph) that issued
/// them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(u32);

/// Identifier of an edge within one [DependencyGraph].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct EdgeId(u32);

/// One logical package: its name, the specification it was activated at (if
/// any), and the requirements explicitly requested for it.
#[derive(Debug, Clone)]
pub struct Vertex<P, R> {
    name: String,
    payload: Option<P>,
    root: bool,
    explicit_requirements: Vec<R>,
    incoming: Vec<EdgeId>,
    outgoing: Vec<EdgeId>,
}

impl<P, R> Vertex<P, R> {
    /// The package name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The specification this package was activated at, if any.
    pub fn payload(&self) -> Option<&P> {
        self.payload.as_ref()
    }

    /// Whether the package was requested at top level.
    pub fn is_root(&self) -> bool {
        self.root
    }

    /// Requirements requested at top level for this package, in request order.
    pub fn explicit_requirements(&self) -> &[R] {
        &self.explicit_requirements
    }
}

/// A dependency link from a parent package to one of its dependencies,
/// accumulating every requirement the parent contributed for it.
#[derive(Debug, Clone)]
pub struct Edge<R> {
    origin: VertexId,
    destination: VertexId,
    requirements: Vec<R>,
}

impl<R> Edge<R> {
    /// The vertex this edge leaves.
    pub fn origin(&self) -> VertexId {
        self.origin
    }

    /// The vertex this edge points at.
    pub fn destination(&self) -> VertexId {
        self.destination
    }

    /// The requirements carried by this edge, oldest first.
    pub fn requirements(&self) -> &[R] {
        &self.requirements
    }
}

/// The activated dependency graph. See the [module docs](self).
///
/// `P` is the payload (specification) type, `R` the requirement type. All
/// mutating operations fail with [GraphError::Frozen] once
/// [freeze](Self::freeze) has been called.
#[derive(Debug, Clone)]
pub struct DependencyGraph<P, R> {
    /// Arena of vertices; `None` slots were detached.
    vertices: Vec<Option<Vertex<P, R>>>,
    /// Arena of edges; `None` slots belonged to detached vertices.
    edges: Vec<Option<Edge<R>>>,
    index_by_name: Map<String, VertexId>,
    frozen: bool,
}

impl<P, R> Default for DependencyGraph<P, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, R> DependencyGraph<P, R> {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            edges: Vec::new(),
            index_by_name: Map::default(),
            frozen: false,
        }
    }

    /// Whether [freeze](Self::freeze) has been called.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Rejects every subsequent mutation with [GraphError::Frozen].
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    fn check_unfrozen(&self) -> Result<(), GraphError> {
        if self.frozen {
            Err(GraphError::Frozen)
        } else {
            Ok(())
        }
    }

    /// The id of the vertex with the given name, if any.
    pub fn vertex_id(&self, name: &str) -> Option<VertexId> {
        self.index_by_name.get(name).copied()
    }

    /// The vertex with the given name, if any.
    pub fn vertex_named(&self, name: &str) -> Option<&Vertex<P, R>> {
        self.vertex_id(name).map(|id| self.vertex(id))
    }

    /// The vertex behind `id`. Panics if the vertex was detached.
    pub fn vertex(&self, id: VertexId) -> &Vertex<P, R> {
        self.vertices[id.0 as usize]
            .as_ref()
            .expect("vertex id refers to a detached vertex")
    }

    fn vertex_mut(&mut self, id: VertexId) -> &mut Vertex<P, R> {
        self.vertices[id.0 as usize]
            .as_mut()
            .expect("vertex id refers to a detached vertex")
    }

    fn edge(&self, id: EdgeId) -> &Edge<R> {
        self.edges[id.0 as usize]
            .as_ref()
            .expect("edge id refers to a detached edge")
    }

    /// Iterates over the live vertices in insertion order.
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex<P, R>> {
        self.vertices.iter().filter_map(|slot| slot.as_ref())
    }

    /// Number of live vertices.
    pub fn vertex_count(&self) -> usize {
        self.index_by_name.len()
    }

    /// Iterates over the edges pointing at `id`, one per distinct parent.
    pub fn incoming_edges(&self, id: VertexId) -> impl Iterator<Item = &Edge<R>> {
        self.vertex(id).incoming.iter().map(move |&e| self.edge(e))
    }

    /// Iterates over the edges leaving `id`.
    pub fn outgoing_edges(&self, id: VertexId) -> impl Iterator<Item = &Edge<R>> {
        self.vertex(id).outgoing.iter().map(move |&e| self.edge(e))
    }

    /// Adds a vertex, merging payload and root flag into an existing vertex of
    /// the same name.
    pub fn add_vertex(
        &mut self,
        name: &str,
        payload: Option<P>,
        root: bool,
    ) -> Result<VertexId, GraphError> {
        self.check_unfrozen()?;
        if let Some(id) = self.vertex_id(name) {
            let vertex = self.vertex_mut(id);
            if payload.is_some() {
                vertex.payload = payload;
            }
            vertex.root |= root;
            return Ok(id);
        }
        let id = VertexId(self.vertices.len() as u32);
        self.vertices.push(Some(Vertex {
            name: name.to_owned(),
            payload,
            root,
            explicit_requirements: Vec::new(),
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }));
        self.index_by_name.insert(name.to_owned(), id);
        Ok(id)
    }

    /// Adds an unpayloaded root vertex and appends `requirement` to its
    /// explicit list. Requesting the same name twice shares one vertex and
    /// accumulates the requirements in request order.
    pub fn add_root_vertex(&mut self, name: &str, requirement: R) -> Result<VertexId, GraphError> {
        let id = self.add_vertex(name, None, true)?;
        self.vertex_mut(id).explicit_requirements.push(requirement);
        Ok(id)
    }

    /// Adds a child vertex reachable from each of `parent_names`, recording
    /// `requirement` on every parent edge. Idempotent on `name`: re-adding
    /// extends the existing vertex with the new edges.
    pub fn add_child_vertex(
        &mut self,
        name: &str,
        payload: Option<P>,
        parent_names: &[&str],
        requirement: &R,
    ) -> Result<VertexId, GraphError>
    where
        R: Clone,
    {
        self.check_unfrozen()?;
        let child = self.add_vertex(name, payload, false)?;
        for parent in parent_names {
            let origin = self
                .vertex_id(parent)
                .ok_or_else(|| GraphError::UnknownVertex {
                    name: (*parent).to_owned(),
                })?;
            self.add_edge(origin, child, requirement.clone())?;
        }
        Ok(child)
    }

    /// Records that `origin` depends on `destination` because of
    /// `requirement`. Requirements accumulate on a single edge per
    /// origin/destination pair; an edge that would close a cycle is rejected.
    pub fn add_edge(
        &mut self,
        origin: VertexId,
        destination: VertexId,
        requirement: R,
    ) -> Result<EdgeId, GraphError> {
        self.check_unfrozen()?;
        if origin == destination || self.path_exists(destination, origin) {
            return Err(GraphError::WouldCreateCycle {
                origin: self.vertex(origin).name.clone(),
                destination: self.vertex(destination).name.clone(),
            });
        }
        let existing = self
            .vertex(origin)
            .outgoing
            .iter()
            .copied()
            .find(|&e| self.edge(e).destination == destination);
        if let Some(id) = existing {
            self.edges[id.0 as usize]
                .as_mut()
                .expect("outgoing list only holds live edges")
                .requirements
                .push(requirement);
            return Ok(id);
        }
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(Some(Edge {
            origin,
            destination,
            requirements: vec![requirement],
        }));
        self.vertex_mut(origin).outgoing.push(id);
        self.vertex_mut(destination).incoming.push(id);
        Ok(id)
    }

    fn path_exists(&self, from: VertexId, to: VertexId) -> bool {
        if from == to {
            return true;
        }
        self.vertex(from)
            .outgoing
            .iter()
            .any(|&e| self.path_exists(self.edge(e).destination, to))
    }

    /// Activates `id` at `payload`.
    pub fn set_payload(&mut self, id: VertexId, payload: P) -> Result<(), GraphError> {
        self.check_unfrozen()?;
        self.vertex_mut(id).payload = Some(payload);
        Ok(())
    }

    /// Removes the named vertex and its edges, then recursively removes
    /// former successors left with no parent (non-root vertices no remaining
    /// edge points at). Unknown names are ignored.
    pub fn detach_vertex_named(&mut self, name: &str) -> Result<(), GraphError> {
        self.check_unfrozen()?;
        if let Some(id) = self.vertex_id(name) {
            self.detach(id);
        }
        Ok(())
    }

    fn detach(&mut self, id: VertexId) {
        let vertex = self.vertices[id.0 as usize]
            .take()
            .expect("detach targets a live vertex");
        self.index_by_name.remove(&vertex.name);
        for e in vertex.incoming {
            let edge = self.edges[e.0 as usize]
                .take()
                .expect("incoming list only holds live edges");
            self.vertex_mut(edge.origin).outgoing.retain(|&o| o != e);
        }
        let mut successors = Vec::new();
        for e in vertex.outgoing {
            let edge = self.edges[e.0 as usize]
                .take()
                .expect("outgoing list only holds live edges");
            self.vertex_mut(edge.destination).incoming.retain(|&i| i != e);
            successors.push(edge.destination);
        }
        for successor in successors {
            let orphaned = self.vertices[successor.0 as usize]
                .as_ref()
                .is_some_and(|v| !v.root && v.incoming.is_empty());
            if orphaned {
                self.detach(successor);
            }
        }
    }

    fn live_vertices(&self) -> impl Iterator<Item = (VertexId, &Vertex<P, R>)> {
        self.vertices
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (VertexId(i as u32), v)))
    }
}

/// Structural equality: same named vertices (payload, root flag, explicit
/// requirements) and same incoming edges per vertex, regardless of arena slot
/// layout or frozenness.
impl<P: PartialEq, R: PartialEq> PartialEq for DependencyGraph<P, R> {
    fn eq(&self, other: &Self) -> bool {
        if self.vertex_count() != other.vertex_count() {
            return false;
        }
        self.live_vertices().all(|(id, vertex)| {
            let Some(other_id) = other.vertex_id(&vertex.name) else {
                return false;
            };
            let other_vertex = other.vertex(other_id);
            if vertex.root != other_vertex.root
                || vertex.payload != other_vertex.payload
                || vertex.explicit_requirements != other_vertex.explicit_requirements
            {
                return false;
            }
            let ours: Vec<_> = self
                .incoming_edges(id)
                .map(|e| (self.vertex(e.origin).name(), &e.requirements))
                .collect();
            let theirs: Vec<_> = other
                .incoming_edges(other_id)
                .map(|e| (other.vertex(e.origin).name(), &e.requirements))
                .collect();
            ours == theirs
        })
    }
}

impl<P: Eq, R: Eq> Eq for DependencyGraph<P, R> {}
