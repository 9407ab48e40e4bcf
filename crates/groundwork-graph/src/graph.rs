//! Immutable graph snapshot.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use groundwork_core::{NodeId, ResourceNode};

/// An immutable snapshot of the resolved dependency graph.
///
/// Safe to share (`Arc`) across concurrent batch dispatchers: nothing
/// mutates a graph after `build()`. Edges point from a node to the nodes it
/// depends on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    nodes: BTreeMap<NodeId, ResourceNode>,
    /// id -> ids it depends on.
    dependencies: BTreeMap<NodeId, BTreeSet<NodeId>>,
    /// id -> ids that depend on it. Maintained as the inverse of
    /// `dependencies`.
    dependents: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

impl Graph {
    pub(crate) fn new(
        nodes: BTreeMap<NodeId, ResourceNode>,
        dependencies: BTreeMap<NodeId, BTreeSet<NodeId>>,
    ) -> Self {
        let mut dependents: BTreeMap<NodeId, BTreeSet<NodeId>> =
            nodes.keys().map(|id| (id.clone(), BTreeSet::new())).collect();
        for (from, deps) in &dependencies {
            for to in deps {
                dependents.entry(to.clone()).or_default().insert(from.clone());
            }
        }
        Self {
            nodes,
            dependencies,
            dependents,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &NodeId) -> Option<&ResourceNode> {
        self.nodes.get(id)
    }

    /// All nodes in deterministic (id) order.
    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.values()
    }

    /// Ids of the nodes `id` depends on.
    pub fn dependencies_of(&self, id: &NodeId) -> impl Iterator<Item = &NodeId> {
        self.dependencies.get(id).into_iter().flatten()
    }

    /// Ids of the nodes that depend on `id`.
    pub fn dependents_of(&self, id: &NodeId) -> impl Iterator<Item = &NodeId> {
        self.dependents.get(id).into_iter().flatten()
    }

    /// Number of dependencies of `id`.
    pub fn in_degree(&self, id: &NodeId) -> usize {
        self.dependencies.get(id).map_or(0, |deps| deps.len())
    }
}
