//! Batch plan computation via Kahn's algorithm.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use groundwork_core::{Error, NodeId, Result};
use groundwork_graph::Graph;

/// Ordered deployment batches.
///
/// Nodes within a batch have no unresolved dependencies on each other and
/// may be provisioned concurrently; batches themselves are strictly ordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployPlan {
    pub batches: Vec<Vec<NodeId>>,
}

impl DeployPlan {
    /// Compute creation batches for a resolved graph.
    ///
    /// Repeatedly extracts the set of nodes with zero unresolved in-degree as
    /// one batch, sorted by id for determinism, then decrements dependents.
    /// A built graph is already acyclic, but a node that never reaches zero
    /// in-degree is still reported as a cycle.
    pub fn build(graph: &Graph) -> Result<Self> {
        let mut remaining: BTreeMap<NodeId, usize> = graph
            .nodes()
            .map(|n| (n.id.clone(), graph.in_degree(&n.id)))
            .collect();

        let mut batches = Vec::new();
        while !remaining.is_empty() {
            let ready: Vec<NodeId> = remaining
                .iter()
                .filter(|(_, degree)| **degree == 0)
                .map(|(id, _)| id.clone())
                .collect();

            if ready.is_empty() {
                return Err(cycle_among(graph, &remaining));
            }

            for id in &ready {
                remaining.remove(id);
                for dependent in graph.dependents_of(id) {
                    if let Some(degree) = remaining.get_mut(dependent) {
                        *degree -= 1;
                    }
                }
            }
            batches.push(ready);
        }

        debug!(batches = batches.len(), nodes = graph.len(), "deploy plan computed");
        Ok(Self { batches })
    }

    /// Deletion batches: the exact reverse of creation order. A node is
    /// destroyed only after everything that depends on it is destroyed.
    pub fn destroy_order(&self) -> Vec<Vec<NodeId>> {
        self.batches.iter().rev().cloned().collect()
    }

    pub fn node_count(&self) -> usize {
        self.batches.iter().map(|b| b.len()).sum()
    }

    /// Batch index of a node, if it is in the plan.
    pub fn batch_of(&self, id: &NodeId) -> Option<usize> {
        self.batches.iter().position(|b| b.contains(id))
    }
}

/// Reconstruct a cycle path among nodes that never reached zero in-degree.
fn cycle_among(graph: &Graph, remaining: &BTreeMap<NodeId, usize>) -> Error {
    let mut path = Vec::new();
    // Every remaining node has a remaining dependency, so walking
    // dependencies inside the remaining set must revisit a node.
    let mut current = remaining.keys().next().cloned();
    while let Some(id) = current {
        if let Some(start) = path.iter().position(|p| *p == id) {
            let mut cycle: Vec<NodeId> = path[start..].to_vec();
            cycle.push(id);
            return Error::Cycle { path: cycle };
        }
        current = graph
            .dependencies_of(&id)
            .find(|dep| remaining.contains_key(*dep))
            .cloned();
        path.push(id);
    }
    // Unreachable for a well-formed remaining set.
    Error::Cycle { path }
}

#[cfg(test)]
mod tests {
    use super::*;
    use groundwork_core::{NodeKind, ResourceNode};
    use groundwork_graph::GraphBuilder;

    fn id(name: &str) -> NodeId {
        NodeId::new("test", name)
    }

    fn diamond() -> Graph {
        // d depends on b and c; b and c depend on a.
        let mut builder = GraphBuilder::new();
        for name in ["a", "b", "c", "d"] {
            builder
                .add_node(ResourceNode::new(id(name), NodeKind::Storage))
                .unwrap();
        }
        builder.add_edge(&id("b"), &id("a")).unwrap();
        builder.add_edge(&id("c"), &id("a")).unwrap();
        builder.add_edge(&id("d"), &id("b")).unwrap();
        builder.add_edge(&id("d"), &id("c")).unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn batches_respect_dependencies() {
        let plan = DeployPlan::build(&diamond()).unwrap();
        assert_eq!(
            plan.batches,
            vec![
                vec![id("a")],
                vec![id("b"), id("c")],
                vec![id("d")],
            ]
        );
    }

    #[test]
    fn every_node_batched_after_its_dependencies() {
        let graph = diamond();
        let plan = DeployPlan::build(&graph).unwrap();
        for node in graph.nodes() {
            let batch = plan.batch_of(&node.id).unwrap();
            for dep in graph.dependencies_of(&node.id) {
                assert!(plan.batch_of(dep).unwrap() < batch, "{dep} not before {}", node.id);
            }
        }
    }

    #[test]
    fn destroy_order_is_reverse_of_creation() {
        let plan = DeployPlan::build(&diamond()).unwrap();
        let destroy = plan.destroy_order();
        assert_eq!(destroy.first().unwrap(), &vec![id("d")]);
        assert_eq!(destroy.last().unwrap(), &vec![id("a")]);
    }

    #[test]
    fn independent_nodes_share_the_first_batch() {
        let mut builder = GraphBuilder::new();
        for name in ["x", "y", "z"] {
            builder
                .add_node(ResourceNode::new(id(name), NodeKind::Storage))
                .unwrap();
        }
        let plan = DeployPlan::build(&builder.build().unwrap()).unwrap();
        assert_eq!(plan.batches.len(), 1);
        assert_eq!(plan.batches[0].len(), 3);
    }
}
