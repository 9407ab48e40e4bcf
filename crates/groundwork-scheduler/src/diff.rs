//! Diff-then-apply classification against the last applied snapshot.

use serde::{Deserialize, Serialize};

use groundwork_core::NodeId;
use groundwork_core::executor::ChangeKind;
use groundwork_core::snapshot::AppliedSnapshot;
use groundwork_graph::Graph;

/// One node's classified change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeChange {
    pub id: NodeId,
    pub kind: ChangeKind,
}

/// Summary of what a deploy would do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub to_create: Vec<NodeId>,
    pub to_update: Vec<NodeId>,
    /// In the snapshot but no longer declared.
    pub to_delete: Vec<NodeId>,
    pub unchanged: Vec<NodeId>,
}

impl PlanSummary {
    /// True when a re-run would trigger zero provisioning calls.
    pub fn is_noop(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    /// The change a declared node needs, if any.
    pub fn change_for(&self, id: &NodeId) -> Option<ChangeKind> {
        if self.to_create.contains(id) {
            Some(ChangeKind::Create)
        } else if self.to_update.contains(id) {
            Some(ChangeKind::Update)
        } else if self.to_delete.contains(id) {
            Some(ChangeKind::Delete)
        } else {
            None
        }
    }
}

/// Classify every declared node against the last applied snapshot.
///
/// Content hashes decide create/update/unchanged; snapshot entries without a
/// declared counterpart become deletes.
pub fn diff(graph: &Graph, snapshot: &AppliedSnapshot) -> PlanSummary {
    let mut summary = PlanSummary::default();

    for node in graph.nodes() {
        if !snapshot.nodes.contains_key(&node.id) {
            summary.to_create.push(node.id.clone());
        } else if snapshot.is_unchanged(node) {
            summary.unchanged.push(node.id.clone());
        } else {
            summary.to_update.push(node.id.clone());
        }
    }

    for id in snapshot.nodes.keys() {
        if !graph.contains(id) {
            summary.to_delete.push(id.clone());
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use groundwork_core::{NodeKind, ResourceNode};
    use groundwork_graph::GraphBuilder;

    fn id(name: &str) -> NodeId {
        NodeId::new("test", name)
    }

    fn graph_with(nodes: Vec<ResourceNode>) -> Graph {
        let mut builder = GraphBuilder::new();
        for node in nodes {
            builder.add_node(node).unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn fresh_graph_is_all_creates() {
        let graph = graph_with(vec![ResourceNode::new(id("a"), NodeKind::Storage)]);
        let summary = diff(&graph, &AppliedSnapshot::default());
        assert_eq!(summary.to_create, vec![id("a")]);
        assert!(!summary.is_noop());
    }

    #[test]
    fn unchanged_redeclaration_is_a_noop() {
        let node = ResourceNode::new(id("a"), NodeKind::Storage).with_attr("retention", "destroy");
        let graph = graph_with(vec![node.clone()]);

        let mut snapshot = AppliedSnapshot::default();
        snapshot.record(&node);

        let summary = diff(&graph, &snapshot);
        assert!(summary.is_noop());
        assert_eq!(summary.unchanged, vec![id("a")]);
    }

    #[test]
    fn attribute_drift_becomes_update() {
        let applied = ResourceNode::new(id("a"), NodeKind::Storage).with_attr("size", "small");
        let mut snapshot = AppliedSnapshot::default();
        snapshot.record(&applied);

        let declared = ResourceNode::new(id("a"), NodeKind::Storage).with_attr("size", "large");
        let summary = diff(&graph_with(vec![declared]), &snapshot);
        assert_eq!(summary.to_update, vec![id("a")]);
        assert_eq!(summary.change_for(&id("a")), Some(ChangeKind::Update));
    }

    #[test]
    fn undeclared_applied_node_becomes_delete() {
        let gone = ResourceNode::new(id("old"), NodeKind::Storage);
        let mut snapshot = AppliedSnapshot::default();
        snapshot.record(&gone);

        let summary = diff(&graph_with(vec![]), &snapshot);
        assert_eq!(summary.to_delete, vec![id("old")]);
    }
}
