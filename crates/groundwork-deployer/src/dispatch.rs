//! Concurrent batch dispatch against a provisioning executor.

use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info};

use groundwork_core::executor::{ChangeKind, ProvisionExecutor};
use groundwork_core::snapshot::AppliedSnapshot;
use groundwork_core::{Error, NodeId, ResourceNode, Result};
use groundwork_graph::Graph;
use groundwork_scheduler::{DeployPlan, PlanSummary};

/// What a dispatch run did.
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Nodes applied (created or updated), in completion order.
    pub applied: Vec<NodeId>,
    /// Nodes destroyed because they were no longer declared.
    pub deleted: Vec<NodeId>,
    /// Declared nodes skipped because the diff found them unchanged.
    pub skipped: usize,
}

/// Drives deploy plans through a provisioning executor.
pub struct BatchDispatcher {
    executor: Arc<dyn ProvisionExecutor>,
}

impl BatchDispatcher {
    pub fn new(executor: Arc<dyn ProvisionExecutor>) -> Self {
        Self { executor }
    }

    /// Apply a plan, batch by batch, updating `snapshot` as nodes land.
    ///
    /// Unchanged nodes are skipped entirely (zero provisioning calls on a
    /// no-op diff). Within a batch, apply requests run concurrently; the
    /// first failure shuts the batch down and nothing later runs. Nodes that
    /// already succeeded stay applied and stay recorded.
    pub async fn apply(
        &self,
        graph: &Graph,
        plan: &DeployPlan,
        summary: &PlanSummary,
        snapshot: &mut AppliedSnapshot,
    ) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();

        // Nodes removed from the declaration are destroyed first so their
        // names are free for re-use. The snapshot carries no edges, so these
        // run one at a time.
        for id in &summary.to_delete {
            let node = match snapshot.nodes.get(id) {
                Some(applied) => {
                    let mut node = ResourceNode::new(id.clone(), applied.kind);
                    node.attrs = applied.attrs.clone();
                    node
                }
                None => continue,
            };
            info!(node = %id, "destroying removed node");
            self.executor.destroy(&node).await?;
            snapshot.remove(id);
            report.deleted.push(id.clone());
        }

        for (index, batch) in plan.batches.iter().enumerate() {
            let mut tasks: JoinSet<(NodeId, Result<ChangeKind>)> = JoinSet::new();

            for id in batch {
                let Some(change) = summary.change_for(id) else {
                    report.skipped += 1;
                    continue;
                };
                // Delete of a declared node never happens; deletes were
                // handled above from the snapshot side.
                let node = graph
                    .get(id)
                    .cloned()
                    .ok_or_else(|| Error::UnknownNode(id.clone()))?;
                let executor = Arc::clone(&self.executor);
                tasks.spawn(async move {
                    let result = executor.apply(&node, change).await.map(|_| change);
                    (node.id, result)
                });
            }

            let mut failure: Option<Error> = None;
            while let Some(joined) = tasks.join_next().await {
                let (id, result) =
                    joined.map_err(|e| Error::Internal(format!("apply task failed: {e}")))?;
                match result {
                    Ok(change) => {
                        info!(node = %id, batch = index, %change, "node applied");
                        if let Some(node) = graph.get(&id) {
                            snapshot.record(node);
                        }
                        report.applied.push(id);
                    }
                    Err(err) => {
                        error!(node = %id, batch = index, error = %err, "apply failed, halting");
                        failure = Some(err);
                        // Abandon the rest of the batch; later batches never
                        // start.
                        tasks.shutdown().await;
                        break;
                    }
                }
            }
            if let Some(err) = failure {
                return Err(err);
            }
        }

        Ok(report)
    }

    /// Destroy everything in the plan, in reverse creation order.
    pub async fn destroy(
        &self,
        graph: &Graph,
        plan: &DeployPlan,
        snapshot: &mut AppliedSnapshot,
    ) -> Result<Vec<NodeId>> {
        let mut destroyed = Vec::new();
        for batch in plan.destroy_order() {
            for id in batch {
                let node = graph
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| Error::UnknownNode(id.clone()))?;
                info!(node = %id, "destroying node");
                self.executor.destroy(&node).await?;
                snapshot.remove(&id);
                destroyed.push(id);
            }
        }
        Ok(destroyed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryExecutor;
    use groundwork_core::{NodeKind, ResourceNode};
    use groundwork_graph::GraphBuilder;
    use groundwork_scheduler::diff;

    fn id(name: &str) -> NodeId {
        NodeId::new("test", name)
    }

    fn chain() -> Graph {
        // c depends on b depends on a.
        let mut builder = GraphBuilder::new();
        for name in ["a", "b", "c"] {
            builder
                .add_node(ResourceNode::new(id(name), NodeKind::Storage))
                .unwrap();
        }
        builder.add_edge(&id("b"), &id("a")).unwrap();
        builder.add_edge(&id("c"), &id("b")).unwrap();
        builder.build().unwrap()
    }

    #[tokio::test]
    async fn applies_everything_and_records_snapshot() {
        let graph = chain();
        let plan = DeployPlan::build(&graph).unwrap();
        let mut snapshot = AppliedSnapshot::default();
        let summary = diff(&graph, &snapshot);

        let executor = Arc::new(MemoryExecutor::new());
        let dispatcher = BatchDispatcher::new(executor.clone());
        let report = dispatcher
            .apply(&graph, &plan, &summary, &mut snapshot)
            .await
            .unwrap();

        assert_eq!(report.applied.len(), 3);
        assert_eq!(snapshot.nodes.len(), 3);
        assert_eq!(executor.apply_calls().len(), 3);
    }

    #[tokio::test]
    async fn unchanged_rerun_makes_zero_calls() {
        let graph = chain();
        let plan = DeployPlan::build(&graph).unwrap();
        let mut snapshot = AppliedSnapshot::default();
        for node in graph.nodes() {
            snapshot.record(node);
        }
        let summary = diff(&graph, &snapshot);
        assert!(summary.is_noop());

        let executor = Arc::new(MemoryExecutor::new());
        let dispatcher = BatchDispatcher::new(executor.clone());
        let report = dispatcher
            .apply(&graph, &plan, &summary, &mut snapshot)
            .await
            .unwrap();

        assert!(report.applied.is_empty());
        assert_eq!(report.skipped, 3);
        assert!(executor.apply_calls().is_empty());
    }

    #[tokio::test]
    async fn failure_halts_later_batches_and_keeps_earlier_state() {
        let graph = chain();
        let plan = DeployPlan::build(&graph).unwrap();
        let mut snapshot = AppliedSnapshot::default();
        let summary = diff(&graph, &snapshot);

        let executor = Arc::new(MemoryExecutor::new().failing_on(id("b")));
        let dispatcher = BatchDispatcher::new(executor.clone());
        let err = dispatcher
            .apply(&graph, &plan, &summary, &mut snapshot)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Provisioning { ref node, .. } if *node == id("b")));
        // Batch 1 landed and stays recorded; batch 3 never ran.
        assert!(snapshot.nodes.contains_key(&id("a")));
        assert!(!snapshot.nodes.contains_key(&id("c")));
        assert!(!executor.apply_calls().iter().any(|(n, _)| *n == id("c")));
    }

    #[tokio::test]
    async fn removed_nodes_get_destroyed() {
        let old = ResourceNode::new(id("old"), NodeKind::Storage);
        let mut snapshot = AppliedSnapshot::default();
        snapshot.record(&old);

        let graph = GraphBuilder::new().build().unwrap();
        let plan = DeployPlan::build(&graph).unwrap();
        let summary = diff(&graph, &snapshot);

        let executor = Arc::new(MemoryExecutor::new());
        let dispatcher = BatchDispatcher::new(executor.clone());
        let report = dispatcher
            .apply(&graph, &plan, &summary, &mut snapshot)
            .await
            .unwrap();

        assert_eq!(report.deleted, vec![id("old")]);
        assert!(snapshot.is_empty());
        assert_eq!(executor.destroy_calls(), vec![id("old")]);
    }

    #[tokio::test]
    async fn destroy_walks_reverse_order() {
        let graph = chain();
        let plan = DeployPlan::build(&graph).unwrap();
        let mut snapshot = AppliedSnapshot::default();
        for node in graph.nodes() {
            snapshot.record(node);
        }

        let executor = Arc::new(MemoryExecutor::new());
        let dispatcher = BatchDispatcher::new(executor.clone());
        let destroyed = dispatcher.destroy(&graph, &plan, &mut snapshot).await.unwrap();

        assert_eq!(destroyed, vec![id("c"), id("b"), id("a")]);
        assert!(snapshot.is_empty());
    }
}
