//! In-memory provisioning backend.
//!
//! Used for local dry runs and tests. Every apply converges immediately;
//! failures can be injected per node id.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Mutex;

use groundwork_core::executor::{ApplyOutcome, ChangeKind, ProvisionExecutor};
use groundwork_core::{Error, NodeId, ResourceNode, Result};

/// A provisioning executor that keeps applied state in memory.
#[derive(Default)]
pub struct MemoryExecutor {
    applies: Mutex<Vec<(NodeId, ChangeKind)>>,
    destroys: Mutex<Vec<NodeId>>,
    fail_on: BTreeSet<NodeId>,
}

impl MemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a provisioning failure for the given node.
    pub fn failing_on(mut self, id: NodeId) -> Self {
        self.fail_on.insert(id);
        self
    }

    /// All apply calls made so far, in completion order.
    pub fn apply_calls(&self) -> Vec<(NodeId, ChangeKind)> {
        self.applies.lock().unwrap().clone()
    }

    /// All destroy calls made so far.
    pub fn destroy_calls(&self) -> Vec<NodeId> {
        self.destroys.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProvisionExecutor for MemoryExecutor {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn apply(&self, node: &ResourceNode, change: ChangeKind) -> Result<ApplyOutcome> {
        if self.fail_on.contains(&node.id) {
            return Err(Error::Provisioning {
                node: node.id.clone(),
                message: "injected failure".into(),
            });
        }
        self.applies.lock().unwrap().push((node.id.clone(), change));
        Ok(ApplyOutcome {
            provider_id: format!("mem-{}", node.id),
            no_op: false,
        })
    }

    async fn destroy(&self, node: &ResourceNode) -> Result<()> {
        if self.fail_on.contains(&node.id) {
            return Err(Error::Provisioning {
                node: node.id.clone(),
                message: "injected failure".into(),
            });
        }
        self.destroys.lock().unwrap().push(node.id.clone());
        Ok(())
    }
}
