//! Executor and provider trait contracts.
//!
//! These are the narrow boundaries to the external collaborators: the
//! provisioning backend, the source provider and the build/asset-publish
//! executor. The core never inspects what is behind them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;
use crate::pipeline::Action;
use crate::{ResourceNode, Result};

/// What the diff decided should happen to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Create => write!(f, "create"),
            ChangeKind::Update => write!(f, "update"),
            ChangeKind::Delete => write!(f, "delete"),
        }
    }
}

/// Per-node result reported by the provisioning executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyOutcome {
    /// Backend-specific identifier for the applied resource.
    pub provider_id: String,
    /// True when the backend found the node already converged and did
    /// nothing (idempotent re-apply).
    pub no_op: bool,
}

/// Provisioning backend. Receives nodes batch by batch in dependency order.
///
/// Implementations must support idempotent re-apply of an unchanged node.
#[async_trait]
pub trait ProvisionExecutor: Send + Sync {
    /// Name of this executor backend.
    fn name(&self) -> &'static str;

    /// Apply one node. Called concurrently for nodes within a batch.
    async fn apply(&self, node: &ResourceNode, change: ChangeKind) -> Result<ApplyOutcome>;

    /// Destroy one node. Called in reverse dependency order.
    async fn destroy(&self, node: &ResourceNode) -> Result<()>;
}

/// Supplies one immutable source artifact per run, keyed by revision.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch(&self, revision: &str) -> Result<Artifact>;
}

/// Runs build and asset-publish actions: given input artifacts and a command
/// manifest, produces zero or more named output artifacts or fails.
#[async_trait]
pub trait BuildExecutor: Send + Sync {
    async fn execute(&self, action: &Action, inputs: &[Artifact]) -> Result<Vec<Artifact>>;
}
