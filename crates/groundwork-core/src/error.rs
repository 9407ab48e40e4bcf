//! Error taxonomy for groundwork.
//!
//! Configuration errors are detected during graph resolution, before any
//! provisioning begins. Runtime errors carry enough identity (node id, stage
//! index, action name) for an operator to fix and re-run; nothing is rolled
//! back automatically.

use thiserror::Error;

use crate::NodeId;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("duplicate node: {0}")]
    DuplicateNode(NodeId),

    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("dependency cycle: {}", format_cycle(.path))]
    Cycle { path: Vec<NodeId> },

    #[error("node {node} references {target}, which does not exist in this build")]
    DanglingReference { node: NodeId, target: NodeId },

    #[error("access intent names unknown principal: {0}")]
    UnresolvedPrincipal(NodeId),

    #[error("access intent names unknown resource: {0}")]
    UnresolvedResource(NodeId),

    #[error("network tuple names context {context} outside network {network}")]
    UnknownContext { context: NodeId, network: String },

    #[error("stage '{stage}' consumes artifact '{artifact}' that no earlier stage produces")]
    UnknownArtifact { stage: String, artifact: String },

    #[error("artifact '{artifact}' is produced more than once (stage '{stage}')")]
    DuplicateArtifact { stage: String, artifact: String },

    #[error("provisioning {node} failed: {message}")]
    Provisioning { node: NodeId, message: String },

    #[error("pipeline action '{action}' failed in stage {stage}: {message}")]
    PipelineAction {
        stage: String,
        action: String,
        message: String,
    },

    #[error("run cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for errors detected during resolution, before anything is applied.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::DuplicateNode(_)
                | Error::UnknownNode(_)
                | Error::Cycle { .. }
                | Error::DanglingReference { .. }
                | Error::UnresolvedPrincipal(_)
                | Error::UnresolvedResource(_)
                | Error::UnknownContext { .. }
                | Error::UnknownArtifact { .. }
                | Error::DuplicateArtifact { .. }
        )
    }
}

fn format_cycle(path: &[NodeId]) -> String {
    path.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_lists_full_path() {
        let err = Error::Cycle {
            path: vec![
                NodeId::new("s", "a"),
                NodeId::new("s", "b"),
                NodeId::new("s", "a"),
            ],
        };
        assert_eq!(err.to_string(), "dependency cycle: s/a -> s/b -> s/a");
        assert!(err.is_configuration());
    }

    #[test]
    fn provisioning_errors_are_not_configuration() {
        let err = Error::Provisioning {
            node: NodeId::new("s", "db"),
            message: "timeout".into(),
        };
        assert!(!err.is_configuration());
    }
}
