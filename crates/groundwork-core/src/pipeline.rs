//! Pipeline, stage and action definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::RunId;

/// Name of the artifact supplied by the external source provider. Always
/// available to every stage of a run.
pub const SOURCE_ARTIFACT: &str = "source";

/// A continuous-delivery pipeline definition: a totally ordered sequence of
/// stages, each holding one or more actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline name (e.g., "warehouse-sql").
    pub name: String,
    /// Ordered stages. Stage order is total; the pipeline is acyclic by
    /// construction.
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn stage_index(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.name == name)
    }
}

/// One stage of a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    /// Stage name (e.g., "Source", "Build", "Deploy").
    pub name: String,
    /// Actions in this stage. All must succeed before the next stage starts.
    pub actions: Vec<Action>,
}

/// The unit of success/failure within a stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Action name, unique within its stage.
    pub name: String,
    /// Named artifacts this action consumes. Each must be produced by an
    /// earlier stage or be [`SOURCE_ARTIFACT`].
    pub inputs: Vec<String>,
    /// Named artifacts this action produces. Each is produced exactly once
    /// per run.
    pub outputs: Vec<String>,
    /// What the action does.
    pub kind: ActionKind,
}

/// What an action does when executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ActionKind {
    /// Fetch the run's source artifact from the source provider.
    Source,
    /// Run a command manifest through the build executor.
    Build { commands: Vec<String> },
    /// Publish assets (images, bundles) through the build executor.
    PublishAssets { commands: Vec<String> },
    /// Apply a stack's deploy plan through the provisioning path.
    Deploy { stack: String },
}

impl ActionKind {
    pub fn describe(&self) -> &'static str {
        match self {
            ActionKind::Source => "source",
            ActionKind::Build { .. } => "build",
            ActionKind::PublishAssets { .. } => "publish-assets",
            ActionKind::Deploy { .. } => "deploy",
        }
    }
}

/// Why a run reached `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureCause {
    /// An action in the named stage failed.
    ActionFailed { action: String, message: String },
    /// The run was cancelled between stages.
    Cancelled,
}

/// State machine for one pipeline run.
///
/// `Pending -> Running { stage } -> Succeeded | Failed { stage, cause }`.
/// No automatic rollback: recovery from `Failed` is a new run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Pending,
    Running { stage: usize },
    Succeeded,
    Failed { stage: usize, cause: FailureCause },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed { .. })
    }
}

/// Record of a completed or in-flight pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: RunId,
    pub pipeline: String,
    /// Revision identifier the source provider was asked for.
    pub revision: String,
    pub state: RunState,
    /// Artifacts produced so far, by name. Survive a failed run for
    /// inspection.
    pub artifacts: BTreeMap<String, crate::artifact::Artifact>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_state_terminality() {
        assert!(!RunState::Pending.is_terminal());
        assert!(!RunState::Running { stage: 1 }.is_terminal());
        assert!(RunState::Succeeded.is_terminal());
        assert!(
            RunState::Failed {
                stage: 1,
                cause: FailureCause::Cancelled,
            }
            .is_terminal()
        );
    }
}
