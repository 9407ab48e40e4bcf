//! The pipeline run state machine.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use groundwork_core::artifact::Artifact;
use groundwork_core::executor::{BuildExecutor, SourceProvider};
use groundwork_core::pipeline::{
    Action, ActionKind, FailureCause, Pipeline, PipelineRun, RunState, SOURCE_ARTIFACT, Stage,
};
use groundwork_core::{Error, Result, RunId};

use crate::validate_lineage;

/// Event emitted during a pipeline run.
#[derive(Debug, Clone)]
pub enum RunEvent {
    StageStarted { stage: String, index: usize },
    ActionCompleted { stage: String, action: String, success: bool },
    StageCompleted { stage: String, success: bool },
    RunCompleted { state: RunState },
}

/// The provisioning path a `Deploy` action invokes. The infrastructure
/// pipeline deploys its own stacks through this seam.
#[async_trait]
pub trait DeployTarget: Send + Sync {
    async fn deploy_stack(&self, stack: &str) -> Result<()>;
}

/// Cancels a run between stages. Mid-action cancellation is not supported;
/// the current stage finishes (or fails) first.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

/// Orchestrates pipeline runs over the collaborator contracts.
pub struct PipelineOrchestrator {
    source: Arc<dyn SourceProvider>,
    builder: Arc<dyn BuildExecutor>,
    deployer: Arc<dyn DeployTarget>,
}

impl PipelineOrchestrator {
    pub fn new(
        source: Arc<dyn SourceProvider>,
        builder: Arc<dyn BuildExecutor>,
        deployer: Arc<dyn DeployTarget>,
    ) -> Self {
        Self {
            source,
            builder,
            deployer,
        }
    }

    /// Start a run for `revision`, returning the event channel, a cancel
    /// handle and a join handle for the final run record.
    ///
    /// Lineage is validated here, synchronously: a misconfigured pipeline
    /// fails before any stage starts.
    pub fn execute(
        &self,
        pipeline: &Pipeline,
        revision: &str,
    ) -> Result<(
        mpsc::Receiver<RunEvent>,
        CancelHandle,
        tokio::task::JoinHandle<PipelineRun>,
    )> {
        validate_lineage(pipeline)?;

        let (tx, rx) = mpsc::channel(64);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let source = Arc::clone(&self.source);
        let builder = Arc::clone(&self.builder);
        let deployer = Arc::clone(&self.deployer);
        let pipeline = pipeline.clone();
        let revision = revision.to_string();

        let handle = tokio::spawn(async move {
            execute_inner(source, builder, deployer, pipeline, revision, cancel_rx, tx).await
        });

        Ok((rx, CancelHandle(cancel_tx), handle))
    }
}

async fn execute_inner(
    source: Arc<dyn SourceProvider>,
    builder: Arc<dyn BuildExecutor>,
    deployer: Arc<dyn DeployTarget>,
    pipeline: Pipeline,
    revision: String,
    cancel: watch::Receiver<bool>,
    tx: mpsc::Sender<RunEvent>,
) -> PipelineRun {
    let mut run = PipelineRun {
        id: RunId::new(),
        pipeline: pipeline.name.clone(),
        revision: revision.clone(),
        state: RunState::Pending,
        artifacts: BTreeMap::new(),
        started_at: Utc::now(),
        finished_at: None,
    };

    info!(run = %run.id, pipeline = %pipeline.name, %revision, "starting pipeline run");

    for (index, stage) in pipeline.stages.iter().enumerate() {
        // Cancellation is only honored between stages.
        if *cancel.borrow() {
            warn!(run = %run.id, stage = index, "run cancelled before stage");
            run.state = RunState::Failed {
                stage: index,
                cause: FailureCause::Cancelled,
            };
            break;
        }

        run.state = RunState::Running { stage: index };
        let _ = tx
            .send(RunEvent::StageStarted {
                stage: stage.name.clone(),
                index,
            })
            .await;

        let mut failed: Option<(String, String)> = None;
        for action in &stage.actions {
            let result = run_action(
                &source,
                &builder,
                &deployer,
                &revision,
                stage,
                index,
                action,
                &mut run.artifacts,
            )
            .await;

            let success = result.is_ok();
            let _ = tx
                .send(RunEvent::ActionCompleted {
                    stage: stage.name.clone(),
                    action: action.name.clone(),
                    success,
                })
                .await;

            if let Err(err) = result {
                error!(run = %run.id, stage = %stage.name, action = %action.name, error = %err, "action failed");
                failed = Some((action.name.clone(), err.to_string()));
                break;
            }
        }

        let success = failed.is_none();
        let _ = tx
            .send(RunEvent::StageCompleted {
                stage: stage.name.clone(),
                success,
            })
            .await;

        if let Some((action, message)) = failed {
            // Artifacts produced so far stay in the run record for
            // inspection; no rollback.
            run.state = RunState::Failed {
                stage: index,
                cause: FailureCause::ActionFailed { action, message },
            };
            break;
        }
    }

    if !run.state.is_terminal() {
        run.state = RunState::Succeeded;
    }
    run.finished_at = Some(Utc::now());

    info!(run = %run.id, state = ?run.state, "pipeline run finished");
    let _ = tx
        .send(RunEvent::RunCompleted {
            state: run.state.clone(),
        })
        .await;

    run
}

#[allow(clippy::too_many_arguments)]
async fn run_action(
    source: &Arc<dyn SourceProvider>,
    builder: &Arc<dyn BuildExecutor>,
    deployer: &Arc<dyn DeployTarget>,
    revision: &str,
    stage: &Stage,
    stage_index: usize,
    action: &Action,
    artifacts: &mut BTreeMap<String, Artifact>,
) -> Result<()> {
    let action_error = |message: String| Error::PipelineAction {
        stage: stage.name.clone(),
        action: action.name.clone(),
        message,
    };

    // Gather inputs; outputs of this same stage are not visible.
    let mut inputs = Vec::new();
    for name in &action.inputs {
        let artifact = artifacts
            .get(name)
            .filter(|a| a.visible_to_stage(stage_index))
            .ok_or_else(|| action_error(format!("input artifact '{name}' not available")))?;
        inputs.push(artifact.clone());
    }

    let produced: Vec<Artifact> = match &action.kind {
        ActionKind::Source => {
            let fetched = source
                .fetch(revision)
                .await
                .map_err(|e| action_error(e.to_string()))?;
            // The fetched bundle is the run's external source artifact,
            // published under each declared output name.
            let names: Vec<&str> = if action.outputs.is_empty() {
                vec![SOURCE_ARTIFACT]
            } else {
                action.outputs.iter().map(String::as_str).collect()
            };
            names
                .into_iter()
                .map(|name| Artifact {
                    name: name.to_string(),
                    produced_by_stage: None,
                    produced_by_action: action.name.clone(),
                    ..fetched.clone()
                })
                .collect()
        }
        ActionKind::Build { .. } | ActionKind::PublishAssets { .. } => {
            let outputs = builder
                .execute(action, &inputs)
                .await
                .map_err(|e| action_error(e.to_string()))?;
            outputs
                .into_iter()
                .map(|mut artifact| {
                    artifact.produced_by_stage = Some(stage_index);
                    artifact.produced_by_action = action.name.clone();
                    artifact
                })
                .collect()
        }
        ActionKind::Deploy { stack } => {
            deployer
                .deploy_stack(stack)
                .await
                .map_err(|e| action_error(e.to_string()))?;
            Vec::new()
        }
    };

    for artifact in produced {
        // Artifacts are immutable: a name is produced once per run.
        if artifacts.contains_key(&artifact.name) {
            return Err(action_error(format!(
                "artifact '{}' already produced",
                artifact.name
            )));
        }
        artifacts.insert(artifact.name.clone(), artifact);
    }

    Ok(())
}
