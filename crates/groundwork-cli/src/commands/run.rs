//! Local pipeline execution command.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use groundwork_core::artifact::Artifact;
use groundwork_core::executor::{BuildExecutor, SourceProvider};
use groundwork_core::pipeline::{Action, RunState};
use groundwork_core::stack::Stack;
use groundwork_core::{Error, NodeId};
use groundwork_deployer::{BatchDispatcher, MemoryExecutor, StateStore};
use groundwork_graph::Graph;
use groundwork_pipeline::{DeployTarget, PipelineOrchestrator, RunEvent};
use groundwork_scheduler::{DeployPlan, diff};

/// Run a pipeline locally against the declared stacks.
pub async fn run(
    stacks_path: &str,
    pipeline_path: &str,
    revision: &str,
    state_dir: &str,
) -> Result<()> {
    let (stacks, graph) = super::synthesize(stacks_path)?;

    let content = std::fs::read_to_string(pipeline_path)
        .with_context(|| format!("failed to read pipeline file: {pipeline_path}"))?;
    let pipeline = groundwork_config::parse_pipeline(&content)
        .with_context(|| format!("failed to parse pipeline: {pipeline_path}"))?;

    println!("Running pipeline: {} @ {revision}", pipeline.name);
    println!("Stages: {}", pipeline.stages.len());

    let orchestrator = PipelineOrchestrator::new(
        Arc::new(LocalSource),
        Arc::new(LocalBuild),
        Arc::new(StackDeployer {
            stacks,
            graph,
            state_dir: state_dir.to_string(),
        }),
    );

    println!("\n--- Starting pipeline run ---\n");

    let (mut rx, _cancel, handle) = orchestrator.execute(&pipeline, revision)?;

    while let Some(event) = rx.recv().await {
        match event {
            RunEvent::StageStarted { stage, index } => {
                println!("▶ Stage {} '{}' started", index + 1, stage);
            }
            RunEvent::ActionCompleted {
                stage,
                action,
                success,
            } => {
                let marker = if success { "✓" } else { "✗" };
                println!("  [{stage}] {marker} {action}");
            }
            RunEvent::StageCompleted { stage, success } => {
                if success {
                    println!("✓ Stage '{stage}' completed\n");
                } else {
                    println!("✗ Stage '{stage}' failed\n");
                }
            }
            RunEvent::RunCompleted { .. } => {}
        }
    }

    let run = handle.await.context("run task failed")?;
    match run.state {
        RunState::Succeeded => {
            println!("--- Run {} succeeded ---", run.id);
            Ok(())
        }
        RunState::Failed { stage, cause } => {
            anyhow::bail!("run {} failed at stage {}: {:?}", run.id, stage + 1, cause)
        }
        other => anyhow::bail!("run {} ended in unexpected state {:?}", run.id, other),
    }
}

/// Source provider that fabricates a revision-keyed artifact. Stands in for
/// the external source-control collaborator in local runs.
struct LocalSource;

#[async_trait]
impl SourceProvider for LocalSource {
    async fn fetch(&self, revision: &str) -> groundwork_core::Result<Artifact> {
        Ok(Artifact {
            name: "source".to_string(),
            produced_by_stage: None,
            produced_by_action: String::new(),
            location: format!("source://{revision}"),
            checksum: hex_digest(revision.as_bytes()),
            created_at: Utc::now(),
        })
    }
}

/// Build executor that records the command manifest and emits the declared
/// outputs with checksums derived from the inputs.
struct LocalBuild;

#[async_trait]
impl BuildExecutor for LocalBuild {
    async fn execute(
        &self,
        action: &Action,
        inputs: &[Artifact],
    ) -> groundwork_core::Result<Vec<Artifact>> {
        let mut hasher = Sha256::new();
        hasher.update(action.name.as_bytes());
        for input in inputs {
            hasher.update(input.checksum.as_bytes());
        }
        let checksum = hex::encode(hasher.finalize());

        Ok(action
            .outputs
            .iter()
            .map(|name| Artifact {
                name: name.clone(),
                produced_by_stage: None,
                produced_by_action: action.name.clone(),
                location: format!("local://{name}"),
                checksum: checksum.clone(),
                created_at: Utc::now(),
            })
            .collect())
    }
}

/// Wires pipeline `deploy` actions into the provisioning path: plan, diff
/// against the stack's applied state, dispatch what changed.
struct StackDeployer {
    stacks: Vec<Stack>,
    graph: Graph,
    state_dir: String,
}

#[async_trait]
impl DeployTarget for StackDeployer {
    async fn deploy_stack(&self, stack: &str) -> groundwork_core::Result<()> {
        if !self.stacks.iter().any(|s| s.name == stack) {
            return Err(Error::Internal(format!("unknown stack '{stack}'")));
        }

        let plan = DeployPlan::build(&self.graph)?;
        let store = StateStore::new(&self.state_dir);
        let mut snapshot = store
            .load(stack)
            .map_err(|e| Error::Internal(e.to_string()))?;

        // Scope the diff to the named stack; other stacks keep their own
        // state and deploy through their own actions.
        let mut summary = diff(&self.graph, &snapshot);
        let scoped = |id: &NodeId| id.stack() == stack;
        summary.to_create.retain(scoped);
        summary.to_update.retain(scoped);
        summary.to_delete.retain(scoped);

        let dispatcher = BatchDispatcher::new(Arc::new(MemoryExecutor::new()));
        let result = dispatcher
            .apply(&self.graph, &plan, &summary, &mut snapshot)
            .await;

        // Applied nodes stay recorded even when the dispatch halted early.
        store
            .save(stack, &snapshot)
            .map_err(|e| Error::Internal(e.to_string()))?;
        result.map(|_| ())
    }
}

fn hex_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
