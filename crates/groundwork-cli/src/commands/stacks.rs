//! Stack-level commands: synth, plan, deploy, destroy, validate.

use anyhow::{Context, Result};
use std::sync::Arc;

use groundwork_deployer::{BatchDispatcher, MemoryExecutor, StateStore};
use groundwork_scheduler::{DeployPlan, diff};

use super::{load_combined_snapshot, save_combined_snapshot, synthesize};

/// Resolve the declarations and print the batch plan.
pub fn synth(path: &str, json: bool) -> Result<()> {
    let (_, graph) = synthesize(path)?;
    let plan = DeployPlan::build(&graph)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!(
        "Resolved {} nodes into {} batches",
        plan.node_count(),
        plan.batches.len()
    );
    for (index, batch) in plan.batches.iter().enumerate() {
        println!("Batch {}:", index + 1);
        for id in batch {
            let kind = graph.get(id).map(|n| n.kind.to_string()).unwrap_or_default();
            println!("  {id} ({kind})");
        }
    }
    Ok(())
}

/// Diff against the applied state and print what a deploy would do.
pub fn plan(path: &str, state_dir: &str) -> Result<()> {
    let (stacks, graph) = synthesize(path)?;
    let store = StateStore::new(state_dir);
    let snapshot = load_combined_snapshot(&store, &stacks)?;
    let summary = diff(&graph, &snapshot);

    println!(
        "Plan: {} to create, {} to update, {} to delete, {} unchanged",
        summary.to_create.len(),
        summary.to_update.len(),
        summary.to_delete.len(),
        summary.unchanged.len()
    );
    for id in &summary.to_create {
        println!("  + {id}");
    }
    for id in &summary.to_update {
        println!("  ~ {id}");
    }
    for id in &summary.to_delete {
        println!("  - {id}");
    }
    if summary.is_noop() {
        println!("No changes; a deploy would be a no-op.");
    }
    Ok(())
}

/// Apply the declared stacks batch by batch.
pub async fn deploy(path: &str, state_dir: &str) -> Result<()> {
    let (stacks, graph) = synthesize(path)?;
    let plan = DeployPlan::build(&graph)?;
    let store = StateStore::new(state_dir);
    let mut snapshot = load_combined_snapshot(&store, &stacks)?;
    let summary = diff(&graph, &snapshot);

    if summary.is_noop() {
        println!("Nothing to do; state already matches the declarations.");
        return Ok(());
    }

    let dispatcher = BatchDispatcher::new(Arc::new(MemoryExecutor::new()));
    let result = dispatcher.apply(&graph, &plan, &summary, &mut snapshot).await;

    // Persist whatever landed, even on failure: already-applied nodes stay.
    save_combined_snapshot(&store, &stacks, &snapshot)?;
    let report = result.context("deploy halted")?;

    println!(
        "Deploy complete: {} applied, {} deleted, {} unchanged",
        report.applied.len(),
        report.deleted.len(),
        report.skipped
    );
    Ok(())
}

/// Destroy everything declared, dependents first.
pub async fn destroy(path: &str, state_dir: &str) -> Result<()> {
    let (stacks, graph) = synthesize(path)?;
    let plan = DeployPlan::build(&graph)?;
    let store = StateStore::new(state_dir);
    let mut snapshot = load_combined_snapshot(&store, &stacks)?;

    let dispatcher = BatchDispatcher::new(Arc::new(MemoryExecutor::new()));
    let result = dispatcher.destroy(&graph, &plan, &mut snapshot).await;

    save_combined_snapshot(&store, &stacks, &snapshot)?;
    let destroyed = result.context("destroy halted")?;

    println!("Destroyed {} nodes", destroyed.len());
    Ok(())
}

/// Validate declarations without touching any state.
pub fn validate(stacks_path: &str, pipeline_path: Option<&str>) -> Result<()> {
    let (stacks, graph) = synthesize(stacks_path)?;
    DeployPlan::build(&graph)?;
    println!(
        "OK: {} stacks, {} nodes after resolution",
        stacks.len(),
        graph.len()
    );

    if let Some(path) = pipeline_path {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read pipeline file: {path}"))?;
        let pipeline = groundwork_config::parse_pipeline(&content)
            .with_context(|| format!("failed to parse pipeline: {path}"))?;
        groundwork_pipeline::validate_lineage(&pipeline)?;
        println!(
            "OK: pipeline '{}' with {} stages",
            pipeline.name,
            pipeline.stages.len()
        );
    }
    Ok(())
}
